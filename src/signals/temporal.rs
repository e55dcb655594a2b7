use chrono::{DateTime, Datelike, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::ingest::types::TradeRecord;
use crate::stats;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Peak<K> {
    pub key: K,
    pub count: usize,
}

/// Activity histograms by UTC hour and weekday, plus how unevenly activity is spread.
#[derive(Debug, Clone, Serialize)]
pub struct TemporalReport {
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub daily_distribution: BTreeMap<String, usize>,
    pub peak_hour: Option<Peak<u32>>,
    pub peak_day: Option<Peak<String>>,
    pub hourly_cv: f64,
    pub daily_cv: f64,
    /// `1 - cv`, not clamped.
    pub hourly_regularity: f64,
    pub daily_regularity: f64,
    pub suspicious_pattern: bool,
}

pub struct TemporalAnalyzer {
    cv_threshold: f64,
}

impl TemporalAnalyzer {
    pub fn new(cv_threshold: f64) -> Self {
        Self { cv_threshold }
    }

    /// Returns `None` for an empty batch.
    pub fn analyze(&self, trades: &[TradeRecord]) -> Option<TemporalReport> {
        let mut hours = [0usize; 24];
        let mut days = [0usize; 7];
        let mut seen = 0usize;

        for trade in trades {
            let Some(dt) = DateTime::from_timestamp(trade.timestamp, 0) else {
                continue;
            };
            hours[dt.hour() as usize] += 1;
            days[dt.weekday().num_days_from_monday() as usize] += 1;
            seen += 1;
        }

        if seen == 0 {
            return None;
        }

        // Only buckets that saw activity take part in the distribution.
        let hourly: Vec<(u32, usize)> = hours
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(h, &c)| (h as u32, c))
            .collect();
        let daily: Vec<(String, usize)> = WEEKDAYS
            .iter()
            .zip(days.iter())
            .filter(|(_, c)| **c > 0)
            .map(|(d, &c)| (weekday_name(*d).to_string(), c))
            .collect();

        let hourly_counts: Vec<f64> = hourly.iter().map(|(_, c)| *c as f64).collect();
        let daily_counts: Vec<f64> = daily.iter().map(|(_, c)| *c as f64).collect();
        let hourly_cv = stats::coefficient_of_variation(&hourly_counts);
        let daily_cv = stats::coefficient_of_variation(&daily_counts);

        Some(TemporalReport {
            peak_hour: peak(&hourly),
            peak_day: peak(&daily),
            hourly_distribution: hourly.into_iter().collect(),
            daily_distribution: daily.into_iter().collect(),
            hourly_cv,
            daily_cv,
            hourly_regularity: 1.0 - hourly_cv,
            daily_regularity: 1.0 - daily_cv,
            suspicious_pattern: hourly_cv > self.cv_threshold || daily_cv > self.cv_threshold,
        })
    }
}

/// First bucket holding the highest count.
fn peak<K: Clone>(buckets: &[(K, usize)]) -> Option<Peak<K>> {
    let mut best: Option<&(K, usize)> = None;
    for bucket in buckets {
        if best.map_or(true, |b| bucket.1 > b.1) {
            best = Some(bucket);
        }
    }
    best.map(|(key, count)| Peak {
        key: key.clone(),
        count: *count,
    })
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
