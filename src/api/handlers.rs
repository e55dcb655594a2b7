use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use crate::monitor::state::{MonitorPhase, StatusSnapshot};
use crate::risk::UNKNOWN_RISK;

use super::types::*;
use super::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

const MAX_ALERTS: usize = 1000;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

// ============================================================
// Health & Status
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let status = state.monitor.status();
    let label = match status.phase {
        MonitorPhase::Running => "ok",
        MonitorPhase::Idle => "starting",
        MonitorPhase::Stopped => "stopped",
    };
    Ok(Json(HealthResponse {
        status: label.to_string(),
        phase: status.phase,
        last_analysis: status.last_analysis,
    }))
}

pub async fn status(State(state): State<Arc<AppState>>) -> ApiResult<StatusSnapshot> {
    Ok(Json(state.monitor.status()))
}

// ============================================================
// Analysis & Alerts
// ============================================================

pub async fn analysis(State(state): State<Arc<AppState>>) -> ApiResult<AnalysisResponse> {
    let response = match state.monitor.latest() {
        Some(report) => AnalysisResponse::Ready(report),
        None => AnalysisResponse::Pending {
            status: "no_analysis",
            risk_score: UNKNOWN_RISK,
        },
    };
    Ok(Json(response))
}

pub async fn alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertParams>,
) -> ApiResult<AlertsResponse> {
    let limit = params.limit.unwrap_or(100);
    if limit == 0 || limit > MAX_ALERTS {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("limit must be between 1 and {}", MAX_ALERTS),
        ));
    }

    let view = state.monitor.view();
    let alerts = view
        .alerts
        .into_iter()
        .filter(|a| params.kind.map_or(true, |k| a.kind == k))
        .filter(|a| params.severity.map_or(true, |s| a.severity == s))
        .take(limit)
        .collect();

    Ok(Json(AlertsResponse {
        total_alerts: view.status.total_alerts,
        alerts,
    }))
}
