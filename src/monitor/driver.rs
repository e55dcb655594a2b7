use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MonitorConfig};
use crate::ingest::source::TradeSource;
use crate::pipeline::{AnalysisReport, DetectionPipeline};
use crate::sync::report::save_report;

use super::alerts::{self, AlertEvent, AlertInputs};
use super::protocol::{ClientCommand, ServerMessage};
use super::state::{MonitorPhase, MonitorState, MonitorView, StatusSnapshot};

pub type SubscriberId = u64;

const COMMAND_BUFFER: usize = 64;
const SUBSCRIBER_BUFFER: usize = 64;

enum MonitorCommand {
    Subscribe {
        outbound: mpsc::Sender<ServerMessage>,
        reply: oneshot::Sender<SubscriberId>,
    },
    Unsubscribe(SubscriberId),
    Client {
        from: SubscriberId,
        command: ClientCommand,
    },
}

/// A registered subscriber's inbox.
pub struct Subscription {
    pub id: SubscriberId,
    pub messages: mpsc::Receiver<ServerMessage>,
}

/// Cloneable front door to the monitor loop. Commands are serialized through
/// the loop; reads come from the last published view and never wait on a pass.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    view: watch::Receiver<MonitorView>,
    shutdown: CancellationToken,
}

impl MonitorHandle {
    async fn send(&self, command: MonitorCommand) -> eyre::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| eyre::eyre!("Monitor is not running"))
    }

    /// Register a new subscriber. Its first message is `current_state`.
    pub async fn subscribe(&self) -> eyre::Result<Subscription> {
        let (outbound, messages) = mpsc::channel(SUBSCRIBER_BUFFER);
        let (reply, id) = oneshot::channel();
        self.send(MonitorCommand::Subscribe { outbound, reply }).await?;
        let id = id
            .await
            .map_err(|_| eyre::eyre!("Monitor stopped before accepting subscriber"))?;
        Ok(Subscription { id, messages })
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        // A stopped monitor has no subscribers left to remove.
        let _ = self.send(MonitorCommand::Unsubscribe(id)).await;
    }

    /// Forward a subscriber command. Replies arrive on that subscriber's inbox.
    pub async fn command(&self, from: SubscriberId, command: ClientCommand) -> eyre::Result<()> {
        self.send(MonitorCommand::Client { from, command }).await
    }

    pub fn view(&self) -> MonitorView {
        self.view.borrow().clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.view.borrow().status.clone()
    }

    pub fn latest(&self) -> Option<Arc<AnalysisReport>> {
        self.view.borrow().latest.clone()
    }

    /// Recent alerts, newest first.
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.view.borrow().alerts.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// The single owner of all monitor state. Runs passes on a fixed interval,
/// evaluates alerts, and fans results out to subscribers.
pub struct Monitor {
    config: MonitorConfig,
    source: Arc<dyn TradeSource>,
    pipeline: Arc<DetectionPipeline>,
    state: MonitorState,
    subscribers: BTreeMap<SubscriberId, mpsc::Sender<ServerMessage>>,
    next_id: SubscriberId,
    /// Set once the failure budget is spent; only then does `run` fail.
    exhausted: bool,
    commands: mpsc::Receiver<MonitorCommand>,
    view: watch::Sender<MonitorView>,
    shutdown: CancellationToken,
}

impl Monitor {
    pub fn new(
        config: &Config,
        source: Arc<dyn TradeSource>,
        pipeline: Arc<DetectionPipeline>,
        shutdown: CancellationToken,
    ) -> (Self, MonitorHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let state = MonitorState::new(config.thresholds.clone(), config.monitor.alert_history);
        let (view_tx, view_rx) = watch::channel(state.view(0));
        let monitor = Self {
            config: config.monitor.clone(),
            source,
            pipeline,
            state,
            subscribers: BTreeMap::new(),
            next_id: 1,
            exhausted: false,
            commands: rx,
            view: view_tx,
            shutdown: shutdown.clone(),
        };
        let handle = MonitorHandle {
            commands: tx,
            view: view_rx,
            shutdown,
        };
        (monitor, handle)
    }

    /// Drive the monitor until shutdown, or until the pipeline has failed
    /// `max_consecutive_failures` times in a row (returned as an error).
    pub async fn run(mut self) -> eyre::Result<()> {
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.shutdown.clone();

        self.state.phase = MonitorPhase::Running;
        self.refresh();
        tracing::info!(interval_secs = interval.as_secs(), "Monitor started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.pass(&shutdown).await {
                        break;
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::info!("All monitor handles dropped, stopping");
                        break;
                    };
                    if !self.handle_command(command, &shutdown).await {
                        break;
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown received, stopping monitor");
                    break;
                }
            }
        }

        self.state.phase = MonitorPhase::Stopped;
        self.refresh();
        if self.exhausted {
            return Err(eyre::eyre!(
                "Monitor stopped after {} consecutive pipeline failures",
                self.state.consecutive_failures
            ));
        }
        tracing::info!(total_alerts = self.state.total_alerts, "Monitor stopped");
        Ok(())
    }

    /// One analysis pass plus its follow-up. Returns false when the loop should exit.
    async fn pass(&mut self, shutdown: &CancellationToken) -> bool {
        let outcome = tokio::select! {
            outcome = self.analyze() => outcome,
            _ = shutdown.cancelled() => return false,
        };

        match outcome {
            Ok(report) => {
                self.publish(report);
                true
            }
            Err(e) => self.on_failure(e, shutdown).await,
        }
    }

    async fn analyze(&self) -> eyre::Result<AnalysisReport> {
        let source = Arc::clone(&self.source);
        let pipeline = Arc::clone(&self.pipeline);
        let task = tokio::task::spawn_blocking(move || -> eyre::Result<AnalysisReport> {
            let batch = source.fetch()?;
            if batch.skipped > 0 {
                tracing::warn!(skipped = batch.skipped, "Skipped malformed trade records");
            }
            Ok(pipeline.analyze(&batch))
        });

        let limit = Duration::from_secs(self.config.pass_timeout_secs.max(1));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(eyre::eyre!("Analysis task failed: {}", e)),
            Err(_) => Err(eyre::eyre!(
                "Analysis pass exceeded {}s timeout",
                limit.as_secs()
            )),
        }
    }

    fn publish(&mut self, report: AnalysisReport) {
        let report = Arc::new(report);
        self.state.record_pass(Arc::clone(&report));

        // Evaluate against the thresholds as they stand right now.
        let alerts = alerts::evaluate(
            &AlertInputs::from_report(&report),
            &self.state.volume_history,
            &self.state.thresholds,
        );
        self.state.record_alerts(&alerts);
        self.refresh();
        for alert in &alerts {
            tracing::warn!(
                kind = ?alert.kind,
                severity = ?alert.severity,
                value = alert.value,
                threshold = alert.threshold,
                "{}",
                alert.message
            );
        }

        if let Some(path) = &self.config.report_path {
            if let Err(e) = save_report(
                Path::new(path),
                &report.cluster_summary,
                &report.clusters,
                report.timestamp,
            ) {
                tracing::warn!(error = %e, "Failed to save cluster report");
            }
        }

        self.broadcast(ServerMessage::AnalysisUpdate {
            analysis: report,
            alerts,
        });
    }

    async fn on_failure(&mut self, error: eyre::Report, shutdown: &CancellationToken) -> bool {
        self.state.consecutive_failures += 1;
        let failures = self.state.consecutive_failures;
        tracing::error!(error = %error, consecutive_failures = failures, "Analysis pass failed");
        self.refresh();

        if failures >= self.config.max_consecutive_failures.max(1) {
            self.exhausted = true;
            self.state.phase = MonitorPhase::Stopped;
            self.broadcast(ServerMessage::error(format!(
                "Monitoring stopped after {} consecutive failures: {}",
                failures, error
            )));
            return false;
        }

        let backoff = Duration::from_secs(self.config.failure_backoff_secs);
        tokio::select! {
            _ = tokio::time::sleep(backoff) => true,
            _ = shutdown.cancelled() => false,
        }
    }

    async fn handle_command(&mut self, command: MonitorCommand, shutdown: &CancellationToken) -> bool {
        match command {
            MonitorCommand::Subscribe { outbound, reply } => {
                let id = self.next_id;
                self.next_id += 1;
                let hello = ServerMessage::CurrentState {
                    stats: self.state.latest_stats(),
                    thresholds: self.state.thresholds.clone(),
                };
                if outbound.try_send(hello).is_ok() && reply.send(id).is_ok() {
                    self.subscribers.insert(id, outbound);
                    self.refresh();
                    tracing::info!(subscriber = id, subscribers = self.subscribers.len(), "Subscriber connected");
                }
            }
            MonitorCommand::Unsubscribe(id) => {
                if self.subscribers.remove(&id).is_some() {
                    self.refresh();
                    tracing::info!(subscriber = id, subscribers = self.subscribers.len(), "Subscriber disconnected");
                }
            }
            MonitorCommand::Client { from, command } => return self.handle_client(from, command, shutdown).await,
        }
        true
    }

    async fn handle_client(
        &mut self,
        from: SubscriberId,
        command: ClientCommand,
        shutdown: &CancellationToken,
    ) -> bool {
        match command {
            ClientCommand::GetStatus => {
                let status = self.state.status(self.subscribers.len());
                self.send_to(from, ServerMessage::Status(status));
            }
            ClientCommand::UpdateThresholds { thresholds } => {
                match thresholds.apply(&self.state.thresholds) {
                    Ok(updated) => {
                        tracing::info!(subscriber = from, thresholds = ?updated, "Alert thresholds updated");
                        self.state.thresholds = updated.clone();
                        self.refresh();
                        self.send_to(from, ServerMessage::ThresholdsUpdated { thresholds: updated });
                    }
                    Err(e) => self.send_to(from, ServerMessage::error(e.to_string())),
                }
            }
            ClientCommand::ForceAnalysis => {
                tracing::info!(subscriber = from, "Forced analysis requested");
                return self.pass(shutdown).await;
            }
        }
        true
    }

    fn send_to(&mut self, id: SubscriberId, message: ServerMessage) {
        let Some(outbound) = self.subscribers.get(&id) else {
            return;
        };
        if let Err(e) = outbound.try_send(message) {
            tracing::warn!(subscriber = id, error = %e, "Dropping subscriber");
            self.subscribers.remove(&id);
            self.refresh();
        }
    }

    /// Best-effort fan-out. A subscriber that cannot take the message is dropped.
    fn broadcast(&mut self, message: ServerMessage) {
        let before = self.subscribers.len();
        self.subscribers.retain(|id, outbound| match outbound.try_send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(subscriber = *id, error = %e, "Dropping subscriber");
                false
            }
        });
        if self.subscribers.len() != before {
            self.refresh();
        }
    }

    fn refresh(&self) {
        self.view.send_replace(self.state.view(self.subscribers.len()));
    }
}
