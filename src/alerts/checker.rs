//! Background alert checker
//!
//! Polls the alert source, compares the fingerprint of what it got with the
//! one from the previous poll, and only on a change renders and dispatches
//! messages.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::config::CheckerConfig;
use super::model::{AlertState, Fingerprint};
use super::notifier::{Notifier, NotifierError};
use super::render::build_messages;
use super::source::AlertSource;

/// Outcome of one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fingerprint: Fingerprint,
    /// Whether the fingerprint differed from the previous poll
    pub changed: bool,
    /// Group keys whose message was delivered
    pub sent: Vec<String>,
    /// Group keys whose message failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Change-detecting poll loop
pub struct AlertChecker {
    source: Box<dyn AlertSource>,
    notifier: Box<dyn Notifier>,
    config: CheckerConfig,
    /// Fingerprint of the last fetched state
    previous: Fingerprint,
}

impl AlertChecker {
    /// Create a checker; the first poll is compared against an empty state
    pub fn new(
        source: Box<dyn AlertSource>,
        notifier: Box<dyn Notifier>,
        config: CheckerConfig,
    ) -> Self {
        Self {
            source,
            notifier,
            config,
            previous: AlertState::default().fingerprint(),
        }
    }

    pub fn previous_fingerprint(&self) -> &Fingerprint {
        &self.previous
    }

    /// Run a single fetch/compare/dispatch cycle
    pub async fn poll_once(&mut self) -> CycleReport {
        let state = self.source.fetch().await;
        let fingerprint = state.fingerprint();

        if fingerprint == self.previous {
            tracing::debug!(alerts = state.alerts.len(), "Alert state unchanged");
            return CycleReport {
                fingerprint,
                changed: false,
                sent: Vec::new(),
                failed: Vec::new(),
            };
        }

        tracing::info!(
            alerts = state.alerts.len(),
            error = %state.error,
            "Alert state changed"
        );

        let (sent, failed) = self.dispatch(&state).await;

        // Failed groups are not retried: the next poll compares against this state
        self.previous = fingerprint.clone();

        CycleReport {
            fingerprint,
            changed: true,
            sent,
            failed,
        }
    }

    /// Send every group's message; one failure does not stop the others
    async fn dispatch(&self, state: &AlertState) -> (Vec<String>, Vec<(String, String)>) {
        let messages = build_messages(state, &self.config.render);
        let group_by = self.config.render.group_by.as_str();
        let target = self.config.target.as_str();

        let sends = messages.iter().map(|(key, body)| async move {
            tracing::debug!(group_by = %group_by, group = %key, "Message:\n{}", body);
            let result: Result<(), NotifierError> = self.notifier.send(target, body).await;
            (key.clone(), result)
        });

        let mut sent = Vec::new();
        let mut failed = Vec::new();
        for (key, result) in futures::future::join_all(sends).await {
            match result {
                Ok(()) => {
                    tracing::info!(group_by = %group_by, group = %key, "Notification sent");
                    sent.push(key);
                }
                Err(e) => {
                    tracing::error!(
                        group_by = %group_by,
                        group = %key,
                        error = %e,
                        "Notification failure"
                    );
                    failed.push((key, e.to_string()));
                }
            }
        }
        (sent, failed)
    }

    /// Poll until a shutdown signal arrives or its sender is dropped.
    ///
    /// The pause runs from the end of one cycle to the start of the next, so
    /// slow fetches never overlap.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::info!(
            interval = ?self.config.interval,
            group_by = %self.config.render.group_by,
            "Alert checker started"
        );

        loop {
            let report = self.poll_once().await;
            if !report.failed.is_empty() {
                tracing::warn!(
                    failed = report.failed.len(),
                    sent = report.sent.len(),
                    "Some notifications were not delivered"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }

        tracing::info!("Alert checker shutting down");
    }

    /// Spawn the loop on the tokio runtime
    pub fn start(self) -> CheckerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let join = tokio::spawn(self.run(shutdown_rx));
        CheckerHandle { shutdown_tx, join }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}

/// Handle to a running checker
pub struct CheckerHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl CheckerHandle {
    /// Signal shutdown and wait for the loop to finish its current cycle
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Alert checker task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::labels::LabelSet;
    use crate::alerts::model::Alert;
    use crate::alerts::render::STATUS_KEY;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Hands out queued states, repeating the last one forever
    struct ScriptedSource {
        states: Mutex<VecDeque<AlertState>>,
    }

    impl ScriptedSource {
        fn new(states: Vec<AlertState>) -> Self {
            Self {
                states: Mutex::new(states.into()),
            }
        }
    }

    #[async_trait]
    impl AlertSource for ScriptedSource {
        async fn fetch(&self) -> AlertState {
            let mut states = self.states.lock();
            if states.len() > 1 {
                states.pop_front().unwrap_or_default()
            } else {
                states.front().cloned().unwrap_or_default()
            }
        }
    }

    /// Records sends; bodies containing `fail_on` are rejected
    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<(String, String)>>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, target: &str, body: &str) -> Result<(), NotifierError> {
            self.sent.lock().push((target.to_string(), body.to_string()));
            match self.fail_on {
                Some(needle) if body.contains(needle) => Err(NotifierError::Rejected {
                    status: 500,
                    description: "boom".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }

    fn alert(name: &str, instance: &str) -> Alert {
        let labels: LabelSet = [("alertname", name), ("instance", instance)]
            .into_iter()
            .collect();
        let annotations: LabelSet = [("summary", name)].into_iter().collect();
        Alert::new(labels).with_annotations(annotations)
    }

    fn checker(states: Vec<AlertState>, notifier: RecordingNotifier) -> AlertChecker {
        let config = CheckerConfig {
            interval: Duration::from_millis(10),
            target: "chat".to_string(),
            ..CheckerConfig::default()
        };
        AlertChecker::new(
            Box::new(ScriptedSource::new(states)),
            Box::new(notifier),
            config,
        )
    }

    #[tokio::test]
    async fn test_unchanged_state_is_not_resent() {
        let state = AlertState::from_alerts(vec![alert("Cpu", "a:1"), alert("Disk", "b:1")]);
        let notifier = RecordingNotifier::default();
        let mut checker = checker(vec![state.clone(), state], notifier.clone());

        let first = checker.poll_once().await;
        assert!(first.changed);
        assert_eq!(first.sent, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(notifier.sent.lock().len(), 2);

        let second = checker.poll_once().await;
        assert!(!second.changed);
        assert!(second.sent.is_empty());
        assert_eq!(notifier.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_dropped_alert_triggers_dispatch() {
        let full = AlertState::from_alerts(vec![alert("Cpu", "a:1"), alert("Disk", "b:1")]);
        let fewer = AlertState::from_alerts(vec![alert("Cpu", "a:1")]);
        let notifier = RecordingNotifier::default();
        let mut checker = checker(vec![full, fewer], notifier.clone());

        checker.poll_once().await;
        let report = checker.poll_once().await;
        assert!(report.changed);
        assert_eq!(report.sent, vec!["a".to_string()]);
        assert_eq!(notifier.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_initial_empty_state_is_not_sent() {
        let notifier = RecordingNotifier::default();
        let mut checker = checker(vec![AlertState::default()], notifier.clone());

        let report = checker.poll_once().await;
        assert!(!report.changed);
        assert!(notifier.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_sends_no_alerts() {
        let notifier = RecordingNotifier::default();
        let mut checker = checker(
            vec![
                AlertState::from_alerts(vec![alert("Cpu", "a:1")]),
                AlertState::default(),
            ],
            notifier.clone(),
        );

        checker.poll_once().await;
        let report = checker.poll_once().await;
        assert_eq!(report.sent, vec![STATUS_KEY.to_string()]);
        assert_eq!(
            notifier.sent.lock().last().cloned(),
            Some(("chat".to_string(), "NO ALERTS".to_string()))
        );
    }

    #[tokio::test]
    async fn test_error_sent_once_while_unchanged() {
        let notifier = RecordingNotifier::default();
        let mut checker = checker(vec![AlertState::failed("connection refused")], notifier.clone());

        for _ in 0..3 {
            checker.poll_once().await;
        }
        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "ERROR: connection refused");
    }

    #[tokio::test]
    async fn test_failure_does_not_block_other_groups() {
        let notifier = RecordingNotifier {
            fail_on: Some("Cpu"),
            ..RecordingNotifier::default()
        };
        let state = AlertState::from_alerts(vec![alert("Cpu", "a:1"), alert("Disk", "b:1")]);
        let mut checker = checker(vec![state.clone(), state.clone()], notifier.clone());

        let report = checker.poll_once().await;
        assert_eq!(report.sent, vec!["b".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a");

        // The failed group is not retried for the same state
        assert_eq!(checker.previous_fingerprint(), &state.fingerprint());
        let report = checker.poll_once().await;
        assert!(!report.changed);
        assert_eq!(notifier.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_identical_payloads_dispatch_once() {
        use crate::alerts::source::PrometheusSource;
        use axum::{routing::get, Router};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::net::TcpListener;

        const FULL: &str = r#"{"status":"success","data":{"alerts":[
            {"labels":{"alertname":"Down","instance":"web-1:9100"},"annotations":{"summary":"web-1 down"}},
            {"labels":{"alertname":"Down","instance":"web-2:9100"},"annotations":{"summary":"web-2 down"}}
        ]}}"#;
        const FEWER: &str = r#"{"status":"success","data":{"alerts":[
            {"labels":{"alertname":"Down","instance":"web-1:9100"},"annotations":{"summary":"web-1 down"}}
        ]}}"#;

        // Two identical responses, then one with an alert gone
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/api/v1/alerts",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        FULL
                    } else {
                        FEWER
                    }
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let source = PrometheusSource::new(
            format!("http://{}/api/v1/alerts", addr),
            Duration::from_secs(5),
        )
        .unwrap();
        let notifier = RecordingNotifier::default();
        let mut checker = AlertChecker::new(
            Box::new(source),
            Box::new(notifier.clone()),
            CheckerConfig::default(),
        );

        assert_eq!(checker.poll_once().await.sent.len(), 2);
        assert!(!checker.poll_once().await.changed);
        assert_eq!(notifier.sent.lock().len(), 2);

        let report = checker.poll_once().await;
        assert!(report.changed);
        assert_eq!(report.sent, vec!["web-1".to_string()]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let notifier = RecordingNotifier::default();
        let state = AlertState::from_alerts(vec![alert("Cpu", "a:1")]);
        let handle = checker(vec![state], notifier.clone()).start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        // Several cycles ran but the unchanged state was dispatched once
        assert_eq!(notifier.sent.lock().len(), 1);
    }
}
