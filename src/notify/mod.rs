use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::mission::Mission;
use crate::observability::metrics::Metrics;

/// Per-target failure reported by a [`PushGateway`] implementation. A
/// network-backed gateway returns `Unavailable` when the push service cannot
/// be reached and `Rejected` when the service refuses the target (expired or
/// unregistered token). The dispatcher treats both the same way: log, count,
/// move on.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("push gateway unavailable: {0}")]
    Unavailable(String),

    #[error("push rejected: {0}")]
    Rejected(String),
}

/// Out-of-band alert shown to a driver whose app is not in the foreground.
#[derive(Debug, Clone, Serialize)]
pub struct PushAlert {
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
}

impl PushAlert {
    fn for_mission(title: &str, mission: &Mission, kind: &str) -> Self {
        let mut data = HashMap::new();
        data.insert("kind".to_string(), kind.to_string());
        data.insert("mission_id".to_string(), mission.id.to_string());

        Self {
            title: title.to_string(),
            body: format!(
                "{} - {}",
                mission.scheduled_time.format("%H:%M"),
                mission.client_name
            ),
            data,
        }
    }
}

/// External push gateway. Single-target send with a per-target result; any
/// throttling or retry policy belongs to the gateway, not to us.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, token: &str, alert: &PushAlert) -> Result<String, PushError>;
}

/// Gateway used when no real push backend is configured: logs the alert and
/// reports success.
pub struct LogOnlyGateway;

#[async_trait]
impl PushGateway for LogOnlyGateway {
    async fn send(&self, token: &str, alert: &PushAlert) -> Result<String, PushError> {
        info!(token, title = %alert.title, "push delivery (log-only gateway)");
        Ok(format!("log-only:{}", Uuid::new_v4()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SendOutcome {
    Delivered { message_id: String },
    /// The driver has no registered delivery address; not an error.
    Skipped,
    /// Gateway refused or was unreachable. Logged, never retried, and never
    /// surfaced as a failure of the operation that requested the alert.
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTarget {
    pub driver_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<FailedTarget>,
}

/// Best-effort delivery of mission alerts, keyed by driver. Strictly
/// asynchronous with respect to the state machine: a failed delivery changes
/// nothing about the transition that requested it.
#[derive(Clone)]
pub struct NotificationDispatcher {
    gateway: Arc<dyn PushGateway>,
    drivers: Arc<DashMap<Uuid, Driver>>,
    metrics: Metrics,
}

impl NotificationDispatcher {
    pub fn new(
        gateway: Arc<dyn PushGateway>,
        drivers: Arc<DashMap<Uuid, Driver>>,
        metrics: Metrics,
    ) -> Self {
        Self {
            gateway,
            drivers,
            metrics,
        }
    }

    /// Resolves the driver's delivery address and sends one alert. A missing
    /// address yields `Skipped`; a gateway failure yields `Failed`.
    pub async fn notify_driver(
        &self,
        driver_id: Uuid,
        alert: PushAlert,
    ) -> Result<SendOutcome, AppError> {
        let token = {
            let driver = self
                .drivers
                .get(&driver_id)
                .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
            driver.push_token.clone()
        };

        let Some(token) = token else {
            info!(%driver_id, "no delivery address registered, skipping push");
            self.metrics
                .push_deliveries_total
                .with_label_values(&["skipped"])
                .inc();
            return Ok(SendOutcome::Skipped);
        };

        match self.gateway.send(&token, &alert).await {
            Ok(message_id) => {
                self.metrics
                    .push_deliveries_total
                    .with_label_values(&["delivered"])
                    .inc();
                Ok(SendOutcome::Delivered { message_id })
            }
            Err(err) => {
                warn!(%driver_id, error = %err, "push delivery failed");
                self.metrics
                    .push_deliveries_total
                    .with_label_values(&["failed"])
                    .inc();
                Ok(SendOutcome::Failed {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Sends to every active driver with a registered delivery address,
    /// silently excluding the rest. Individual failures are reported as
    /// counts with per-target diagnostics, never raised.
    pub async fn broadcast(&self, alert: PushAlert) -> BroadcastReport {
        let targets: Vec<(Uuid, String)> = self
            .drivers
            .iter()
            .filter(|entry| entry.value().active)
            .filter_map(|entry| {
                entry
                    .value()
                    .push_token
                    .clone()
                    .map(|token| (entry.value().id, token))
            })
            .collect();

        let mut report = BroadcastReport {
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
        };

        for (driver_id, token) in targets {
            match self.gateway.send(&token, &alert).await {
                Ok(_) => {
                    report.success_count += 1;
                    self.metrics
                        .push_deliveries_total
                        .with_label_values(&["delivered"])
                        .inc();
                }
                Err(err) => {
                    warn!(%driver_id, error = %err, "broadcast target failed");
                    report.failure_count += 1;
                    report.failures.push(FailedTarget {
                        driver_id,
                        reason: err.to_string(),
                    });
                    self.metrics
                        .push_deliveries_total
                        .with_label_values(&["failed"])
                        .inc();
                }
            }
        }

        info!(
            success = report.success_count,
            failed = report.failure_count,
            "broadcast finished"
        );
        report
    }

    /// Fire-and-forget alert for a freshly dispatched mission. No-op when no
    /// driver is assigned.
    pub fn spawn_mission_sent(&self, mission: &Mission) {
        self.spawn_for_mission(mission, "Nouvelle mission", "mission_sent");
    }

    /// Fire-and-forget alert when an already dispatched mission changes.
    pub fn spawn_mission_updated(&self, mission: &Mission) {
        self.spawn_for_mission(mission, "Mission modifiee", "mission_updated");
    }

    /// Fire-and-forget cancellation alert before a dispatched mission is
    /// removed.
    pub fn spawn_mission_cancelled(&self, driver_id: Uuid, mission: &Mission) {
        let alert = PushAlert::for_mission("Mission annulee", mission, "mission_cancelled");
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.notify_driver(driver_id, alert).await {
                warn!(%driver_id, error = %err, "cancellation alert not delivered");
            }
        });
    }

    fn spawn_for_mission(&self, mission: &Mission, title: &str, kind: &str) {
        let Some(driver_id) = mission.driver_id else {
            return;
        };

        let alert = PushAlert::for_mission(title, mission, kind);
        let dispatcher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.notify_driver(driver_id, alert).await {
                warn!(%driver_id, error = %err, "mission alert not delivered");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    struct RecordingGateway {
        sent: Mutex<Vec<String>>,
        fail_tokens: Vec<String>,
    }

    impl RecordingGateway {
        fn new(fail_tokens: Vec<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_tokens: fail_tokens.into_iter().map(String::from).collect(),
            }
        }
    }

    #[async_trait]
    impl PushGateway for RecordingGateway {
        async fn send(&self, token: &str, _alert: &PushAlert) -> Result<String, PushError> {
            self.sent.lock().unwrap().push(token.to_string());
            if self.fail_tokens.iter().any(|t| t == token) {
                return Err(PushError::Rejected("token expired".to_string()));
            }
            Ok("msg-1".to_string())
        }
    }

    fn driver(seed: u128, active: bool, token: Option<&str>) -> Driver {
        Driver {
            id: Uuid::from_u128(seed),
            name: format!("driver-{seed}"),
            phone: None,
            active,
            push_token: token.map(String::from),
            updated_at: Utc::now(),
        }
    }

    fn dispatcher_with(
        gateway: Arc<RecordingGateway>,
        drivers: Vec<Driver>,
    ) -> NotificationDispatcher {
        let map = Arc::new(DashMap::new());
        for d in drivers {
            map.insert(d.id, d);
        }
        NotificationDispatcher::new(gateway, map, Metrics::new())
    }

    #[tokio::test]
    async fn missing_token_is_skipped_without_error() {
        let gateway = Arc::new(RecordingGateway::new(vec![]));
        let dispatcher = dispatcher_with(gateway.clone(), vec![driver(1, true, None)]);

        let outcome = dispatcher
            .notify_driver(
                Uuid::from_u128(1),
                PushAlert {
                    title: "t".to_string(),
                    body: "b".to_string(),
                    data: HashMap::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::Skipped);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_driver_is_not_found() {
        let gateway = Arc::new(RecordingGateway::new(vec![]));
        let dispatcher = dispatcher_with(gateway, vec![]);

        let err = dispatcher
            .notify_driver(
                Uuid::from_u128(9),
                PushAlert {
                    title: "t".to_string(),
                    body: "b".to_string(),
                    data: HashMap::new(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn broadcast_excludes_tokenless_and_inactive_drivers() {
        let gateway = Arc::new(RecordingGateway::new(vec![]));
        let dispatcher = dispatcher_with(
            gateway.clone(),
            vec![
                driver(1, true, Some("tok-1")),
                driver(2, true, Some("tok-2")),
                driver(3, true, None),
                driver(4, false, Some("tok-4")),
            ],
        );

        let report = dispatcher
            .broadcast(PushAlert {
                title: "t".to_string(),
                body: "b".to_string(),
                data: HashMap::new(),
            })
            .await;

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 0);

        let sent = gateway.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert!(!sent.contains(&"tok-4".to_string()));
    }

    #[tokio::test]
    async fn broadcast_reports_partial_failures_per_target() {
        let gateway = Arc::new(RecordingGateway::new(vec!["tok-2"]));
        let dispatcher = dispatcher_with(
            gateway,
            vec![driver(1, true, Some("tok-1")), driver(2, true, Some("tok-2"))],
        );

        let report = dispatcher
            .broadcast(PushAlert {
                title: "t".to_string(),
                body: "b".to_string(),
                data: HashMap::new(),
            })
            .await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.failures[0].driver_id, Uuid::from_u128(2));
    }

    #[tokio::test]
    async fn gateway_failure_is_reported_as_outcome_not_error() {
        // Gateway whose backing service is down for every send.
        struct DownGateway;

        #[async_trait]
        impl PushGateway for DownGateway {
            async fn send(&self, _token: &str, _alert: &PushAlert) -> Result<String, PushError> {
                Err(PushError::Unavailable("connection refused".to_string()))
            }
        }

        let map = Arc::new(DashMap::new());
        let d = driver(1, true, Some("tok-1"));
        map.insert(d.id, d);
        let dispatcher = NotificationDispatcher::new(Arc::new(DownGateway), map, Metrics::new());

        let outcome = dispatcher
            .notify_driver(
                Uuid::from_u128(1),
                PushAlert {
                    title: "t".to_string(),
                    body: "b".to_string(),
                    data: HashMap::new(),
                },
            )
            .await
            .unwrap();

        match outcome {
            SendOutcome::Failed { reason } => {
                assert!(reason.contains("unavailable"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
