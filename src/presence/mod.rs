use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::validate_coords;
use crate::models::driver::Driver;
use crate::models::position::{ActivePosition, Freshness, PositionSample};
use crate::state::AppState;

/// A sample this recent means the driver is online.
pub const ONLINE_MAX_AGE_SECS: i64 = 120;
/// Beyond this age the driver is offline and omitted from the active view.
pub const STALE_MAX_AGE_SECS: i64 = 300;

/// Classifies presence purely from sample age; no heartbeat protocol beyond
/// the device's own re-sampling cadence.
pub fn classify(age_secs: i64) -> Freshness {
    if age_secs <= ONLINE_MAX_AGE_SECS {
        Freshness::Online
    } else if age_secs <= STALE_MAX_AGE_SECS {
        Freshness::WeakSignal
    } else {
        Freshness::Offline
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionIngest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

/// Append-only per-driver position log with a derived latest-per-driver view.
/// Each key is written by exactly one driver session, so the per-entry lock
/// is the only coordination needed.
#[derive(Default)]
pub struct PresenceTracker {
    samples: DashMap<Uuid, Vec<PositionSample>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample for `driver_id`. Malformed coordinates are rejected
    /// with no retry; the device resends on its own cadence.
    pub fn record(
        &self,
        driver_id: Uuid,
        ingest: PositionIngest,
    ) -> Result<PositionSample, AppError> {
        validate_coords(ingest.latitude, ingest.longitude)?;

        let sample = PositionSample {
            driver_id,
            latitude: ingest.latitude,
            longitude: ingest.longitude,
            accuracy: ingest.accuracy,
            speed: ingest.speed,
            heading: ingest.heading,
            recorded_at: Utc::now(),
            is_active: true,
        };

        self.push(sample.clone());
        debug!(%driver_id, lat = sample.latitude, lon = sample.longitude, "position recorded");
        Ok(sample)
    }

    fn push(&self, sample: PositionSample) {
        self.samples.entry(sample.driver_id).or_default().push(sample);
    }

    pub fn latest(&self, driver_id: Uuid) -> Option<PositionSample> {
        self.samples
            .get(&driver_id)
            .and_then(|log| log.last().cloned())
    }

    /// Most recent samples first, at most `limit` of them.
    pub fn history(&self, driver_id: Uuid, limit: usize) -> Vec<PositionSample> {
        self.samples
            .get(&driver_id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Marks the driver's latest sample inactive (logout), removing it from
    /// the active view immediately regardless of age.
    pub fn sign_off(&self, driver_id: Uuid) -> bool {
        match self.samples.get_mut(&driver_id) {
            Some(mut log) => match log.last_mut() {
                Some(sample) => {
                    sample.is_active = false;
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Latest sample per active-rostered driver, filtered to ages within the
    /// stale horizon. Offline drivers and signed-off drivers are omitted
    /// entirely.
    pub fn active_positions(&self, roster: &DashMap<Uuid, Driver>) -> Vec<ActivePosition> {
        self.active_positions_at(Utc::now(), roster)
    }

    pub fn active_positions_at(
        &self,
        now: DateTime<Utc>,
        roster: &DashMap<Uuid, Driver>,
    ) -> Vec<ActivePosition> {
        let mut positions: Vec<ActivePosition> = roster
            .iter()
            .filter(|entry| entry.value().active)
            .filter_map(|entry| {
                let driver = entry.value();
                let sample = self.latest(driver.id)?;
                if !sample.is_active {
                    return None;
                }

                let age_secs = (now - sample.recorded_at).num_seconds();
                let freshness = classify(age_secs);
                if freshness == Freshness::Offline {
                    return None;
                }

                Some(ActivePosition {
                    driver_id: driver.id,
                    driver_name: driver.name.clone(),
                    latitude: sample.latitude,
                    longitude: sample.longitude,
                    accuracy: sample.accuracy,
                    speed: sample.speed,
                    heading: sample.heading,
                    recorded_at: sample.recorded_at,
                    freshness,
                })
            })
            .collect();

        positions.sort_by_key(|p| p.driver_id);
        positions
    }

    /// Bulk retention pass: drops samples older than `horizon`. Returns the
    /// number of samples removed.
    pub fn purge_older_than(&self, horizon: DateTime<Utc>) -> usize {
        let mut removed = 0;

        for mut entry in self.samples.iter_mut() {
            let log = entry.value_mut();
            let before = log.len();
            log.retain(|sample| sample.recorded_at >= horizon);
            removed += before - log.len();
        }

        self.samples.retain(|_, log| !log.is_empty());
        removed
    }
}

/// Background retention task, off the request path.
pub async fn run_retention_task(state: Arc<AppState>) {
    let interval = std::time::Duration::from_secs(state.config.position_purge_interval_secs);
    let horizon_days = state.config.position_retention_days;
    info!(horizon_days, "position retention task started");

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let horizon = Utc::now() - Duration::days(horizon_days);
        let removed = state.presence.purge_older_than(horizon);
        if removed > 0 {
            info!(removed, "purged stale position samples");
        }
    }
}
