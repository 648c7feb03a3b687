use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSample {
    pub driver_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Age-based classification of a driver's most recent sample.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Freshness {
    Online,
    WeakSignal,
    Offline,
}

/// One entry of the active-positions view: the latest sample per driver,
/// already filtered to fresh-enough ages.
#[derive(Debug, Clone, Serialize)]
pub struct ActivePosition {
    pub driver_id: Uuid,
    pub driver_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub freshness: Freshness,
}
