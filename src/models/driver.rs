use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub active: bool,
    /// Delivery address for push notifications. Overwritten wholesale on
    /// every registration; no history kept.
    pub push_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}
