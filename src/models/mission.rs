use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states in order of progress. PickedUp and Completed are
/// immutable; Draft, Sent and Confirmed can still be edited or deleted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MissionStatus {
    Draft,
    Sent,
    Confirmed,
    PickedUp,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub mission_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub driver_id: Option<Uuid>,
    pub passenger_count: u32,
    pub estimated_price: Option<f64>,
    pub notes: String,
    pub driver_comment: Option<String>,
    pub status: MissionStatus,
    pub created_at: DateTime<Utc>,
    // Transition timestamps are append-only: set once, never rewritten.
    pub sent_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Filters for mission listing; every field is optional and combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub driver_id: Option<Uuid>,
    pub status: Option<MissionStatus>,
}

impl MissionFilter {
    pub fn matches(&self, mission: &Mission) -> bool {
        if let Some(from) = self.date_from {
            if mission.mission_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if mission.mission_date > to {
                return false;
            }
        }
        if let Some(driver_id) = self.driver_id {
            if mission.driver_id != Some(driver_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if mission.status != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mission(date: &str, status: MissionStatus) -> Mission {
        Mission {
            id: Uuid::new_v4(),
            mission_date: date.parse::<NaiveDate>().unwrap(),
            scheduled_time: "08:30:00".parse().unwrap(),
            client_name: "Dupont".to_string(),
            client_phone: None,
            pickup_address: "1 rue de la Gare".to_string(),
            dropoff_address: "CHU Nord".to_string(),
            driver_id: None,
            passenger_count: 1,
            estimated_price: None,
            notes: String::new(),
            driver_comment: None,
            status,
            created_at: Utc::now(),
            sent_at: None,
            confirmed_at: None,
            picked_up_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn filter_combines_date_range_and_status() {
        let filter = MissionFilter {
            date_from: Some("2026-03-01".parse().unwrap()),
            date_to: Some("2026-03-31".parse().unwrap()),
            driver_id: None,
            status: Some(MissionStatus::Sent),
        };

        assert!(filter.matches(&mission("2026-03-15", MissionStatus::Sent)));
        assert!(!filter.matches(&mission("2026-04-01", MissionStatus::Sent)));
        assert!(!filter.matches(&mission("2026-03-15", MissionStatus::Draft)));
    }
}
