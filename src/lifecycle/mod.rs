pub mod store;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::info;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::error::AppError;
use crate::models::event::{DeletedMission, DispatchEvent};
use crate::models::mission::{Mission, MissionFilter, MissionStatus};
use crate::notify::NotificationDispatcher;
use crate::observability::metrics::Metrics;
use store::MissionStore;

const EDITABLE: &[MissionStatus] = &[
    MissionStatus::Draft,
    MissionStatus::Sent,
    MissionStatus::Confirmed,
];

const ANY_STATUS: &[MissionStatus] = &[
    MissionStatus::Draft,
    MissionStatus::Sent,
    MissionStatus::Confirmed,
    MissionStatus::PickedUp,
    MissionStatus::Completed,
];

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMission {
    pub mission_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub driver_id: Option<Uuid>,
    #[serde(default = "default_passengers")]
    pub passenger_count: u32,
    pub estimated_price: Option<f64>,
    #[serde(default)]
    pub notes: String,
    /// When set, the mission skips Draft and is dispatched immediately.
    #[serde(default)]
    pub dispatch_now: bool,
}

fn default_passengers() -> u32 {
    1
}

/// Partial update; absent fields keep their current value. Status and
/// transition timestamps are deliberately not expressible here. The nullable
/// mission fields use a double `Option` so an explicit `null` clears the
/// value (unassigning the driver) while an absent field leaves it alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissionUpdate {
    pub mission_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub client_phone: Option<Option<String>>,
    pub pickup_address: Option<String>,
    pub dropoff_address: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub driver_id: Option<Option<Uuid>>,
    pub passenger_count: Option<u32>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub estimated_price: Option<Option<f64>>,
    pub notes: Option<String>,
}

/// Distinguishes a field that is present (possibly `null`) from one that is
/// absent: the outer `Option` only becomes `Some` when the key was given.
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Owns every mission mutation. Each transition is a conditional update
/// against the store; a guard that matches zero rows is a no-op reported to
/// the caller as `InvalidTransition`, which makes every transition idempotent
/// under retries. Successful transitions publish a domain event, and the ones
/// that must reach an off-screen driver also request a push delivery —
/// best-effort, off the request path.
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn MissionStore>,
    bus: EventBus,
    notifier: NotificationDispatcher,
    metrics: Metrics,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn MissionStore>,
        bus: EventBus,
        notifier: NotificationDispatcher,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            bus,
            notifier,
            metrics,
        }
    }

    pub async fn create(&self, input: CreateMission) -> Result<Mission, AppError> {
        if input.client_name.trim().is_empty() {
            return Err(AppError::BadRequest("client name cannot be empty".to_string()));
        }
        if input.pickup_address.trim().is_empty() || input.dropoff_address.trim().is_empty() {
            return Err(AppError::BadRequest(
                "pickup and dropoff addresses are required".to_string(),
            ));
        }
        if input.passenger_count == 0 {
            return Err(AppError::BadRequest("passenger count must be > 0".to_string()));
        }

        let now = Utc::now();
        let mission = Mission {
            id: Uuid::new_v4(),
            mission_date: input.mission_date,
            scheduled_time: input.scheduled_time,
            client_name: input.client_name,
            client_phone: input.client_phone,
            pickup_address: input.pickup_address,
            dropoff_address: input.dropoff_address,
            driver_id: input.driver_id,
            passenger_count: input.passenger_count,
            estimated_price: input.estimated_price,
            notes: input.notes,
            driver_comment: None,
            status: if input.dispatch_now {
                MissionStatus::Sent
            } else {
                MissionStatus::Draft
            },
            created_at: now,
            sent_at: input.dispatch_now.then_some(now),
            confirmed_at: None,
            picked_up_at: None,
            completed_at: None,
        };

        let mission = self.store.insert(mission).await?;
        self.count("create", "success");
        info!(mission_id = %mission.id, status = ?mission.status, "mission created");

        self.bus.publish(DispatchEvent::MissionNew(mission.clone()));
        if mission.status == MissionStatus::Sent {
            self.notifier.spawn_mission_sent(&mission);
        }

        Ok(mission)
    }

    pub async fn get(&self, id: Uuid) -> Result<Mission, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("mission {id} not found")))
    }

    pub async fn list(&self, filter: &MissionFilter) -> Result<Vec<Mission>, AppError> {
        self.store.list(filter).await
    }

    /// Missions visible to a driver: its own, Draft excluded.
    pub async fn list_for_driver(
        &self,
        driver_id: Uuid,
        filter: &MissionFilter,
    ) -> Result<Vec<Mission>, AppError> {
        let filter = MissionFilter {
            driver_id: Some(driver_id),
            ..filter.clone()
        };
        let missions = self.store.list(&filter).await?;
        Ok(missions
            .into_iter()
            .filter(|m| m.status != MissionStatus::Draft)
            .collect())
    }

    pub async fn send(&self, id: Uuid) -> Result<Mission, AppError> {
        let now = Utc::now();
        let sent = self
            .store
            .compare_and_transition(
                id,
                &[MissionStatus::Draft],
                Box::new(move |m| {
                    m.status = MissionStatus::Sent;
                    m.sent_at.get_or_insert(now);
                }),
            )
            .await?;

        let Some(mission) = sent else {
            self.count("send", "noop");
            return Err(AppError::InvalidTransition(
                "mission already sent or not found".to_string(),
            ));
        };

        self.count("send", "success");
        info!(mission_id = %mission.id, "mission sent");
        self.bus.publish(DispatchEvent::MissionSent(mission.clone()));
        self.notifier.spawn_mission_sent(&mission);
        Ok(mission)
    }

    /// Dispatches every Draft mission scheduled on `date`, each under its own
    /// conditional update. Returns exactly the set that transitioned;
    /// missions not in Draft are untouched.
    pub async fn send_all_for_date(&self, date: NaiveDate) -> Result<Vec<Mission>, AppError> {
        let now = Utc::now();
        let sent = self
            .store
            .transition_all_for_date(
                date,
                MissionStatus::Draft,
                Box::new(move |m| {
                    m.status = MissionStatus::Sent;
                    m.sent_at.get_or_insert(now);
                }),
            )
            .await?;

        info!(%date, count = sent.len(), "missions sent for date");
        for mission in &sent {
            self.count("send", "success");
            self.bus.publish(DispatchEvent::MissionSent(mission.clone()));
            self.notifier.spawn_mission_sent(mission);
        }

        Ok(sent)
    }

    pub async fn confirm(&self, id: Uuid) -> Result<Mission, AppError> {
        let now = Utc::now();
        let confirmed = self
            .store
            .compare_and_transition(
                id,
                &[MissionStatus::Sent],
                Box::new(move |m| {
                    m.status = MissionStatus::Confirmed;
                    m.confirmed_at.get_or_insert(now);
                }),
            )
            .await?;

        let Some(mission) = confirmed else {
            self.count("confirm", "noop");
            return Err(AppError::InvalidTransition(
                "mission already confirmed or not found".to_string(),
            ));
        };

        self.count("confirm", "success");
        info!(mission_id = %mission.id, "mission confirmed");
        self.bus
            .publish(DispatchEvent::MissionConfirmed(mission.clone()));
        Ok(mission)
    }

    /// Confirmation is optional: pickup is reachable from Sent as well.
    pub async fn pick_up(&self, id: Uuid) -> Result<Mission, AppError> {
        let now = Utc::now();
        let picked_up = self
            .store
            .compare_and_transition(
                id,
                &[MissionStatus::Sent, MissionStatus::Confirmed],
                Box::new(move |m| {
                    m.status = MissionStatus::PickedUp;
                    m.picked_up_at.get_or_insert(now);
                }),
            )
            .await?;

        let Some(mission) = picked_up else {
            self.count("pick_up", "noop");
            return Err(AppError::InvalidTransition(
                "mission already in progress or not found".to_string(),
            ));
        };

        self.count("pick_up", "success");
        info!(mission_id = %mission.id, "client picked up");
        self.bus
            .publish(DispatchEvent::MissionPickedUp(mission.clone()));
        Ok(mission)
    }

    pub async fn complete(&self, id: Uuid) -> Result<Mission, AppError> {
        let now = Utc::now();
        let completed = self
            .store
            .compare_and_transition(
                id,
                &[MissionStatus::PickedUp],
                Box::new(move |m| {
                    m.status = MissionStatus::Completed;
                    m.completed_at.get_or_insert(now);
                }),
            )
            .await?;

        let Some(mission) = completed else {
            self.count("complete", "noop");
            return Err(AppError::InvalidTransition(
                "mission already completed or not found".to_string(),
            ));
        };

        self.count("complete", "success");
        info!(mission_id = %mission.id, "mission completed");
        self.bus
            .publish(DispatchEvent::MissionCompleted(mission.clone()));
        Ok(mission)
    }

    /// Editable only until the ride has begun; after pickup the mission is
    /// immutable and the update is rejected with no mutation.
    pub async fn edit(&self, id: Uuid, update: MissionUpdate) -> Result<Mission, AppError> {
        if let Some(name) = &update.client_name {
            if name.trim().is_empty() {
                return Err(AppError::BadRequest("client name cannot be empty".to_string()));
            }
        }
        if let Some(count) = update.passenger_count {
            if count == 0 {
                return Err(AppError::BadRequest("passenger count must be > 0".to_string()));
            }
        }

        let edited = self
            .store
            .compare_and_transition(
                id,
                EDITABLE,
                Box::new(move |m| {
                    if let Some(v) = update.mission_date {
                        m.mission_date = v;
                    }
                    if let Some(v) = update.scheduled_time {
                        m.scheduled_time = v;
                    }
                    if let Some(v) = update.client_name.clone() {
                        m.client_name = v;
                    }
                    if let Some(v) = update.client_phone.clone() {
                        m.client_phone = v;
                    }
                    if let Some(v) = update.pickup_address.clone() {
                        m.pickup_address = v;
                    }
                    if let Some(v) = update.dropoff_address.clone() {
                        m.dropoff_address = v;
                    }
                    if let Some(v) = update.driver_id {
                        m.driver_id = v;
                    }
                    if let Some(v) = update.passenger_count {
                        m.passenger_count = v;
                    }
                    if let Some(v) = update.estimated_price {
                        m.estimated_price = v;
                    }
                    if let Some(v) = update.notes.clone() {
                        m.notes = v;
                    }
                }),
            )
            .await?;

        let Some(mission) = edited else {
            self.count("edit", "noop");
            return match self.store.get(id).await? {
                Some(_) => Err(AppError::InvalidTransition(
                    "mission already picked up or completed".to_string(),
                )),
                None => Err(AppError::NotFound(format!("mission {id} not found"))),
            };
        };

        self.count("edit", "success");
        info!(mission_id = %mission.id, "mission updated");
        self.bus
            .publish(DispatchEvent::MissionUpdated(mission.clone()));
        // A driver already holds a dispatched copy; tell it about the change.
        if matches!(mission.status, MissionStatus::Sent | MissionStatus::Confirmed) {
            self.notifier.spawn_mission_updated(&mission);
        }

        Ok(mission)
    }

    /// Removal is terminal and only allowed before pickup. Leaving Draft
    /// means a driver may already have seen the mission, so deletion of a
    /// dispatched mission triggers a cancellation alert.
    pub async fn delete(&self, id: Uuid) -> Result<Mission, AppError> {
        let removed = self.store.remove_if(id, EDITABLE).await?;

        let Some(mission) = removed else {
            self.count("delete", "noop");
            return match self.store.get(id).await? {
                Some(_) => Err(AppError::InvalidTransition(
                    "mission already picked up or completed".to_string(),
                )),
                None => Err(AppError::NotFound(format!("mission {id} not found"))),
            };
        };

        self.count("delete", "success");
        info!(mission_id = %mission.id, "mission deleted");

        if mission.status != MissionStatus::Draft {
            if let Some(driver_id) = mission.driver_id {
                self.notifier.spawn_mission_cancelled(driver_id, &mission);
            }
        }

        self.bus
            .publish(DispatchEvent::MissionDeleted(DeletedMission { id }));
        Ok(mission)
    }

    /// Permitted at any status; never changes status or timestamps.
    pub async fn add_comment(&self, id: Uuid, comment: String) -> Result<Mission, AppError> {
        let commented = self
            .store
            .compare_and_transition(
                id,
                ANY_STATUS,
                Box::new(move |m| {
                    m.driver_comment = Some(comment.clone());
                }),
            )
            .await?;

        let Some(mission) = commented else {
            return Err(AppError::NotFound(format!("mission {id} not found")));
        };

        self.count("comment", "success");
        self.bus
            .publish(DispatchEvent::MissionCommented(mission.clone()));
        Ok(mission)
    }

    fn count(&self, transition: &str, outcome: &str) {
        self.metrics
            .transitions_total
            .with_label_values(&[transition, outcome])
            .inc();
    }
}
