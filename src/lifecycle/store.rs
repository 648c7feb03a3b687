use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::mission::{Mission, MissionFilter, MissionStatus};

/// Mutation applied to a row once its guard has matched.
pub type Apply = Box<dyn Fn(&mut Mission) + Send + Sync>;

/// Relational-store seam for missions. The only mutation primitive is the
/// conditional single-row update ("WHERE id = ? AND status = expected"), so
/// racing transitions resolve without locks: exactly one caller matches, the
/// rest see `None` and treat it as a no-op.
#[async_trait]
pub trait MissionStore: Send + Sync {
    async fn insert(&self, mission: Mission) -> Result<Mission, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Mission>, AppError>;

    async fn list(&self, filter: &MissionFilter) -> Result<Vec<Mission>, AppError>;

    /// Applies `apply` only when the current status is one of `expected`.
    /// Returns the updated row, or `None` when zero rows matched.
    async fn compare_and_transition(
        &self,
        id: Uuid,
        expected: &[MissionStatus],
        apply: Apply,
    ) -> Result<Option<Mission>, AppError>;

    /// Per-mission-atomic variant over every mission scheduled on `date`
    /// whose status equals `expected`. Returns exactly the rows that
    /// transitioned.
    async fn transition_all_for_date(
        &self,
        date: NaiveDate,
        expected: MissionStatus,
        apply: Apply,
    ) -> Result<Vec<Mission>, AppError>;

    /// Removes the row only when its status is one of `expected`; returns
    /// the removed row.
    async fn remove_if(
        &self,
        id: Uuid,
        expected: &[MissionStatus],
    ) -> Result<Option<Mission>, AppError>;
}

/// In-memory store. DashMap entry locks give each row the same atomicity a
/// conditional UPDATE would: check and mutation happen under one lock.
#[derive(Default)]
pub struct MemoryStore {
    missions: DashMap<Uuid, Mission>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MissionStore for MemoryStore {
    async fn insert(&self, mission: Mission) -> Result<Mission, AppError> {
        self.missions.insert(mission.id, mission.clone());
        Ok(mission)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Mission>, AppError> {
        Ok(self.missions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list(&self, filter: &MissionFilter) -> Result<Vec<Mission>, AppError> {
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        missions.sort_by(|a, b| {
            (a.mission_date, a.scheduled_time).cmp(&(b.mission_date, b.scheduled_time))
        });
        Ok(missions)
    }

    async fn compare_and_transition(
        &self,
        id: Uuid,
        expected: &[MissionStatus],
        apply: Apply,
    ) -> Result<Option<Mission>, AppError> {
        let Some(mut entry) = self.missions.get_mut(&id) else {
            return Ok(None);
        };

        if !expected.contains(&entry.status) {
            return Ok(None);
        }

        apply(entry.value_mut());
        Ok(Some(entry.value().clone()))
    }

    async fn transition_all_for_date(
        &self,
        date: NaiveDate,
        expected: MissionStatus,
        apply: Apply,
    ) -> Result<Vec<Mission>, AppError> {
        let mut transitioned = Vec::new();

        for mut entry in self.missions.iter_mut() {
            let mission = entry.value_mut();
            if mission.mission_date == date && mission.status == expected {
                apply(mission);
                transitioned.push(mission.clone());
            }
        }

        transitioned.sort_by_key(|m| m.scheduled_time);
        Ok(transitioned)
    }

    async fn remove_if(
        &self,
        id: Uuid,
        expected: &[MissionStatus],
    ) -> Result<Option<Mission>, AppError> {
        let removed = self
            .missions
            .remove_if(&id, |_, mission| expected.contains(&mission.status));
        Ok(removed.map(|(_, mission)| mission))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn draft(date: &str) -> Mission {
        Mission {
            id: Uuid::new_v4(),
            mission_date: date.parse().unwrap(),
            scheduled_time: "09:00:00".parse().unwrap(),
            client_name: "Martin".to_string(),
            client_phone: None,
            pickup_address: "Gare".to_string(),
            dropoff_address: "Clinique".to_string(),
            driver_id: None,
            passenger_count: 1,
            estimated_price: None,
            notes: String::new(),
            driver_comment: None,
            status: MissionStatus::Draft,
            created_at: Utc::now(),
            sent_at: None,
            confirmed_at: None,
            picked_up_at: None,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn compare_and_transition_is_a_noop_on_wrong_status() {
        let store = MemoryStore::new();
        let mission = store.insert(draft("2026-05-01")).await.unwrap();

        let sent = store
            .compare_and_transition(
                mission.id,
                &[MissionStatus::Draft],
                Box::new(|m| m.status = MissionStatus::Sent),
            )
            .await
            .unwrap();
        assert_eq!(sent.unwrap().status, MissionStatus::Sent);

        // Second attempt matches zero rows and leaves the mission untouched.
        let again = store
            .compare_and_transition(
                mission.id,
                &[MissionStatus::Draft],
                Box::new(|m| m.status = MissionStatus::Confirmed),
            )
            .await
            .unwrap();
        assert!(again.is_none());
        let current = store.get(mission.id).await.unwrap().unwrap();
        assert_eq!(current.status, MissionStatus::Sent);
    }

    #[tokio::test]
    async fn transition_all_for_date_only_touches_drafts_on_that_date() {
        let store = MemoryStore::new();
        let a = store.insert(draft("2026-05-01")).await.unwrap();
        let b = store.insert(draft("2026-05-01")).await.unwrap();
        let other_day = store.insert(draft("2026-05-02")).await.unwrap();

        let mut sent = store
            .transition_all_for_date(
                "2026-05-01".parse().unwrap(),
                MissionStatus::Draft,
                Box::new(|m| m.status = MissionStatus::Sent),
            )
            .await
            .unwrap();

        sent.sort_by_key(|m| m.id);
        let mut expected = vec![a.id, b.id];
        expected.sort();
        let got: Vec<Uuid> = sent.iter().map(|m| m.id).collect();
        assert_eq!(got, expected);

        let untouched = store.get(other_day.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, MissionStatus::Draft);
    }

    #[tokio::test]
    async fn remove_if_respects_the_guard() {
        let store = MemoryStore::new();
        let mission = store.insert(draft("2026-05-01")).await.unwrap();

        let refused = store
            .remove_if(mission.id, &[MissionStatus::Completed])
            .await
            .unwrap();
        assert!(refused.is_none());

        let removed = store
            .remove_if(mission.id, &[MissionStatus::Draft])
            .await
            .unwrap();
        assert_eq!(removed.unwrap().id, mission.id);
        assert!(store.get(mission.id).await.unwrap().is_none());
    }
}
