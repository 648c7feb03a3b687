use serde::Serialize;
use uuid::Uuid;

use crate::models::mission::Mission;
use crate::models::position::PositionSample;

/// Payload of a `mission:deleted` event; the mission row is gone, only the
/// id survives.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedMission {
    pub id: Uuid,
}

/// Payload of a `geolocation:offline` event after a driver signs off.
#[derive(Debug, Clone, Serialize)]
pub struct DriverOffline {
    pub driver_id: Uuid,
}

/// Domain events fanned out to every open real-time session. Serialized as
/// `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum DispatchEvent {
    #[serde(rename = "mission:new")]
    MissionNew(Mission),
    #[serde(rename = "mission:sent")]
    MissionSent(Mission),
    #[serde(rename = "mission:updated")]
    MissionUpdated(Mission),
    #[serde(rename = "mission:deleted")]
    MissionDeleted(DeletedMission),
    #[serde(rename = "mission:confirmed")]
    MissionConfirmed(Mission),
    #[serde(rename = "mission:pickedup")]
    MissionPickedUp(Mission),
    #[serde(rename = "mission:completed")]
    MissionCompleted(Mission),
    #[serde(rename = "mission:commented")]
    MissionCommented(Mission),
    #[serde(rename = "geolocation:update")]
    GeolocationUpdate(PositionSample),
    #[serde(rename = "geolocation:offline")]
    GeolocationOffline(DriverOffline),
}

impl DispatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchEvent::MissionNew(_) => "mission:new",
            DispatchEvent::MissionSent(_) => "mission:sent",
            DispatchEvent::MissionUpdated(_) => "mission:updated",
            DispatchEvent::MissionDeleted(_) => "mission:deleted",
            DispatchEvent::MissionConfirmed(_) => "mission:confirmed",
            DispatchEvent::MissionPickedUp(_) => "mission:pickedup",
            DispatchEvent::MissionCompleted(_) => "mission:completed",
            DispatchEvent::MissionCommented(_) => "mission:commented",
            DispatchEvent::GeolocationUpdate(_) => "geolocation:update",
            DispatchEvent::GeolocationOffline(_) => "geolocation:offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_event_serializes_with_wire_name() {
        let event = DispatchEvent::MissionDeleted(DeletedMission {
            id: Uuid::from_u128(7),
        });

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "mission:deleted");
        assert_eq!(json["data"]["id"], Uuid::from_u128(7).to_string());
    }

    #[test]
    fn name_matches_serialized_tag() {
        let event = DispatchEvent::GeolocationOffline(DriverOffline {
            driver_id: Uuid::from_u128(1),
        });

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
    }
}
