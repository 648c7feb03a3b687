use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::models::event::{DispatchEvent, DriverOffline};
use crate::models::position::{ActivePosition, PositionSample};
use crate::presence::PositionIngest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/geolocation/position", post(ingest_position))
        .route("/geolocation/active", get(active_positions))
        .route("/geolocation/driver/:id", get(latest_position))
        .route("/geolocation/history/:id", get(position_history))
        .route("/geolocation/disconnect", post(disconnect))
}

async fn ingest_position(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<PositionIngest>,
) -> Result<Json<PositionSample>, AppError> {
    let driver_id = identity.require_driver()?;

    let sample = state.presence.record(driver_id, payload)?;
    state.metrics.positions_ingested_total.inc();
    state
        .bus
        .publish(DispatchEvent::GeolocationUpdate(sample.clone()));

    Ok(Json(sample))
}

async fn active_positions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<ActivePosition>>, AppError> {
    identity.require_dispatcher()?;
    Ok(Json(state.presence.active_positions(&state.drivers)))
}

async fn latest_position(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<PositionSample>, AppError> {
    if identity.role == Role::Driver && identity.user_id != id {
        return Err(AppError::Forbidden(
            "drivers may only read their own position".to_string(),
        ));
    }

    let sample = state
        .presence
        .latest(id)
        .ok_or_else(|| AppError::NotFound(format!("no position recorded for driver {id}")))?;
    Ok(Json(sample))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn position_history(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PositionSample>>, AppError> {
    identity.require_dispatcher()?;
    let limit = query.limit.unwrap_or(50);
    Ok(Json(state.presence.history(id, limit)))
}

/// Explicit sign-off: the driver's latest sample is marked inactive and the
/// driver disappears from the active view immediately regardless of age.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<serde_json::Value>, AppError> {
    let driver_id = identity.require_driver()?;

    state.presence.sign_off(driver_id);
    state
        .bus
        .publish(DispatchEvent::GeolocationOffline(DriverOffline { driver_id }));

    Ok(Json(serde_json::json!({ "message": "position marked inactive" })))
}
