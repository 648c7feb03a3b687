use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/active", patch(set_active))
        .route("/drivers/:id/push-token", post(register_push_token))
}

#[derive(Deserialize)]
struct CreateDriverRequest {
    name: String,
    phone: Option<String>,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    identity.require_dispatcher()?;

    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        active: true,
        push_token: None,
        updated_at: Utc::now(),
    };

    state.drivers.insert(driver.id, driver.clone());
    Ok(Json(driver))
}

async fn list_drivers(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<Json<Vec<Driver>>, AppError> {
    identity.require_dispatcher()?;
    let drivers = state
        .drivers
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Ok(Json(drivers))
}

#[derive(Deserialize)]
struct SetActiveRequest {
    active: bool,
}

async fn set_active(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<Driver>, AppError> {
    identity.require_dispatcher()?;

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.active = payload.active;
    driver.updated_at = Utc::now();
    Ok(Json(driver.clone()))
}

#[derive(Deserialize)]
struct RegisterTokenRequest {
    token: String,
}

/// Registers the driver's delivery address for push notifications. Each
/// registration overwrites the previous one wholesale.
async fn register_push_token(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<RegisterTokenRequest>,
) -> Result<Json<Driver>, AppError> {
    let caller = identity.require_driver()?;
    if caller != id {
        return Err(AppError::Forbidden(
            "drivers may only register their own token".to_string(),
        ));
    }

    if payload.token.trim().is_empty() {
        return Err(AppError::BadRequest("token cannot be empty".to_string()));
    }

    let mut driver = state
        .drivers
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

    driver.push_token = Some(payload.token);
    driver.updated_at = Utc::now();
    Ok(Json(driver.clone()))
}
