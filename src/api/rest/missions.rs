use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Identity, Role};
use crate::error::AppError;
use crate::lifecycle::{CreateMission, MissionUpdate};
use crate::models::mission::{Mission, MissionFilter};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/missions", post(create_mission).get(list_missions))
        .route("/missions/send-for-date", post(send_for_date))
        .route(
            "/missions/:id",
            get(get_mission).put(edit_mission).delete(delete_mission),
        )
        .route("/missions/:id/send", post(send_mission))
        .route("/missions/:id/confirm", post(confirm_mission))
        .route("/missions/:id/pickup", post(pick_up_mission))
        .route("/missions/:id/complete", post(complete_mission))
        .route("/missions/:id/comment", post(comment_mission))
        .route("/drivers/:id/missions", get(driver_missions))
}

async fn create_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<CreateMission>,
) -> Result<Json<Mission>, AppError> {
    identity.require_dispatcher()?;
    let mission = state.lifecycle.create(payload).await?;
    Ok(Json(mission))
}

async fn list_missions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(filter): Query<MissionFilter>,
) -> Result<Json<Vec<Mission>>, AppError> {
    identity.require_dispatcher()?;
    let missions = state.lifecycle.list(&filter).await?;
    Ok(Json(missions))
}

async fn get_mission(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, AppError> {
    let mission = state.lifecycle.get(id).await?;
    Ok(Json(mission))
}

async fn edit_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<MissionUpdate>,
) -> Result<Json<Mission>, AppError> {
    identity.require_dispatcher()?;
    let mission = state.lifecycle.edit(id, payload).await?;
    Ok(Json(mission))
}

async fn delete_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    identity.require_dispatcher()?;
    state.lifecycle.delete(id).await?;
    Ok(Json(serde_json::json!({ "message": "mission deleted" })))
}

async fn send_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, AppError> {
    identity.require_dispatcher()?;
    let mission = state.lifecycle.send(id).await?;
    Ok(Json(mission))
}

#[derive(Deserialize)]
struct SendForDateRequest {
    date: NaiveDate,
}

#[derive(Serialize)]
struct SendForDateResponse {
    message: String,
    missions: Vec<Mission>,
}

async fn send_for_date(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<SendForDateRequest>,
) -> Result<Json<SendForDateResponse>, AppError> {
    identity.require_dispatcher()?;
    let missions = state.lifecycle.send_all_for_date(payload.date).await?;
    Ok(Json(SendForDateResponse {
        message: format!("{} mission(s) sent", missions.len()),
        missions,
    }))
}

async fn confirm_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, AppError> {
    identity.require_driver()?;
    let mission = state.lifecycle.confirm(id).await?;
    Ok(Json(mission))
}

async fn pick_up_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, AppError> {
    identity.require_driver()?;
    let mission = state.lifecycle.pick_up(id).await?;
    Ok(Json(mission))
}

async fn complete_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> Result<Json<Mission>, AppError> {
    identity.require_driver()?;
    let mission = state.lifecycle.complete(id).await?;
    Ok(Json(mission))
}

#[derive(Deserialize)]
struct CommentRequest {
    comment: String,
}

async fn comment_mission(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Mission>, AppError> {
    identity.require_driver()?;
    let mission = state.lifecycle.add_comment(id, payload.comment).await?;
    Ok(Json(mission))
}

async fn driver_missions(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Query(filter): Query<MissionFilter>,
) -> Result<Json<Vec<Mission>>, AppError> {
    // A driver may only read its own missions; the dispatcher may read any.
    if identity.role == Role::Driver && identity.user_id != id {
        return Err(AppError::Forbidden(
            "drivers may only list their own missions".to_string(),
        ));
    }

    let missions = state.lifecycle.list_for_driver(id, &filter).await?;
    Ok(Json(missions))
}
