use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::AppError;
use crate::notify::{BroadcastReport, PushAlert, SendOutcome};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/driver", post(notify_driver))
        .route("/notifications/broadcast", post(broadcast))
}

#[derive(Deserialize)]
struct NotifyDriverRequest {
    driver_id: Uuid,
    title: String,
    body: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

async fn notify_driver(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<NotifyDriverRequest>,
) -> Result<Json<SendOutcome>, AppError> {
    identity.require_dispatcher()?;

    let outcome = state
        .notifier
        .notify_driver(
            payload.driver_id,
            PushAlert {
                title: payload.title,
                body: payload.body,
                data: payload.data,
            },
        )
        .await?;

    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct BroadcastRequest {
    title: String,
    body: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

async fn broadcast(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(payload): Json<BroadcastRequest>,
) -> Result<Json<BroadcastReport>, AppError> {
    identity.require_dispatcher()?;

    let report = state
        .notifier
        .broadcast(PushAlert {
            title: payload.title,
            body: payload.body,
            data: payload.data,
        })
        .await;

    Ok(Json(report))
}
