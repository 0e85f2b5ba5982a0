use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::assignment::{cancel, complete, start};
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::customer::CustomerLoyalty;
use crate::models::order::OrderId;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/assignments", get(list_assignments))
        .route("/deliveries/:id/assignment/start", post(start_assignment))
        .route("/deliveries/:id/assignment/complete", post(complete_assignment))
        .route("/deliveries/:id/assignment/cancel", post(cancel_assignment))
        .route("/customers/:id/loyalty", get(get_loyalty))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<Assignment>> {
    let mut assignments: Vec<Assignment> = state
        .assignments
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    assignments.sort_by_key(|assignment| assignment.delivery_id);

    Json(assignments)
}

async fn start_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Assignment>, AppError> {
    Ok(Json(start(&state, id)?))
}

async fn complete_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Assignment>, AppError> {
    Ok(Json(complete(&state, id)?))
}

async fn cancel_assignment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    Json(payload): Json<CancelRequest>,
) -> Result<Json<Assignment>, AppError> {
    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("reason cannot be empty".to_string()));
    }
    Ok(Json(cancel(&state, id, payload.reason.trim())?))
}

async fn get_loyalty(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<CustomerLoyalty>, AppError> {
    let loyalty = state
        .loyalty
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("no loyalty record for customer {id}")))?;

    Ok(Json(loyalty.value().clone()))
}
