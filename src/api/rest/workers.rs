use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::directory::insert_worker_profile;
use crate::engine::assignment::{PoolReset, reset_pool, set_availability};
use crate::engine::selector::{PoolLoad, pool_load};
use crate::error::AppError;
use crate::models::RecordStatus;
use crate::models::user::{Role, User};
use crate::models::worker::{Availability, Vehicle, Worker, WorkerProfile};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workers", post(register_worker).get(list_workers))
        .route("/workers/load", get(load))
        .route("/workers/reset", post(reset))
        .route("/workers/:id/availability", patch(update_availability))
}

#[derive(Deserialize)]
pub struct RegisterWorkerRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub identification_number: String,
    #[serde(default)]
    pub vehicle: Option<Vehicle>,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub availability: Availability,
}

async fn register_worker(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterWorkerRequest>,
) -> Result<Json<Worker>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: payload.name,
        phone: payload.phone,
        role: Role::DeliveryWorker,
        status: RecordStatus::Active,
        created_at: now,
    };
    let profile = WorkerProfile {
        worker_id: user.id,
        identification_number: payload.identification_number.trim().to_string(),
        availability: if payload.offline {
            Availability::Offline
        } else {
            Availability::Available
        },
        vehicle: payload.vehicle,
        created_at: now,
        updated_at: now,
    };

    state.users.insert(user.id, user.clone());
    if let Err(err) = insert_worker_profile(&state, profile.clone()) {
        state.users.remove(&user.id);
        return Err(err);
    }

    info!(worker_id = %user.id, "delivery worker registered");
    Ok(Json(Worker {
        id: user.id,
        name: user.name,
        phone: user.phone,
        profile,
    }))
}

async fn list_workers(State(state): State<Arc<AppState>>) -> Json<Vec<WorkerProfile>> {
    let mut profiles: Vec<WorkerProfile> = state
        .worker_profiles
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    profiles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.worker_id.cmp(&b.worker_id)));
    Json(profiles)
}

async fn load(State(state): State<Arc<AppState>>) -> Json<PoolLoad> {
    Json(pool_load(&state))
}

async fn reset(State(state): State<Arc<AppState>>) -> Json<PoolReset> {
    Json(reset_pool(&state))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<WorkerProfile>, AppError> {
    let profile = set_availability(&state, id, payload.availability)?;
    Ok(Json(profile))
}
