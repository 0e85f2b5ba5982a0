use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::checkout::{
    NewOrder, PaymentReceipt, add_item, archive_order, complete_payment, create_order,
};
use crate::engine::orchestrator::{FulfillmentResult, Orchestrator};
use crate::engine::queue::publish_payment;
use crate::error::AppError;
use crate::models::delivery::Delivery;
use crate::models::order::{Order, OrderId};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create))
        .route("/orders/:id", get(get_order).delete(archive))
        .route("/orders/:id/items", post(add_order_item))
        .route("/orders/:id/payment", post(pay))
        .route("/orders/:id/fulfill", post(fulfill))
        .route("/orders/:id/delivery", get(get_delivery))
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub provider_reference: String,
}

async fn create(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewOrder>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(create_order(&state, payload)?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    Ok(Json(order.value().clone()))
}

async fn archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(archive_order(&state, id)?))
}

async fn add_order_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(add_item(
        &state,
        id,
        payload.product_id,
        payload.quantity,
    )?))
}

async fn pay(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    Json(payload): Json<PaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    if payload.provider_reference.trim().is_empty() {
        return Err(AppError::BadRequest(
            "provider_reference cannot be empty".to_string(),
        ));
    }

    let receipt = complete_payment(&state, id, &payload.provider_reference)?;
    if receipt.newly_completed {
        publish_payment(&state, receipt.event.clone()).await?;
    }

    Ok(Json(receipt))
}

async fn fulfill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<FulfillmentResult>, AppError> {
    Ok(Json(Orchestrator::new().fulfill(&state, id)?))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Delivery>, AppError> {
    let delivery = state
        .deliveries
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("delivery for order {id} not found")))?;

    Ok(Json(delivery.value().clone()))
}
