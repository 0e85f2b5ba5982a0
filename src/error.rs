use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid {entity} state: expected {expected}, found {actual}")]
    InvalidState {
        entity: &'static str,
        expected: String,
        actual: String,
    },

    #[error("worker {0} is no longer available")]
    WorkerUnavailable(Uuid),

    #[error("product {product_id} out of stock: requested {requested}, available {available}")]
    OutOfStock {
        product_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_state(
        entity: &'static str,
        expected: impl Into<String>,
        actual: impl std::fmt::Debug,
    ) -> Self {
        AppError::InvalidState {
            entity,
            expected: expected.into(),
            actual: format!("{actual:?}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_)
            | AppError::InvalidState { .. }
            | AppError::WorkerUnavailable(_)
            | AppError::OutOfStock { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
