use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

use crate::clock::StateResponse;
use crate::controller::QueryRequest;

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    code: u16,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    ApiError(status, msg.into())
}

// ─── GET /api/state ──────────────────────────────────────────────

pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateResponse> {
    Json(state.controller.on_query(QueryRequest::GetState).await)
}

// ─── POST /api/message ───────────────────────────────────────────

pub(super) async fn message(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<StateResponse>, ApiError> {
    let request: QueryRequest = serde_json::from_value(body.clone()).map_err(|_| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("unsupported message: {}", body),
        )
    })?;
    debug!("query message: {:?}", request);
    Ok(Json(state.controller.on_query(request).await))
}
