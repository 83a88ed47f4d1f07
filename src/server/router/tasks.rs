use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::history::{HistoryError, NewHistoryRecord, DEFAULT_LIMIT};
use crate::server::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new()
        .route("/tasks", get(list_history_handler).post(create_history_handler))
        .route(
            "/api/tasks",
            get(list_history_handler).post(create_history_handler),
        )
}

#[instrument(name = "promptsmith.history.list", skip(state))]
async fn list_history_handler(State(state): State<ServeState>) -> Response {
    match state.store.latest(DEFAULT_LIMIT).await {
        Ok(records) => Json(json!({ "success": true, "data": records })).into_response(),
        Err(err) => {
            error!(%err, "failed to list history");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[instrument(name = "promptsmith.history.create", skip(state, payload))]
async fn create_history_handler(
    State(state): State<ServeState>,
    payload: Result<Json<NewHistoryRecord>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let record = match request.validate(Utc::now()) {
        Ok(record) => record,
        Err(err) => {
            warn!(%err, "rejected history record");
            return failure(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    match state.store.insert(&record).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "data": record })),
        )
            .into_response(),
        Err(err @ HistoryError::Validation(_)) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(err) => {
            error!(%err, "failed to store history record");
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}
