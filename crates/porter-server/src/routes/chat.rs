use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use porter_schema::ChatRequest;
use serde_json::json;

use crate::routes::store_failure;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/chat", post(chat))
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> impl IntoResponse {
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "message must not be empty" })),
        )
            .into_response();
    }

    match state.policy.handle(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}
