use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use porter_schema::ScheduleRequest;
use serde_json::json;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/schedule", post(schedule))
}

async fn schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> impl IntoResponse {
    match state.booker.schedule(&request, &state.client_zone).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) if err.is_input_error() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "schedule failed upstream");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "ok": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
