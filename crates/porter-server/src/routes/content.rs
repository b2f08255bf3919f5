//! Read-only portfolio content endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::routes::store_failure;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(projects))
        .route("/api/skills", get(skills))
        .route("/api/services", get(services))
        .route("/api/about", get(about))
        .route("/api/blogs", get(blogs))
        .route("/api/blogs/{slug}", get(blog_by_slug))
}

async fn projects(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_projects().await {
        Ok(projects) => Json(projects).into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}

async fn skills(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_skills().await {
        Ok(skills) => Json(skills).into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}

async fn services(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_services(true).await {
        Ok(services) => Json(services).into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}

async fn about(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_about().await {
        Ok(Some(about)) => Json(about).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "about is not configured" })),
        )
            .into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}

async fn blogs(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_blog_posts().await {
        Ok(posts) => Json(posts).into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}

async fn blog_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.store.get_blog_post(&slug).await {
        Ok(Some(post)) => Json(post).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such post" })),
        )
            .into_response(),
        Err(err) => store_failure(err).into_response(),
    }
}
