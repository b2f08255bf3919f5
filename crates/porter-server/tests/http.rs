use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use porter_core::{Booker, Policy};
use porter_memory::Store;
use porter_provider::StubProvider;
use porter_schema::Project;
use porter_server::{create_router, AppState, CredentialStatus};
use tower::ServiceExt;

fn app(store: Store) -> Router {
    let booker = Arc::new(Booker::new(chrono_tz::Asia::Kolkata));
    let policy = Arc::new(Policy::new(
        store.clone(),
        Arc::new(StubProvider),
        booker.clone(),
        chrono_tz::UTC,
    ));
    create_router(AppState::new(
        policy,
        booker,
        store,
        chrono_tz::UTC,
        CredentialStatus {
            provider: true,
            zoom: false,
            google: false,
        },
    ))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn chat_rejects_empty_message() {
    let app = app(Store::open_in_memory().unwrap());
    let response = app
        .clone()
        .oneshot(post_json("/api/chat", serde_json::json!({ "message": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // A body without the field gets the same 400, not a 422 from the
    // extractor.
    let response = app
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({ "session_id": "visitor-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_turn_returns_reply_and_session() {
    let app = app(Store::open_in_memory().unwrap());
    let response = app
        .oneshot(post_json(
            "/api/chat",
            serde_json::json!({ "session_id": "visitor-1", "message": "Hi" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["session_id"], "visitor-1");
    assert_eq!(body["stage"], "ask_name");
    assert!(body["bot_reply"].as_str().unwrap().contains("name"));
}

#[tokio::test]
async fn schedule_maps_input_errors_to_400_and_upstream_to_502() {
    let app = app(Store::open_in_memory().unwrap());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/schedule",
            serde_json::json!({
                "platform": "teams",
                "date": "2025-10-22",
                "time": "03:30 PM"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["ok"], false);

    // Valid input, but no zoom gateway configured behind the booker.
    let response = app
        .oneshot(post_json(
            "/api/schedule",
            serde_json::json!({
                "platform": "zoom",
                "date": "2025-10-22",
                "time": "03:30 PM"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn content_routes_serve_the_store() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert_project(&Project {
            title: "Shopline".into(),
            tagline: String::new(),
            description: "storefront".into(),
            tech_stacks: vec!["Rust".into()],
            features: vec![],
            link: None,
        })
        .await
        .unwrap();
    let app = app(store);

    let response = app
        .clone()
        .oneshot(Request::get("/api/projects").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Shopline");

    let response = app
        .clone()
        .oneshot(Request::get("/api/about").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::get("/api/blogs/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_credential_booleans_only() {
    let app = app(Store::open_in_memory().unwrap());
    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["credentials"]["provider"], true);
    assert_eq!(body["credentials"]["zoom"], false);
}
