//! Write-route behavior that precedes any database work: the admin gate,
//! payload shape checks, and batch validation. The Postgres pool is lazy and
//! never connected -- reaching it would fail these tests, which is the point:
//! validation must reject bad requests before any insert attempt.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use chapterdash::config::Config;
use chapterdash::kv::KvStore;
use chapterdash::state::AppState;
use chapterdash::web::create_router;
use chapterdash::web::middleware::rate_limit::RateLimitState;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "secret_admin_token";

fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "postgres://postgres@localhost:5432/chapterdash_test".to_owned(),
        redis_url: "redis://localhost:6379".to_owned(),
        redis_required: false,
        admin_token: ADMIN_TOKEN.to_owned(),
        rate_limit_max: 10_000,
        rate_limit_window_secs: 900,
        cache_ttl_secs: 60,
        log_level: "info".to_owned(),
    }
}

fn app() -> Router {
    let config = test_config();
    let db_pool = sqlx::PgPool::connect_lazy(&config.database_url).unwrap();
    let kv = KvStore::memory();
    let rate_limit = Arc::new(RateLimitState::new(
        kv.clone(),
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    ));
    create_router(AppState::new(db_pool, kv, &config), rate_limit)
}

async fn post_json(router: &Router, token: Option<&str>, body: Value) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/chapters")
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid_chapter(name: &str) -> Value {
    json!({
        "subject": "Physics",
        "chapter": name,
        "class": "Class 11",
        "unit": "Mechanics",
        "yearWiseQuestionCount": {"2023": 4, "2024": 7},
        "questionSolved": 12,
        "status": "In Progress",
        "isWeakChapter": false
    })
}

#[tokio::test]
async fn missing_admin_token_is_forbidden() {
    let app = app();
    let response = post_json(&app, None, json!([valid_chapter("Waves")])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(
        body["message"],
        "Missing x-admin-token header. Only admins can perform this action."
    );
}

#[tokio::test]
async fn wrong_admin_token_is_forbidden() {
    let app = app();
    let response = post_json(&app, Some("nope"), json!([valid_chapter("Waves")])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(
        body["message"],
        "Invalid x-admin-token. Only admins can perform this action."
    );
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let app = app();
    let response = post_json(&app, Some(ADMIN_TOKEN), json!([])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "No chapters provided");
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let app = app();
    let response = post_json(&app, Some(ADMIN_TOKEN), json!("chapters")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Request body must be a chapter object, an array of chapters, or a valid JSON file."
    );
}

#[tokio::test]
async fn batch_with_one_invalid_document_reports_only_that_index() {
    let app = app();
    let mut bad = valid_chapter("Optics");
    bad.as_object_mut().unwrap().remove("status");

    let response = post_json(
        &app,
        Some(ADMIN_TOKEN),
        json!([valid_chapter("Kinematics"), bad, valid_chapter("Gravitation")]),
    )
    .await;

    // Rejected wholesale before any insert is attempted (the lazy pool has no
    // live connection to fall back on).
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Validation failed for some chapters");
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["index"], 1);
}

#[tokio::test]
async fn invalid_single_chapter_is_rejected() {
    let app = app();
    let response = post_json(&app, Some(ADMIN_TOKEN), json!({"subject": "Physics"})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Validation failed");
    assert!(body["error"].as_str().unwrap().contains("missing field"));
}

#[tokio::test]
async fn non_json_upload_is_rejected() {
    let app = app();
    let boundary = "chapterdash-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"chapters.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         subject,chapter\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/chapters")
                .header("x-admin-token", ADMIN_TOKEN)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["message"], "Only JSON files allowed");
}

#[tokio::test]
async fn unparsable_json_upload_is_rejected() {
    let app = app();
    let boundary = "chapterdash-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"chapters.json\"\r\n\
         Content-Type: application/json\r\n\r\n\
         {{not json\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/chapters")
                .header("x-admin-token", ADMIN_TOKEN)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Invalid JSON file uploaded"
    );
}

#[tokio::test]
async fn root_greeting_is_served() {
    let app = app();
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Hello World!");
}
