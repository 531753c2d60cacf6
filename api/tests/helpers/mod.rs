use axum::{Router, body::Body, http::Request};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use util::{config::AppConfig, state::AppState};

use api::routes::routes;

fn test_config() -> AppConfig {
    AppConfig {
        env: "test".into(),
        project_name: "rollcall".into(),
        log_level: "api=info".into(),
        log_file: "api.log".into(),
        log_to_stdout: false,
        database_path: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret-do-not-use-in-production".into(),
        jwt_duration_minutes: 60,
        token_retention_days: 30,
        purge_interval_seconds: 3600,
    }
}

/// Builds the real application router over a fresh in-memory database.
pub async fn make_test_app() -> (Router, DatabaseConnection) {
    AppConfig::override_config(test_config());

    let db = db::test_utils::setup_test_db().await;
    let state = AppState::new(db.clone());
    let app = Router::new()
        .nest("/api", routes(state.clone()))
        .with_state(state);

    (app, db)
}

pub fn authed_json_request(method: &str, uri: &str, jwt: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {jwt}"))
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, jwt: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {jwt}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
