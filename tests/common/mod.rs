#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use cafe_backend::{
    auth::clock::ManualClock,
    build_router,
    notify::RecordingNotifier,
    AppConfig, AppState,
};
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const ADMIN_EMAIL: &str = "admin@cafe.test";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    _db: NamedTempFile,
}

pub fn config(db: &NamedTempFile, lock_wait_ms: u64) -> AppConfig {
    AppConfig::try_parse_from([
        "cafe",
        "--jwt-secret",
        SECRET,
        "--db-path",
        db.path().to_str().unwrap(),
        "--bcrypt-cost",
        "4",
        "--lock-wait-ms",
        &lock_wait_ms.to_string(),
    ])
    .unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(2_000, 100)
    }

    pub fn with_settings(lock_wait_ms: u64, login_limit: u32) -> Self {
        let db = NamedTempFile::new().unwrap();
        let cfg = config(&db, lock_wait_ms);
        let clock = Arc::new(ManualClock::starting_now());
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AppState::from_config(&cfg, clock.clone(), notifier.clone()).unwrap();
        state.users.ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();

        Self {
            app: build_router(state.clone(), login_limit),
            state,
            clock,
            notifier,
            _db: db,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/user/login",
                None,
                serde_json::json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Sign up, approve and log in a staff account.
    pub async fn staff_token(&self, email: &str) -> String {
        let admin = self.admin_token().await;
        let (status, _) = self
            .post(
                "/user/signup",
                None,
                serde_json::json!({
                    "name": "Staff",
                    "contactNumber": "5550100",
                    "email": email,
                    "password": "staff-pass-123"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let id = self
            .state
            .users
            .find_by_email(email)
            .unwrap()
            .unwrap()
            .id;
        let (status, _) = self
            .post(
                "/user/update",
                Some(&admin),
                serde_json::json!({ "id": id, "status": true }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        self.login(email, "staff-pass-123").await
    }
}
