//! Router harness for endpoint tests: a temporary database, a recording
//! publisher and helpers that send JSON requests through `oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::api::router::api_router_with_ctx;
use crate::api::types::ApiContext;
use crate::assistant::TextGenerator;
use crate::auth::issue_token;
use crate::config::AppConfig;
use crate::core_state::CoreState;
use crate::db::fixtures::{seed_doctor, seed_employer, seed_patient};
use crate::models::{Doctor, Employer, Patient, User};
use crate::realtime::testing::RecordingPublisher;

pub(crate) struct TestApp {
    pub ctx: ApiContext,
    pub publisher: Arc<RecordingPublisher>,
    router: Router,
    _dir: TempDir,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        Self::build(None)
    }

    pub(crate) fn with_generator(generator: Arc<dyn TextGenerator>) -> Self {
        Self::build(Some(generator))
    }

    fn build(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::with_database(dir.path().join("praanacare.db"));
        let publisher = Arc::new(RecordingPublisher::default());
        let core = CoreState::new(config)
            .unwrap()
            .with_publisher(publisher.clone())
            .with_generator(generator);
        let ctx = ApiContext::new(Arc::new(core));
        Self {
            router: api_router_with_ctx(ctx.clone()),
            ctx,
            publisher,
            _dir: dir,
        }
    }

    pub(crate) fn conn(&self) -> Connection {
        self.ctx.core.open_db().unwrap()
    }

    pub(crate) fn token(&self, user: &User) -> String {
        let config = &self.ctx.core.config;
        issue_token(
            &config.jwt_secret,
            user.id,
            user.role,
            config.token_lifetime,
            Utc::now(),
        )
        .unwrap()
    }

    pub(crate) fn patient(
        &self,
        email: &str,
        employee_id: &str,
        department: &str,
    ) -> (Patient, String) {
        let (user, patient) = seed_patient(&self.conn(), email, employee_id, department);
        (patient, self.token(&user))
    }

    pub(crate) fn doctor(&self, email: &str, license: &str) -> (Doctor, String) {
        let (user, doctor) = seed_doctor(&self.conn(), email, license);
        (doctor, self.token(&user))
    }

    pub(crate) fn employer(&self, email: &str) -> (Employer, String) {
        let (user, employer) = seed_employer(&self.conn(), email);
        (employer, self.token(&user))
    }

    pub(crate) async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub(crate) async fn post(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    pub(crate) async fn put(
        &self,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send("PUT", uri, token, Some(body)).await
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 4 * 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}
