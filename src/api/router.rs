//! HTTP router.
//!
//! Returns a composable `Router` with the JSON API under `/api/`, the
//! realtime socket at `/ws/connect` and a liveness check at `/health`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Security headers → 3. Context extension → 4. Error detail
//! → 5. Rate limiter → 6. Auth validator → 7. Role gate → 8. Audit logger

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, Uri};
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints::{ai, auth, doctor, employer, health, patient, status};
use crate::api::error::ApiError;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CoreState;

/// Build the application router.
///
/// Middleware uses `Extension<ApiContext>` (injected near the outside).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`, so tests can reach the
/// ticket store and rate limiter.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn patient_routes() -> Router<ApiContext> {
    Router::new()
        .route("/dashboard", get(patient::dashboard))
        .route("/vitals", post(patient::record_vitals))
        .route("/vitals/history", get(patient::vitals_history))
        .route("/alerts", get(patient::alerts))
        .route("/alerts/:id/acknowledge", put(patient::acknowledge_alert))
        .route("/chats", get(patient::chats).post(patient::start_chat))
        .route_layer(from_fn(middleware::role::patients_only))
}

fn doctor_routes() -> Router<ApiContext> {
    Router::new()
        .route("/dashboard", get(doctor::dashboard))
        .route("/patients", get(doctor::patients))
        .route("/patients/:id", get(doctor::patient_detail))
        .route("/alerts/:id/approve", put(doctor::approve_alert))
        .route("/alerts/:id/dismiss", put(doctor::dismiss_alert))
        .route("/consultations", post(doctor::start_consultation))
        .route("/schedule", get(doctor::schedule))
        .route_layer(from_fn(middleware::role::doctors_only))
}

fn employer_routes() -> Router<ApiContext> {
    Router::new()
        .route("/dashboard", get(employer::dashboard))
        .route("/analytics", get(employer::analytics))
        .route("/alerts", get(employer::alerts))
        .route("/alerts/:id/respond", put(employer::respond_to_alert))
        .route("/employees", get(employer::employees))
        .route_layer(from_fn(middleware::role::employers_only))
}

fn ai_routes() -> Router<ApiContext> {
    Router::new()
        .route("/chat", post(ai::chat))
        .route("/chat/:id", get(ai::get_chat))
        .route("/analyze-vitals", post(ai::analyze))
        .route(
            "/generate-recommendations",
            post(ai::generate_recommendations),
        )
}

fn health_routes() -> Router<ApiContext> {
    Router::new()
        .route("/vitals/realtime", get(health::realtime_vitals))
        .route("/vitals/stream", post(health::stream_vitals))
        .route("/alerts/active", get(health::active_alerts))
        .route("/analytics/overview", get(health::analytics_overview))
        .route("/trends", get(health::trends))
        .route("/risk-assessment", post(health::risk_assessment))
        .route("/emergency-status", get(health::emergency_status))
}

fn cors(ctx: &ApiContext) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);
    let origin = &ctx.core.config.frontend_url;
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(
                origin,
                "FRONTEND_URL is not a valid origin, cross-origin requests disabled"
            );
            layer
        }
    }
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Route {} not found", uri.path()))
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: bearer token required. Every gate is a
    // `route_layer` so unknown paths fall through to the JSON 404.
    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/ws-ticket", post(auth::ws_ticket))
        .nest("/patient", patient_routes())
        .nest("/doctor", doctor_routes())
        .nest("/employer", employer_routes())
        .nest("/ai", ai_routes())
        .nest("/health", health_routes())
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .route_layer(from_fn(middleware::audit::log_access))
        .route_layer(from_fn(middleware::auth::require_auth));

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(ctx.clone());

    let api = protected
        .merge(public)
        .route_layer(from_fn(middleware::rate::limit));

    // WebSocket upgrade (ticket-based auth, rate-limited)
    let ws_routes = Router::new()
        .route("/ws/connect", get(websocket::connect))
        .with_state(ctx.clone())
        .route_layer(from_fn(middleware::rate::limit));

    let cors = cors(&ctx);
    Router::new()
        .route("/health", get(status::check))
        .with_state(ctx.clone())
        .nest("/api", api)
        .merge(ws_routes)
        .fallback(not_found)
        .layer(from_fn(middleware::error_detail::expose_in_development))
        // Extension must sit outside every middleware that reads ApiContext
        .layer(axum::Extension(ctx))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::api::testing::TestApp;
    use crate::config::AppConfig;

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/nowhere", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Route /api/nowhere not found");
    }

    #[tokio::test]
    async fn protected_routes_need_valid_token() {
        let app = TestApp::new();
        let (status, body) = app.get("/api/auth/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = app.get("/api/auth/me", Some("not.a.token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_groups_reject_other_roles() {
        let app = TestApp::new();
        let (_, patient_token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let (_, doctor_token) = app.doctor("d@clinic.io", "LIC-1");

        let (status, body) = app
            .get("/api/employer/dashboard", Some(&patient_token))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, _) = app.get("/api/patient/dashboard", Some(&doctor_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Shared groups accept every role.
        let (status, _) = app
            .get("/api/health/emergency-status", Some(&doctor_token))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_allows_configured_frontend() {
        let app = TestApp::new();
        let router = api_router_with_ctx(app.ctx.clone());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/auth/login")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let allowed = response.headers().get("access-control-allow-origin");
        assert_eq!(allowed.unwrap(), "http://localhost:5173");
    }

    #[tokio::test]
    async fn responses_carry_nosniff() {
        let app = TestApp::new();
        let router = api_router_with_ctx(app.ctx.clone());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let nosniff = response.headers().get("x-content-type-options");
        assert_eq!(nosniff.unwrap(), "nosniff");
    }

    #[tokio::test]
    async fn rate_limit_returns_429_with_retry_after() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::with_database(dir.path().join("p.db"));
        config.rate_limit_max = 2;
        let core = Arc::new(CoreState::new(config).unwrap());
        let router = api_router(core);

        let login = || {
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .header("X-Forwarded-For", "10.0.0.9")
                .body(Body::from(r#"{"email":"x@y.io","password":"nope"}"#))
                .unwrap()
        };
        for _ in 0..2 {
            let response = router.clone().oneshot(login()).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        let response = router.clone().oneshot(login()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(body_json(response).await["error"]["code"], "RATE_LIMITED");
    }
}
