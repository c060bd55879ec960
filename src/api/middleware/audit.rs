//! Audit logging middleware.
//!
//! Logs every protected request with the acting user, method, path and
//! response status. Runs innermost (after auth has injected `AuthUser`).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthUser;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let user = req.extensions().get::<AuthUser>().copied();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    match user {
        Some(user) => tracing::info!(
            user_id = %user.user_id,
            role = %user.role,
            %method,
            path,
            status,
            "api access"
        ),
        None => tracing::info!(%method, path, status, "api access"),
    }
    response
}
