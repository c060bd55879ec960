//! Role gates for the per-role route groups. Must run inside `require_auth`.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::AuthUser;
use crate::models::Role;

pub async fn patients_only(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(Role::Patient, req, next).await
}

pub async fn doctors_only(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(Role::Doctor, req, next).await
}

pub async fn employers_only(req: Request<axum::body::Body>, next: Next) -> Response {
    require_role(Role::Employer, req, next).await
}

async fn require_role(role: Role, req: Request<axum::body::Body>, next: Next) -> Response {
    match req.extensions().get::<AuthUser>() {
        Some(user) if user.role == role => next.run(req).await,
        Some(user) => ApiError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            user.role
        ))
        .into_response(),
        None => ApiError::Unauthorized.into_response(),
    }
}
