//! Development-only exposure of internal error causes.
//!
//! Rewrites 500 bodies to carry `error.detail` when the server runs with
//! `APP_ENV=development`. Other environments pass responses through.

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error::InternalErrorDetail;
use crate::api::types::ApiContext;

const MAX_ERROR_BODY: usize = 64 * 1024;

pub async fn expose_in_development(req: Request<Body>, next: Next) -> Response {
    let development = req
        .extensions()
        .get::<ApiContext>()
        .is_some_and(|ctx| ctx.core.config.is_development());

    let response = next.run(req).await;
    if !development {
        return response;
    }
    let detail = response.extensions().get::<InternalErrorDetail>().cloned();
    let Some(InternalErrorDetail(detail)) = detail else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_ERROR_BODY).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let Ok(mut json) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return Response::from_parts(parts, Body::from(bytes));
    };
    json["error"]["detail"] = serde_json::Value::String(detail);
    let rewritten = json.to_string();
    parts.headers.remove(header::CONTENT_LENGTH);
    let json = HeaderValue::from_static("application/json");
    parts.headers.insert(header::CONTENT_TYPE, json);
    Response::from_parts(parts, Body::from(rewritten))
}
