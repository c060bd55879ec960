//! HTTP API.
//!
//! Routes are nested under `/api/` and protected by a middleware stack:
//! Rate Limit → Auth → Role → Audit → Handler. The realtime socket lives at
//! `/ws/connect`.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use router::api_router;
pub use server::ApiServer;
pub use types::ApiContext;
