//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Error detail: development builds only
//! 2. Rate limiter: reject early, save resources
//! 3. Auth validator: bearer token verification
//! 4. Role gate: per route group
//! 5. Audit logger: logs after auth, has the user id

pub mod audit;
pub mod auth;
pub mod error_detail;
pub mod rate;
pub mod role;
