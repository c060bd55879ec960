//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::db::Page;
use crate::models::Role;

const WS_TICKET_TTL_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub ws_tickets: Arc<Mutex<WsTicketStore>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        let limiter = RateLimiter::new(
            core.config.rate_limit_max,
            Duration::from_secs(core.config.rate_limit_window_secs),
        );
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
            ws_tickets: Arc::new(Mutex::new(WsTicketStore::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Authenticated caller: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Identity taken from a verified bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Realtime room private to this user.
    pub fn room(&self) -> String {
        format!("{}-{}", self.role, self.user_id)
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            max_requests,
            window,
        }
    }

    /// Check if a client is within its limit. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let window = self.window;
        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < window);

        if entries.len() as u32 >= self.max_requests {
            let oldest = entries.first().copied().unwrap_or(now);
            let wait = window.saturating_sub(now.duration_since(oldest));
            return Err(wait.as_secs().max(1));
        }

        entries.push(now);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// WS ticket store: one-time WebSocket upgrade tokens
// ═══════════════════════════════════════════════════════════

/// Keeps bearer tokens out of socket URLs.
struct WsTicket {
    user: AuthUser,
    expires_at: Instant,
}

pub struct WsTicketStore {
    tickets: HashMap<String, WsTicket>,
}

impl WsTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: HashMap::new(),
        }
    }

    /// Issue a one-time ticket for the caller (30-second TTL).
    pub fn issue(&mut self, user: AuthUser) -> String {
        self.cleanup();
        let ticket = Uuid::new_v4().to_string();
        self.tickets.insert(
            ticket.clone(),
            WsTicket {
                user,
                expires_at: Instant::now() + Duration::from_secs(WS_TICKET_TTL_SECS),
            },
        );
        ticket
    }

    /// Consume a ticket (one-time use).
    pub fn consume(&mut self, ticket: &str) -> Option<AuthUser> {
        let entry = self.tickets.remove(ticket)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        Some(entry.user)
    }

    fn cleanup(&mut self) {
        let now = Instant::now();
        self.tickets.retain(|_, t| now < t.expires_at);
    }
}

impl Default for WsTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Pagination
// ═══════════════════════════════════════════════════════════

/// `page`/`limit` query parameters. Endpoint queries carry these as plain
/// fields because url-encoded numbers do not survive `#[serde(flatten)]`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self { page, limit }
    }

    pub fn page(&self) -> Page {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Page::new(self.page.unwrap_or(1), limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: u32,
    pub pages: u64,
    pub total: u64,
}

impl Pagination {
    pub fn new(page: Page, total: u64) -> Self {
        let limit = u64::from(page.limit.max(1));
        Self {
            current: page.offset / page.limit.max(1) + 1,
            pages: total.div_ceil(limit),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new(100, Duration::from_secs(900));
        assert!(limiter.check("token:abc").is_ok());
        assert!(limiter.check("token:abc").is_ok());
    }

    #[test]
    fn rate_limiter_rejects_over_limit() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("ip:10.0.0.1").is_ok());
        assert!(limiter.check("ip:10.0.0.1").is_ok());
        let retry = limiter.check("ip:10.0.0.1").unwrap_err();
        assert!((1..=60).contains(&retry));
    }

    #[test]
    fn rate_limiter_isolates_clients() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
    }

    #[test]
    fn rate_limiter_window_expires() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a").is_ok());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a").is_ok());
    }

    #[test]
    fn ws_ticket_is_single_use() {
        let mut store = WsTicketStore::new();
        let caller = user(Role::Doctor);
        let ticket = store.issue(caller);
        assert_eq!(store.consume(&ticket), Some(caller));
        assert_eq!(store.consume(&ticket), None);
    }

    #[test]
    fn ws_ticket_expired_is_rejected() {
        let mut store = WsTicketStore::new();
        store.tickets.insert(
            "old".into(),
            WsTicket {
                user: user(Role::Patient),
                expires_at: Instant::now() - Duration::from_secs(1),
            },
        );
        assert_eq!(store.consume("old"), None);
    }

    #[test]
    fn ws_ticket_unknown_is_rejected() {
        let mut store = WsTicketStore::new();
        assert_eq!(store.consume("nope"), None);
    }

    #[test]
    fn room_name_is_role_then_id() {
        let caller = user(Role::Employer);
        assert_eq!(caller.room(), format!("employer-{}", caller.user_id));
    }

    #[test]
    fn page_query_defaults_and_caps() {
        let page = PageQuery::default().page();
        assert_eq!(
            page,
            Page {
                limit: 20,
                offset: 0
            }
        );
        let capped = PageQuery {
            page: Some(3),
            limit: Some(500),
        }
        .page();
        assert_eq!(
            capped,
            Page {
                limit: 100,
                offset: 200
            }
        );
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let p = Pagination::new(Page::new(2, 20), 41);
        assert_eq!(
            p,
            Pagination {
                current: 2,
                pages: 3,
                total: 41
            }
        );
        assert_eq!(Pagination::new(Page::new(1, 20), 0).pages, 0);
    }
}
