//! Real-time dashboard socket.
//!
//! Handles WebSocket upgrade, heartbeat (30s), room joins, broadcast
//! delivery and per-connection rate limiting (10 incoming messages/sec).
//!
//! Connection lifecycle:
//! 1. Client calls `POST /api/auth/ws-ticket` to get a one-time ticket
//! 2. Client opens `GET /ws/connect?ticket=xxx`, ticket validated, WS upgraded
//! 3. Server sends `welcome`, then forwards every broadcast frame
//! 4. Heartbeat every 30s; 3 missed = disconnect

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthUser};
use crate::models::Role;
use crate::realtime::{Audience, Broadcaster};

/// Heartbeat interval: server sends `heartbeat` every 30 seconds.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Disconnect after this many missed heartbeats (3 × 30s = 90s).
const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Maximum incoming messages per second per connection.
const MAX_INCOMING_PER_SECOND: u32 = 10;

/// Query parameters for WebSocket upgrade.
#[derive(Deserialize)]
pub struct WsAuthQuery {
    ticket: String,
}

/// Frames a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom { role: Role, user_id: Uuid },
    VitalsUpdate(Value),
    EmergencyAlert(Value),
    Pong,
}

/// Frames the server originates on a single connection. Broadcast events
/// arrive pre-encoded from the [`Broadcaster`].
#[derive(Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Welcome {
        connection_id: Uuid,
        user_id: Uuid,
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat { server_time: DateTime<Utc> },
    Joined { room: String },
    Error { message: String },
}

impl ServerFrame {
    fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

// ═══════════════════════════════════════════════════════════
// WsSessionState: heartbeat and rate bookkeeping
// ═══════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
pub(crate) enum HeartbeatAction {
    SendHeartbeat,
    /// Too many missed heartbeats, disconnect.
    HeartbeatTimeout,
}

/// Per-connection state, kept apart from the socket so it can be tested
/// without one.
pub(crate) struct WsSessionState {
    missed_heartbeats: u32,
    incoming_times: VecDeque<Instant>,
}

impl WsSessionState {
    fn new() -> Self {
        Self {
            missed_heartbeats: 0,
            incoming_times: VecDeque::new(),
        }
    }

    fn on_pong(&mut self) {
        self.missed_heartbeats = 0;
    }

    fn on_heartbeat_tick(&mut self) -> HeartbeatAction {
        if self.missed_heartbeats >= MAX_MISSED_HEARTBEATS {
            return HeartbeatAction::HeartbeatTimeout;
        }
        self.missed_heartbeats += 1;
        HeartbeatAction::SendHeartbeat
    }

    /// Check incoming rate limit. Returns true if allowed.
    fn check_rate(&mut self) -> bool {
        check_incoming_rate(&mut self.incoming_times)
    }
}

/// `GET /ws/connect?ticket=`
///
/// Validates the one-time ticket before upgrading the connection.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(ctx): State<ApiContext>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = {
        let mut tickets = ctx
            .ws_tickets
            .lock()
            .map_err(|_| ApiError::Internal("ticket lock".into()))?;
        tickets
            .consume(&query.ticket)
            .ok_or(ApiError::Unauthorized)?
    };

    tracing::info!(user_id = %user.user_id, role = %user.role, "WebSocket upgrade accepted");
    let events = ctx.core.events().clone();
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, events, user)))
}

/// Main connection loop.
///
/// A sender task owns the sink; the loop multiplexes client frames,
/// heartbeat ticks and broadcast envelopes until either side goes away.
async fn handle_ws(socket: WebSocket, events: Broadcaster, user: AuthUser) {
    let connection_id = Uuid::new_v4();
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let mut broadcasts = events.subscribe();

    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let welcome = ServerFrame::Welcome {
        connection_id,
        user_id: user.user_id,
        role: user.role,
    };
    if let Some(frame) = welcome.encode() {
        let _ = tx.send(frame).await;
    }

    let mut session = WsSessionState::new();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // first tick is immediate

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(ref text))) => {
                        if !session.check_rate() {
                            tracing::debug!(%connection_id, "incoming frame over rate limit, dropped");
                            continue;
                        }
                        match serde_json::from_str::<ClientEvent>(text) {
                            Ok(ClientEvent::Pong) => session.on_pong(),
                            Ok(event) => {
                                if let Some(reply) = handle_client_event(&events, connection_id, &user, event) {
                                    let _ = tx.send(reply).await;
                                }
                            }
                            Err(e) => tracing::debug!(%connection_id, error = %e, "unrecognised frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // Ping/Pong handled by axum/tungstenite
                }
            }
            envelope = broadcasts.recv() => {
                match envelope {
                    Ok(envelope) if envelope.is_for(connection_id) => {
                        if tx.send(envelope.frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%connection_id, skipped, "socket lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                match session.on_heartbeat_tick() {
                    HeartbeatAction::HeartbeatTimeout => {
                        tracing::info!(
                            %connection_id,
                            "{MAX_MISSED_HEARTBEATS} missed heartbeats, disconnecting"
                        );
                        break;
                    }
                    HeartbeatAction::SendHeartbeat => {
                        let frame = ServerFrame::Heartbeat { server_time: Utc::now() };
                        if let Some(frame) = frame.encode() {
                            let _ = tx.send(frame).await;
                        }
                    }
                }
            }
        }
    }

    // Dropping the sender stops the sender task.
    drop(tx);
    let _ = sender_handle.await;

    tracing::info!(%connection_id, user_id = %user.user_id, "WebSocket disconnected");
}

/// Apply a client frame. Returns a reply for this connection only.
fn handle_client_event(
    events: &Broadcaster,
    connection_id: Uuid,
    user: &AuthUser,
    event: ClientEvent,
) -> Option<String> {
    match event {
        ClientEvent::JoinRoom { role, user_id } => {
            if role != user.role || user_id != user.user_id {
                tracing::warn!(%connection_id, %role, %user_id, "join refused for foreign room");
                return ServerFrame::Error {
                    message: "Cannot join another user's room".into(),
                }
                .encode();
            }
            let room = user.room();
            tracing::info!(%connection_id, room, "joined room");
            ServerFrame::Joined { room }.encode()
        }
        ClientEvent::VitalsUpdate(data) => {
            events.relay(Audience::AllExcept(connection_id), "vitals-update", data);
            None
        }
        ClientEvent::EmergencyAlert(data) => {
            tracing::warn!(
                %connection_id,
                user_id = %user.user_id,
                "client-raised emergency relayed"
            );
            events.relay(Audience::Everyone, "emergency-alert", data);
            None
        }
        ClientEvent::Pong => None,
    }
}

/// Check if an incoming message is within the rate limit (10/sec).
fn check_incoming_rate(timestamps: &mut VecDeque<Instant>) -> bool {
    let now = Instant::now();
    let one_sec_ago = now - Duration::from_secs(1);

    while let Some(&front) = timestamps.front() {
        if front < one_sec_ago {
            timestamps.pop_front();
        } else {
            break;
        }
    }

    if timestamps.len() as u32 >= MAX_INCOMING_PER_SECOND {
        return false;
    }

    timestamps.push_back(now);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use crate::api::router::api_router_with_ctx;
    use crate::api::testing::TestApp;
    use crate::models::AlertStatus;
    use crate::realtime::{EventPublisher, RealtimeEvent};

    #[test]
    fn incoming_rate_blocks_over_limit() {
        let mut timestamps = VecDeque::new();
        for _ in 0..10 {
            assert!(check_incoming_rate(&mut timestamps));
        }
        assert!(!check_incoming_rate(&mut timestamps));
    }

    #[test]
    fn incoming_rate_resets_after_window() {
        let mut timestamps = VecDeque::new();
        let old = Instant::now() - Duration::from_secs(2);
        for _ in 0..10 {
            timestamps.push_back(old);
        }
        assert!(check_incoming_rate(&mut timestamps));
    }

    #[test]
    fn third_missed_heartbeat_disconnects() {
        let mut session = WsSessionState::new();
        for _ in 0..3 {
            assert_eq!(session.on_heartbeat_tick(), HeartbeatAction::SendHeartbeat);
        }
        assert_eq!(
            session.on_heartbeat_tick(),
            HeartbeatAction::HeartbeatTimeout
        );
    }

    #[test]
    fn pong_resets_missed_counter() {
        let mut session = WsSessionState::new();
        session.on_heartbeat_tick();
        session.on_heartbeat_tick();
        session.on_pong();
        for _ in 0..3 {
            assert_eq!(session.on_heartbeat_tick(), HeartbeatAction::SendHeartbeat);
        }
    }

    #[test]
    fn client_frames_parse() {
        let join: ClientEvent = serde_json::from_value(json!({
            "event": "join-room",
            "data": {"role": "doctor", "userId": Uuid::nil()}
        }))
        .unwrap();
        assert!(matches!(
            join,
            ClientEvent::JoinRoom {
                role: Role::Doctor,
                ..
            }
        ));
        let pong: ClientEvent = serde_json::from_value(json!({"event": "pong"})).unwrap();
        assert!(matches!(pong, ClientEvent::Pong));
    }

    #[test]
    fn foreign_room_is_refused() {
        let events = Broadcaster::new();
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Patient,
        };
        let reply = handle_client_event(
            &events,
            Uuid::new_v4(),
            &user,
            ClientEvent::JoinRoom {
                role: Role::Patient,
                user_id: Uuid::new_v4(),
            },
        )
        .unwrap();
        let json: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["event"], "error");

        let reply = handle_client_event(
            &events,
            Uuid::new_v4(),
            &user,
            ClientEvent::JoinRoom {
                role: user.role,
                user_id: user.user_id,
            },
        )
        .unwrap();
        let json: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(json["event"], "joined");
        assert_eq!(json["data"]["room"], format!("patient-{}", user.user_id));
    }

    async fn serve(app: &TestApp) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = api_router_with_ctx(app.ctx.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn next_json<S>(stream: &mut S) -> Value
    where
        S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            match stream.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn socket_receives_welcome_and_broadcasts() {
        let app = TestApp::new();
        let (doctor, _) = app.doctor("d@clinic.io", "LIC-1");
        let ticket = app.ctx.ws_tickets.lock().unwrap().issue(AuthUser {
            user_id: doctor.user_id,
            role: Role::Doctor,
        });
        let addr = serve(&app).await;

        let url = format!("ws://{addr}/ws/connect?ticket={ticket}");
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        let welcome = next_json(&mut socket).await;
        assert_eq!(welcome["event"], "welcome");
        assert_eq!(welcome["data"]["role"], "doctor");

        let join = json!({
            "event": "join-room",
            "data": {"role": "doctor", "userId": doctor.user_id}
        });
        let frame = WsMessage::Text(join.to_string());
        socket.send(frame).await.unwrap();
        let joined = next_json(&mut socket).await;
        assert_eq!(joined["event"], "joined");
        assert_eq!(joined["data"]["room"], format!("doctor-{}", doctor.user_id));

        app.ctx.core.events().publish(RealtimeEvent::AlertUpdated {
            alert_id: Uuid::nil(),
            status: AlertStatus::Resolved,
            patient_id: Uuid::nil(),
        });
        let frame = next_json(&mut socket).await;
        assert_eq!(frame["event"], "alert-updated");
        assert_eq!(frame["data"]["status"], "resolved");
    }

    #[tokio::test]
    async fn client_vitals_reach_other_connections() {
        let app = TestApp::new();
        let (doctor, _) = app.doctor("d@clinic.io", "LIC-1");
        let (employer, _) = app.employer("boss@plant.io");
        let (doctor_ticket, employer_ticket) = {
            let mut tickets = app.ctx.ws_tickets.lock().unwrap();
            (
                tickets.issue(AuthUser {
                    user_id: doctor.user_id,
                    role: Role::Doctor,
                }),
                tickets.issue(AuthUser {
                    user_id: employer.user_id,
                    role: Role::Employer,
                }),
            )
        };
        let addr = serve(&app).await;

        let sender_url = format!("ws://{addr}/ws/connect?ticket={doctor_ticket}");
        let watcher_url = format!("ws://{addr}/ws/connect?ticket={employer_ticket}");
        let (mut sender, _) = tokio_tungstenite::connect_async(sender_url).await.unwrap();
        let (mut watcher, _) = tokio_tungstenite::connect_async(watcher_url).await.unwrap();
        assert_eq!(next_json(&mut sender).await["event"], "welcome");
        assert_eq!(next_json(&mut watcher).await["event"], "welcome");

        sender
            .send(WsMessage::Text(
                json!({"event": "vitals-update", "data": {"heartRate": 88}}).to_string(),
            ))
            .await
            .unwrap();
        let relayed = next_json(&mut watcher).await;
        assert_eq!(relayed["event"], "vitals-update");
        assert_eq!(relayed["data"]["heartRate"], 88);
    }

    #[tokio::test]
    async fn reused_ticket_is_rejected() {
        let app = TestApp::new();
        let (doctor, _) = app.doctor("d@clinic.io", "LIC-1");
        let ticket = app.ctx.ws_tickets.lock().unwrap().issue(AuthUser {
            user_id: doctor.user_id,
            role: Role::Doctor,
        });
        let addr = serve(&app).await;

        let url = format!("ws://{addr}/ws/connect?ticket={ticket}");
        let (_socket, _) = tokio_tungstenite::connect_async(url.clone()).await.unwrap();
        let err = tokio_tungstenite::connect_async(url).await.unwrap_err();
        match err {
            tokio_tungstenite::tungstenite::Error::Http(response) => {
                assert_eq!(response.status(), 401);
            }
            other => panic!("expected HTTP rejection, got {other:?}"),
        }
    }
}
