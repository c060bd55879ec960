//! Dashboard event fan-out.
//!
//! Handlers publish through [`EventPublisher`]; the production publisher is a
//! [`Broadcaster`] over a `tokio::sync::broadcast` channel that every socket
//! connection subscribes to. Delivery is fire-and-forget: a receiver that
//! lags behind loses the oldest frames and nothing is replayed.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{AlertStatus, Severity, Vitals};

const CHANNEL_CAPACITY: usize = 256;

/// Server-originated events, serialised as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum RealtimeEvent {
    #[serde(rename_all = "camelCase")]
    VitalsUpdate {
        patient_id: Uuid,
        vitals: Box<Vitals>,
        is_emergency: bool,
    },
    #[serde(rename_all = "camelCase")]
    EmergencyAlert {
        patient_id: Uuid,
        alert_id: Uuid,
        severity: Severity,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<&'static str>,
        ai_detected: bool,
    },
    #[serde(rename_all = "camelCase")]
    AlertUpdated {
        alert_id: Uuid,
        status: AlertStatus,
        patient_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    AlertResponse {
        alert_id: Uuid,
        action: String,
        employer_id: Uuid,
    },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::VitalsUpdate { .. } => "vitals-update",
            RealtimeEvent::EmergencyAlert { .. } => "emergency-alert",
            RealtimeEvent::AlertUpdated { .. } => "alert-updated",
            RealtimeEvent::AlertResponse { .. } => "alert-response",
        }
    }
}

/// Capability handed to handlers for emitting dashboard events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: RealtimeEvent);
}

/// Which connections receive a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    /// Everyone but the connection that sent it.
    AllExcept(Uuid),
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub frame: String,
}

impl Envelope {
    pub fn is_for(&self, connection: Uuid) -> bool {
        match self.audience {
            Audience::Everyone => true,
            Audience::AllExcept(sender) => sender != connection,
        }
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Envelope>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Forward a client-sent event to other connections unchanged.
    pub fn relay(&self, audience: Audience, event: &str, data: Value) {
        let frame = serde_json::json!({ "event": event, "data": data }).to_string();
        self.send(Envelope { audience, frame });
    }

    fn send(&self, envelope: Envelope) {
        // An error only means nobody is connected.
        if self.tx.send(envelope).is_err() {
            tracing::debug!("no realtime subscribers, event dropped");
        }
    }
}

impl EventPublisher for Broadcaster {
    fn publish(&self, event: RealtimeEvent) {
        match serde_json::to_string(&event) {
            Ok(frame) => self.send(Envelope {
                audience: Audience::Everyone,
                frame,
            }),
            Err(e) => {
                tracing::error!(event = event.name(), error = %e, "failed to encode realtime event")
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Publisher that keeps every event for later inspection.
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        events: Mutex<Vec<RealtimeEvent>>,
    }

    impl RecordingPublisher {
        pub(crate) fn names(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(RealtimeEvent::name)
                .collect()
        }

        pub(crate) fn events(&self) -> Vec<RealtimeEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn publish(&self, event: RealtimeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
