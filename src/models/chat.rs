use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ChatActionType, ChatPriority, ChatStatus, MessageKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatAction {
    #[serde(rename = "type")]
    pub kind: ChatActionType,
    pub title: String,
    pub description: String,
    pub executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub confidence: Option<u32>,
    pub risk_score: Option<u32>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub action: Option<ChatAction>,
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn text(kind: MessageKind, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            timestamp: at,
            action: None,
            metadata: None,
        }
    }
}

/// Conversation thread. `messages` is append-only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
    pub status: ChatStatus,
    pub priority: ChatPriority,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn open(patient_id: Uuid, doctor_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id,
            messages: Vec::new(),
            status: ChatStatus::Active,
            priority: ChatPriority::Medium,
            tags: Vec::new(),
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }
}
