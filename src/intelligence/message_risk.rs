//! Keyword triage of free-text chat messages.
//!
//! When a message matches several groups, the highest group score wins and
//! recommendations and actions from every matched group are kept, in group
//! order.

use serde::Serialize;

use crate::models::ChatActionType;

/// Score used when no keyword group matches.
pub const BASELINE_RISK: u32 = 20;

/// A follow-up the assistant proposes alongside its reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedAction {
    #[serde(rename = "type")]
    pub kind: ChatActionType,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRisk {
    pub risk_score: u32,
    pub recommendations: Vec<String>,
    pub actions: Vec<SuggestedAction>,
}

impl MessageRisk {
    pub fn is_emergency(&self) -> bool {
        self.risk_score > 80
    }
}

struct KeywordGroup {
    keywords: &'static [&'static str],
    score: u32,
    recommendations: &'static [&'static str],
    action: SuggestedAction,
}

const GROUPS: [KeywordGroup; 3] = [
    KeywordGroup {
        keywords: &["chest pain", "difficulty breathing", "can't breathe"],
        score: 95,
        recommendations: &["Seek immediate medical attention"],
        action: SuggestedAction {
            kind: ChatActionType::Emergency,
            title: "Emergency Alert Triggered",
            description: "Medical emergency team and supervisor notified",
        },
    },
    KeywordGroup {
        keywords: &["headache", "dizzy", "tired", "fatigue"],
        score: 70,
        recommendations: &[
            "Take a break in a cool, shaded area",
            "Drink water and electrolytes",
        ],
        action: SuggestedAction {
            kind: ChatActionType::Consultation,
            title: "Doctor Consultation Booked",
            description: "Video call with doctor scheduled for urgent review",
        },
    },
    KeywordGroup {
        keywords: &["thirsty", "dehydrated", "hot"],
        score: 50,
        recommendations: &["Increase fluid intake", "Take regular breaks"],
        action: SuggestedAction {
            kind: ChatActionType::Reminder,
            title: "Hydration Reminder Set",
            description: "Reminder to drink water every 30 minutes",
        },
    },
];

const BASELINE_RECOMMENDATIONS: [&str; 2] = [
    "Continue monitoring your health",
    "Stay hydrated and take regular breaks",
];

/// Score a message by substring match on its lower-cased text.
pub fn analyze_message(message: &str) -> MessageRisk {
    let text = message.to_lowercase().replace('\u{2019}', "'");
    let mut risk = MessageRisk {
        risk_score: 0,
        recommendations: Vec::new(),
        actions: Vec::new(),
    };

    for group in &GROUPS {
        if !group.keywords.iter().any(|k| text.contains(k)) {
            continue;
        }
        risk.risk_score = risk.risk_score.max(group.score);
        risk.recommendations
            .extend(group.recommendations.iter().map(|r| r.to_string()));
        risk.actions.push(group.action.clone());
    }

    if risk.risk_score == 0 {
        risk.risk_score = BASELINE_RISK;
        risk.recommendations
            .extend(BASELINE_RECOMMENDATIONS.iter().map(|r| r.to_string()));
    }
    risk
}

/// Canned reply used when no generated text is available.
pub fn fallback_reply(risk_score: u32) -> &'static str {
    if risk_score > 80 {
        "I understand you're experiencing serious symptoms. Please seek immediate medical attention and notify your supervisor. Emergency services have been contacted."
    } else if risk_score > 50 {
        "Based on your symptoms, I recommend taking immediate rest in a cool area and drinking water. I've scheduled a consultation with a doctor for you."
    } else {
        "Thank you for sharing your health status. I'm monitoring your condition and will provide recommendations based on your vitals and symptoms."
    }
}
