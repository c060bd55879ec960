use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AlertActionType, AlertStatus, AlertType, NotificationChannel, Severity};
use super::vitals::{EnvironmentalReading, VitalsSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub risk_score: u32,
    pub recommendations: Vec<String>,
    pub confidence: u32,
}

/// A remediation step recorded against an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAction {
    #[serde(rename = "type")]
    pub kind: AlertActionType,
    pub description: String,
    pub executed: bool,
    pub executed_at: Option<DateTime<Utc>>,
    pub executed_by: Option<Uuid>,
}

impl AlertAction {
    pub fn executed(
        kind: AlertActionType,
        description: impl Into<String>,
        by: Uuid,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            executed: true,
            executed_at: Some(at),
            executed_by: Some(by),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipient: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub employer_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub vitals_data: Option<VitalsSnapshot>,
    pub environmental_data: Option<EnvironmentalReading>,
    pub symptoms: Vec<String>,
    pub ai_analysis: Option<AiAnalysis>,
    pub status: AlertStatus,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub actions: Vec<AlertAction>,
    pub notifications: Vec<NotificationRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields chosen by whoever raises an alert. Everything else starts empty.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub patient_id: Uuid,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub vitals_data: Option<VitalsSnapshot>,
    pub environmental_data: Option<EnvironmentalReading>,
    pub symptoms: Vec<String>,
    pub ai_analysis: Option<AiAnalysis>,
}

impl NewAlert {
    pub fn into_alert(self, now: DateTime<Utc>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            patient_id: self.patient_id,
            doctor_id: None,
            employer_id: None,
            alert_type: self.alert_type,
            severity: self.severity,
            title: self.title,
            description: self.description,
            vitals_data: self.vitals_data,
            environmental_data: self.environmental_data,
            symptoms: self.symptoms,
            ai_analysis: self.ai_analysis,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            actions: Vec::new(),
            notifications: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_alert_starts_active_and_empty() {
        let alert = NewAlert {
            patient_id: Uuid::new_v4(),
            alert_type: AlertType::Emergency,
            severity: Severity::Critical,
            title: "t".into(),
            description: "d".into(),
            vitals_data: None,
            environmental_data: None,
            symptoms: vec![],
            ai_analysis: None,
        }
        .into_alert(Utc::now());
        assert_eq!(alert.status, AlertStatus::Active);
        assert!(alert.actions.is_empty() && alert.notifications.is_empty());
    }

    #[test]
    fn alert_serializes_type_field() {
        let action = AlertAction::executed(
            AlertActionType::Consultation,
            "Treatment approved by doctor",
            Uuid::nil(),
            Utc::now(),
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "consultation");
        assert_eq!(json["executed"], true);
    }
}
