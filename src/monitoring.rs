//! Vitals intake and emergency escalation.
//!
//! Storing a reading and raising its alert happen in one transaction; the
//! realtime event is published only after commit.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{append_notification, insert_alert, insert_vitals, mark_emergency, DatabaseError};
use crate::intelligence::emergency::is_emergency;
use crate::intelligence::message_risk::MessageRisk;
use crate::models::{
    AiAnalysis, Alert, AlertType, NewAlert, NotificationChannel, NotificationRecord, Severity,
    Vitals, VitalsSource,
};
use crate::realtime::{EventPublisher, RealtimeEvent};

const DASHBOARD_RECIPIENT: &str = "dashboards";

#[derive(Debug, Clone)]
pub struct RecordedVitals {
    pub vitals: Vitals,
    pub alert: Option<Alert>,
}

impl RecordedVitals {
    pub fn is_emergency(&self) -> bool {
        self.vitals.is_emergency
    }
}

fn emergency_description(source: VitalsSource) -> &'static str {
    match source {
        VitalsSource::Device => "Critical vitals detected from IoT device",
        _ => "Critical vitals detected, immediate attention required",
    }
}

/// Persist a validated reading and raise a critical alert if it breaches an
/// emergency threshold.
pub fn record_vitals(
    conn: &mut Connection,
    publisher: &dyn EventPublisher,
    mut vitals: Vitals,
) -> Result<RecordedVitals, DatabaseError> {
    let now = Utc::now();
    let snapshot = vitals.snapshot();

    let tx = conn.transaction()?;
    insert_vitals(&tx, &vitals)?;
    let alert = if is_emergency(&snapshot) {
        mark_emergency(&tx, &vitals.id, &now)?;
        vitals.is_emergency = true;
        vitals.updated_at = now;
        let alert = NewAlert {
            patient_id: vitals.patient_id,
            alert_type: AlertType::Emergency,
            severity: Severity::Critical,
            title: "Emergency Vitals Detected".into(),
            description: emergency_description(vitals.recorded_by).into(),
            vitals_data: Some(snapshot),
            environmental_data: vitals.environmental_data.clone(),
            symptoms: vitals.symptoms.clone(),
            ai_analysis: None,
        }
        .into_alert(now);
        insert_alert(&tx, &alert)?;
        record_dispatch(&tx, &alert.id, now)?;
        Some(alert)
    } else {
        None
    };
    tx.commit()?;

    if let Some(alert) = &alert {
        let source = (vitals.recorded_by == VitalsSource::Device).then_some("iot_device");
        announce(publisher, alert, source, false);
        tracing::warn!(
            patient_id = %vitals.patient_id,
            alert_id = %alert.id,
            heart_rate = vitals.heart_rate,
            oxygen_saturation = vitals.oxygen_saturation,
            "emergency vitals recorded"
        );
    }

    Ok(RecordedVitals { vitals, alert })
}

/// Raise a critical alert for a chat message the keyword analysis scored
/// above the emergency threshold.
pub fn escalate_chat_emergency(
    conn: &Connection,
    publisher: &dyn EventPublisher,
    patient_id: Uuid,
    reply: &str,
    risk: &MessageRisk,
    confidence: u32,
) -> Result<Alert, DatabaseError> {
    let now = Utc::now();
    let alert = NewAlert {
        patient_id,
        alert_type: AlertType::Emergency,
        severity: Severity::Critical,
        title: "AI Detected Emergency Condition".into(),
        description: reply.to_string(),
        vitals_data: None,
        environmental_data: None,
        symptoms: Vec::new(),
        ai_analysis: Some(AiAnalysis {
            risk_score: risk.risk_score,
            recommendations: risk.recommendations.clone(),
            confidence,
        }),
    }
    .into_alert(now);
    let tx = conn.unchecked_transaction()?;
    insert_alert(&tx, &alert)?;
    record_dispatch(&tx, &alert.id, now)?;
    tx.commit()?;
    announce(publisher, &alert, None, true);
    tracing::warn!(
        patient_id = %patient_id,
        alert_id = %alert.id,
        risk_score = risk.risk_score,
        "chat message escalated to emergency"
    );
    Ok(alert)
}

/// Record the in-app dispatch on the alert. Runs inside the caller's
/// transaction.
fn record_dispatch(
    conn: &Connection,
    alert_id: &Uuid,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    append_notification(
        conn,
        alert_id,
        &NotificationRecord {
            channel: NotificationChannel::InApp,
            sent: true,
            sent_at: Some(at),
            recipient: DASHBOARD_RECIPIENT.into(),
        },
    )
}

/// Publish once the alert is committed.
fn announce(
    publisher: &dyn EventPublisher,
    alert: &Alert,
    source: Option<&'static str>,
    ai_detected: bool,
) {
    publisher.publish(RealtimeEvent::EmergencyAlert {
        patient_id: alert.patient_id,
        alert_id: alert.id,
        severity: alert.severity,
        source,
        ai_detected,
    });
}
