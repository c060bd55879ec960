use std::fmt::Write;

use crate::models::{Alert, PatientRecord, Vitals};

const PREAMBLE: &str =
    "You are Praana AI, an intelligent health assistant for industrial workers. ";
const CLOSING: &str = "Provide helpful, actionable health advice. \
    If you detect emergency conditions, recommend immediate medical attention.";

/// System prompt describing the patient the conversation is about.
pub fn build_context(
    patient: Option<&PatientRecord>,
    latest: Option<&Vitals>,
    recent_alerts: &[Alert],
) -> String {
    let mut context = String::from(PREAMBLE);

    if let Some(record) = patient {
        let user = &record.user;
        let _ = write!(
            context,
            "Patient: {} {}, Department: {}, Shift: {}. ",
            user.first_name, user.last_name, record.patient.department, record.patient.shift
        );
    }

    if let Some(v) = latest {
        let bp = &v.blood_pressure;
        let _ = write!(
            context,
            "Latest vitals: Heart Rate: {} bpm, Blood Pressure: {}/{} mmHg, \
             Temperature: {}°F, Oxygen Saturation: {}%. ",
            v.heart_rate, bp.systolic, bp.diastolic, v.temperature, v.oxygen_saturation
        );
    }

    if !recent_alerts.is_empty() {
        let listed: Vec<String> = recent_alerts
            .iter()
            .map(|a| format!("{} ({})", a.alert_type, a.severity))
            .collect();
        let _ = write!(context, "Recent alerts: {}. ", listed.join(", "));
    }

    context.push_str(CLOSING);
    context
}
