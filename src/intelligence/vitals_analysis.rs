//! Per-patient interpretation of a reading against the patient's history.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::concerns::vital_concerns;
use crate::models::{Alert, RiskLevel, Severity, Vitals, VitalsSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsAnalysis {
    pub risk_score: u32,
    pub concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub severity: RiskLevel,
    pub ai_insights: &'static str,
}

/// Score a reading on its own and against the mean of `history`.
pub fn analyze_vitals(vitals: &VitalsSnapshot, history: &[Vitals]) -> VitalsAnalysis {
    let mut score = 0u32;
    let mut concerns = Vec::new();
    let mut recommendations = Vec::new();

    for concern in vital_concerns(vitals) {
        score += concern.weight;
        concerns.push(concern.label.to_string());
        recommendations.push(concern.recommendation.to_string());
    }

    if !history.is_empty() {
        let n = history.len() as f64;
        let baseline_hr = history.iter().map(|v| f64::from(v.heart_rate)).sum::<f64>() / n;
        let baseline_sys = history
            .iter()
            .map(|v| f64::from(v.blood_pressure.systolic))
            .sum::<f64>()
            / n;
        if f64::from(vitals.heart_rate) > baseline_hr + 20.0 {
            score += 15;
            concerns.push("Heart rate significantly elevated from baseline".to_string());
        }
        if f64::from(vitals.blood_pressure.systolic) > baseline_sys + 20.0 {
            score += 15;
            concerns.push("Blood pressure significantly elevated from baseline".to_string());
        }
    }

    VitalsAnalysis {
        risk_score: score.min(100),
        concerns,
        recommendations,
        severity: RiskLevel::from_score(score),
        ai_insights: insight(score),
    }
}

fn insight(score: u32) -> &'static str {
    if score > 80 {
        "Critical health indicators detected. Immediate medical intervention required. Patient shows signs of severe distress."
    } else if score > 60 {
        "High-risk health indicators. Patient requires close monitoring and potential medical consultation."
    } else if score > 40 {
        "Moderate health concerns detected. Patient should be monitored and provided with appropriate interventions."
    } else {
        "Health indicators are within acceptable ranges. Continue regular monitoring and maintain current health practices."
    }
}

/// Doctor-facing digest of a patient's latest state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub risk_score: u32,
    pub summary: String,
    pub recommendations: Vec<String>,
    pub concerns: Vec<String>,
}

pub fn patient_summary(
    latest: Option<&Vitals>,
    alerts: &[Alert],
    now: DateTime<Utc>,
) -> PatientSummary {
    let Some(latest) = latest else {
        return PatientSummary {
            risk_score: 0,
            summary: "No recent vitals data available".into(),
            recommendations: vec!["Schedule regular health monitoring".into()],
            concerns: Vec::new(),
        };
    };

    let mut score = 0u32;
    let mut concerns = Vec::new();
    let mut recommendations = Vec::new();
    for concern in vital_concerns(&latest.snapshot()) {
        score += concern.weight;
        concerns.push(concern.label.to_string());
        recommendations.push(concern.recommendation.to_string());
    }

    let day_ago = now - Duration::hours(24);
    if alerts
        .iter()
        .any(|a| a.severity == Severity::Critical && a.created_at > day_ago)
    {
        score += 40;
        concerns.push("Recent critical alerts".to_string());
        recommendations.push("Urgent medical evaluation recommended".to_string());
    }

    let summary = if concerns.is_empty() {
        "Patient vitals are within normal ranges".to_string()
    } else {
        let level = match score {
            s if s > 70 => "High",
            s if s > 40 => "Medium",
            _ => "Low",
        };
        format!("Patient shows {}. Risk level: {level}", concerns.join(", "))
    };

    PatientSummary {
        risk_score: score.min(100),
        summary,
        recommendations,
        concerns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{emergency_alert, reading};
    use crate::intelligence::concerns::snapshot;
    use uuid::Uuid;

    #[test]
    fn baseline_deviation_adds_weight() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let history: Vec<_> = (0..3).map(|i| reading(id, 70, now - Duration::hours(i))).collect();
        let analysis = analyze_vitals(&snapshot(95, 145, 80, 98.6, 98), &history);
        assert_eq!(analysis.risk_score, 55);
        assert_eq!(analysis.severity, RiskLevel::Medium);
        assert_eq!(
            analysis.concerns,
            vec![
                "High blood pressure",
                "Heart rate significantly elevated from baseline",
                "Blood pressure significantly elevated from baseline"
            ]
        );
        assert_eq!(analysis.recommendations, vec!["Consider medication review"]);
    }

    #[test]
    fn critical_reading_without_history() {
        let analysis = analyze_vitals(&snapshot(110, 150, 95, 101.0, 93), &[]);
        assert_eq!(analysis.risk_score, 100);
        assert_eq!(analysis.severity, RiskLevel::Critical);
        assert!(analysis.ai_insights.starts_with("Critical"));
    }

    #[test]
    fn summary_without_vitals() {
        let summary = patient_summary(None, &[], Utc::now());
        assert_eq!(summary.risk_score, 0);
        assert_eq!(summary.summary, "No recent vitals data available");
    }

    #[test]
    fn recent_critical_alert_raises_summary_risk() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let latest = reading(id, 105, now);
        let alerts = vec![emergency_alert(id, Severity::Critical)];
        let summary = patient_summary(Some(&latest), &alerts, now + Duration::minutes(1));
        assert_eq!(summary.risk_score, 60);
        assert_eq!(
            summary.summary,
            "Patient shows Elevated heart rate, Recent critical alerts. Risk level: Medium"
        );

        let mut stale = emergency_alert(id, Severity::Critical);
        stale.created_at = now - Duration::hours(30);
        let quiet = patient_summary(Some(&latest), &[stale], now);
        assert_eq!(quiet.risk_score, 20);
    }

    #[test]
    fn normal_latest_reading() {
        let latest = reading(Uuid::new_v4(), 72, Utc::now());
        let summary = patient_summary(Some(&latest), &[], Utc::now());
        assert_eq!(summary.summary, "Patient vitals are within normal ranges");
        assert!(summary.recommendations.is_empty());
    }
}
