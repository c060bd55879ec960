use serde::Serialize;

use super::concerns::vital_concerns;
use super::trends::{vitals_trends, Direction};
use crate::models::{Alert, EnvironmentalReading, RiskLevel, Severity, Vitals, VitalsSnapshot};

/// Everything the assessment looks at. History and alerts are newest first.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs<'a> {
    pub vitals: Option<&'a VitalsSnapshot>,
    pub environment: Option<&'a EnvironmentalReading>,
    pub history: &'a [Vitals],
    pub recent_alerts: &'a [Alert],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: u32,
}

/// Sum independent penalties over current vitals, environment, recent
/// trend and alert history. The score is capped at 100.
pub fn assess(inputs: RiskInputs<'_>) -> RiskAssessment {
    let mut score = 0u32;
    let mut factors: Vec<&'static str> = Vec::new();
    let mut recommendations: Vec<&'static str> = Vec::new();

    if let Some(vitals) = inputs.vitals {
        for concern in vital_concerns(vitals) {
            score += concern.weight;
            factors.push(concern.label);
        }
    }

    if let Some(env) = inputs.environment {
        if env.ambient_temperature.is_some_and(|t| t > 35.0) {
            score += 15;
            factors.push("High ambient temperature");
            recommendations.push("Implement cooling measures");
        }
        if env.humidity.is_some_and(|h| h > 80.0) {
            score += 10;
            factors.push("High humidity");
        }
        if env.air_quality.is_some_and(|q| q > 150.0) {
            score += 20;
            factors.push("Poor air quality");
            recommendations.push("Improve ventilation");
        }
    }

    if !inputs.history.is_empty() {
        let window = &inputs.history[..inputs.history.len().min(5)];
        let trend = vitals_trends(window);
        if trend.heart_rate.trend == Direction::Increasing {
            score += 10;
            factors.push("Increasing heart rate trend");
        }
        if trend.temperature.trend == Direction::Increasing {
            score += 15;
            factors.push("Increasing temperature trend");
        }
    }

    for alert in inputs.recent_alerts {
        score += match alert.severity {
            Severity::Critical => 25,
            Severity::High => 15,
            _ => 0,
        };
    }

    const FOLLOW_UPS: [(&str, &str); 4] = [
        ("Elevated heart rate", "Monitor for stress and dehydration"),
        ("High blood pressure", "Consider medication review"),
        ("Elevated temperature", "Monitor for infection or heat stress"),
        ("Low oxygen saturation", "Immediate medical attention required"),
    ];
    for (factor, advice) in FOLLOW_UPS {
        if factors.contains(&factor) {
            recommendations.push(advice);
        }
    }

    let risk_score = score.min(100);
    RiskAssessment {
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        risk_factors: factors.into_iter().map(String::from).collect(),
        recommendations: recommendations.into_iter().map(String::from).collect(),
        confidence: assessment_confidence(inputs.history.len(), inputs.recent_alerts.len()),
    }
}

/// Base 50, more history and any alert raise it; never above 95.
pub fn assessment_confidence(history_len: usize, alert_count: usize) -> u32 {
    let mut confidence = 50;
    if history_len > 10 {
        confidence += 20;
    } else if history_len > 5 {
        confidence += 10;
    }
    if alert_count > 0 {
        confidence += 15;
    }
    confidence.min(95)
}
