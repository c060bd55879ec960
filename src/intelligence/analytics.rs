//! Population-level summaries over a reporting window.

use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use serde::Serialize;

use super::health_index::{health_index, AlertPenalty};
use super::trends::{population_trend, PopulationTrend};
use crate::models::{Alert, AlertType, Severity, Vitals};

/// Reporting window accepted by the analytics endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl Period {
    /// Unknown or missing values fall back to `7d`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("1d") => Period::Day,
            Some("30d") => Period::Month,
            Some("90d") => Period::Quarter,
            _ => Period::Week,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "1d",
            Period::Week => "7d",
            Period::Month => "30d",
            Period::Quarter => "90d",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Period::Day => Duration::days(1),
            Period::Week => Duration::days(7),
            Period::Month => Duration::days(30),
            Period::Quarter => Duration::days(90),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl SeverityCounts {
    pub fn tally<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        let mut counts = SeverityCounts::default();
        for alert in alerts {
            match alert.severity {
                Severity::Low => counts.low += 1,
                Severity::Medium => counts.medium += 1,
                Severity::High => counts.high += 1,
                Severity::Critical => counts.critical += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub count: u64,
}

pub fn alert_type_counts(alerts: &[Alert]) -> BTreeMap<AlertType, u64> {
    let mut counts = BTreeMap::new();
    for alert in alerts {
        *counts.entry(alert.alert_type).or_insert(0) += 1;
    }
    counts
}

/// Most frequent alert types, ties broken by type name.
pub fn top_risk_factors(counts: &BTreeMap<AlertType, u64>, limit: usize) -> Vec<TypeCount> {
    let mut ranked: Vec<TypeCount> = counts
        .iter()
        .map(|(&alert_type, &count)| TypeCount { alert_type, count })
        .collect();
    ranked.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.alert_type.as_str().cmp(b.alert_type.as_str()))
    });
    ranked.truncate(limit);
    ranked
}

pub fn health_recommendations(health_index: f64, counts: &BTreeMap<AlertType, u64>) -> Vec<String> {
    let count = |t: AlertType| counts.get(&t).copied().unwrap_or(0);
    let mut out = Vec::new();
    if health_index < 70.0 {
        out.push("Implement enhanced health monitoring protocols".to_string());
        out.push("Increase frequency of health check-ups".to_string());
    }
    if count(AlertType::HeatStress) > 5 {
        out.push("Improve workplace cooling and hydration facilities".to_string());
    }
    if count(AlertType::Fatigue) > 3 {
        out.push("Optimize work schedules and break patterns".to_string());
    }
    if count(AlertType::Respiratory) > 2 {
        out.push("Enhance air quality monitoring and filtration".to_string());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_vitals: usize,
    pub total_alerts: usize,
    pub unique_patients: usize,
    pub health_index: f64,
    pub trend: PopulationTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAnalytics {
    pub period: Period,
    pub summary: AnalyticsSummary,
    pub risk_distribution: SeverityCounts,
    pub top_risk_factors: Vec<TypeCount>,
    pub recommendations: Vec<String>,
}

/// Overview across every reading and alert of the window. Readings are
/// expected newest first.
pub fn health_analytics(period: Period, vitals: &[Vitals], alerts: &[Alert]) -> HealthAnalytics {
    let unique_patients: HashSet<_> = vitals.iter().map(|v| v.patient_id).collect();
    let snapshots = vitals.iter().map(Vitals::snapshot);
    let index = health_index(snapshots, alerts.len(), AlertPenalty::Standard);
    let counts = alert_type_counts(alerts);
    HealthAnalytics {
        period,
        summary: AnalyticsSummary {
            total_vitals: vitals.len(),
            total_alerts: alerts.len(),
            unique_patients: unique_patients.len(),
            health_index: index,
            trend: population_trend(vitals, alerts.len()),
        },
        risk_distribution: SeverityCounts::tally(alerts),
        top_risk_factors: top_risk_factors(&counts, 5),
        recommendations: health_recommendations(index, &counts),
    }
}
