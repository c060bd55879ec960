//! Employer-facing workforce metrics.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::analytics::Period;
use super::health_index::{health_index, AlertPenalty};
use super::trends::days_in_window;
use crate::models::{Alert, AlertType, Severity, Urgency, Vitals, VitalsSnapshot};

const LOW_INDEX_ADVICE: &str =
    "Health index is below optimal levels. Consider implementing additional safety measures.";
const HEAT_STRESS_ADVICE: &str =
    "High number of heat stress incidents detected. Add more hydration stations.";
const INCIDENT_RATE_ADVICE: &str =
    "High incident rate detected. Implement cooling breaks every 2 hours.";

// ---------------------------------------------------------------------------
// Productivity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityImpact {
    pub total_employees: usize,
    pub affected_employees: usize,
    pub impact_percentage: f64,
    pub avg_productivity: f64,
}

/// Share of monitored workers who raised at least one alert.
pub fn productivity_impact(vitals: &[Vitals], alerts: &[Alert]) -> ProductivityImpact {
    let total: HashSet<Uuid> = vitals.iter().map(|v| v.patient_id).collect();
    let affected: HashSet<Uuid> = alerts.iter().map(|a| a.patient_id).collect();
    let impact_percentage = if total.is_empty() {
        0.0
    } else {
        affected.len() as f64 / total.len() as f64 * 100.0
    };
    ProductivityImpact {
        total_employees: total.len(),
        affected_employees: affected.len(),
        impact_percentage,
        avg_productivity: (100.0 - impact_percentage).max(0.0),
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceRecommendation {
    #[serde(rename = "type")]
    pub priority: RecommendationPriority,
    pub title: &'static str,
    pub description: String,
    pub impact: &'static str,
    pub estimated_cost: &'static str,
    #[serde(rename = "expectedROI")]
    pub expected_roi: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_workers: Option<usize>,
}

/// Suggestions shown on the employer dashboard.
pub fn dashboard_recommendations(
    health_index: f64,
    type_counts: &BTreeMap<AlertType, u64>,
    active_alerts: usize,
) -> Vec<WorkforceRecommendation> {
    let mut out = Vec::new();
    if health_index < 70.0 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::High,
            title: "Improve Workplace Health Conditions",
            description: LOW_INDEX_ADVICE.into(),
            impact: "High",
            estimated_cost: "$5,000",
            expected_roi: "6 months",
            affected_workers: None,
        });
    }
    let heat_stress = type_counts
        .get(&AlertType::HeatStress)
        .copied()
        .unwrap_or(0);
    if heat_stress > 5 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::Medium,
            title: "Increase Hydration Stations",
            description: HEAT_STRESS_ADVICE.into(),
            impact: "Medium",
            estimated_cost: "$2,400",
            expected_roi: "3 months",
            affected_workers: None,
        });
    }
    if active_alerts > 10 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::High,
            title: "Implement Staggered Break Schedules",
            description: INCIDENT_RATE_ADVICE.into(),
            impact: "High",
            estimated_cost: "$0",
            expected_roi: "Immediate",
            affected_workers: None,
        });
    }
    out
}

fn percent(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> usize {
    ids.collect::<HashSet<_>>().len()
}

/// Action plan generated on request, sized by affected workers.
pub fn action_plan(
    vitals: &[Vitals],
    alerts: &[Alert],
    period: Period,
) -> Vec<WorkforceRecommendation> {
    let mut out = Vec::new();
    let snapshots = vitals.iter().map(Vitals::snapshot);
    let index = health_index(snapshots, alerts.len(), AlertPenalty::Standard);

    if index < 70.0 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::High,
            title: "Implement Enhanced Safety Protocols",
            description: format!(
                "Health index is {}%, below optimal levels. Implement additional safety measures and monitoring.",
                percent(index)
            ),
            impact: "High",
            estimated_cost: "$10,000",
            expected_roi: "6 months",
            affected_workers: Some(distinct(vitals.iter().map(|v| v.patient_id))),
        });
    }
    if alerts.len() > 20 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::Critical,
            title: "Emergency Response Protocol Activation",
            description: format!(
                "{} incidents detected in {}. Activate emergency response protocols.",
                alerts.len(),
                period.as_str()
            ),
            impact: "Critical",
            estimated_cost: "$5,000",
            expected_roi: "Immediate",
            affected_workers: Some(distinct(alerts.iter().map(|a| a.patient_id))),
        });
    }
    let heat: Vec<&Alert> = alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::HeatStress)
        .collect();
    if heat.len() > 5 {
        out.push(WorkforceRecommendation {
            priority: RecommendationPriority::Medium,
            title: "Increase Hydration Infrastructure",
            description: format!(
                "{} heat stress incidents detected. Add hydration stations and cooling areas.",
                heat.len()
            ),
            impact: "Medium",
            estimated_cost: "$3,000",
            expected_roi: "3 months",
            affected_workers: Some(distinct(heat.iter().map(|a| a.patient_id))),
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Trend and breakdowns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceDay {
    pub date: NaiveDate,
    pub health_index: f64,
    pub incidents: usize,
    pub vitals_recorded: usize,
}

/// One entry per day of the window, including empty days.
pub fn daily_workforce_trend(
    vitals: &[Vitals],
    alerts: &[Alert],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<WorkforceDay> {
    days_in_window(start, end)
        .into_iter()
        .map(|date| {
            let day_vitals: Vec<VitalsSnapshot> = vitals
                .iter()
                .filter(|v| v.timestamp.date_naive() == date)
                .map(Vitals::snapshot)
                .collect();
            let incidents = alerts
                .iter()
                .filter(|a| a.created_at.date_naive() == date)
                .count();
            WorkforceDay {
                date,
                health_index: health_index(
                    day_vitals.iter().copied(),
                    incidents,
                    AlertPenalty::Workforce,
                ),
                incidents,
                vitals_recorded: day_vitals.len(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentBreakdown {
    pub department: String,
    pub employee_count: usize,
    pub avg_health_index: f64,
    pub total_alerts: usize,
}

/// Per-department headcount, health index and alert total. `roster` maps
/// each active patient to their department.
pub fn department_breakdown(
    roster: &[(Uuid, String)],
    vitals: &[Vitals],
    alerts: &[Alert],
) -> Vec<DepartmentBreakdown> {
    let mut departments: BTreeMap<&str, HashSet<Uuid>> = BTreeMap::new();
    for (patient_id, department) in roster {
        departments
            .entry(department.as_str())
            .or_default()
            .insert(*patient_id);
    }
    departments
        .into_iter()
        .map(|(department, members)| {
            let readings = vitals
                .iter()
                .filter(|v| members.contains(&v.patient_id))
                .map(Vitals::snapshot);
            let total_alerts = alerts
                .iter()
                .filter(|a| members.contains(&a.patient_id))
                .count();
            DepartmentBreakdown {
                department: department.to_string(),
                employee_count: members.len(),
                avg_health_index: health_index(readings, total_alerts, AlertPenalty::Workforce),
                total_alerts,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Risk factors, absenteeism, ROI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFactorShare {
    pub name: String,
    pub value: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskFactorAnalysis {
    pub distribution: Vec<RiskFactorShare>,
    pub top_risk_factor: RiskFactorShare,
}

/// Alert types in order of first appearance with their share of all alerts.
pub fn risk_factor_analysis(alerts: &[Alert]) -> RiskFactorAnalysis {
    let mut order: Vec<(AlertType, u64)> = Vec::new();
    for alert in alerts {
        match order.iter_mut().find(|(t, _)| *t == alert.alert_type) {
            Some((_, count)) => *count += 1,
            None => order.push((alert.alert_type, 1)),
        }
    }
    let total = alerts.len() as f64;
    let distribution: Vec<RiskFactorShare> = order
        .into_iter()
        .map(|(alert_type, count)| RiskFactorShare {
            name: alert_type.display_name(),
            value: count,
            percentage: count as f64 / total * 100.0,
        })
        .collect();
    let top_risk_factor = distribution.iter().fold(
        RiskFactorShare {
            name: String::new(),
            value: 0,
            percentage: 0.0,
        },
        |best, current| {
            if current.value > best.value {
                current.clone()
            } else {
                best
            }
        },
    );
    RiskFactorAnalysis {
        distribution,
        top_risk_factor,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeismFactors {
    pub health_index: f64,
    pub incident_rate: f64,
    pub critical_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeismForecast {
    pub next_7_days: f64,
    pub next_30_days: f64,
    pub factors: AbsenteeismFactors,
}

/// Predicted absence percentage: 5% base plus health and incident loadings.
pub fn predict_absenteeism(vitals: &[Vitals], alerts: &[Alert]) -> AbsenteeismForecast {
    let snapshots = vitals.iter().map(Vitals::snapshot);
    let index = health_index(snapshots, alerts.len(), AlertPenalty::Workforce);
    let incident_rate = alerts.len() as f64 / vitals.len().max(1) as f64;
    let critical_alerts = alerts
        .iter()
        .filter(|a| a.severity == Severity::Critical)
        .count();

    let mut predicted = 5.0;
    if index < 60.0 {
        predicted += 15.0;
    }
    if incident_rate > 0.1 {
        predicted += 10.0;
    }
    if critical_alerts > 0 {
        predicted += 20.0;
    }

    AbsenteeismForecast {
        next_7_days: f64::min(predicted, 25.0),
        next_30_days: f64::min(predicted * 1.5, 35.0),
        factors: AbsenteeismFactors {
            health_index: index,
            incident_rate,
            critical_alerts,
        },
    }
}

pub const MONTHLY_SYSTEM_COST: f64 = 10_000.0;
const PREVENTION_RATE: f64 = 0.7;
const COST_PER_INCIDENT: f64 = 500.0;
const PRODUCTIVITY_PER_EMPLOYEE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiAnalysis {
    pub healthcare_cost_reduction: f64,
    pub productivity_improvement: f64,
    pub total_monthly_savings: f64,
    pub system_cost: f64,
    pub roi: i64,
    /// Months; absent when there are no savings to pay the system back.
    pub payback_period: Option<u64>,
}

pub fn roi_analysis(alerts: &[Alert], vitals: &[Vitals]) -> RoiAnalysis {
    let employees: HashSet<Uuid> = vitals.iter().map(|v| v.patient_id).collect();
    let healthcare_cost_reduction = alerts.len() as f64 * PREVENTION_RATE * COST_PER_INCIDENT;
    let productivity_improvement = employees.len() as f64 * PRODUCTIVITY_PER_EMPLOYEE;
    let total_monthly_savings = healthcare_cost_reduction + productivity_improvement;
    let net_savings = total_monthly_savings - MONTHLY_SYSTEM_COST;
    let roi = (net_savings / MONTHLY_SYSTEM_COST * 100.0).round() as i64;
    let payback_period = (total_monthly_savings > 0.0)
        .then(|| (MONTHLY_SYSTEM_COST / total_monthly_savings).ceil() as u64);
    RoiAnalysis {
        healthcare_cost_reduction,
        productivity_improvement,
        total_monthly_savings,
        system_cost: MONTHLY_SYSTEM_COST,
        roi,
        payback_period,
    }
}

// ---------------------------------------------------------------------------
// Individual triage
// ---------------------------------------------------------------------------

/// Employee risk from the latest reading and the severity of open alerts.
pub fn employee_risk_level(latest: Option<&VitalsSnapshot>, active_alerts: &[Alert]) -> Urgency {
    if latest.is_none() && active_alerts.is_empty() {
        return Urgency::Low;
    }
    let mut points = 0u32;
    if let Some(v) = latest {
        if !(60..=100).contains(&v.heart_rate) {
            points += 2;
        }
        if v.blood_pressure.systolic > 140 || v.blood_pressure.diastolic > 90 {
            points += 2;
        }
        if v.temperature > 100.0 {
            points += 3;
        }
        if v.oxygen_saturation < 95 {
            points += 3;
        }
    }
    for alert in active_alerts {
        points += match alert.severity {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low => 0,
        };
    }
    match points {
        p if p >= 8 => Urgency::High,
        p if p >= 4 => Urgency::Medium,
        _ => Urgency::Low,
    }
}

/// Doctor triage: only patients with at least one reading are ranked.
/// Only `high` alerts raise the level; a critical alert arrives with an
/// emergency reading, which already does.
pub fn patient_urgency(latest: Option<&Vitals>, active_alerts: &[Alert]) -> Urgency {
    let Some(latest) = latest else {
        return Urgency::Low;
    };
    if latest.is_emergency || active_alerts.iter().any(|a| a.severity == Severity::High) {
        Urgency::High
    } else if active_alerts.iter().any(|a| a.severity == Severity::Medium) {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}
