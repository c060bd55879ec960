//! Cross-role health views: live readings, device intake, population
//! analytics and risk assessment. Open to every authenticated role.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::employer::department_members;
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, ApiJson, ApiQuery};
use crate::api::types::{ApiContext, AuthUser};
use crate::db::{self, AlertFilter, Page, VitalsFilter};
use crate::intelligence::analytics::{health_analytics, HealthAnalytics, Period, SeverityCounts};
use crate::intelligence::risk_assessment::{assess, RiskAssessment, RiskInputs};
use crate::intelligence::trends::{daily_averages, vitals_trends, DailyVitals, VitalsTrends};
use crate::models::{
    Alert, AlertStatus, AlertType, EnvironmentalReading, Severity, Vitals, VitalsInput,
    VitalsSnapshot, VitalsSource,
};
use crate::monitoring;
use crate::realtime::RealtimeEvent;

const TREND_SAMPLE: u32 = 10;
const ACTIVE_ALERT_LIMIT: u32 = 50;
const ASSESSMENT_HISTORY: u32 = 20;
const ASSESSMENT_ALERTS: u32 = 10;

fn required_patient(raw: Option<&str>) -> Result<Uuid, ApiError> {
    let raw = raw
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::bad_request("Patient ID is required"))?;
    parse_id(raw)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuery {
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RealtimeVitals {
    pub current: Vitals,
    pub trends: VitalsTrends,
    pub timestamp: DateTime<Utc>,
}

/// `GET /api/health/vitals/realtime?patientId=`
pub async fn realtime_vitals(
    State(ctx): State<ApiContext>,
    ApiQuery(query): ApiQuery<RealtimeQuery>,
) -> Result<Json<RealtimeVitals>, ApiError> {
    let patient_id = required_patient(query.patient_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    let recent = db::recent_vitals(&conn, &patient_id, TREND_SAMPLE)?;
    let trends = vitals_trends(&recent);
    let current = recent
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::not_found("No vitals data found"))?;
    Ok(Json(RealtimeVitals {
        current,
        trends,
        timestamp: Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamedVitals {
    pub patient_id: String,
    #[serde(flatten)]
    pub reading: VitalsInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamAccepted {
    pub vitals: Vitals,
    pub is_emergency: bool,
}

/// `POST /api/health/vitals/stream`: device intake. Same checks and alerting
/// as patient submissions, plus a `vitals-update` broadcast.
pub async fn stream_vitals(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(body): ApiJson<StreamedVitals>,
) -> Result<(StatusCode, Json<StreamAccepted>), ApiError> {
    body.reading.validate()?;
    let patient_id = parse_id(&body.patient_id)?;
    let mut conn = ctx.core.open_db()?;
    if db::get_patient(&conn, &patient_id)?.is_none() {
        return Err(ApiError::not_found("Patient not found"));
    }

    let reading = body.reading;
    let vitals = reading.into_vitals(patient_id, VitalsSource::Device, Utc::now());
    let recorded = monitoring::record_vitals(&mut conn, ctx.core.publisher(), vitals)?;
    let is_emergency = recorded.is_emergency();

    ctx.core.publisher().publish(RealtimeEvent::VitalsUpdate {
        patient_id,
        vitals: Box::new(recorded.vitals.clone()),
        is_emergency,
    });
    tracing::debug!(
        patient_id = %patient_id,
        submitted_by = %caller.user_id,
        is_emergency,
        "device reading stored"
    );

    Ok((
        StatusCode::CREATED,
        Json(StreamAccepted {
            vitals: recorded.vitals,
            is_emergency,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlertsQuery {
    pub severity: Option<Severity>,
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
}

/// `GET /api/health/alerts/active`: newest fifty.
pub async fn active_alerts(
    State(ctx): State<ApiContext>,
    ApiQuery(query): ApiQuery<ActiveAlertsQuery>,
) -> Result<Json<AlertList>, ApiError> {
    let patient_id = query.patient_id.as_deref().map(parse_id).transpose()?;
    let filter = AlertFilter {
        patient_id,
        severities: query.severity.into_iter().collect(),
        alert_type: query.alert_type,
        ..AlertFilter::active()
    };
    let conn = ctx.core.open_db()?;
    let alerts = db::list_alerts(&conn, &filter, Some(Page::first(ACTIVE_ALERT_LIMIT)))?;
    Ok(Json(AlertList { alerts }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewQuery {
    pub period: Option<String>,
    pub department: Option<String>,
}

/// `GET /api/health/analytics/overview`
pub async fn analytics_overview(
    State(ctx): State<ApiContext>,
    ApiQuery(query): ApiQuery<OverviewQuery>,
) -> Result<Json<HealthAnalytics>, ApiError> {
    let period = Period::parse(query.period.as_deref());
    let end = Utc::now();
    let start = end - period.duration();
    let conn = ctx.core.open_db()?;

    let mut vitals_filter = VitalsFilter::default().since(start).until(end);
    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        vitals_filter.patient_ids = Some(department_members(&conn, department)?);
    }
    let vitals = db::list_vitals(&conn, &vitals_filter, None)?;
    let alerts = db::list_alerts(&conn, &AlertFilter::default().since(start).until(end), None)?;

    Ok(Json(health_analytics(period, &vitals, &alerts)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsQuery {
    pub period: Option<String>,
    pub patient_id: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrendSeries {
    pub period: Period,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub trends: Vec<DailyVitals>,
}

/// `GET /api/health/trends`: daily averages, thirty days unless told
/// otherwise. A patient id takes precedence over a department.
pub async fn trends(
    State(ctx): State<ApiContext>,
    ApiQuery(query): ApiQuery<TrendsQuery>,
) -> Result<Json<TrendSeries>, ApiError> {
    let period = match query.period.as_deref() {
        Some(raw) => Period::parse(Some(raw)),
        None => Period::Month,
    };
    let end = Utc::now();
    let start = end - period.duration();
    let conn = ctx.core.open_db()?;

    let mut filter = VitalsFilter::default().since(start).until(end);
    if let Some(raw) = query.patient_id.as_deref().filter(|p| !p.is_empty()) {
        filter.patient_id = Some(parse_id(raw)?);
    } else if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        filter.patient_ids = Some(department_members(&conn, department)?);
    }
    let vitals = db::list_vitals(&conn, &filter, None)?;

    Ok(Json(TrendSeries {
        period,
        start,
        end,
        trends: daily_averages(&vitals, start, end),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskAssessmentRequest {
    pub patient_id: Option<String>,
    pub vitals_data: Option<VitalsSnapshot>,
    pub environmental_data: Option<EnvironmentalReading>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub assessment: RiskAssessment,
    /// Severity counts of the recent alerts raised in the last 24 hours.
    pub risk_distribution: SeverityCounts,
}

/// `POST /api/health/risk-assessment`
pub async fn risk_assessment(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<RiskAssessmentRequest>,
) -> Result<Json<RiskReport>, ApiError> {
    let patient_id = required_patient(req.patient_id.as_deref())?;
    let conn = ctx.core.open_db()?;
    if db::get_patient(&conn, &patient_id)?.is_none() {
        return Err(ApiError::not_found("Patient not found"));
    }

    let history = db::recent_vitals(&conn, &patient_id, ASSESSMENT_HISTORY)?;
    let recent_alerts = db::list_alerts(
        &conn,
        &AlertFilter::for_patient(patient_id),
        Some(Page::first(ASSESSMENT_ALERTS)),
    )?;

    let assessment = assess(RiskInputs {
        vitals: req.vitals_data.as_ref(),
        environment: req.environmental_data.as_ref(),
        history: &history,
        recent_alerts: &recent_alerts,
    });
    let day_ago = Utc::now() - Duration::hours(24);
    let risk_distribution =
        SeverityCounts::tally(recent_alerts.iter().filter(|a| a.created_at >= day_ago));

    Ok(Json(RiskReport {
        assessment,
        risk_distribution,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyStatus {
    pub emergency_alerts: Vec<Alert>,
    pub critical_vitals: Vec<Vitals>,
    pub total_emergencies: usize,
    pub last_updated: DateTime<Utc>,
}

/// `GET /api/health/emergency-status`: active critical alerts and
/// emergency readings from the last hour.
pub async fn emergency_status(
    State(ctx): State<ApiContext>,
) -> Result<Json<EmergencyStatus>, ApiError> {
    let conn = ctx.core.open_db()?;
    let now = Utc::now();
    let alerts_filter = AlertFilter {
        severities: vec![Severity::Critical],
        ..AlertFilter::default().with_status(AlertStatus::Active)
    };
    let emergency_alerts = db::list_alerts(&conn, &alerts_filter, None)?;
    let vitals_filter = VitalsFilter {
        emergency_only: true,
        ..VitalsFilter::default().since(now - Duration::hours(1))
    };
    let critical_vitals = db::list_vitals(&conn, &vitals_filter, None)?;

    Ok(Json(EmergencyStatus {
        total_emergencies: emergency_alerts.len() + critical_vitals.len(),
        emergency_alerts,
        critical_vitals,
        last_updated: now,
    }))
}
