//! Employer endpoints: workforce dashboard, analytics and alert responses.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{employer_profile, parse_optional_date};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, ApiJson, ApiQuery};
use crate::api::types::{ApiContext, AuthUser, PageQuery, Pagination};
use crate::db::{self, AlertFilter, Page, VitalsFilter};
use crate::intelligence::analytics::{alert_type_counts, top_risk_factors, Period, TypeCount};
use crate::intelligence::health_index::{health_index, AlertPenalty};
use crate::intelligence::workforce::{
    daily_workforce_trend, dashboard_recommendations, department_breakdown, employee_risk_level,
    predict_absenteeism, productivity_impact, risk_factor_analysis, roi_analysis,
    AbsenteeismForecast, DepartmentBreakdown, ProductivityImpact, RiskFactorAnalysis, RoiAnalysis,
    WorkforceDay, WorkforceRecommendation,
};
use crate::models::{
    Alert, AlertAction, AlertActionType, AlertStatus, AlertType, Employer, FieldError,
    PatientRecord, Severity, Urgency, Vitals,
};
use crate::realtime::RealtimeEvent;

const DASHBOARD_DAYS: i64 = 7;
/// Longest custom analytics window; the trend holds one entry per day.
const MAX_ANALYTICS_DAYS: i64 = 366;
const DASHBOARD_RECENT_ALERTS: usize = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceStatistics {
    pub total_employees: u64,
    pub active_employees: u64,
    pub health_index: f64,
    pub daily_incidents: usize,
    pub avg_productivity: f64,
}

#[derive(Debug, Serialize)]
pub struct DepartmentCount {
    pub department: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployerDashboard {
    pub employer: Employer,
    pub statistics: WorkforceStatistics,
    pub department_stats: Vec<DepartmentCount>,
    pub risk_factors: Vec<TypeCount>,
    pub productivity_data: ProductivityImpact,
    pub ai_recommendations: Vec<WorkforceRecommendation>,
    pub recent_alerts: Vec<Alert>,
}

/// `GET /api/employer/dashboard`: the last seven days across the workforce.
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<EmployerDashboard>, ApiError> {
    let conn = ctx.core.open_db()?;
    let employer = employer_profile(&conn, &caller)?;

    let since = Utc::now() - Duration::days(DASHBOARD_DAYS);
    let headcount = db::count_active_patients(&conn, None)?;
    let recent_vitals = db::list_vitals(&conn, &VitalsFilter::default().since(since), None)?;
    let active_alerts = db::list_alerts(&conn, &AlertFilter::active().since(since), None)?;
    let window_alerts = db::list_alerts(&conn, &AlertFilter::default().since(since), None)?;

    let index = health_index(
        recent_vitals.iter().map(Vitals::snapshot),
        active_alerts.len(),
        AlertPenalty::Workforce,
    );
    let type_counts = alert_type_counts(&window_alerts);
    let productivity_data = productivity_impact(&recent_vitals, &active_alerts);
    let ai_recommendations = dashboard_recommendations(index, &type_counts, active_alerts.len());

    let department_stats = db::department_headcounts(&conn)?
        .into_iter()
        .map(|(department, count)| DepartmentCount { department, count })
        .collect();

    Ok(Json(EmployerDashboard {
        employer,
        statistics: WorkforceStatistics {
            total_employees: headcount,
            active_employees: headcount,
            health_index: index,
            daily_incidents: active_alerts.len(),
            avg_productivity: productivity_data.avg_productivity,
        },
        department_stats,
        risk_factors: top_risk_factors(&type_counts, type_counts.len()),
        productivity_data,
        ai_recommendations,
        recent_alerts: active_alerts
            .into_iter()
            .take(DASHBOARD_RECENT_ALERTS)
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    pub period: Option<String>,
    pub department: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceAnalytics {
    pub period: Window,
    pub trend_data: Vec<WorkforceDay>,
    pub department_breakdown: Vec<DepartmentBreakdown>,
    pub risk_analysis: RiskFactorAnalysis,
    pub predicted_absenteeism: AbsenteeismForecast,
    pub roi_analysis: RoiAnalysis,
}

/// Active patient ids of one department.
pub(crate) fn department_members(
    conn: &Connection,
    department: &str,
) -> Result<Vec<Uuid>, ApiError> {
    Ok(db::list_active_patients(conn, Some(department), None, 0)?
        .into_iter()
        .map(|r| r.patient.id)
        .collect())
}

/// `GET /api/employer/analytics`
///
/// The department filter narrows the trend, risk, absenteeism and ROI
/// figures. The department breakdown always covers every active patient.
pub async fn analytics(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<AnalyticsQuery>,
) -> Result<Json<WorkforceAnalytics>, ApiError> {
    let conn = ctx.core.open_db()?;
    employer_profile(&conn, &caller)?;

    let period = Period::parse(query.period.as_deref());
    let end = parse_optional_date("endDate", query.end_date.as_deref())?.unwrap_or_else(Utc::now);
    let start = parse_optional_date("startDate", query.start_date.as_deref())?
        .unwrap_or(end - period.duration());
    if start > end {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }
    if end - start > Duration::days(MAX_ANALYTICS_DAYS) {
        return Err(vec![FieldError::new(
            "startDate",
            format!("Analytics window must not exceed {MAX_ANALYTICS_DAYS} days"),
        )]
        .into());
    }

    let all_vitals = db::list_vitals(
        &conn,
        &VitalsFilter::default().since(start).until(end),
        None,
    )?;
    let all_alerts = db::list_alerts(&conn, &AlertFilter::default().since(start).until(end), None)?;

    let (vitals, alerts): (Vec<Vitals>, Vec<Alert>) =
        match query.department.as_deref().filter(|d| !d.is_empty()) {
            Some(department) => {
                let members = department_members(&conn, department)?;
                (
                    all_vitals
                        .iter()
                        .filter(|v| members.contains(&v.patient_id))
                        .cloned()
                        .collect(),
                    all_alerts
                        .iter()
                        .filter(|a| members.contains(&a.patient_id))
                        .cloned()
                        .collect(),
                )
            }
            None => (all_vitals.clone(), all_alerts.clone()),
        };

    let roster: Vec<(Uuid, String)> = db::list_active_patients(&conn, None, None, 0)?
        .into_iter()
        .map(|r| (r.patient.id, r.patient.department))
        .collect();

    Ok(Json(WorkforceAnalytics {
        period: Window { start, end },
        trend_data: daily_workforce_trend(&vitals, &alerts, start, end),
        department_breakdown: department_breakdown(&roster, &all_vitals, &all_alerts),
        risk_analysis: risk_factor_analysis(&alerts),
        predicted_absenteeism: predict_absenteeism(&vitals, &alerts),
        roi_analysis: roi_analysis(&alerts, &vitals),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EmployerAlertsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<AlertStatus>,
    pub severity: Option<Severity>,
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub pagination: Pagination,
}

/// `GET /api/employer/alerts`: active alerts unless `status` says otherwise.
pub async fn alerts(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<EmployerAlertsQuery>,
) -> Result<Json<AlertPage>, ApiError> {
    let conn = ctx.core.open_db()?;
    employer_profile(&conn, &caller)?;

    let filter = AlertFilter {
        severities: query.severity.into_iter().collect(),
        alert_type: query.alert_type,
        ..AlertFilter::default().with_status(query.status.unwrap_or(AlertStatus::Active))
    };
    let page = PageQuery::new(query.page, query.limit).page();
    let alerts = db::list_alerts(&conn, &filter, Some(page))?;
    let total = db::count_alerts(&conn, &filter)?;

    Ok(Json(AlertPage {
        alerts,
        pagination: Pagination::new(page, total),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AlertResponseRequest {
    pub action: Option<String>,
    pub notes: Option<String>,
}

/// `PUT /api/employer/alerts/:id/respond`: log an executed notification
/// action; the alert status is unchanged.
pub async fn respond_to_alert(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AlertResponseRequest>,
) -> Result<Json<Alert>, ApiError> {
    let alert_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;

    let action = req
        .action
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "Alert acknowledged by employer".to_string());
    let description = match req.notes.filter(|n| !n.trim().is_empty()) {
        Some(notes) => format!("{action} (notes: {notes})"),
        None => action.clone(),
    };
    let entry = AlertAction::executed(
        AlertActionType::Notification,
        description,
        caller.user_id,
        Utc::now(),
    );
    let alert = db::append_action(&conn, &alert_id, &entry)?;

    ctx.core.publisher().publish(RealtimeEvent::AlertResponse {
        alert_id: alert.id,
        action,
        employer_id: caller.user_id,
    });
    Ok(Json(alert))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeesQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub department: Option<String>,
    pub risk_level: Option<Urgency>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHealth {
    #[serde(flatten)]
    pub record: PatientRecord,
    pub latest_vitals: Option<Vitals>,
    pub active_alerts: Vec<Alert>,
    pub risk_level: Urgency,
}

#[derive(Debug, Serialize)]
pub struct EmployeePage {
    pub employees: Vec<EmployeeHealth>,
    pub pagination: Pagination,
}

/// `GET /api/employer/employees`: risk level is filtered within the page.
pub async fn employees(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<EmployeesQuery>,
) -> Result<Json<EmployeePage>, ApiError> {
    let conn = ctx.core.open_db()?;
    employer_profile(&conn, &caller)?;

    let department = query.department.as_deref().filter(|d| !d.is_empty());
    let page: Page = PageQuery::new(query.page, query.limit).page();
    let records = db::list_active_patients(&conn, department, Some(page.limit), page.offset)?;
    let total = db::count_active_patients(&conn, department)?;

    let mut employees = Vec::with_capacity(records.len());
    for record in records {
        let latest_vitals = db::latest_vitals(&conn, &record.patient.id)?;
        let open = AlertFilter::for_patient(record.patient.id).with_status(AlertStatus::Active);
        let active_alerts = db::list_alerts(&conn, &open, None)?;
        let snapshot = latest_vitals.as_ref().map(Vitals::snapshot);
        let risk_level = employee_risk_level(snapshot.as_ref(), &active_alerts);
        if query.risk_level.is_some_and(|wanted| wanted != risk_level) {
            continue;
        }
        employees.push(EmployeeHealth {
            record,
            latest_vitals,
            active_alerts,
            risk_level,
        });
    }

    Ok(Json(EmployeePage {
        employees,
        pagination: Pagination::new(page, total),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::api::testing::TestApp;
    use crate::db::fixtures::{emergency_alert, reading};
    use crate::db::{insert_alert, insert_vitals};
    use crate::models::{AlertType, Severity};
    use crate::realtime::RealtimeEvent;

    #[tokio::test]
    async fn dashboard_applies_workforce_penalty() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let (a, _) = app.patient("a@plant.io", "EMP-1", "Assembly");
        let (b, _) = app.patient("b@plant.io", "EMP-2", "Welding");
        {
            let conn = app.conn();
            let now = Utc::now();
            insert_vitals(&conn, &reading(a.id, 72, now - Duration::hours(3))).unwrap();
            insert_vitals(&conn, &reading(b.id, 75, now - Duration::hours(2))).unwrap();
            let mut heat = emergency_alert(b.id, Severity::Medium);
            heat.alert_type = AlertType::HeatStress;
            insert_alert(&conn, &heat).unwrap();
        }

        let (status, body) = app.get("/api/employer/dashboard", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let stats = &body["statistics"];
        assert_eq!(stats["totalEmployees"], 2);
        assert_eq!(stats["healthIndex"], 90.0);
        assert_eq!(stats["dailyIncidents"], 1);
        assert_eq!(stats["avgProductivity"], 50.0);
        assert_eq!(
            body["departmentStats"],
            json!([{"department": "Assembly", "count": 1}, {"department": "Welding", "count": 1}])
        );
        assert_eq!(
            body["riskFactors"],
            json!([{"type": "heat_stress", "count": 1}])
        );
        assert!(body["aiRecommendations"].as_array().unwrap().is_empty());
        assert_eq!(body["recentAlerts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn analytics_breakdown_ignores_department_filter() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let (a, _) = app.patient("a@plant.io", "EMP-1", "Assembly");
        let (b, _) = app.patient("b@plant.io", "EMP-2", "Welding");
        {
            let conn = app.conn();
            let now = Utc::now();
            insert_vitals(&conn, &reading(a.id, 72, now - Duration::days(1))).unwrap();
            insert_vitals(&conn, &reading(b.id, 130, now - Duration::days(1))).unwrap();
            insert_alert(&conn, &emergency_alert(b.id, Severity::Critical)).unwrap();
        }

        let uri = "/api/employer/analytics?period=7d&department=Assembly";
        let (status, body) = app.get(uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["departmentBreakdown"].as_array().unwrap().len(), 2);
        assert_eq!(body["departmentBreakdown"][1]["department"], "Welding");
        assert_eq!(body["departmentBreakdown"][1]["totalAlerts"], 1);
        // Assembly alone has no alerts.
        assert_eq!(body["riskAnalysis"]["distribution"], json!([]));
        assert_eq!(body["predictedAbsenteeism"]["next7Days"], 5.0);
        assert_eq!(body["roiAnalysis"]["productivityImprovement"], 50.0);
        let days = body["trendData"].as_array().unwrap();
        assert!(days.len() >= 7);

        let (_, everyone) = app.get("/api/employer/analytics", Some(&token)).await;
        assert_eq!(
            everyone["riskAnalysis"]["topRiskFactor"]["name"],
            "EMERGENCY"
        );
    }

    #[tokio::test]
    async fn analytics_rejects_inverted_window() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let uri = "/api/employer/analytics?startDate=2026-03-10&endDate=2026-03-01";
        let (status, _) = app.get(uri, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analytics_caps_window_length() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let unbounded = "/api/employer/analytics?startDate=0001-01-01&endDate=9999-12-31";
        let (status, body) = app.get(unbounded, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION");
        assert_eq!(body["error"]["fields"][0]["field"], "startDate");

        let one_year = "/api/employer/analytics?startDate=2025-03-01&endDate=2026-03-01";
        let (status, body) = app.get(one_year, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trendData"].as_array().unwrap().len(), 365);
    }

    #[tokio::test]
    async fn alerts_default_to_active() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let (a, _) = app.patient("a@plant.io", "EMP-1", "Assembly");
        let open = emergency_alert(a.id, Severity::High);
        let mut closed = emergency_alert(a.id, Severity::High);
        closed.status = crate::models::AlertStatus::Resolved;
        {
            let conn = app.conn();
            insert_alert(&conn, &open).unwrap();
            insert_alert(&conn, &closed).unwrap();
        }
        let (_, active) = app.get("/api/employer/alerts", Some(&token)).await;
        assert_eq!(active["pagination"]["total"], 1);
        assert_eq!(active["alerts"][0]["id"], open.id.to_string());

        let uri = "/api/employer/alerts?status=resolved&severity=high";
        let (_, resolved) = app.get(uri, Some(&token)).await;
        assert_eq!(resolved["pagination"]["total"], 1);

        let (status, _) = app
            .get("/api/employer/alerts?severity=extreme", Some(&token))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn respond_appends_notification_and_publishes() {
        let app = TestApp::new();
        let (employer, token) = app.employer("hr@vasant.io");
        let (a, _) = app.patient("a@plant.io", "EMP-1", "Assembly");
        let alert = emergency_alert(a.id, Severity::High);
        insert_alert(&app.conn(), &alert).unwrap();

        let uri = format!("/api/employer/alerts/{}/respond", alert.id);
        let (status, body) = app.put(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
        assert_eq!(body["actions"][0]["type"], "notification");
        assert_eq!(
            body["actions"][0]["description"],
            "Alert acknowledged by employer"
        );

        let events = app.publisher.events();
        match events.as_slice() {
            [RealtimeEvent::AlertResponse {
                alert_id,
                action,
                employer_id,
            }] => {
                assert_eq!(*alert_id, alert.id);
                assert_eq!(action, "Alert acknowledged by employer");
                assert_eq!(*employer_id, employer.user_id);
            }
            other => panic!("unexpected events {other:?}"),
        }

        let (_, again) = app
            .put(&uri, Some(&token), json!({"action": "Sent to first aid"}))
            .await;
        assert_eq!(again["actions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn employees_filter_by_risk_level() {
        let app = TestApp::new();
        let (_, token) = app.employer("hr@vasant.io");
        let (calm, _) = app.patient("calm@plant.io", "EMP-1", "Assembly");
        let (sick, _) = app.patient("sick@plant.io", "EMP-2", "Assembly");
        {
            let conn = app.conn();
            let now = Utc::now();
            insert_vitals(&conn, &reading(calm.id, 72, now)).unwrap();
            let mut bad = reading(sick.id, 130, now);
            bad.temperature = 101.5;
            bad.oxygen_saturation = 92;
            insert_vitals(&conn, &bad).unwrap();
        }
        let (_, high) = app
            .get("/api/employer/employees?riskLevel=high", Some(&token))
            .await;
        let listed = high["employees"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["id"], sick.id.to_string());
        assert_eq!(listed[0]["riskLevel"], "high");

        let (_, low) = app
            .get("/api/employer/employees?riskLevel=low", Some(&token))
            .await;
        assert_eq!(low["employees"][0]["id"], calm.id.to_string());
    }
}
