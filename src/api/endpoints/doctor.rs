//! Doctor endpoints: triage views, alert decisions and consultations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::{doctor_profile, parse_date};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, ApiJson, ApiQuery};
use crate::api::types::{ApiContext, AuthUser, PageQuery, Pagination};
use crate::db::{self, AlertFilter, ChatScope, Page};
use crate::intelligence::vitals_analysis::{patient_summary, PatientSummary};
use crate::intelligence::workforce::patient_urgency;
use crate::models::{
    Alert, AlertAction, AlertActionType, AlertStatus, Chat, ChatPriority, ChatStatus,
    DayAvailability, Doctor, PatientRecord, Severity, Urgency, Vitals,
};
use crate::realtime::RealtimeEvent;

const URGENT_ALERTS: u32 = 10;
const DETAIL_VITALS: u32 = 50;
const DETAIL_ALERTS: u32 = 20;

fn urgent_filter() -> AlertFilter {
    AlertFilter {
        severities: vec![Severity::High, Severity::Critical],
        ..AlertFilter::active()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatistics {
    pub total_patients: u64,
    pub active_alerts: u64,
    pub urgent_cases: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDashboard {
    pub doctor: Doctor,
    pub patients: Vec<PatientRecord>,
    pub urgent_alerts: Vec<Alert>,
    pub todays_consultations: Vec<Chat>,
    pub statistics: DoctorStatistics,
}

/// `GET /api/doctor/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<DoctorDashboard>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = doctor_profile(&conn, &caller)?;

    let patients = db::list_active_patients(&conn, None, None, 0)?;
    let urgent_alerts = db::list_alerts(&conn, &urgent_filter(), Some(Page::first(URGENT_ALERTS)))?;

    let today = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
    let todays_consultations = db::list_doctor_chats_between(
        &conn,
        &doctor.id,
        &today,
        &(today + Duration::days(1)),
        Some(ChatStatus::Active),
    )?;

    let statistics = DoctorStatistics {
        total_patients: db::count_active_patients(&conn, None)?,
        active_alerts: db::count_alerts(&conn, &AlertFilter::active())?,
        urgent_cases: db::count_alerts(&conn, &urgent_filter())?,
    };

    Ok(Json(DoctorDashboard {
        doctor,
        patients,
        urgent_alerts,
        todays_consultations,
        statistics,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PatientsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub department: Option<String>,
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriagedPatient {
    #[serde(flatten)]
    pub record: PatientRecord,
    pub latest_vitals: Option<Vitals>,
    pub active_alerts: Vec<Alert>,
    pub urgency: Urgency,
}

#[derive(Debug, Serialize)]
pub struct PatientPage {
    pub patients: Vec<TriagedPatient>,
    pub pagination: Pagination,
}

/// `GET /api/doctor/patients`: the urgency filter applies within the page,
/// so the pagination counts every active patient of the department.
pub async fn patients(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PatientsQuery>,
) -> Result<Json<PatientPage>, ApiError> {
    let conn = ctx.core.open_db()?;
    doctor_profile(&conn, &caller)?;

    let department = query.department.as_deref().filter(|d| !d.is_empty());
    let page = PageQuery::new(query.page, query.limit).page();
    let records = db::list_active_patients(&conn, department, Some(page.limit), page.offset)?;
    let total = db::count_active_patients(&conn, department)?;

    let mut patients = Vec::with_capacity(records.len());
    for record in records {
        let latest_vitals = db::latest_vitals(&conn, &record.patient.id)?;
        let open = AlertFilter::for_patient(record.patient.id).with_status(AlertStatus::Active);
        let active_alerts = db::list_alerts(&conn, &open, None)?;
        let urgency = patient_urgency(latest_vitals.as_ref(), &active_alerts);
        if query.urgency.is_some_and(|wanted| wanted != urgency) {
            continue;
        }
        patients.push(TriagedPatient {
            record,
            latest_vitals,
            active_alerts,
            urgency,
        });
    }

    Ok(Json(PatientPage {
        patients,
        pagination: Pagination::new(page, total),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetail {
    pub patient: PatientRecord,
    pub latest_vitals: Option<Vitals>,
    pub vitals_history: Vec<Vitals>,
    pub alerts_history: Vec<Alert>,
    pub chat_history: Vec<Chat>,
    pub ai_summary: PatientSummary,
}

/// `GET /api/doctor/patients/:id`
pub async fn patient_detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    let patient_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    doctor_profile(&conn, &caller)?;

    let patient = db::get_patient_record(&conn, &patient_id)?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    let vitals_history = db::recent_vitals(&conn, &patient_id, DETAIL_VITALS)?;
    let alerts_history = db::list_alerts(
        &conn,
        &AlertFilter::for_patient(patient_id),
        Some(Page::first(DETAIL_ALERTS)),
    )?;
    let chat_history = db::list_patient_chats(&conn, &patient_id, None)?;
    let latest_vitals = vitals_history.first().cloned();
    let ai_summary = patient_summary(latest_vitals.as_ref(), &alerts_history, Utc::now());

    Ok(Json(PatientDetail {
        patient,
        latest_vitals,
        vitals_history,
        alerts_history,
        chat_history,
        ai_summary,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalRequest {
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
}

/// `PUT /api/doctor/alerts/:id/approve`: resolve with a consultation action.
pub async fn approve_alert(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ApprovalRequest>,
) -> Result<Json<Alert>, ApiError> {
    let alert_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;

    let plan = req
        .treatment_plan
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "Treatment approved by doctor".to_string());
    let description = match req.notes.filter(|n| !n.trim().is_empty()) {
        Some(notes) => format!("{plan} (notes: {notes})"),
        None => plan,
    };
    let now = Utc::now();
    let action = AlertAction::executed(
        AlertActionType::Consultation,
        description,
        caller.user_id,
        now,
    );
    let alert = db::resolve_alert(&conn, &alert_id, &caller.user_id, &action, &now)?;

    ctx.core.publisher().publish(RealtimeEvent::AlertUpdated {
        alert_id: alert.id,
        status: alert.status,
        patient_id: alert.patient_id,
    });
    tracing::info!(alert_id = %alert.id, doctor = %caller.user_id, "alert resolved");
    Ok(Json(alert))
}

/// `PUT /api/doctor/alerts/:id/dismiss`
pub async fn dismiss_alert(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let alert_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let alert = db::dismiss_alert(&conn, &alert_id, &caller.user_id, &Utc::now())?;

    ctx.core.publisher().publish(RealtimeEvent::AlertUpdated {
        alert_id: alert.id,
        status: alert.status,
        patient_id: alert.patient_id,
    });
    Ok(Json(alert))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequest {
    pub patient_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub priority: Option<ChatPriority>,
}

#[derive(Debug, Serialize)]
pub struct Consultation {
    pub consultation: Chat,
    pub created: bool,
}

/// `POST /api/doctor/consultations`: reuse the active chat with this
/// patient or open one. 201 either way.
pub async fn start_consultation(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ConsultationRequest>,
) -> Result<(StatusCode, Json<Consultation>), ApiError> {
    let patient_id = parse_id(&req.patient_id)?;
    let mut conn = ctx.core.open_db()?;
    let doctor = doctor_profile(&conn, &caller)?;
    let patient = db::get_patient(&conn, &patient_id)?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;

    let mut fresh = Chat::open(patient.id, Some(doctor.id), Utc::now());
    fresh.priority = req.priority.unwrap_or(ChatPriority::Medium);
    if !req.kind.trim().is_empty() {
        fresh.tags.push(req.kind.trim().to_string());
    }
    let scope = ChatScope::Consultation {
        patient_id: patient.id,
        doctor_id: doctor.id,
    };
    let (consultation, created) = db::find_or_create_active_chat(&mut conn, scope, fresh)?;

    Ok((
        StatusCode::CREATED,
        Json(Consultation {
            consultation,
            created,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Schedule {
    pub date: chrono::NaiveDate,
    pub doctor: Doctor,
    pub consultations: Vec<Chat>,
    pub availability: DayAvailability,
}

/// `GET /api/doctor/schedule?date=`: consultations opened on that day.
pub async fn schedule(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ScheduleQuery>,
) -> Result<Json<Schedule>, ApiError> {
    let conn = ctx.core.open_db()?;
    let doctor = doctor_profile(&conn, &caller)?;

    let target = match query.date.as_deref() {
        Some(raw) => parse_date("date", raw)?,
        None => Utc::now(),
    };
    let day = target.date_naive();
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1);
    let consultations = db::list_doctor_chats_between(&conn, &doctor.id, &start, &end, None)?;
    let availability = doctor.availability.on(day.weekday()).clone();

    Ok(Json(Schedule {
        date: day,
        doctor,
        consultations,
        availability,
    }))
}
