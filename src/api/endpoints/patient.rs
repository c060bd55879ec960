//! Patient self-service endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{parse_optional_date, patient_profile};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, ApiJson, ApiQuery};
use crate::api::types::{ApiContext, AuthUser, PageQuery, Pagination};
use crate::db::{self, AlertFilter, Page, VitalsFilter};
use crate::intelligence::health_index::{health_index, AlertPenalty};
use crate::models::{
    Alert, AlertStatus, AlertType, Chat, ChatMessage, ChatStatus, MessageKind, Patient, Vitals,
    VitalsInput, VitalsSource,
};
use crate::monitoring;

const RECENT_ALERTS: u32 = 5;
const HISTORY_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub vitals_in_window: usize,
    pub active_alerts: u64,
    pub health_index: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDashboard {
    pub patient: Patient,
    pub latest_vitals: Option<Vitals>,
    pub recent_alerts: Vec<Alert>,
    pub active_chats: Vec<Chat>,
    pub vitals_history: Vec<Vitals>,
    pub stats: PatientStats,
}

/// `GET /api/patient/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<PatientDashboard>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let latest_vitals = db::latest_vitals(&conn, &patient.id)?;
    let recent_alerts = db::list_alerts(
        &conn,
        &AlertFilter::for_patient(patient.id),
        Some(Page::first(RECENT_ALERTS)),
    )?;
    let active_chats = db::list_patient_chats(&conn, &patient.id, Some(ChatStatus::Active))?;
    let since = Utc::now() - Duration::days(HISTORY_DAYS);
    let history_filter = VitalsFilter::for_patient(patient.id).since(since);
    let vitals_history = db::list_vitals(&conn, &history_filter, None)?;

    let active = AlertFilter::for_patient(patient.id).with_status(AlertStatus::Active);
    let active_alerts = db::count_alerts(&conn, &active)?;
    let index = health_index(
        vitals_history.iter().map(Vitals::snapshot),
        active_alerts as usize,
        AlertPenalty::Standard,
    );

    Ok(Json(PatientDashboard {
        stats: PatientStats {
            vitals_in_window: vitals_history.len(),
            active_alerts,
            health_index: index,
        },
        patient,
        latest_vitals,
        recent_alerts,
        active_chats,
        vitals_history,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedVitalsResponse {
    pub vitals: Vitals,
    pub is_emergency: bool,
}

/// `POST /api/patient/vitals`: store a self-reported reading.
pub async fn record_vitals(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(input): ApiJson<VitalsInput>,
) -> Result<(StatusCode, Json<RecordedVitalsResponse>), ApiError> {
    input.validate()?;
    let mut conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let vitals = input.into_vitals(patient.id, VitalsSource::Patient, Utc::now());
    let recorded = monitoring::record_vitals(&mut conn, ctx.core.publisher(), vitals)?;

    Ok((
        StatusCode::CREATED,
        Json(RecordedVitalsResponse {
            is_emergency: recorded.is_emergency(),
            vitals: recorded.vitals,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VitalsHistory {
    pub vitals: Vec<Vitals>,
    pub pagination: Pagination,
}

/// `GET /api/patient/vitals/history`
pub async fn vitals_history(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<VitalsHistory>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let filter = VitalsFilter {
        from: parse_optional_date("startDate", query.start_date.as_deref())?,
        to: parse_optional_date("endDate", query.end_date.as_deref())?,
        ..VitalsFilter::for_patient(patient.id)
    };
    let page = PageQuery::new(query.page, query.limit).page();
    let vitals = db::list_vitals(&conn, &filter, Some(page))?;
    let total = db::count_vitals(&conn, &filter)?;

    Ok(Json(VitalsHistory {
        vitals,
        pagination: Pagination::new(page, total),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<AlertStatus>,
    #[serde(rename = "type")]
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, Serialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub pagination: Pagination,
}

/// `GET /api/patient/alerts`
pub async fn alerts(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<AlertsQuery>,
) -> Result<Json<AlertPage>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let filter = AlertFilter {
        statuses: query.status.into_iter().collect(),
        alert_type: query.alert_type,
        ..AlertFilter::for_patient(patient.id)
    };
    let page = PageQuery::new(query.page, query.limit).page();
    let alerts = db::list_alerts(&conn, &filter, Some(page))?;
    let total = db::count_alerts(&conn, &filter)?;

    Ok(Json(AlertPage {
        alerts,
        pagination: Pagination::new(page, total),
    }))
}

/// `PUT /api/patient/alerts/:id/acknowledge`: only the patient's own alerts.
pub async fn acknowledge_alert(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    let alert_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let alert = db::acknowledge_alert(&conn, &alert_id, &patient.id, &caller.user_id, &Utc::now())?;
    Ok(Json(alert))
}

#[derive(Debug, Serialize)]
pub struct ChatList {
    pub chats: Vec<Chat>,
}

/// `GET /api/patient/chats`: every chat, most recently updated first.
pub async fn chats(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ChatList>, ApiError> {
    let conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;
    let chats = db::list_patient_chats(&conn, &patient.id, None)?;
    Ok(Json(ChatList { chats }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatRequest {
    pub initial_message: String,
}

/// `POST /api/patient/chats`: start a chat with the first user message.
pub async fn start_chat(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<NewChatRequest>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    if req.initial_message.trim().is_empty() {
        return Err(ApiError::bad_request("Initial message is required"));
    }
    let mut conn = ctx.core.open_db()?;
    let patient = patient_profile(&conn, &caller)?;

    let now = Utc::now();
    let mut chat = Chat::open(patient.id, None, now);
    chat.messages
        .push(ChatMessage::text(MessageKind::User, req.initial_message, now));
    db::insert_chat(&mut conn, &chat)?;

    Ok((StatusCode::CREATED, Json(chat)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::api::testing::TestApp;
    use crate::db::fixtures::{emergency_alert, reading};
    use crate::db::{get_alert, insert_alert, insert_vitals};
    use crate::models::{AlertStatus, Severity};

    fn normal_vitals(heart_rate: u32) -> serde_json::Value {
        json!({
            "heartRate": heart_rate,
            "bloodPressure": {"systolic": 120, "diastolic": 80},
            "temperature": 98.6,
            "oxygenSaturation": 98,
            "respiratoryRate": 16
        })
    }

    #[tokio::test]
    async fn normal_reading_is_not_an_emergency() {
        let app = TestApp::new();
        let (_, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let (status, body) = app
            .post("/api/patient/vitals", Some(&token), normal_vitals(80))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isEmergency"], false);
        assert_eq!(body["vitals"]["recordedBy"], "patient");
        assert!(app.publisher.names().is_empty());
    }

    #[tokio::test]
    async fn fast_heart_rate_raises_alert_and_event() {
        let app = TestApp::new();
        let (patient, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let (status, body) = app
            .post("/api/patient/vitals", Some(&token), normal_vitals(121))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["isEmergency"], true);
        assert_eq!(app.publisher.names(), vec!["emergency-alert"]);

        let (_, alerts) = app
            .get("/api/patient/alerts?status=active", Some(&token))
            .await;
        assert_eq!(alerts["pagination"]["total"], 1);
        let alert = &alerts["alerts"][0];
        assert_eq!(alert["type"], "emergency");
        assert_eq!(alert["severity"], "critical");
        assert_eq!(alert["patientId"], patient.id.to_string());
        assert_eq!(alert["vitalsData"]["heartRate"], 121);
    }

    #[tokio::test]
    async fn out_of_range_reading_is_rejected() {
        let app = TestApp::new();
        let (_, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let mut body = normal_vitals(80);
        body["heartRate"] = json!(260);
        body["oxygenSaturation"] = json!(60);
        let (status, err) = app.post("/api/patient/vitals", Some(&token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"]["code"], "VALIDATION");
        assert_eq!(err["error"]["fields"].as_array().unwrap().len(), 2);

        let (_, history) = app.get("/api/patient/vitals/history", Some(&token)).await;
        assert_eq!(history["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn other_roles_are_forbidden() {
        let app = TestApp::new();
        let (_, token) = app.doctor("d@clinic.io", "LIC-1");
        let (status, body) = app.get("/api/patient/dashboard", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");
        let (status, _) = app.get("/api/patient/dashboard", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dashboard_is_stable_without_writes() {
        let app = TestApp::new();
        let (patient, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        {
            let conn = app.conn();
            let now = Utc::now();
            insert_vitals(&conn, &reading(patient.id, 70, now - Duration::hours(2))).unwrap();
            insert_vitals(&conn, &reading(patient.id, 110, now - Duration::hours(1))).unwrap();
            insert_vitals(&conn, &reading(patient.id, 72, now - Duration::days(9))).unwrap();
            insert_alert(&conn, &emergency_alert(patient.id, Severity::High)).unwrap();
        }

        let (status, first) = app.get("/api/patient/dashboard", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, second) = app.get("/api/patient/dashboard", Some(&token)).await;
        assert_eq!(first["stats"], second["stats"]);

        assert_eq!(first["stats"]["vitalsInWindow"], 2);
        assert_eq!(first["stats"]["activeAlerts"], 1);
        // (100 + 80) / 2 - 5
        assert_eq!(first["stats"]["healthIndex"], 85.0);
        assert_eq!(first["latestVitals"]["heartRate"], 110);
        assert_eq!(first["recentAlerts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_paginates_and_filters_by_date() {
        let app = TestApp::new();
        let (patient, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        {
            let conn = app.conn();
            let base = Utc::now() - Duration::days(10);
            for day in 0..5 {
                let taken_at = base + Duration::days(day as i64);
                insert_vitals(&conn, &reading(patient.id, 70 + day, taken_at)).unwrap();
            }
        }
        let (_, page) = app
            .get("/api/patient/vitals/history?page=2&limit=2", Some(&token))
            .await;
        assert_eq!(
            page["pagination"],
            json!({"current": 2, "pages": 3, "total": 5})
        );
        assert_eq!(page["vitals"][0]["heartRate"], 72);

        let start = (Utc::now() - Duration::days(8) - Duration::hours(12)).to_rfc3339();
        let uri = format!(
            "/api/patient/vitals/history?startDate={}",
            start.replace('+', "%2B")
        );
        let (status, filtered) = app.get(&uri, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filtered["pagination"]["total"], 3);
    }

    #[tokio::test]
    async fn acknowledge_is_repeatable_and_owner_only() {
        let app = TestApp::new();
        let (patient, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let (other, _) = app.patient("q@plant.io", "EMP-2", "Assembly");
        let mine = emergency_alert(patient.id, Severity::Critical);
        let theirs = emergency_alert(other.id, Severity::Critical);
        {
            let conn = app.conn();
            insert_alert(&conn, &mine).unwrap();
            insert_alert(&conn, &theirs).unwrap();
        }

        let uri = format!("/api/patient/alerts/{}/acknowledge", mine.id);
        let (first, body) = app.put(&uri, Some(&token), json!({})).await;
        let (second, _) = app.put(&uri, Some(&token), json!({})).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(body["status"], "acknowledged");
        assert!(body["actions"].as_array().unwrap().is_empty());

        let uri = format!("/api/patient/alerts/{}/acknowledge", theirs.id);
        let (status, _) = app.put(&uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let uri = "/api/patient/alerts/nope/acknowledge";
        let (status, _) = app.put(uri, Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn concurrent_acknowledgements_both_succeed() {
        let app = TestApp::new();
        let (patient, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let alert = emergency_alert(patient.id, Severity::High);
        insert_alert(&app.conn(), &alert).unwrap();

        let uri = format!("/api/patient/alerts/{}/acknowledge", alert.id);
        let ((first, _), (second, _)) = tokio::join!(
            app.put(&uri, Some(&token), json!({})),
            app.put(&uri, Some(&token), json!({})),
        );
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);

        let stored = get_alert(&app.conn(), &alert.id).unwrap().unwrap();
        assert_eq!(stored.status, AlertStatus::Acknowledged);
        assert_eq!(stored.acknowledged_by, Some(patient.user_id));
        assert!(stored.actions.is_empty());
    }

    #[tokio::test]
    async fn chats_start_and_list() {
        let app = TestApp::new();
        let (_, token) = app.patient("p@plant.io", "EMP-1", "Assembly");
        let opening = json!({"initialMessage": "Feeling tired today"});
        let (status, chat) = app.post("/api/patient/chats", Some(&token), opening).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(chat["status"], "active");
        assert_eq!(chat["priority"], "medium");
        assert_eq!(chat["messages"][0]["type"], "user");

        let (_, list) = app.get("/api/patient/chats", Some(&token)).await;
        assert_eq!(list["chats"].as_array().unwrap().len(), 1);
    }
}
