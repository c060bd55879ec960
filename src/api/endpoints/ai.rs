//! Assistant endpoints: keyword-triaged chat, vitals analysis and
//! employer action plans.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::employer::department_members;
use super::{employer_profile, patient_profile};
use crate::api::error::ApiError;
use crate::api::extract::{parse_id, ApiJson, ApiQuery};
use crate::api::types::{ApiContext, AuthUser};
use crate::assistant::{self, build_context, ReplyOrigin};
use crate::db::{self, AlertFilter, ChatScope, Page, VitalsFilter};
use crate::intelligence::analytics::Period;
use crate::intelligence::message_risk::{analyze_message, SuggestedAction};
use crate::intelligence::vitals_analysis::{analyze_vitals, VitalsAnalysis};
use crate::intelligence::workforce::{action_plan, WorkforceRecommendation};
use crate::models::{
    Chat, ChatAction, ChatMessage, ChatPriority, MessageKind, MessageMetadata, Patient, Role,
    Vitals, VitalsSnapshot,
};
use crate::monitoring::escalate_chat_emergency;

const CONTEXT_ALERTS: u32 = 5;
const ANALYSIS_HISTORY: u32 = 10;

/// Patients always act on their own profile. Other roles name the patient.
fn resolve_patient(
    conn: &Connection,
    caller: &AuthUser,
    patient_id: Option<&str>,
) -> Result<Patient, ApiError> {
    if caller.role == Role::Patient {
        let own = patient_profile(conn, caller)?;
        if let Some(raw) = patient_id {
            if parse_id(raw)? != own.id {
                return Err(ApiError::Forbidden("Access denied".into()));
            }
        }
        return Ok(own);
    }
    let raw = patient_id.ok_or_else(|| ApiError::bad_request("patientId is required"))?;
    db::get_patient(conn, &parse_id(raw)?)?
        .ok_or_else(|| ApiError::not_found("Patient not found"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub chat_id: Option<String>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub content: String,
    pub confidence: u32,
    pub risk_score: u32,
    pub recommendations: Vec<String>,
    pub actions: Vec<SuggestedAction>,
    pub origin: ReplyOrigin,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub chat: Chat,
    pub ai_response: AiResponse,
}

fn action_message(action: &SuggestedAction, at: chrono::DateTime<Utc>) -> ChatMessage {
    ChatMessage {
        action: Some(ChatAction {
            kind: action.kind,
            title: action.title.to_string(),
            description: action.description.to_string(),
            executed: false,
            executed_at: None,
        }),
        ..ChatMessage::text(MessageKind::Action, action.title, at)
    }
}

/// `POST /api/ai/chat`
///
/// Appends the user message, the assistant reply and one message per
/// suggested action. A risk score above 80 raises a critical alert and
/// marks the chat urgent.
pub async fn chat(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Message is required"))?;

    let (patient, chat, system) = {
        let mut conn = ctx.core.open_db()?;
        let patient = resolve_patient(&conn, &caller, req.patient_id.as_deref())?;

        let chat = match req.chat_id.as_deref() {
            Some(raw) => {
                let chat = db::get_chat(&conn, &parse_id(raw)?)?
                    .ok_or_else(|| ApiError::not_found("Chat not found"))?;
                if chat.patient_id != patient.id {
                    return Err(ApiError::Forbidden("Access denied".into()));
                }
                chat
            }
            None => {
                let fresh = Chat::open(patient.id, None, Utc::now());
                db::find_or_create_active_chat(&mut conn, ChatScope::Patient(patient.id), fresh)?.0
            }
        };

        let record = db::get_patient_record(&conn, &patient.id)?;
        let latest = db::latest_vitals(&conn, &patient.id)?;
        let recent = db::list_alerts(
            &conn,
            &AlertFilter::for_patient(patient.id),
            Some(Page::first(CONTEXT_ALERTS)),
        )?;
        (
            patient,
            chat,
            build_context(record.as_ref(), latest.as_ref(), &recent),
        )
    };

    let risk = analyze_message(&message);
    let reply = assistant::respond(ctx.core.generator(), &system, &message, risk.risk_score).await;

    let mut conn = ctx.core.open_db()?;
    let now = Utc::now();
    let mut messages = vec![
        ChatMessage::text(MessageKind::User, message.as_str(), now),
        ChatMessage {
            metadata: Some(MessageMetadata {
                confidence: Some(reply.confidence),
                risk_score: Some(risk.risk_score),
                recommendations: risk.recommendations.clone(),
            }),
            ..ChatMessage::text(MessageKind::Ai, reply.content.as_str(), now)
        },
    ];
    messages.extend(risk.actions.iter().map(|a| action_message(a, now)));
    let mut chat = db::append_messages(&mut conn, &chat.id, &messages, &now)?;

    if risk.is_emergency() {
        escalate_chat_emergency(
            &conn,
            ctx.core.publisher(),
            patient.id,
            &reply.content,
            &risk,
            reply.confidence,
        )?;
        db::set_chat_priority(&conn, &chat.id, ChatPriority::Urgent)?;
        chat.priority = ChatPriority::Urgent;
    }

    tracing::debug!(
        chat_id = %chat.id,
        risk_score = risk.risk_score,
        origin = ?reply.origin,
        "assistant replied"
    );

    Ok(Json(ChatReply {
        chat,
        ai_response: AiResponse {
            content: reply.content,
            confidence: reply.confidence,
            risk_score: risk.risk_score,
            recommendations: risk.recommendations,
            actions: risk.actions,
            origin: reply.origin,
        },
    }))
}

/// `GET /api/ai/chat/:id`: patients may only read their own chats.
pub async fn get_chat(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Chat>, ApiError> {
    let chat_id = parse_id(&id)?;
    let conn = ctx.core.open_db()?;
    let chat = db::get_chat(&conn, &chat_id)?.ok_or_else(|| ApiError::not_found("Chat not found"))?;
    if caller.role == Role::Patient && patient_profile(&conn, &caller)?.id != chat.patient_id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }
    Ok(Json(chat))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzeVitalsRequest {
    pub vitals_data: Option<VitalsSnapshot>,
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analysis: VitalsAnalysis,
}

/// `POST /api/ai/analyze-vitals`: compares against the last ten readings.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<AnalyzeVitalsRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let vitals = req
        .vitals_data
        .ok_or_else(|| ApiError::bad_request("Vitals data is required"))?;
    let conn = ctx.core.open_db()?;
    let patient = resolve_patient(&conn, &caller, req.patient_id.as_deref())?;
    let history = db::recent_vitals(&conn, &patient.id, ANALYSIS_HISTORY)?;
    Ok(Json(AnalysisResponse {
        analysis: analyze_vitals(&vitals, &history),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub period: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<WorkforceRecommendation>,
}

/// `POST /api/ai/generate-recommendations`: employers only. The
/// department narrows the readings; alerts cover the whole workforce.
pub async fn generate_recommendations(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<RecommendationsQuery>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    if caller.role != Role::Employer {
        return Err(ApiError::Forbidden("Access denied".into()));
    }
    let conn = ctx.core.open_db()?;
    employer_profile(&conn, &caller)?;

    let period = Period::parse(query.period.as_deref());
    let end = Utc::now();
    let start = end - period.duration();

    let mut vitals_filter = VitalsFilter::default().since(start).until(end);
    if let Some(department) = query.department.as_deref().filter(|d| !d.is_empty()) {
        vitals_filter.patient_ids = Some(department_members(&conn, department)?);
    }
    let vitals: Vec<Vitals> = db::list_vitals(&conn, &vitals_filter, None)?;
    let alerts = db::list_alerts(&conn, &AlertFilter::default().since(start).until(end), None)?;

    Ok(Json(RecommendationsResponse {
        recommendations: action_plan(&vitals, &alerts, period),
    }))
}
