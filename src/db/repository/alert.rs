use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::filter::{Page, SqlFilter};
use crate::db::{
    col_enum, col_json, col_opt_json, col_opt_time, col_opt_uuid, col_time, col_uuid, opt_json,
    opt_ts, to_json, ts, DatabaseError,
};
use crate::models::{Alert, AlertAction, AlertStatus, AlertType, NotificationRecord, Severity};

const ALERT_COLUMNS: &str = "id, patient_id, doctor_id, employer_id, alert_type, severity, title,
     description, vitals_data, environmental_data, symptoms, ai_analysis, status,
     acknowledged_by, acknowledged_at, resolved_by, resolved_at, actions, notifications,
     created_at, updated_at";

/// Selection over alerts. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub patient_id: Option<Uuid>,
    pub patient_ids: Option<Vec<Uuid>>,
    pub statuses: Vec<AlertStatus>,
    pub severities: Vec<Severity>,
    pub alert_type: Option<AlertType>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl AlertFilter {
    pub fn active() -> Self {
        Self {
            statuses: vec![AlertStatus::Active],
            ..Default::default()
        }
    }

    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: AlertStatus) -> Self {
        self.statuses = vec![status];
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.created_to = Some(to);
        self
    }

    fn to_sql(&self) -> SqlFilter {
        let mut filter = SqlFilter::new();
        if let Some(id) = &self.patient_id {
            filter.eq("patient_id", id.to_string());
        }
        if let Some(ids) = &self.patient_ids {
            filter.any_of("patient_id", ids.iter().map(Uuid::to_string).collect());
        }
        if !self.statuses.is_empty() {
            filter.any_of(
                "status",
                self.statuses
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            );
        }
        if !self.severities.is_empty() {
            filter.any_of(
                "severity",
                self.severities
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            );
        }
        if let Some(alert_type) = &self.alert_type {
            filter.eq("alert_type", alert_type.as_str());
        }
        if let Some(from) = &self.created_from {
            filter.cmp("created_at", ">=", ts(from));
        }
        if let Some(to) = &self.created_to {
            filter.cmp("created_at", "<=", ts(to));
        }
        filter
    }
}

pub fn insert_alert(conn: &Connection, alert: &Alert) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO alerts (id, patient_id, doctor_id, employer_id, alert_type, severity, title,
                             description, vitals_data, environmental_data, symptoms, ai_analysis,
                             status, acknowledged_by, acknowledged_at, resolved_by, resolved_at,
                             actions, notifications, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
        params![
            alert.id.to_string(),
            alert.patient_id.to_string(),
            alert.doctor_id.map(|id| id.to_string()),
            alert.employer_id.map(|id| id.to_string()),
            alert.alert_type.as_str(),
            alert.severity.as_str(),
            alert.title,
            alert.description,
            opt_json(&alert.vitals_data)?,
            opt_json(&alert.environmental_data)?,
            to_json(&alert.symptoms)?,
            opt_json(&alert.ai_analysis)?,
            alert.status.as_str(),
            alert.acknowledged_by.map(|id| id.to_string()),
            opt_ts(&alert.acknowledged_at),
            alert.resolved_by.map(|id| id.to_string()),
            opt_ts(&alert.resolved_at),
            to_json(&alert.actions)?,
            to_json(&alert.notifications)?,
            ts(&alert.created_at),
            ts(&alert.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_alert(conn: &Connection, id: &Uuid) -> Result<Option<Alert>, DatabaseError> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_alert)
        .optional()
        .map_err(DatabaseError::from)
}

fn require_alert(conn: &Connection, id: &Uuid) -> Result<Alert, DatabaseError> {
    get_alert(conn, id)?.ok_or_else(|| DatabaseError::not_found("alert", id))
}

pub fn list_alerts(
    conn: &Connection,
    filter: &AlertFilter,
    page: Option<Page>,
) -> Result<Vec<Alert>, DatabaseError> {
    let where_clause = filter.to_sql();
    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM alerts{} ORDER BY created_at DESC, id ASC{}",
        where_clause.where_sql(),
        Page::sql(page),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(where_clause.params(), row_to_alert)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_alerts(conn: &Connection, filter: &AlertFilter) -> Result<u64, DatabaseError> {
    let where_clause = filter.to_sql();
    let sql = format!("SELECT COUNT(*) FROM alerts{}", where_clause.where_sql());
    let count: i64 = conn.query_row(&sql, where_clause.params(), |row| row.get(0))?;
    Ok(count as u64)
}

/// `status IN (...)` literal for the states that may move to `next`.
fn source_states(next: AlertStatus) -> String {
    AlertStatus::sources_of(next)
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a conditional status update matched no row.
fn failed_transition(
    conn: &Connection,
    id: &Uuid,
    patient_scope: Option<&Uuid>,
    next: AlertStatus,
) -> DatabaseError {
    match get_alert(conn, id) {
        Ok(Some(alert)) if patient_scope.map_or(true, |p| *p == alert.patient_id) => {
            DatabaseError::InvalidTransition {
                entity_type: "alert".into(),
                id: id.to_string(),
                from: alert.status.as_str().into(),
                to: next.as_str().into(),
            }
        }
        Ok(_) => DatabaseError::not_found("alert", id),
        Err(e) => e,
    }
}

/// Acknowledge an alert owned by `patient_id`. Repeating the call keeps the
/// alert acknowledged and moves the acknowledgement timestamp forward.
pub fn acknowledge_alert(
    conn: &Connection,
    id: &Uuid,
    patient_id: &Uuid,
    by: &Uuid,
    at: &DateTime<Utc>,
) -> Result<Alert, DatabaseError> {
    let sql = format!(
        "UPDATE alerts SET status = 'acknowledged', acknowledged_by = ?1, acknowledged_at = ?2,
                updated_at = ?2
         WHERE id = ?3 AND patient_id = ?4 AND status IN ({})",
        source_states(AlertStatus::Acknowledged)
    );
    let affected = conn.execute(
        &sql,
        params![
            by.to_string(),
            ts(at),
            id.to_string(),
            patient_id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(failed_transition(conn, id, Some(patient_id), AlertStatus::Acknowledged));
    }
    require_alert(conn, id)
}

/// Resolve an alert and record the resolving action in the same statement.
pub fn resolve_alert(
    conn: &Connection,
    id: &Uuid,
    by: &Uuid,
    action: &AlertAction,
    at: &DateTime<Utc>,
) -> Result<Alert, DatabaseError> {
    let sql = format!(
        "UPDATE alerts SET status = 'resolved', resolved_by = ?1, resolved_at = ?2,
                actions = json_insert(actions, '$[#]', json(?3)), updated_at = ?2
         WHERE id = ?4 AND status IN ({})",
        source_states(AlertStatus::Resolved)
    );
    let affected = conn.execute(
        &sql,
        params![by.to_string(), ts(at), to_json(action)?, id.to_string()],
    )?;
    if affected == 0 {
        return Err(failed_transition(conn, id, None, AlertStatus::Resolved));
    }
    require_alert(conn, id)
}

pub fn dismiss_alert(
    conn: &Connection,
    id: &Uuid,
    by: &Uuid,
    at: &DateTime<Utc>,
) -> Result<Alert, DatabaseError> {
    let sql = format!(
        "UPDATE alerts SET status = 'dismissed', resolved_by = ?1, resolved_at = ?2, updated_at = ?2
         WHERE id = ?3 AND status IN ({})",
        source_states(AlertStatus::Dismissed)
    );
    let affected = conn.execute(&sql, params![by.to_string(), ts(at), id.to_string()])?;
    if affected == 0 {
        return Err(failed_transition(conn, id, None, AlertStatus::Dismissed));
    }
    require_alert(conn, id)
}

/// Append to the action log without touching status.
pub fn append_action(
    conn: &Connection,
    id: &Uuid,
    action: &AlertAction,
) -> Result<Alert, DatabaseError> {
    let affected = conn.execute(
        "UPDATE alerts SET actions = json_insert(actions, '$[#]', json(?1)), updated_at = ?2
         WHERE id = ?3",
        params![to_json(action)?, ts(&Utc::now()), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("alert", id));
    }
    require_alert(conn, id)
}

pub fn append_notification(
    conn: &Connection,
    id: &Uuid,
    record: &NotificationRecord,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE alerts SET notifications = json_insert(notifications, '$[#]', json(?1)),
                updated_at = ?2
         WHERE id = ?3",
        params![to_json(record)?, ts(&Utc::now()), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("alert", id));
    }
    Ok(())
}

fn row_to_alert(row: &rusqlite::Row) -> Result<Alert, rusqlite::Error> {
    Ok(Alert {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        doctor_id: col_opt_uuid(row, 2)?,
        employer_id: col_opt_uuid(row, 3)?,
        alert_type: col_enum(row, 4)?,
        severity: col_enum(row, 5)?,
        title: row.get(6)?,
        description: row.get(7)?,
        vitals_data: col_opt_json(row, 8)?,
        environmental_data: col_opt_json(row, 9)?,
        symptoms: col_json(row, 10)?,
        ai_analysis: col_opt_json(row, 11)?,
        status: col_enum(row, 12)?,
        acknowledged_by: col_opt_uuid(row, 13)?,
        acknowledged_at: col_opt_time(row, 14)?,
        resolved_by: col_opt_uuid(row, 15)?,
        resolved_at: col_opt_time(row, 16)?,
        actions: col_json(row, 17)?,
        notifications: col_json(row, 18)?,
        created_at: col_time(row, 19)?,
        updated_at: col_time(row, 20)?,
    })
}
