use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::filter::{Page, SqlFilter};
use crate::db::{
    col_enum, col_json, col_opt_json, col_time, col_uuid, opt_json, to_json, ts, DatabaseError,
};
use crate::models::{BloodPressure, Vitals};

const VITALS_COLUMNS: &str = "id, patient_id, timestamp, heart_rate, systolic, diastolic,
     temperature, oxygen_saturation, respiratory_rate, blood_glucose, weight, height, bmi,
     environmental_data, symptoms, notes, recorded_by, is_emergency, created_at, updated_at";

/// Selection over stored readings. Results are newest first.
#[derive(Debug, Clone, Default)]
pub struct VitalsFilter {
    pub patient_id: Option<Uuid>,
    pub patient_ids: Option<Vec<Uuid>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub emergency_only: bool,
}

impl VitalsFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Default::default()
        }
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
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
        if let Some(from) = &self.from {
            filter.cmp("timestamp", ">=", ts(from));
        }
        if let Some(to) = &self.to {
            filter.cmp("timestamp", "<=", ts(to));
        }
        if self.emergency_only {
            filter.raw("is_emergency = 1");
        }
        filter
    }
}

pub fn insert_vitals(conn: &Connection, vitals: &Vitals) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vitals (id, patient_id, timestamp, heart_rate, systolic, diastolic,
                             temperature, oxygen_saturation, respiratory_rate, blood_glucose,
                             weight, height, bmi, environmental_data, symptoms, notes,
                             recorded_by, is_emergency, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
        params![
            vitals.id.to_string(),
            vitals.patient_id.to_string(),
            ts(&vitals.timestamp),
            vitals.heart_rate,
            vitals.blood_pressure.systolic,
            vitals.blood_pressure.diastolic,
            vitals.temperature,
            vitals.oxygen_saturation,
            vitals.respiratory_rate,
            vitals.blood_glucose,
            vitals.weight,
            vitals.height,
            vitals.bmi,
            opt_json(&vitals.environmental_data)?,
            to_json(&vitals.symptoms)?,
            vitals.notes,
            vitals.recorded_by.as_str(),
            vitals.is_emergency,
            ts(&vitals.created_at),
            ts(&vitals.updated_at),
        ],
    )?;
    Ok(())
}

/// Set the emergency flag on a stored reading.
pub fn mark_emergency(
    conn: &Connection,
    id: &Uuid,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE vitals SET is_emergency = 1, updated_at = ?1 WHERE id = ?2",
        params![ts(at), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("vitals", id));
    }
    Ok(())
}

pub fn get_vitals(conn: &Connection, id: &Uuid) -> Result<Option<Vitals>, DatabaseError> {
    let sql = format!("SELECT {VITALS_COLUMNS} FROM vitals WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_vitals)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn latest_vitals(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<Vitals>, DatabaseError> {
    Ok(recent_vitals(conn, patient_id, 1)?.into_iter().next())
}

/// The `limit` most recent readings for one patient, newest first.
pub fn recent_vitals(
    conn: &Connection,
    patient_id: &Uuid,
    limit: u32,
) -> Result<Vec<Vitals>, DatabaseError> {
    let filter = VitalsFilter::for_patient(*patient_id);
    list_vitals(conn, &filter, Some(Page::first(limit)))
}

pub fn list_vitals(
    conn: &Connection,
    filter: &VitalsFilter,
    page: Option<Page>,
) -> Result<Vec<Vitals>, DatabaseError> {
    let where_clause = filter.to_sql();
    let sql = format!(
        "SELECT {VITALS_COLUMNS} FROM vitals{} ORDER BY timestamp DESC, id ASC{}",
        where_clause.where_sql(),
        Page::sql(page),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(where_clause.params(), row_to_vitals)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_vitals(conn: &Connection, filter: &VitalsFilter) -> Result<u64, DatabaseError> {
    let where_clause = filter.to_sql();
    let sql = format!("SELECT COUNT(*) FROM vitals{}", where_clause.where_sql());
    let count: i64 = conn.query_row(&sql, where_clause.params(), |row| row.get(0))?;
    Ok(count as u64)
}

fn row_to_vitals(row: &rusqlite::Row) -> Result<Vitals, rusqlite::Error> {
    Ok(Vitals {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        timestamp: col_time(row, 2)?,
        heart_rate: row.get(3)?,
        blood_pressure: BloodPressure {
            systolic: row.get(4)?,
            diastolic: row.get(5)?,
        },
        temperature: row.get(6)?,
        oxygen_saturation: row.get(7)?,
        respiratory_rate: row.get(8)?,
        blood_glucose: row.get(9)?,
        weight: row.get(10)?,
        height: row.get(11)?,
        bmi: row.get(12)?,
        environmental_data: col_opt_json(row, 13)?,
        symptoms: col_json(row, 14)?,
        notes: row.get(15)?,
        recorded_by: col_enum(row, 16)?,
        is_emergency: row.get(17)?,
        created_at: col_time(row, 18)?,
        updated_at: col_time(row, 19)?,
    })
}
