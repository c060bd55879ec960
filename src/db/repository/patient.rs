use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{
    col_enum, col_json, col_opt_json, col_time, col_uuid, opt_json, to_json, ts, DatabaseError,
};
use crate::models::{Patient, PatientRecord, UserContact};

const PATIENT_COLUMNS: &str = "p.id, p.user_id, p.employee_id, p.department, p.shift,
     p.work_location, p.supervisor_id, p.emergency_contact, p.medical_history, p.allergies,
     p.current_medications,
     p.insurance_info, p.is_active, p.created_at, p.updated_at";

const CONTACT_COLUMNS: &str = "u.id, u.first_name, u.last_name, u.email, u.phone";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, user_id, employee_id, department, shift, work_location,
                               supervisor_id, emergency_contact, medical_history, allergies,
                               current_medications, insurance_info, is_active, created_at,
                               updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            patient.id.to_string(),
            patient.user_id.to_string(),
            patient.employee_id,
            patient.department,
            patient.shift.as_str(),
            patient.work_location,
            patient.supervisor_id,
            to_json(&patient.emergency_contact)?,
            to_json(&patient.medical_history)?,
            to_json(&patient.allergies)?,
            to_json(&patient.current_medications)?,
            opt_json(&patient.insurance_info)?,
            patient.is_active,
            ts(&patient.created_at),
            ts(&patient.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_patient)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn get_patient_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!("SELECT {PATIENT_COLUMNS} FROM patients p WHERE p.user_id = ?1");
    conn.query_row(&sql, params![user_id.to_string()], row_to_patient)
        .optional()
        .map_err(DatabaseError::from)
}

/// Patient plus owner contact details.
pub fn get_patient_record(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<PatientRecord>, DatabaseError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS}, {CONTACT_COLUMNS}
         FROM patients p JOIN users u ON u.id = p.user_id
         WHERE p.id = ?1"
    );
    conn.query_row(&sql, params![id.to_string()], row_to_record)
        .optional()
        .map_err(DatabaseError::from)
}

/// Active patients ordered by employee id, optionally within one department.
pub fn list_active_patients(
    conn: &Connection,
    department: Option<&str>,
    limit: Option<u32>,
    offset: u32,
) -> Result<Vec<PatientRecord>, DatabaseError> {
    let mut sql = format!(
        "SELECT {PATIENT_COLUMNS}, {CONTACT_COLUMNS}
         FROM patients p JOIN users u ON u.id = p.user_id
         WHERE p.is_active = 1"
    );
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(dept) = department {
        args.push(Box::new(dept.to_string()));
        sql.push_str(&format!(" AND p.department = ?{}", args.len()));
    }
    sql.push_str(" ORDER BY p.employee_id ASC, p.id ASC");
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        row_to_record,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_active_patients(
    conn: &Connection,
    department: Option<&str>,
) -> Result<u64, DatabaseError> {
    let count: i64 = match department {
        Some(dept) => conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE is_active = 1 AND department = ?1",
            params![dept],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?,
    };
    Ok(count as u64)
}

/// Number of active patients per department, alphabetical.
pub fn department_headcounts(conn: &Connection) -> Result<Vec<(String, u64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT department, COUNT(*) FROM patients
         WHERE is_active = 1
         GROUP BY department
         ORDER BY department ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE patients SET department = ?1, shift = ?2, work_location = ?3,
                emergency_contact = ?4, medical_history = ?5, allergies = ?6,
                current_medications = ?7, insurance_info = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            patient.department,
            patient.shift.as_str(),
            patient.work_location,
            to_json(&patient.emergency_contact)?,
            to_json(&patient.medical_history)?,
            to_json(&patient.allergies)?,
            to_json(&patient.current_medications)?,
            opt_json(&patient.insurance_info)?,
            ts(&patient.updated_at),
            patient.id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("patient", patient.id));
    }
    Ok(())
}

fn row_to_patient(row: &rusqlite::Row) -> Result<Patient, rusqlite::Error> {
    Ok(Patient {
        id: col_uuid(row, 0)?,
        user_id: col_uuid(row, 1)?,
        employee_id: row.get(2)?,
        department: row.get(3)?,
        shift: col_enum(row, 4)?,
        work_location: row.get(5)?,
        supervisor_id: row.get(6)?,
        emergency_contact: col_json(row, 7)?,
        medical_history: col_json(row, 8)?,
        allergies: col_json(row, 9)?,
        current_medications: col_json(row, 10)?,
        insurance_info: col_opt_json(row, 11)?,
        is_active: row.get(12)?,
        created_at: col_time(row, 13)?,
        updated_at: col_time(row, 14)?,
    })
}

fn row_to_record(row: &rusqlite::Row) -> Result<PatientRecord, rusqlite::Error> {
    Ok(PatientRecord {
        patient: row_to_patient(row)?,
        user: UserContact {
            id: col_uuid(row, 15)?,
            first_name: row.get(16)?,
            last_name: row.get(17)?,
            email: row.get(18)?,
            phone: row.get(19)?,
        },
    })
}
