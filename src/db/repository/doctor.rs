use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{col_json, col_time, col_uuid, to_json, ts, DatabaseError};
use crate::models::Doctor;

const DOCTOR_COLUMNS: &str = "id, user_id, license_number, specialization, department,
     qualifications, experience, consultation_fee, availability, max_patients_per_day,
     current_patients, rating, total_consultations, is_active, created_at, updated_at";

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (id, user_id, license_number, specialization, department,
                              qualifications, experience, consultation_fee, availability,
                              max_patients_per_day, current_patients, rating,
                              total_consultations, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            doctor.id.to_string(),
            doctor.user_id.to_string(),
            doctor.license_number,
            doctor.specialization,
            doctor.department,
            to_json(&doctor.qualifications)?,
            doctor.experience,
            doctor.consultation_fee,
            to_json(&doctor.availability)?,
            doctor.max_patients_per_day,
            doctor.current_patients,
            doctor.rating,
            doctor.total_consultations,
            doctor.is_active,
            ts(&doctor.created_at),
            ts(&doctor.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_doctor_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Doctor>, DatabaseError> {
    let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id.to_string()], row_to_doctor)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn update_doctor(conn: &Connection, doctor: &Doctor) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE doctors SET specialization = ?1, department = ?2, qualifications = ?3,
                experience = ?4, consultation_fee = ?5, availability = ?6,
                max_patients_per_day = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            doctor.specialization,
            doctor.department,
            to_json(&doctor.qualifications)?,
            doctor.experience,
            doctor.consultation_fee,
            to_json(&doctor.availability)?,
            doctor.max_patients_per_day,
            ts(&doctor.updated_at),
            doctor.id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("doctor", doctor.id));
    }
    Ok(())
}

fn row_to_doctor(row: &rusqlite::Row) -> Result<Doctor, rusqlite::Error> {
    Ok(Doctor {
        id: col_uuid(row, 0)?,
        user_id: col_uuid(row, 1)?,
        license_number: row.get(2)?,
        specialization: row.get(3)?,
        department: row.get(4)?,
        qualifications: col_json(row, 5)?,
        experience: row.get(6)?,
        consultation_fee: row.get(7)?,
        availability: col_json(row, 8)?,
        max_patients_per_day: row.get(9)?,
        current_patients: row.get(10)?,
        rating: row.get(11)?,
        total_consultations: row.get(12)?,
        is_active: row.get(13)?,
        created_at: col_time(row, 14)?,
        updated_at: col_time(row, 15)?,
    })
}
