//! API endpoint handlers, one module per route group.
//!
//! Role modules resolve the caller's profile first and answer 404 when the
//! user has none.

pub mod ai;
pub mod auth;
pub mod doctor;
pub mod employer;
pub mod health;
pub mod patient;
pub mod status;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::types::AuthUser;
use crate::db;
use crate::models::{Doctor, Employer, Patient};

pub(crate) fn patient_profile(conn: &Connection, caller: &AuthUser) -> Result<Patient, ApiError> {
    db::get_patient_by_user(conn, &caller.user_id)?
        .ok_or_else(|| ApiError::not_found("Patient profile not found"))
}

pub(crate) fn doctor_profile(conn: &Connection, caller: &AuthUser) -> Result<Doctor, ApiError> {
    db::get_doctor_by_user(conn, &caller.user_id)?
        .ok_or_else(|| ApiError::not_found("Doctor profile not found"))
}

pub(crate) fn employer_profile(conn: &Connection, caller: &AuthUser) -> Result<Employer, ApiError> {
    db::get_employer_by_user(conn, &caller.user_id)?
        .ok_or_else(|| ApiError::not_found("Employer profile not found"))
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| ApiError::bad_request(format!("Invalid {field}: {raw}")))
}

pub(crate) fn parse_optional_date(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|r| parse_date(field, r)).transpose()
}
