use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{col_enum, col_opt_time, col_time, col_uuid, opt_ts, ts, DatabaseError};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, password_hash, role, first_name, last_name, phone,
     is_active, last_login, created_at, updated_at";

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, email, password_hash, role, first_name, last_name, phone,
                            is_active, last_login, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            user.id.to_string(),
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.first_name,
            user.last_name,
            user.phone,
            user.is_active,
            opt_ts(&user.last_login),
            ts(&user.created_at),
            ts(&user.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_user)
        .optional()
        .map_err(DatabaseError::from)
}

/// Lookup by already-normalised (lower-case) email.
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    conn.query_row(&sql, params![email], row_to_user)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn record_login(conn: &Connection, id: &Uuid, at: &DateTime<Utc>) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
        params![ts(at), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}

/// Persist name and phone changes.
pub fn update_user_details(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, phone = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            user.first_name,
            user.last_name,
            user.phone,
            ts(&user.updated_at),
            user.id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("user", user.id));
    }
    Ok(())
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
    at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, ts(at), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}

pub fn set_user_active(conn: &Connection, id: &Uuid, active: bool) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active, ts(&Utc::now()), id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: col_uuid(row, 0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: col_enum(row, 3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone: row.get(6)?,
        is_active: row.get(7)?,
        last_login: col_opt_time(row, 8)?,
        created_at: col_time(row, 9)?,
        updated_at: col_time(row, 10)?,
    })
}
