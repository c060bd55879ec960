use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{col_enum, col_json, col_time, col_uuid, to_json, ts, DatabaseError};
use crate::models::Employer;

const EMPLOYER_COLUMNS: &str = "id, user_id, company_name, industry, company_size, address,
     contact_info, subscription, settings, total_employees, active_employees, is_active,
     created_at, updated_at";

pub fn insert_employer(conn: &Connection, employer: &Employer) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO employers (id, user_id, company_name, industry, company_size, address,
                                contact_info, subscription, settings, total_employees,
                                active_employees, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            employer.id.to_string(),
            employer.user_id.to_string(),
            employer.company_name,
            employer.industry,
            employer.company_size.as_str(),
            to_json(&employer.address)?,
            to_json(&employer.contact_info)?,
            to_json(&employer.subscription)?,
            to_json(&employer.settings)?,
            employer.total_employees,
            employer.active_employees,
            employer.is_active,
            ts(&employer.created_at),
            ts(&employer.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_employer_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Employer>, DatabaseError> {
    let sql = format!("SELECT {EMPLOYER_COLUMNS} FROM employers WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id.to_string()], row_to_employer)
        .optional()
        .map_err(DatabaseError::from)
}

pub fn update_employer(conn: &Connection, employer: &Employer) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE employers SET company_name = ?1, industry = ?2, company_size = ?3,
                address = ?4, contact_info = ?5, settings = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            employer.company_name,
            employer.industry,
            employer.company_size.as_str(),
            to_json(&employer.address)?,
            to_json(&employer.contact_info)?,
            to_json(&employer.settings)?,
            ts(&employer.updated_at),
            employer.id.to_string(),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("employer", employer.id));
    }
    Ok(())
}

fn row_to_employer(row: &rusqlite::Row) -> Result<Employer, rusqlite::Error> {
    Ok(Employer {
        id: col_uuid(row, 0)?,
        user_id: col_uuid(row, 1)?,
        company_name: row.get(2)?,
        industry: row.get(3)?,
        company_size: col_enum(row, 4)?,
        address: col_json(row, 5)?,
        contact_info: col_json(row, 6)?,
        subscription: col_json(row, 7)?,
        settings: col_json(row, 8)?,
        total_employees: row.get(9)?,
        active_employees: row.get(10)?,
        is_active: row.get(11)?,
        created_at: col_time(row, 12)?,
        updated_at: col_time(row, 13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{seed_employer, test_db};
    use crate::models::CompanySize;

    #[test]
    fn employer_round_trips_nested_documents() {
        let conn = test_db();
        let (user, employer) = seed_employer(&conn, "hr@vasant.example");
        let loaded = get_employer_by_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.address, employer.address);
        assert_eq!(loaded.subscription, employer.subscription);
        assert_eq!(loaded.settings.alert_thresholds.fatigue, 70);
    }

    #[test]
    fn update_changes_company_size() {
        let conn = test_db();
        let (user, mut employer) = seed_employer(&conn, "ops@vasant.example");
        employer.company_size = CompanySize::Enterprise;
        update_employer(&conn, &employer).unwrap();
        let loaded = get_employer_by_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.company_size, CompanySize::Enterprise);
    }
}
