use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::filter::SqlFilter;
use crate::db::{
    col_enum, col_json, col_opt_json, col_opt_uuid, col_time, col_uuid, opt_json, to_json, ts,
    DatabaseError,
};
use crate::models::{Chat, ChatMessage, ChatPriority, ChatStatus};

const CHAT_COLUMNS: &str =
    "id, patient_id, doctor_id, status, priority, tags, summary, created_at, updated_at";

/// Which active conversation to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatScope {
    /// Any active chat of the patient.
    Patient(Uuid),
    /// The active chat between a patient and one doctor.
    Consultation { patient_id: Uuid, doctor_id: Uuid },
}

/// Insert a chat together with its initial messages.
pub fn insert_chat(conn: &mut Connection, chat: &Chat) -> Result<(), DatabaseError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    insert_chat_row(&tx, chat)?;
    insert_messages(&tx, &chat.id, 0, &chat.messages)?;
    tx.commit()?;
    Ok(())
}

fn insert_chat_row(conn: &Connection, chat: &Chat) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO chats (id, patient_id, doctor_id, status, priority, tags, summary,
                            created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            chat.id.to_string(),
            chat.patient_id.to_string(),
            chat.doctor_id.map(|id| id.to_string()),
            chat.status.as_str(),
            chat.priority.as_str(),
            to_json(&chat.tags)?,
            chat.summary,
            ts(&chat.created_at),
            ts(&chat.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_messages(
    conn: &Connection,
    chat_id: &Uuid,
    first_seq: i64,
    messages: &[ChatMessage],
) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO chat_messages (id, chat_id, seq, kind, content, timestamp, action, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (offset, message) in messages.iter().enumerate() {
        stmt.execute(params![
            message.id.to_string(),
            chat_id.to_string(),
            first_seq + offset as i64,
            message.kind.as_str(),
            message.content,
            ts(&message.timestamp),
            opt_json(&message.action)?,
            opt_json(&message.metadata)?,
        ])?;
    }
    Ok(())
}

pub fn get_chat(conn: &Connection, id: &Uuid) -> Result<Option<Chat>, DatabaseError> {
    let sql = format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?1");
    let chat = conn
        .query_row(&sql, params![id.to_string()], row_to_chat)
        .optional()?;
    chat.map(|c| with_messages(conn, c)).transpose()
}

/// Oldest active chat matching the scope.
pub fn find_active_chat(
    conn: &Connection,
    scope: ChatScope,
) -> Result<Option<Chat>, DatabaseError> {
    let mut filter = SqlFilter::new();
    match scope {
        ChatScope::Patient(patient_id) => {
            filter.eq("patient_id", patient_id.to_string());
        }
        ChatScope::Consultation {
            patient_id,
            doctor_id,
        } => {
            filter
                .eq("patient_id", patient_id.to_string())
                .eq("doctor_id", doctor_id.to_string());
        }
    }
    filter.eq("status", ChatStatus::Active.as_str());
    let sql = format!(
        "SELECT {CHAT_COLUMNS} FROM chats{} ORDER BY created_at ASC, id ASC LIMIT 1",
        filter.where_sql()
    );
    let chat = conn
        .query_row(&sql, filter.params(), row_to_chat)
        .optional()?;
    chat.map(|c| with_messages(conn, c)).transpose()
}

/// Return the active chat for `scope`, creating `fresh` if there is none.
/// Lookup and insert share one immediate transaction, so concurrent
/// callers cannot both create a chat for the same scope.
pub fn find_or_create_active_chat(
    conn: &mut Connection,
    scope: ChatScope,
    fresh: Chat,
) -> Result<(Chat, bool), DatabaseError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(existing) = find_active_chat(&tx, scope)? {
        tx.commit()?;
        return Ok((existing, false));
    }
    insert_chat_row(&tx, &fresh)?;
    insert_messages(&tx, &fresh.id, 0, &fresh.messages)?;
    tx.commit()?;
    Ok((fresh, true))
}

/// Append messages after the current tail and return the updated chat.
pub fn append_messages(
    conn: &mut Connection,
    chat_id: &Uuid,
    messages: &[ChatMessage],
    at: &DateTime<Utc>,
) -> Result<Chat, DatabaseError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let next_seq: i64 = tx.query_row(
        "SELECT COALESCE(MAX(seq) + 1, 0) FROM chat_messages WHERE chat_id = ?1",
        params![chat_id.to_string()],
        |row| row.get(0),
    )?;
    let affected = tx.execute(
        "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
        params![ts(at), chat_id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("chat", chat_id));
    }
    insert_messages(&tx, chat_id, next_seq, messages)?;
    tx.commit()?;
    get_chat(conn, chat_id)?.ok_or_else(|| DatabaseError::not_found("chat", chat_id))
}

pub fn set_chat_priority(
    conn: &Connection,
    chat_id: &Uuid,
    priority: ChatPriority,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE chats SET priority = ?1, updated_at = ?2 WHERE id = ?3",
        params![priority.as_str(), ts(&Utc::now()), chat_id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::not_found("chat", chat_id));
    }
    Ok(())
}

/// Chats of one patient, most recently updated first.
pub fn list_patient_chats(
    conn: &Connection,
    patient_id: &Uuid,
    status: Option<ChatStatus>,
) -> Result<Vec<Chat>, DatabaseError> {
    let mut filter = SqlFilter::new();
    filter.eq("patient_id", patient_id.to_string());
    if let Some(status) = status {
        filter.eq("status", status.as_str());
    }
    load_chats(conn, &filter, "updated_at DESC, id ASC")
}

/// A doctor's chats created inside `[from, to)`, oldest first.
pub fn list_doctor_chats_between(
    conn: &Connection,
    doctor_id: &Uuid,
    from: &DateTime<Utc>,
    to: &DateTime<Utc>,
    status: Option<ChatStatus>,
) -> Result<Vec<Chat>, DatabaseError> {
    let mut filter = SqlFilter::new();
    filter
        .eq("doctor_id", doctor_id.to_string())
        .cmp("created_at", ">=", ts(from))
        .cmp("created_at", "<", ts(to));
    if let Some(status) = status {
        filter.eq("status", status.as_str());
    }
    load_chats(conn, &filter, "created_at ASC, id ASC")
}

fn load_chats(
    conn: &Connection,
    filter: &SqlFilter,
    order: &str,
) -> Result<Vec<Chat>, DatabaseError> {
    let sql = format!(
        "SELECT {CHAT_COLUMNS} FROM chats{} ORDER BY {order}",
        filter.where_sql()
    );
    let mut stmt = conn.prepare(&sql)?;
    let chats = stmt
        .query_map(filter.params(), row_to_chat)?
        .collect::<Result<Vec<_>, _>>()?;
    chats.into_iter().map(|c| with_messages(conn, c)).collect()
}

fn with_messages(conn: &Connection, mut chat: Chat) -> Result<Chat, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, content, timestamp, action, metadata
         FROM chat_messages WHERE chat_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![chat.id.to_string()], |row| {
        Ok(ChatMessage {
            id: col_uuid(row, 0)?,
            kind: col_enum(row, 1)?,
            content: row.get(2)?,
            timestamp: col_time(row, 3)?,
            action: col_opt_json(row, 4)?,
            metadata: col_opt_json(row, 5)?,
        })
    })?;
    chat.messages = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(chat)
}

fn row_to_chat(row: &rusqlite::Row) -> Result<Chat, rusqlite::Error> {
    Ok(Chat {
        id: col_uuid(row, 0)?,
        patient_id: col_uuid(row, 1)?,
        doctor_id: col_opt_uuid(row, 2)?,
        messages: Vec::new(),
        status: col_enum(row, 3)?,
        priority: col_enum(row, 4)?,
        tags: col_json(row, 5)?,
        summary: row.get(6)?,
        created_at: col_time(row, 7)?,
        updated_at: col_time(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{seed_doctor, seed_patient, test_db};
    use crate::models::MessageKind;

    #[test]
    fn messages_keep_append_order() {
        let mut conn = test_db();
        let (_, patient) = seed_patient(&conn, "c@plant.io", "EMP-1", "Assembly");
        let now = Utc::now();
        let mut chat = Chat::open(patient.id, None, now);
        let greeting = ChatMessage::text(MessageKind::User, "hello", now);
        chat.messages.push(greeting);
        insert_chat(&mut conn, &chat).unwrap();

        let replies = vec![
            ChatMessage::text(MessageKind::User, "I feel dizzy", now),
            ChatMessage::text(MessageKind::Ai, "Take a break", now),
        ];
        let updated = append_messages(&mut conn, &chat.id, &replies, &now).unwrap();
        let contents: Vec<_> = updated
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["hello", "I feel dizzy", "Take a break"]);
    }

    #[test]
    fn stored_messages_cannot_be_edited_or_deleted() {
        let mut conn = test_db();
        let (_, patient) = seed_patient(&conn, "ro@plant.io", "EMP-2", "Assembly");
        let now = Utc::now();
        let mut chat = Chat::open(patient.id, None, now);
        let original = ChatMessage::text(MessageKind::User, "original", now);
        chat.messages.push(original);
        insert_chat(&mut conn, &chat).unwrap();

        assert!(conn
            .execute("UPDATE chat_messages SET content = 'edited'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM chat_messages", []).is_err());
        let stored = get_chat(&conn, &chat.id).unwrap().unwrap();
        assert_eq!(stored.messages[0].content, "original");
    }

    #[test]
    fn find_or_create_reuses_active_chat() {
        let mut conn = test_db();
        let (_, patient) = seed_patient(&conn, "f@plant.io", "EMP-3", "Assembly");
        let now = Utc::now();
        let scope = ChatScope::Patient(patient.id);

        let fresh = || Chat::open(patient.id, None, now);
        let (first, created) = find_or_create_active_chat(&mut conn, scope, fresh()).unwrap();
        assert!(created);
        let (second, created_again) =
            find_or_create_active_chat(&mut conn, scope, fresh()).unwrap();
        assert!(!created_again);
        assert_eq!(first.id, second.id);
        let chats = list_patient_chats(&conn, &patient.id, None).unwrap();
        assert_eq!(chats.len(), 1);
    }

    #[test]
    fn consultation_scope_is_per_doctor() {
        let mut conn = test_db();
        let (_, patient) = seed_patient(&conn, "s@plant.io", "EMP-4", "Assembly");
        let (_, doc_a) = seed_doctor(&conn, "a@clinic.io", "LIC-A");
        let (_, doc_b) = seed_doctor(&conn, "b@clinic.io", "LIC-B");
        let now = Utc::now();

        for doctor in [&doc_a, &doc_b] {
            let scope = ChatScope::Consultation {
                patient_id: patient.id,
                doctor_id: doctor.id,
            };
            let (_, created) = find_or_create_active_chat(
                &mut conn,
                scope,
                Chat::open(patient.id, Some(doctor.id), now),
            )
            .unwrap();
            assert!(created);
        }

        let day_start = now - chrono::Duration::hours(1);
        let day_end = now + chrono::Duration::hours(1);
        let a_chats =
            list_doctor_chats_between(&conn, &doc_a.id, &day_start, &day_end, None).unwrap();
        assert_eq!(a_chats.len(), 1);
        assert_eq!(a_chats[0].doctor_id, Some(doc_a.id));
    }

    #[test]
    fn append_to_missing_chat_fails() {
        let mut conn = test_db();
        let err = append_messages(&mut conn, &Uuid::new_v4(), &[], &Utc::now()).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
