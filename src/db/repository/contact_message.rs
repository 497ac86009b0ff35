use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, Paged};
use crate::db::DatabaseError;
use crate::models::enums::{InquiryType, MessageStatus, Priority};
use crate::models::ContactMessage;

const COLUMNS: &str = "id, full_name, email, phone, subject, message, inquiry_type, status, \
     priority, source, response_message, responded_at, responded_by, created_at, updated_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> Result<ContactMessage, rusqlite::Error> {
    Ok(ContactMessage {
        id: parse_uuid(0, row.get(0)?)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        subject: row.get(4)?,
        message: row.get(5)?,
        inquiry_type: parse_enum(6, row.get(6)?)?,
        status: parse_enum(7, row.get(7)?)?,
        priority: parse_enum(8, row.get(8)?)?,
        source: row.get(9)?,
        response_message: row.get(10)?,
        responded_at: row.get(11)?,
        responded_by: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

pub fn insert_contact_message(
    conn: &Connection,
    message: &ContactMessage,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO contact_messages (id, full_name, email, phone, subject, message,
         inquiry_type, status, priority, source, response_message, responded_at,
         responded_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            message.id.to_string(),
            message.full_name,
            message.email,
            message.phone,
            message.subject,
            message.message,
            message.inquiry_type.as_str(),
            message.status.as_str(),
            message.priority.as_str(),
            message.source,
            message.response_message,
            message.responded_at,
            message.responded_by,
            message.created_at,
            message.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_contact_message(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ContactMessage>, DatabaseError> {
    let result = conn
        .prepare(&format!("SELECT {COLUMNS} FROM contact_messages WHERE id = ?1"))?
        .query_row(params![id.to_string()], message_from_row);
    match result {
        Ok(message) => Ok(Some(message)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct ContactMessageFilter {
    pub status: Option<MessageStatus>,
    pub inquiry_type: Option<InquiryType>,
    pub priority: Option<Priority>,
    pub responded: Option<bool>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

fn filter_sql(filter: &ContactMessageFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(inquiry_type) = filter.inquiry_type {
        values.push(Box::new(inquiry_type.as_str()));
        clauses.push(format!("inquiry_type = ?{}", values.len()));
    }
    if let Some(priority) = filter.priority {
        values.push(Box::new(priority.as_str()));
        clauses.push(format!("priority = ?{}", values.len()));
    }
    if let Some(responded) = filter.responded {
        clauses.push(if responded {
            "responded_at IS NOT NULL".into()
        } else {
            "responded_at IS NULL".into()
        });
    }
    if let Some(from) = filter.date_from {
        values.push(Box::new(from));
        clauses.push(format!("created_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.date_to {
        values.push(Box::new(to));
        clauses.push(format!("created_at <= ?{}", values.len()));
    }
    if let Some(search) = &filter.search {
        values.push(Box::new(format!("%{search}%")));
        let n = values.len();
        clauses.push(format!(
            "(LOWER(full_name) LIKE LOWER(?{n}) OR LOWER(email) LIKE LOWER(?{n}) \
             OR LOWER(subject) LIKE LOWER(?{n}) OR LOWER(message) LIKE LOWER(?{n}))"
        ));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_clause, values)
}

pub fn list_contact_messages(
    conn: &Connection,
    filter: &ContactMessageFilter,
    page: i64,
    per_page: i64,
) -> Result<Paged<ContactMessage>, DatabaseError> {
    let (where_clause, count_values) = filter_sql(filter);
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM contact_messages{where_clause}"),
        params_from_iter(count_values),
        |row| row.get(0),
    )?;

    let (where_clause, mut values) = filter_sql(filter);
    values.push(Box::new(per_page));
    let limit_idx = values.len();
    values.push(Box::new((page - 1) * per_page));
    let offset_idx = values.len();

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM contact_messages{where_clause} \
         ORDER BY created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    ))?;
    let items = stmt
        .query_map(params_from_iter(values), message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paged { items, total })
}

pub fn update_contact_message(
    conn: &Connection,
    message: &ContactMessage,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE contact_messages SET status = ?2, priority = ?3, response_message = ?4,
         responded_at = ?5, responded_by = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            message.id.to_string(),
            message.status.as_str(),
            message.priority.as_str(),
            message.response_message,
            message.responded_at,
            message.responded_by,
            message.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ContactMessage".into(),
            id: message.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_contact_message(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM contact_messages WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ContactMessage".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct ContactStats {
    pub total_messages: i64,
    pub new_messages: i64,
    pub pending_response: i64,
    pub resolved_messages: i64,
    pub urgent_messages: i64,
    pub messages_this_week: i64,
    pub messages_this_month: i64,
    pub average_response_time_hours: f64,
}

pub fn contact_stats(conn: &Connection, now: DateTime<Utc>) -> Result<ContactStats, DatabaseError> {
    let week_ago = now - chrono::Duration::days(7);
    let month_ago = now - chrono::Duration::days(30);

    let count = |sql: &str| -> Result<i64, DatabaseError> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    let total_messages = count("SELECT COUNT(*) FROM contact_messages")?;
    let new_messages = count("SELECT COUNT(*) FROM contact_messages WHERE status = 'new'")?;
    let pending_response = count(
        "SELECT COUNT(*) FROM contact_messages WHERE status IN ('new', 'read', 'in_progress')",
    )?;
    let resolved_messages =
        count("SELECT COUNT(*) FROM contact_messages WHERE status IN ('resolved', 'closed')")?;
    let urgent_messages =
        count("SELECT COUNT(*) FROM contact_messages WHERE priority IN ('urgent', 'high')")?;

    let messages_this_week: i64 = conn.query_row(
        "SELECT COUNT(*) FROM contact_messages WHERE created_at >= ?1",
        params![week_ago],
        |row| row.get(0),
    )?;
    let messages_this_month: i64 = conn.query_row(
        "SELECT COUNT(*) FROM contact_messages WHERE created_at >= ?1",
        params![month_ago],
        |row| row.get(0),
    )?;

    let average_response_time_hours: f64 = conn.query_row(
        "SELECT COALESCE(AVG((julianday(responded_at) - julianday(created_at)) * 24), 0)
         FROM contact_messages WHERE responded_at IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    Ok(ContactStats {
        total_messages,
        new_messages,
        pending_response,
        resolved_messages,
        urgent_messages,
        messages_this_week,
        messages_this_month,
        average_response_time_hours,
    })
}
