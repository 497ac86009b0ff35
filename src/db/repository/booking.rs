use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, Paged};
use crate::db::DatabaseError;
use crate::models::enums::BookingStatus;
use crate::models::Booking;

const COLUMNS: &str = "b.id, b.test_id, b.user_id, b.booking_reference, b.patient_name, \
     b.patient_age, b.patient_gender, b.appointment_date, b.home_collection, b.address, \
     b.phone_number, b.special_instructions, b.status, b.admin_notes, b.cancellation_reason, \
     b.created_at, b.updated_at, b.cancelled_at, b.completed_at";

fn booking_from_row(row: &rusqlite::Row<'_>) -> Result<Booking, rusqlite::Error> {
    Ok(Booking {
        id: parse_uuid(0, row.get(0)?)?,
        test_id: parse_uuid(1, row.get(1)?)?,
        user_id: parse_uuid(2, row.get(2)?)?,
        booking_reference: row.get(3)?,
        patient_name: row.get(4)?,
        patient_age: row.get(5)?,
        patient_gender: row.get(6)?,
        appointment_date: row.get(7)?,
        home_collection: row.get(8)?,
        address: row.get(9)?,
        phone_number: row.get(10)?,
        special_instructions: row.get(11)?,
        status: parse_enum(12, row.get(12)?)?,
        admin_notes: row.get(13)?,
        cancellation_reason: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        cancelled_at: row.get(17)?,
        completed_at: row.get(18)?,
    })
}

fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bookings (id, test_id, user_id, booking_reference, patient_name,
         patient_age, patient_gender, appointment_date, home_collection, address,
         phone_number, special_instructions, status, admin_notes, cancellation_reason,
         created_at, updated_at, cancelled_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19)",
        params![
            booking.id.to_string(),
            booking.test_id.to_string(),
            booking.user_id.to_string(),
            booking.booking_reference,
            booking.patient_name,
            booking.patient_age,
            booking.patient_gender,
            booking.appointment_date,
            booking.home_collection,
            booking.address,
            booking.phone_number,
            booking.special_instructions,
            booking.status.as_str(),
            booking.admin_notes,
            booking.cancellation_reason,
            booking.created_at,
            booking.updated_at,
            booking.cancelled_at,
            booking.completed_at,
        ],
    )?;
    Ok(())
}

/// Insert a booking, regenerating the reference on a collision.
///
/// The reference space is small enough that collisions happen in practice;
/// uniqueness is enforced by the database and the insert retried with a
/// fresh code a bounded number of times.
pub fn create_booking(conn: &Connection, booking: &mut Booking) -> Result<(), DatabaseError> {
    let mut attempts = 0;
    loop {
        match insert_booking(conn, booking) {
            Ok(()) => return Ok(()),
            Err(err) if err.is_unique_violation() && attempts < 4 => {
                attempts += 1;
                tracing::warn!(
                    reference = %booking.booking_reference,
                    "booking reference collision, regenerating"
                );
                booking.booking_reference = Booking::generate_reference();
            }
            Err(err) => return Err(err),
        }
    }
}

/// `owner` scopes the lookup to a single user's bookings.
pub fn get_booking(
    conn: &Connection,
    id: &Uuid,
    owner: Option<&Uuid>,
) -> Result<Option<Booking>, DatabaseError> {
    let result = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM bookings b WHERE b.id = ?1 AND b.user_id = ?2"
            ))?
            .query_row(params![id.to_string(), user_id.to_string()], booking_from_row),
        None => conn
            .prepare(&format!("SELECT {COLUMNS} FROM bookings b WHERE b.id = ?1"))?
            .query_row(params![id.to_string()], booking_from_row),
    };
    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_by_reference(
    conn: &Connection,
    reference: &str,
    owner: Option<&Uuid>,
) -> Result<Option<Booking>, DatabaseError> {
    let result = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM bookings b \
                 WHERE b.booking_reference = ?1 AND b.user_id = ?2"
            ))?
            .query_row(params![reference, user_id.to_string()], booking_from_row),
        None => conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM bookings b WHERE b.booking_reference = ?1"
            ))?
            .query_row(params![reference], booking_from_row),
    };
    match result {
        Ok(booking) => Ok(Some(booking)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct BookingFilter {
    pub user_id: Option<Uuid>,
    pub test_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub home_collection: Option<bool>,
}

/// A booking joined with the catalog and account fields list views need.
#[derive(Debug)]
pub struct BookingListRow {
    pub booking: Booking,
    pub test_name: String,
    pub test_code: String,
    pub test_price: f64,
    pub user_email: String,
    pub user_name: String,
}

fn filter_sql(filter: &BookingFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(user_id) = &filter.user_id {
        values.push(Box::new(user_id.to_string()));
        clauses.push(format!("b.user_id = ?{}", values.len()));
    }
    if let Some(test_id) = &filter.test_id {
        values.push(Box::new(test_id.to_string()));
        clauses.push(format!("b.test_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("b.status = ?{}", values.len()));
    }
    if let Some(from) = filter.date_from {
        values.push(Box::new(from));
        clauses.push(format!("b.appointment_date >= ?{}", values.len()));
    }
    if let Some(to) = filter.date_to {
        values.push(Box::new(to));
        clauses.push(format!("b.appointment_date <= ?{}", values.len()));
    }
    if let Some(home) = filter.home_collection {
        values.push(Box::new(home));
        clauses.push(format!("b.home_collection = ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_clause, values)
}

pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    page: i64,
    per_page: i64,
) -> Result<Paged<BookingListRow>, DatabaseError> {
    let (where_clause, count_values) = filter_sql(filter);
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM bookings b{where_clause}"),
        params_from_iter(count_values),
        |row| row.get(0),
    )?;

    let (where_clause, mut values) = filter_sql(filter);
    values.push(Box::new(per_page));
    let limit_idx = values.len();
    values.push(Box::new((page - 1) * per_page));
    let offset_idx = values.len();

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS}, t.name, t.code, t.price, u.email, u.username, u.first_name, u.last_name \
         FROM bookings b \
         JOIN lab_tests t ON t.id = b.test_id \
         JOIN users u ON u.id = b.user_id{where_clause} \
         ORDER BY b.created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    ))?;

    let items = stmt
        .query_map(params_from_iter(values), |row| {
            let booking = booking_from_row(row)?;
            let username: String = row.get(23)?;
            let first_name: Option<String> = row.get(24)?;
            let last_name: Option<String> = row.get(25)?;
            let user_name = match (first_name, last_name) {
                (Some(first), Some(last)) => format!("{first} {last}"),
                _ => username,
            };
            Ok(BookingListRow {
                booking,
                test_name: row.get(19)?,
                test_code: row.get(20)?,
                test_price: row.get(21)?,
                user_email: row.get(22)?,
                user_name,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paged { items, total })
}

pub fn update_booking(conn: &Connection, booking: &Booking) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE bookings SET status = ?2, patient_name = ?3, patient_age = ?4,
         patient_gender = ?5, appointment_date = ?6, home_collection = ?7, address = ?8,
         phone_number = ?9, special_instructions = ?10, admin_notes = ?11,
         cancellation_reason = ?12, updated_at = ?13, cancelled_at = ?14, completed_at = ?15
         WHERE id = ?1",
        params![
            booking.id.to_string(),
            booking.status.as_str(),
            booking.patient_name,
            booking.patient_age,
            booking.patient_gender,
            booking.appointment_date,
            booking.home_collection,
            booking.address,
            booking.phone_number,
            booking.special_instructions,
            booking.admin_notes,
            booking.cancellation_reason,
            booking.updated_at,
            booking.cancelled_at,
            booking.completed_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Booking".into(),
            id: booking.id.to_string(),
        });
    }
    Ok(())
}
