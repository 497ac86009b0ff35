//! Booking endpoints: user views of their own bookings plus the admin
//! management surface driving the status state machine.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::db::repository::{self, BookingFilter, BookingListRow};
use crate::models::enums::BookingStatus;
use crate::models::Booking;

/// A booking with the catalog fields clients display alongside it.
#[derive(Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub test_name: String,
    pub test_code: String,
    pub test_price: f64,
}

impl BookingView {
    pub fn new(booking: Booking, test_name: &str, test_code: &str, test_price: f64) -> Self {
        Self {
            booking,
            test_name: test_name.to_string(),
            test_code: test_code.to_string(),
            test_price,
        }
    }
}

#[derive(Serialize)]
pub struct BookingListItem {
    pub id: Uuid,
    pub booking_reference: String,
    pub patient_name: String,
    pub patient_age: i64,
    pub appointment_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub home_collection: bool,
    pub created_at: DateTime<Utc>,
    pub test_name: String,
    pub test_code: String,
    pub test_price: f64,
    pub user_email: String,
    pub user_name: String,
}

impl From<BookingListRow> for BookingListItem {
    fn from(row: BookingListRow) -> Self {
        Self {
            id: row.booking.id,
            booking_reference: row.booking.booking_reference,
            patient_name: row.booking.patient_name,
            patient_age: row.booking.patient_age,
            appointment_date: row.booking.appointment_date,
            status: row.booking.status,
            home_collection: row.booking.home_collection,
            created_at: row.booking.created_at,
            test_name: row.test_name,
            test_code: row.test_code,
            test_price: row.test_price,
            user_email: row.user_email,
            user_name: row.user_name,
        }
    }
}

#[derive(Serialize)]
pub struct PaginationBlock {
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingListItem>,
    pub pagination: PaginationBlock,
}

#[derive(Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
    pub test_id: Option<Uuid>,
    /// YYYY-MM-DD
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub home_collection: Option<bool>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

fn parse_day(raw: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| {
            date.and_hms_opt(0, 0, 0)
                .expect("midnight is always valid")
                .and_utc()
        })
        .map_err(|_| ApiError::Validation(format!("Invalid {field} format. Use YYYY-MM-DD")))
}

impl BookingListQuery {
    fn to_filter(&self, owner: Option<Uuid>) -> Result<BookingFilter, ApiError> {
        Ok(BookingFilter {
            user_id: owner.or(self.user_id),
            test_id: self.test_id,
            status: self.status,
            date_from: self.date_from.as_deref().map(|d| parse_day(d, "date_from")).transpose()?,
            date_to: self.date_to.as_deref().map(|d| parse_day(d, "date_to")).transpose()?,
            home_collection: self.home_collection,
        })
    }

    fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    fn size(&self) -> i64 {
        self.size.unwrap_or(50).clamp(1, 100)
    }
}

fn list_response(
    conn: &rusqlite::Connection,
    filter: &BookingFilter,
    page: i64,
    size: i64,
) -> Result<BookingListResponse, ApiError> {
    let result = repository::list_bookings(conn, filter, page, size)?;
    let total_pages = if result.total > 0 {
        (result.total + size - 1) / size
    } else {
        0
    };
    Ok(BookingListResponse {
        bookings: result.items.into_iter().map(Into::into).collect(),
        pagination: PaginationBlock {
            total: result.total,
            page,
            size,
            total_pages,
        },
    })
}

/// `GET /api/v1/bookings/my` — the caller's bookings.
pub async fn my(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let filter = query.to_filter(Some(current.0.id))?;
    let conn = ctx.open_db()?;
    Ok(Json(list_response(&conn, &filter, query.page(), query.size())?))
}

/// `GET /api/v1/bookings` — all bookings, admin router.
pub async fn list_all(
    State(ctx): State<ApiContext>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<BookingListResponse>, ApiError> {
    let filter = query.to_filter(None)?;
    let conn = ctx.open_db()?;
    Ok(Json(list_response(&conn, &filter, query.page(), query.size())?))
}

fn owner_scope(current: &CurrentUser) -> Option<Uuid> {
    if current.0.is_admin() {
        None
    } else {
        Some(current.0.id)
    }
}

fn load_view(
    conn: &rusqlite::Connection,
    booking: Booking,
) -> Result<BookingView, ApiError> {
    let test = repository::get_lab_test(conn, &booking.test_id)?
        .ok_or_else(|| ApiError::Internal("booking references missing test".into()))?;
    Ok(BookingView::new(booking, &test.name, &test.code, test.price))
}

/// `GET /api/v1/bookings/:id` — own booking (any booking for admins).
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingView>, ApiError> {
    let conn = ctx.open_db()?;
    let booking = repository::get_booking(&conn, &id, owner_scope(&current).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;
    Ok(Json(load_view(&conn, booking)?))
}

/// `GET /api/v1/bookings/reference/:reference`.
pub async fn get_by_reference(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(reference): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let conn = ctx.open_db()?;
    let booking =
        repository::get_booking_by_reference(&conn, &reference, owner_scope(&current).as_ref())?
            .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;
    Ok(Json(load_view(&conn, booking)?))
}

#[derive(Deserialize)]
pub struct CancelRequest {
    pub cancellation_reason: Option<String>,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub booking_reference: String,
    pub status: BookingStatus,
}

/// `PUT /api/v1/bookings/:id/cancel` — cancellable only while pending or
/// confirmed with the appointment still in the future.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<CancelResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let mut booking = repository::get_booking(&conn, &id, owner_scope(&current).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;

    booking.cancel(body.cancellation_reason, Utc::now())?;
    repository::update_booking(&conn, &booking)?;

    Ok(Json(CancelResponse {
        message: "Booking cancelled successfully",
        booking_reference: booking.booking_reference,
        status: booking.status,
    }))
}

#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: BookingStatus,
    pub admin_notes: Option<String>,
}

#[derive(Serialize)]
pub struct StatusUpdateResponse {
    pub message: &'static str,
    pub booking_reference: String,
    pub status: BookingStatus,
    pub updated_at: DateTime<Utc>,
}

/// `PUT /api/v1/bookings/:id/status` — admin router; drives the status
/// state machine directly.
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let mut booking = repository::get_booking(&conn, &id, None)?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;

    booking.transition_to(body.status, Utc::now())?;
    if let Some(notes) = body.admin_notes {
        booking.admin_notes = Some(notes);
    }
    repository::update_booking(&conn, &booking)?;

    Ok(Json(StatusUpdateResponse {
        message: "Booking status updated successfully",
        booking_reference: booking.booking_reference,
        status: booking.status,
        updated_at: booking.updated_at,
    }))
}

/// Typed admin patch. Status changes route through the transition method,
/// never through a generic field setter.
#[derive(Deserialize)]
pub struct AdminUpdateRequest {
    pub status: Option<BookingStatus>,
    pub admin_notes: Option<String>,
    pub appointment_date: Option<DateTime<Utc>>,
}

/// `PUT /api/v1/bookings/:id/admin` — admin router.
pub async fn admin_update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(body): Json<AdminUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let mut booking = repository::get_booking(&conn, &id, None)?
        .ok_or_else(|| ApiError::NotFound("Booking not found".into()))?;

    let now = Utc::now();
    if let Some(status) = body.status {
        booking.transition_to(status, now)?;
    }
    if let Some(notes) = body.admin_notes {
        booking.admin_notes = Some(notes);
    }
    if let Some(appointment_date) = body.appointment_date {
        booking.appointment_date = appointment_date;
        booking.updated_at = now;
    }
    repository::update_booking(&conn, &booking)?;

    Ok(Json(StatusUpdateResponse {
        message: "Booking updated successfully",
        booking_reference: booking.booking_reference,
        status: booking.status,
        updated_at: booking.updated_at,
    }))
}
