//! Company profile and contact endpoints.
//!
//! Reads are public; profile updates share the `/company/info` path with
//! the public read and check the admin role in-handler. Contact-message
//! management lives on the admin router.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_admin_caller;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser, PageParams, Pagination};
use crate::db::repository::{self, ContactMessageFilter, ContactStats};
use crate::models::enums::{InquiryType, MessageStatus, Priority};
use crate::models::{Company, ContactMessage};

#[derive(Serialize)]
pub struct CompanyView {
    #[serde(flatten)]
    pub company: Company,
    pub full_address: String,
}

impl From<Company> for CompanyView {
    fn from(company: Company) -> Self {
        let full_address = company.full_address();
        Self {
            company,
            full_address,
        }
    }
}

fn load_company(conn: &rusqlite::Connection) -> Result<Company, ApiError> {
    repository::get_company(conn)?
        .ok_or_else(|| ApiError::NotFound("Company information not found".into()))
}

/// `GET /api/v1/company/info` — public.
pub async fn info(State(ctx): State<ApiContext>) -> Result<Json<CompanyView>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(load_company(&conn)?.into()))
}

/// Typed partial update of the company profile.
#[derive(Deserialize, Default)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone_primary: Option<String>,
    pub phone_secondary: Option<String>,
    pub website: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub established_year: Option<i64>,
    pub license_number: Option<String>,
    pub accreditation: Option<String>,
    pub services: Option<Vec<String>>,
    pub specializations: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub operating_hours: Option<serde_json::Value>,
    pub emergency_contact: Option<String>,
    pub is_24x7: Option<bool>,
    pub accepts_home_collection: Option<bool>,
    pub home_collection_radius_km: Option<i64>,
    pub minimum_order_amount: Option<i64>,
    pub logo_url: Option<String>,
    pub tagline: Option<String>,
}

/// `PUT /api/v1/company/info` — admin only.
pub async fn update_info(
    State(ctx): State<ApiContext>,
    caller: Option<Extension<CurrentUser>>,
    Json(patch): Json<CompanyPatch>,
) -> Result<Json<CompanyView>, ApiError> {
    require_admin_caller(caller.as_ref())?;

    let conn = ctx.open_db()?;
    let mut company = load_company(&conn)?;

    if let Some(name) = patch.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("Company name must not be empty".into()));
        }
        company.name = name;
    }
    if let Some(legal_name) = patch.legal_name {
        company.legal_name = Some(legal_name);
    }
    if let Some(description) = patch.description {
        company.description = Some(description);
    }
    if let Some(email) = patch.email {
        company.email = Some(email);
    }
    if let Some(phone_primary) = patch.phone_primary {
        company.phone_primary = Some(phone_primary);
    }
    if let Some(phone_secondary) = patch.phone_secondary {
        company.phone_secondary = Some(phone_secondary);
    }
    if let Some(website) = patch.website {
        company.website = Some(website);
    }
    if let Some(address_line1) = patch.address_line1 {
        company.address_line1 = Some(address_line1);
    }
    if let Some(address_line2) = patch.address_line2 {
        company.address_line2 = Some(address_line2);
    }
    if let Some(city) = patch.city {
        company.city = Some(city);
    }
    if let Some(state) = patch.state {
        company.state = Some(state);
    }
    if let Some(postal_code) = patch.postal_code {
        company.postal_code = Some(postal_code);
    }
    if let Some(country) = patch.country {
        company.country = country;
    }
    if let Some(established_year) = patch.established_year {
        company.established_year = Some(established_year);
    }
    if let Some(license_number) = patch.license_number {
        company.license_number = Some(license_number);
    }
    if let Some(accreditation) = patch.accreditation {
        company.accreditation = Some(accreditation);
    }
    if let Some(services) = patch.services {
        company.services = services;
    }
    if let Some(specializations) = patch.specializations {
        company.specializations = specializations;
    }
    if let Some(certifications) = patch.certifications {
        company.certifications = certifications;
    }
    if let Some(operating_hours) = patch.operating_hours {
        company.operating_hours = Some(operating_hours);
    }
    if let Some(emergency_contact) = patch.emergency_contact {
        company.emergency_contact = Some(emergency_contact);
    }
    if let Some(is_24x7) = patch.is_24x7 {
        company.is_24x7 = is_24x7;
    }
    if let Some(accepts_home_collection) = patch.accepts_home_collection {
        company.accepts_home_collection = accepts_home_collection;
    }
    if let Some(radius) = patch.home_collection_radius_km {
        company.home_collection_radius_km = Some(radius);
    }
    if let Some(minimum_order_amount) = patch.minimum_order_amount {
        company.minimum_order_amount = minimum_order_amount;
    }
    if let Some(logo_url) = patch.logo_url {
        company.logo_url = Some(logo_url);
    }
    if let Some(tagline) = patch.tagline {
        company.tagline = Some(tagline);
    }

    company.updated_at = Utc::now();
    repository::update_company(&conn, &company)?;

    Ok(Json(company.into()))
}

#[derive(Serialize)]
pub struct ContactInfoResponse {
    pub name: String,
    pub email: Option<String>,
    pub phone_primary: Option<String>,
    pub phone_secondary: Option<String>,
    pub emergency_contact: Option<String>,
    pub website: Option<String>,
    pub full_address: String,
    pub operating_hours: Option<serde_json::Value>,
    pub is_24x7: bool,
}

/// `GET /api/v1/company/contact` — public contact card.
pub async fn contact_info(
    State(ctx): State<ApiContext>,
) -> Result<Json<ContactInfoResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let company = load_company(&conn)?;
    Ok(Json(ContactInfoResponse {
        full_address: company.full_address(),
        name: company.name,
        email: company.email,
        phone_primary: company.phone_primary,
        phone_secondary: company.phone_secondary,
        emergency_contact: company.emergency_contact,
        website: company.website,
        operating_hours: company.operating_hours,
        is_24x7: company.is_24x7,
    }))
}

#[derive(Serialize)]
pub struct ServicesResponse {
    pub services: Vec<String>,
    pub specializations: Vec<String>,
    pub certifications: Vec<String>,
    pub total_services: usize,
}

/// `GET /api/v1/company/services` — public.
pub async fn services(State(ctx): State<ApiContext>) -> Result<Json<ServicesResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let company = load_company(&conn)?;
    Ok(Json(ServicesResponse {
        total_services: company.services.len(),
        services: company.services,
        specializations: company.specializations,
        certifications: company.certifications,
    }))
}

#[derive(Deserialize)]
pub struct ContactFormRequest {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    #[serde(default = "default_inquiry")]
    pub inquiry_type: InquiryType,
    pub source: Option<String>,
}

fn default_inquiry() -> InquiryType {
    InquiryType::General
}

#[derive(Serialize)]
pub struct ContactFormResponse {
    pub message: &'static str,
    pub contact_id: Uuid,
    pub estimated_response_time: &'static str,
    pub support_email: Option<String>,
    pub support_phone: Option<String>,
}

/// `POST /api/v1/company/contact` — public contact form.
pub async fn submit_contact(
    State(ctx): State<ApiContext>,
    Json(body): Json<ContactFormRequest>,
) -> Result<(StatusCode, Json<ContactFormResponse>), ApiError> {
    if body.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }
    if !body.email.contains('@') {
        return Err(ApiError::Validation(format!(
            "Invalid email address: {}",
            body.email
        )));
    }
    if body.subject.trim().is_empty() || body.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "Subject and message must not be empty".into(),
        ));
    }

    let conn = ctx.open_db()?;
    let company = repository::get_company(&conn)?
        .ok_or_else(|| ApiError::ExternalService("Service temporarily unavailable".into()))?;

    let now = Utc::now();
    let message = ContactMessage {
        id: Uuid::new_v4(),
        full_name: body.full_name,
        email: body.email,
        phone: body.phone,
        subject: body.subject,
        message: body.message,
        inquiry_type: body.inquiry_type,
        status: MessageStatus::New,
        priority: ContactMessage::priority_for(body.inquiry_type),
        source: body.source,
        response_message: None,
        responded_at: None,
        responded_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_contact_message(&conn, &message)?;

    let estimated_response_time = if message.is_urgent() {
        "4-6 hours"
    } else {
        "24-48 hours"
    };

    Ok((
        StatusCode::CREATED,
        Json(ContactFormResponse {
            message: "Thank you for contacting us. We have received your message and will respond soon.",
            contact_id: message.id,
            estimated_response_time,
            support_email: company.email,
            support_phone: company.phone_primary,
        }),
    ))
}

#[derive(Serialize)]
pub struct ContactMessageView {
    #[serde(flatten)]
    pub message: ContactMessage,
    pub is_urgent: bool,
    pub response_time_hours: Option<f64>,
}

impl From<ContactMessage> for ContactMessageView {
    fn from(message: ContactMessage) -> Self {
        let is_urgent = message.is_urgent();
        let response_time_hours = message.response_time_hours();
        Self {
            message,
            is_urgent,
            response_time_hours,
        }
    }
}

#[derive(Deserialize)]
pub struct MessageListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<MessageStatus>,
    pub inquiry_type: Option<InquiryType>,
    pub priority: Option<Priority>,
    pub responded: Option<bool>,
    /// YYYY-MM-DD
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<ContactMessageView>,
    #[serde(flatten)]
    pub pagination: Pagination,
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

/// `GET /api/v1/company/contact/messages` — admin router.
pub async fn list_messages(
    State(ctx): State<ApiContext>,
    Query(query): Query<MessageListQuery>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let pages = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = ContactMessageFilter {
        status: query.status,
        inquiry_type: query.inquiry_type,
        priority: query.priority,
        responded: query.responded,
        date_from: query.date_from.as_deref().map(|d| parse_day(d, "date_from")).transpose()?,
        date_to: query.date_to.as_deref().map(|d| parse_day(d, "date_to")).transpose()?,
        search: query.search,
    };

    let conn = ctx.open_db()?;
    let page = repository::list_contact_messages(&conn, &filter, pages.page(), pages.per_page())?;

    Ok(Json(MessageListResponse {
        pagination: Pagination::new(page.total, pages.page(), pages.per_page()),
        messages: page.items.into_iter().map(Into::into).collect(),
    }))
}

/// `GET /api/v1/company/contact/messages/:id` — admin router. Viewing a
/// fresh message moves it to read.
pub async fn get_message(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactMessageView>, ApiError> {
    let conn = ctx.open_db()?;
    let mut message = repository::get_contact_message(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("Contact message not found".into()))?;

    if message.status == MessageStatus::New {
        message.mark_as_read(Utc::now());
        repository::update_contact_message(&conn, &message)?;
    }
    Ok(Json(message.into()))
}

/// Typed update for a contact message.
#[derive(Deserialize, Default)]
pub struct MessagePatch {
    pub status: Option<MessageStatus>,
    pub priority: Option<Priority>,
    pub response_message: Option<String>,
}

/// `PUT /api/v1/company/contact/messages/:id` — admin router. A response
/// stamps `responded_at` at most once.
pub async fn update_message(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<MessagePatch>,
) -> Result<Json<ContactMessageView>, ApiError> {
    let conn = ctx.open_db()?;
    let mut message = repository::get_contact_message(&conn, &id)?
        .ok_or_else(|| ApiError::NotFound("Contact message not found".into()))?;

    let now = Utc::now();
    if let Some(response) = patch.response_message {
        message.respond(response, current.0.full_name(), now);
    }
    if let Some(status) = patch.status {
        message.status = status;
        message.updated_at = now;
    }
    if let Some(priority) = patch.priority {
        message.priority = priority;
        message.updated_at = now;
    }
    repository::update_contact_message(&conn, &message)?;

    Ok(Json(message.into()))
}

/// `DELETE /api/v1/company/contact/messages/:id` — admin router.
pub async fn delete_message(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.open_db()?;
    repository::delete_contact_message(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/company/contact/stats` — admin router.
pub async fn contact_stats(
    State(ctx): State<ApiContext>,
) -> Result<Json<ContactStats>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(repository::contact_stats(&conn, Utc::now())?))
}
