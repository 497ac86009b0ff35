//! Report endpoints: CRUD over the report lifecycle plus file upload,
//! download and sharing against the object store.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser, PageParams, Pagination};
use crate::db::repository::{self, ReportFilter, ReportStats};
use crate::models::enums::{PaymentStatus, Priority, ReportStatus};
use crate::models::{DomainError, Report, User};

const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(3600);

/// MIME types accepted for report files, with their canonical extension.
const ALLOWED_FILE_TYPES: &[(&str, &str)] = &[
    ("application/pdf", ".pdf"),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/gif", ".gif"),
];

/// A report with its derived fields, as clients see it.
#[derive(Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub can_be_downloaded: bool,
    pub amount_in_rupees: f64,
    pub turnaround_time_hours: Option<f64>,
}

impl From<Report> for ReportView {
    fn from(report: Report) -> Self {
        let can_be_downloaded = report.can_be_downloaded();
        let amount_in_rupees = report.amount_in_rupees();
        let turnaround_time_hours = report
            .turnaround()
            .map(|d| d.num_seconds() as f64 / 3600.0);
        Self {
            report,
            can_be_downloaded,
            amount_in_rupees,
            turnaround_time_hours,
        }
    }
}

fn owner_scope(user: &User) -> Option<Uuid> {
    if user.is_admin() {
        None
    } else {
        Some(user.id)
    }
}

#[derive(Deserialize)]
pub struct ReportListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<ReportStatus>,
    pub lab_test_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub priority: Option<Priority>,
    pub is_verified: Option<bool>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<ReportView>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// `GET /api/v1/reports` — own reports; admins see everyone's.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<ReportListResponse>, ApiError> {
    let pages = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = ReportFilter {
        user_id: owner_scope(&current.0),
        lab_test_id: query.lab_test_id,
        status: query.status,
        payment_status: query.payment_status,
        priority: query.priority,
        is_verified: query.is_verified,
        date_from: query.date_from,
        date_to: query.date_to,
        search: query.search,
    };

    let conn = ctx.open_db()?;
    let page = repository::list_reports(&conn, &filter, pages.page(), pages.per_page())?;

    Ok(Json(ReportListResponse {
        pagination: Pagination::new(page.total, pages.page(), pages.per_page()),
        reports: page.items.into_iter().map(Into::into).collect(),
    }))
}

/// `GET /api/v1/reports/:id`.
pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportView>, ApiError> {
    let conn = ctx.open_db()?;
    let report = repository::get_report(&conn, &id, owner_scope(&current.0).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;
    Ok(Json(report.into()))
}

#[derive(Deserialize)]
pub struct ReportCreate {
    pub lab_test_id: Uuid,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub collection_location: Option<String>,
    pub collection_notes: Option<String>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
}

/// `POST /api/v1/reports` — open a report for a catalog test. The amount
/// charged is captured from the catalog price at creation time.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ReportCreate>,
) -> Result<(StatusCode, Json<ReportView>), ApiError> {
    let conn = ctx.open_db()?;
    let test = match repository::get_lab_test(&conn, &body.lab_test_id)? {
        Some(test) if test.is_active => test,
        _ => return Err(ApiError::NotFound("Lab test not found or inactive".into())),
    };

    let now = Utc::now();
    let report = Report {
        id: Uuid::new_v4(),
        user_id: current.0.id,
        lab_test_id: test.id,
        report_number: Report::generate_report_number(now),
        status: ReportStatus::Pending,
        scheduled_at: body.scheduled_at,
        collected_at: None,
        tested_at: None,
        reviewed_at: None,
        delivered_at: None,
        sample_collected_by: None,
        collection_location: body.collection_location,
        collection_notes: body.collection_notes,
        results: None,
        observations: None,
        recommendations: None,
        file_path: None,
        file_original_name: None,
        file_size: None,
        file_type: None,
        is_shared: false,
        shared_at: None,
        shared_with: None,
        is_verified: false,
        verified_by: None,
        verified_at: None,
        amount_charged: Some(test.price_minor_units()),
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        notes: body.notes,
        priority: body.priority.unwrap_or(Priority::Normal),
        created_at: now,
        updated_at: now,
    };
    repository::insert_report(&conn, &report)?;

    Ok((StatusCode::CREATED, Json(report.into())))
}

/// Typed partial update. Status changes go through the lifecycle method
/// and are reserved to staff; everything else is plain data entry.
#[derive(Deserialize, Default)]
pub struct ReportPatch {
    pub status: Option<ReportStatus>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub sample_collected_by: Option<String>,
    pub collection_location: Option<String>,
    pub collection_notes: Option<String>,
    pub results: Option<String>,
    pub observations: Option<String>,
    pub recommendations: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<Priority>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<String>,
    pub is_verified: Option<bool>,
    pub verified_by: Option<String>,
}

/// `PUT /api/v1/reports/:id`.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ReportPatch>,
) -> Result<Json<ReportView>, ApiError> {
    let conn = ctx.open_db()?;
    let mut report = repository::get_report(&conn, &id, owner_scope(&current.0).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    let now = Utc::now();
    if let Some(status) = patch.status {
        if !current.0.is_staff() {
            return Err(ApiError::Forbidden(
                "Only lab staff can change report status".into(),
            ));
        }
        report.set_status(status, now)?;
    }
    if let Some(scheduled_at) = patch.scheduled_at {
        report.scheduled_at = Some(scheduled_at);
    }
    if let Some(collected_at) = patch.collected_at {
        report.collected_at = Some(collected_at);
    }
    if let Some(sample_collected_by) = patch.sample_collected_by {
        report.sample_collected_by = Some(sample_collected_by);
    }
    if let Some(collection_location) = patch.collection_location {
        report.collection_location = Some(collection_location);
    }
    if let Some(collection_notes) = patch.collection_notes {
        report.collection_notes = Some(collection_notes);
    }
    if let Some(results) = patch.results {
        report.results = Some(results);
    }
    if let Some(observations) = patch.observations {
        report.observations = Some(observations);
    }
    if let Some(recommendations) = patch.recommendations {
        report.recommendations = Some(recommendations);
    }
    if let Some(notes) = patch.notes {
        report.notes = Some(notes);
    }
    if let Some(priority) = patch.priority {
        report.priority = priority;
    }
    if let Some(payment_status) = patch.payment_status {
        report.payment_status = payment_status;
    }
    if let Some(payment_reference) = patch.payment_reference {
        report.payment_reference = Some(payment_reference);
    }
    if let Some(is_verified) = patch.is_verified {
        if is_verified && !report.is_verified {
            report.verified_at = Some(now);
            report.verified_by = Some(current.0.full_name());
        }
        report.is_verified = is_verified;
    }
    if let Some(verified_by) = patch.verified_by {
        report.verified_by = Some(verified_by);
    }
    report.updated_at = now;
    repository::update_report(&conn, &report)?;

    Ok(Json(report.into()))
}

/// `DELETE /api/v1/reports/:id` — only pending/cancelled reports. The
/// attached file is removed best-effort; a storage failure is logged and
/// does not fail the delete.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.open_db()?;
    let report = repository::get_report(&conn, &id, owner_scope(&current.0).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    if !report.can_be_deleted() {
        return Err(DomainError::ReportNotDeletable.into());
    }

    if let Some(file_path) = &report.file_path {
        if let Err(err) = ctx.store.delete(file_path).await {
            tracing::warn!(file_path, error = %err, "failed to delete report file");
        }
    }
    repository::delete_report(&conn, &report.id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/reports/:id/upload` — staff router. Accepts one
/// `file` multipart field (PDF or image), stores it and completes a
/// pending report.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ReportView>, ApiError> {
    let conn = ctx.open_db()?;
    let mut report = repository::get_report(&conn, &id, None)?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    let mut upload: Option<(String, String, bytes::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("report").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read upload: {e}")))?;
            upload = Some((file_name, content_type, data));
        }
    }
    let (file_name, content_type, data) =
        upload.ok_or_else(|| ApiError::Validation("Missing 'file' field".into()))?;

    let extension = ALLOWED_FILE_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            ApiError::Validation(format!(
                "File type {content_type} not supported. Allowed types: PDF, JPEG, PNG, GIF"
            ))
        })?;

    if data.len() > ctx.config.max_upload_bytes {
        return Err(ApiError::Validation(format!(
            "File size exceeds {} byte limit",
            ctx.config.max_upload_bytes
        )));
    }

    let key = ctx.store.object_key(&report.report_number, extension);
    ctx.store.put(&key, data.clone()).await?;

    // Superseded file cleanup is best-effort.
    if let Some(old_path) = &report.file_path {
        if let Err(err) = ctx.store.delete(old_path).await {
            tracing::warn!(old_path, error = %err, "failed to delete superseded file");
        }
    }

    let now = Utc::now();
    report.file_path = Some(key);
    report.file_original_name = Some(file_name);
    report.file_size = Some(data.len() as i64);
    report.file_type = Some(content_type);
    if report.status == ReportStatus::Pending {
        report.set_status(ReportStatus::Completed, now)?;
    }
    report.updated_at = now;
    repository::update_report(&conn, &report)?;

    Ok(Json(report.into()))
}

#[derive(Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub file_name: String,
    pub file_size: i64,
}

/// `GET /api/v1/reports/:id/download` — time-limited read URL.
pub async fn download(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let report = repository::get_report(&conn, &id, owner_scope(&current.0).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    if !report.can_be_downloaded() {
        return Err(ApiError::BusinessRule(
            "Report file is not available for download".into(),
        ));
    }
    let file_path = report
        .file_path
        .as_deref()
        .expect("can_be_downloaded implies a file");

    let download_url = ctx.store.presign_get(file_path, DOWNLOAD_URL_TTL).await?;

    Ok(Json(DownloadResponse {
        download_url,
        expires_at: Utc::now() + chrono::Duration::hours(1),
        file_name: report
            .file_original_name
            .clone()
            .unwrap_or_else(|| format!("report_{}.pdf", report.report_number)),
        file_size: report.file_size.unwrap_or(0),
    }))
}

#[derive(Deserialize)]
pub struct ShareRequest {
    pub shared_with: Vec<String>,
}

/// `POST /api/v1/reports/:id/share` — record who a finished report was
/// shared with.
pub async fn share(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<ShareRequest>,
) -> Result<Json<ReportView>, ApiError> {
    if body.shared_with.is_empty() {
        return Err(ApiError::Validation("shared_with must not be empty".into()));
    }
    if body.shared_with.iter().any(|email| !email.contains('@')) {
        return Err(ApiError::Validation(
            "shared_with must contain email addresses".into(),
        ));
    }

    let conn = ctx.open_db()?;
    let mut report = repository::get_report(&conn, &id, owner_scope(&current.0).as_ref())?
        .ok_or_else(|| ApiError::NotFound("Report not found".into()))?;

    if !report.can_be_downloaded() {
        return Err(ApiError::BusinessRule("Report is not ready for sharing".into()));
    }

    let now = Utc::now();
    report.is_shared = true;
    report.shared_at = Some(now);
    report.shared_with = Some(
        serde_json::to_string(&body.shared_with)
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );
    report.updated_at = now;
    repository::update_report(&conn, &report)?;

    Ok(Json(report.into()))
}

/// `GET /api/v1/reports/stats/overview` — own stats; global for admins.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ReportStats>, ApiError> {
    let conn = ctx.open_db()?;
    let stats = repository::report_stats(&conn, owner_scope(&current.0).as_ref())?;
    Ok(Json(stats))
}
