use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{InquiryType, MessageStatus, Priority};

/// Organization profile. One row per deployment, updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
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
    pub country: String,
    pub established_year: Option<i64>,
    pub license_number: Option<String>,
    pub accreditation: Option<String>,
    pub services: Vec<String>,
    pub specializations: Vec<String>,
    pub certifications: Vec<String>,
    pub operating_hours: Option<serde_json::Value>,
    pub emergency_contact: Option<String>,
    pub is_24x7: bool,
    pub accepts_home_collection: bool,
    pub home_collection_radius_km: Option<i64>,
    pub minimum_order_amount: i64,
    pub logo_url: Option<String>,
    pub tagline: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn full_address(&self) -> String {
        [
            self.address_line1.as_deref(),
            self.address_line2.as_deref(),
            self.city.as_deref(),
            self.state.as_deref(),
            self.postal_code.as_deref(),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ")
    }

    pub fn is_within_service_area(&self, distance_km: i64) -> bool {
        self.accepts_home_collection && distance_km <= self.home_collection_radius_km.unwrap_or(25)
    }
}

/// Inbound inquiry submitted through the public contact form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub inquiry_type: InquiryType,
    pub status: MessageStatus,
    pub priority: Priority,
    pub source: Option<String>,
    pub response_message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub responded_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactMessage {
    /// Complaints and support requests jump the queue.
    pub fn priority_for(inquiry_type: InquiryType) -> Priority {
        match inquiry_type {
            InquiryType::Complaint | InquiryType::Support => Priority::High,
            _ => Priority::Normal,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self.priority, Priority::Urgent | Priority::High)
    }

    /// First admin view moves a fresh message to read.
    pub fn mark_as_read(&mut self, now: DateTime<Utc>) {
        if self.status == MessageStatus::New {
            self.status = MessageStatus::Read;
            self.updated_at = now;
        }
    }

    /// Record a response. `responded_at` is stamped at most once; later
    /// responses update the text but keep the original timestamp.
    pub fn respond(&mut self, message: String, by: String, now: DateTime<Utc>) {
        self.response_message = Some(message);
        if self.responded_at.is_none() {
            self.responded_at = Some(now);
            self.responded_by = Some(by);
        }
        self.updated_at = now;
    }

    pub fn response_time_hours(&self) -> Option<f64> {
        self.responded_at
            .map(|at| (at - self.created_at).num_seconds() as f64 / 3600.0)
    }
}
