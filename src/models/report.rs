use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PaymentStatus, Priority, ReportStatus};
use super::DomainError;

/// The result artifact for a performed test, optionally carrying an
/// uploaded file stored in the object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lab_test_id: Uuid,
    pub report_number: String,
    pub status: ReportStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub collected_at: Option<DateTime<Utc>>,
    pub tested_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub sample_collected_by: Option<String>,
    pub collection_location: Option<String>,
    pub collection_notes: Option<String>,
    pub results: Option<String>,
    pub observations: Option<String>,
    pub recommendations: Option<String>,
    pub file_path: Option<String>,
    pub file_original_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub is_shared: bool,
    pub shared_at: Option<DateTime<Utc>>,
    pub shared_with: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    /// Amount in minor currency units (paisa).
    pub amount_charged: Option<i64>,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportStatus {
    /// Position in the forward chain. Cancelled sits outside the chain.
    fn rank(self) -> Option<u8> {
        match self {
            ReportStatus::Pending => Some(0),
            ReportStatus::InProgress => Some(1),
            ReportStatus::Completed => Some(2),
            ReportStatus::Reviewed => Some(3),
            ReportStatus::Delivered => Some(4),
            ReportStatus::Cancelled => None,
        }
    }

    /// Forward moves along the chain are legal (skips included);
    /// cancellation only from pending; delivered and cancelled are terminal.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        if next == ReportStatus::Cancelled {
            return self == ReportStatus::Pending;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl Report {
    /// Report numbers look like `RPT20260807A1B2C3D4`.
    pub fn generate_report_number(now: DateTime<Utc>) -> String {
        format!(
            "RPT{}{:08X}",
            now.format("%Y%m%d"),
            rand::random::<u32>()
        )
    }

    pub fn is_completed(&self) -> bool {
        matches!(
            self.status,
            ReportStatus::Completed | ReportStatus::Reviewed | ReportStatus::Delivered
        )
    }

    /// Downloadable iff a file is attached and the result is at least completed.
    pub fn can_be_downloaded(&self) -> bool {
        self.file_path.is_some() && self.is_completed()
    }

    /// Reports with work in flight or finished results must be kept.
    pub fn can_be_deleted(&self) -> bool {
        matches!(self.status, ReportStatus::Pending | ReportStatus::Cancelled)
    }

    pub fn turnaround(&self) -> Option<chrono::Duration> {
        match (self.collected_at, self.delivered_at) {
            (Some(collected), Some(delivered)) => Some(delivered - collected),
            _ => None,
        }
    }

    pub fn amount_in_rupees(&self) -> f64 {
        self.amount_charged.unwrap_or(0) as f64 / 100.0
    }

    /// Advance the lifecycle, stamping the timestamp that belongs to the
    /// target state. Regressions and moves out of terminal states fail and
    /// leave the report untouched.
    pub fn set_status(
        &mut self,
        next: ReportStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        match next {
            ReportStatus::Completed => self.tested_at = Some(now),
            ReportStatus::Reviewed => self.reviewed_at = Some(now),
            ReportStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(status: ReportStatus, file: Option<&str>) -> Report {
        Report {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            lab_test_id: Uuid::new_v4(),
            report_number: Report::generate_report_number(Utc::now()),
            status,
            scheduled_at: None,
            collected_at: None,
            tested_at: None,
            reviewed_at: None,
            delivered_at: None,
            sample_collected_by: None,
            collection_location: None,
            collection_notes: None,
            results: None,
            observations: None,
            recommendations: None,
            file_path: file.map(String::from),
            file_original_name: file.map(|_| "report.pdf".into()),
            file_size: file.map(|_| 1024),
            file_type: file.map(|_| "application/pdf".into()),
            is_shared: false,
            shared_at: None,
            shared_with: None,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            amount_charged: Some(50_000),
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            notes: None,
            priority: Priority::Normal,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const ALL: [ReportStatus; 6] = [
        ReportStatus::Pending,
        ReportStatus::InProgress,
        ReportStatus::Completed,
        ReportStatus::Reviewed,
        ReportStatus::Delivered,
        ReportStatus::Cancelled,
    ];

    #[test]
    fn report_number_shape() {
        let number = Report::generate_report_number(Utc::now());
        assert!(number.starts_with("RPT"));
        assert_eq!(number.len(), 3 + 8 + 8);
        assert!(number[3..11].chars().all(|c| c.is_ascii_digit()));
        assert!(number[11..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// Exhaustive table: downloadable iff file attached AND status is
    /// completed/reviewed/delivered.
    #[test]
    fn can_be_downloaded_exhaustive() {
        for status in ALL {
            for file in [None, Some("lab-reports/abc.pdf")] {
                let report = report_with(status, file);
                let expected = file.is_some()
                    && matches!(
                        status,
                        ReportStatus::Completed | ReportStatus::Reviewed | ReportStatus::Delivered
                    );
                assert_eq!(
                    report.can_be_downloaded(),
                    expected,
                    "status={status}, file={file:?}"
                );
            }
        }
    }

    #[test]
    fn forward_moves_allowed_including_skips() {
        let now = Utc::now();

        let mut report = report_with(ReportStatus::Pending, None);
        report.set_status(ReportStatus::InProgress, now).unwrap();
        report.set_status(ReportStatus::Completed, now).unwrap();
        report.set_status(ReportStatus::Reviewed, now).unwrap();
        report.set_status(ReportStatus::Delivered, now).unwrap();
        assert_eq!(report.tested_at, Some(now));
        assert_eq!(report.reviewed_at, Some(now));
        assert_eq!(report.delivered_at, Some(now));

        // File upload completes a pending report directly.
        let mut skipped = report_with(ReportStatus::Pending, None);
        skipped.set_status(ReportStatus::Completed, now).unwrap();
        assert_eq!(skipped.status, ReportStatus::Completed);
    }

    #[test]
    fn regressions_are_rejected() {
        let now = Utc::now();
        let mut report = report_with(ReportStatus::Reviewed, None);
        let err = report.set_status(ReportStatus::Pending, now).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: "reviewed".into(),
                to: "pending".into(),
            }
        );
        assert_eq!(report.status, ReportStatus::Reviewed);

        let mut delivered = report_with(ReportStatus::Delivered, None);
        assert!(delivered.set_status(ReportStatus::Reviewed, now).is_err());
        assert!(delivered.set_status(ReportStatus::Delivered, now).is_err());
    }

    #[test]
    fn cancellation_only_from_pending() {
        let now = Utc::now();
        let mut pending = report_with(ReportStatus::Pending, None);
        assert!(pending.set_status(ReportStatus::Cancelled, now).is_ok());

        for status in [
            ReportStatus::InProgress,
            ReportStatus::Completed,
            ReportStatus::Reviewed,
            ReportStatus::Delivered,
        ] {
            let mut report = report_with(status, None);
            assert!(report.set_status(ReportStatus::Cancelled, now).is_err());
        }

        // Cancelled is terminal.
        let mut cancelled = report_with(ReportStatus::Cancelled, None);
        assert!(cancelled.set_status(ReportStatus::Pending, now).is_err());
        assert!(cancelled.set_status(ReportStatus::Delivered, now).is_err());
    }

    #[test]
    fn deletable_only_while_pending_or_cancelled() {
        assert!(report_with(ReportStatus::Pending, None).can_be_deleted());
        assert!(report_with(ReportStatus::Cancelled, None).can_be_deleted());
        assert!(!report_with(ReportStatus::InProgress, None).can_be_deleted());
        assert!(!report_with(ReportStatus::Delivered, None).can_be_deleted());
    }

    #[test]
    fn turnaround_needs_both_timestamps() {
        let mut report = report_with(ReportStatus::Delivered, None);
        assert!(report.turnaround().is_none());
        let collected = Utc::now();
        report.collected_at = Some(collected);
        report.delivered_at = Some(collected + chrono::Duration::hours(12));
        assert_eq!(report.turnaround(), Some(chrono::Duration::hours(12)));
    }
}
