use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BookingStatus;
use super::DomainError;

/// A scheduled lab-test appointment tied to a user and a catalog test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub booking_reference: String,
    pub patient_name: String,
    pub patient_age: i64,
    pub patient_gender: String,
    pub appointment_date: DateTime<Utc>,
    pub home_collection: bool,
    pub address: Option<String>,
    pub phone_number: String,
    pub special_instructions: Option<String>,
    pub status: BookingStatus,
    pub admin_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BookingStatus {
    /// Legal outgoing edges. Cancelled, completed and no_show are terminal.
    pub fn allowed_transitions(self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Pending => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
            BookingStatus::Confirmed => &[
                BookingStatus::Completed,
                BookingStatus::Cancelled,
                BookingStatus::NoShow,
            ],
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl Booking {
    /// Generate a booking reference: `BK` + 6 random A-Z/0-9 characters.
    ///
    /// Uniqueness is enforced by the database; callers retry with a fresh
    /// reference on a unique-constraint violation.
    pub fn generate_reference() -> String {
        const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        let suffix: String = (0..6)
            .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
            .collect();
        format!("BK{suffix}")
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.appointment_date > now
            && matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Cancellable only while pending/confirmed and still in the future.
    pub fn is_cancellable(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
            && self.is_upcoming(now)
    }

    pub fn is_modifiable(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.is_upcoming(now)
    }

    /// Move to `next` if the edge exists in the transition table, stamping
    /// `cancelled_at`/`completed_at` on the transitions that produce them.
    /// On an illegal edge the status is left untouched.
    pub fn transition_to(
        &mut self,
        next: BookingStatus,
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
            BookingStatus::Cancelled => self.cancelled_at = Some(now),
            BookingStatus::Completed => self.completed_at = Some(now),
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    /// User-facing cancellation: checks the cancellation rule (not just the
    /// transition table) and records the reason.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.is_cancellable(now) {
            return Err(DomainError::NotCancellable);
        }
        self.cancellation_reason = reason;
        self.transition_to(BookingStatus::Cancelled, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn booking_with(status: BookingStatus, appointment: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            test_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            booking_reference: Booking::generate_reference(),
            patient_name: "Test Patient".into(),
            patient_age: 30,
            patient_gender: "female".into(),
            appointment_date: appointment,
            home_collection: false,
            address: None,
            phone_number: "+911234567890".into(),
            special_instructions: None,
            status,
            admin_notes: None,
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            cancelled_at: None,
            completed_at: None,
        }
    }

    const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    #[test]
    fn reference_matches_pattern() {
        for _ in 0..50 {
            let reference = Booking::generate_reference();
            assert_eq!(reference.len(), 8);
            assert!(reference.starts_with("BK"));
            assert!(reference[2..]
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn every_illegal_edge_fails_and_leaves_status_unchanged() {
        let now = Utc::now();
        let future = now + Duration::days(1);

        for from in ALL {
            for to in ALL {
                let mut booking = booking_with(from, future);
                let result = booking.transition_to(to, now);
                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from} -> {to} should be legal");
                    assert_eq!(booking.status, to);
                } else {
                    let err = result.unwrap_err();
                    assert_eq!(
                        err,
                        DomainError::InvalidTransition {
                            from: from.to_string(),
                            to: to.to_string(),
                        }
                    );
                    assert_eq!(booking.status, from, "{from} -> {to} must not mutate");
                }
            }
        }
    }

    #[test]
    fn transition_table_matches_design() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(NoShow));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Confirmed.can_transition_to(Pending));
        for terminal in [Cancelled, Completed, NoShow] {
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn completion_stamps_completed_at() {
        let now = Utc::now();
        let mut booking = booking_with(BookingStatus::Confirmed, now + Duration::hours(2));
        booking.transition_to(BookingStatus::Completed, now).unwrap();
        assert_eq!(booking.completed_at, Some(now));
        assert!(booking.cancelled_at.is_none());
    }

    #[test]
    fn cancel_records_reason_and_timestamp() {
        let now = Utc::now();
        let mut booking = booking_with(BookingStatus::Pending, now + Duration::days(2));
        booking.cancel(Some("travelling".into()), now).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancelled_at, Some(now));
        assert_eq!(booking.cancellation_reason.as_deref(), Some("travelling"));
    }

    #[test]
    fn cancel_fails_for_past_appointment() {
        let now = Utc::now();
        let mut booking = booking_with(BookingStatus::Confirmed, now - Duration::hours(1));
        assert_eq!(booking.cancel(None, now), Err(DomainError::NotCancellable));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.cancelled_at.is_none());
    }

    #[test]
    fn cancel_fails_from_terminal_status() {
        let now = Utc::now();
        let future = now + Duration::days(1);
        for status in [
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::NoShow,
        ] {
            let mut booking = booking_with(status, future);
            assert_eq!(booking.cancel(None, now), Err(DomainError::NotCancellable));
            assert!(booking.cancelled_at.is_none());
        }
    }

    #[test]
    fn upcoming_requires_future_and_open_status() {
        let now = Utc::now();
        assert!(booking_with(BookingStatus::Pending, now + Duration::hours(1)).is_upcoming(now));
        assert!(!booking_with(BookingStatus::Pending, now - Duration::hours(1)).is_upcoming(now));
        assert!(!booking_with(BookingStatus::Completed, now + Duration::hours(1)).is_upcoming(now));
    }
}
