pub mod booking;
pub mod company;
pub mod enums;
pub mod lab_test;
pub mod report;
pub mod user;

pub use booking::Booking;
pub use company::{Company, ContactMessage};
pub use lab_test::LabTest;
pub use report::Report;
pub use user::User;

use thiserror::Error;

/// Business-rule violations raised by the domain entities themselves,
/// independent of persistence or transport.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Booking cannot be cancelled")]
    NotCancellable,

    #[error("Patient age {age} is not within allowed range ({min}-{max}) for this test")]
    AgeNotEligible { age: i64, min: i64, max: i64 },

    #[error("Home collection is not available for this test")]
    HomeCollectionUnavailable,

    #[error("Appointment date must be in the future")]
    AppointmentInPast,

    #[error("Only pending or cancelled reports can be deleted")]
    ReportNotDeletable,
}
