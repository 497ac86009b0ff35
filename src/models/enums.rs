use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(UserRole {
    Admin => "admin",
    User => "user",
    LabTechnician => "lab_technician",
});

str_enum!(BookingStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
    NoShow => "no_show",
});

str_enum!(ReportStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
    Reviewed => "reviewed",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

str_enum!(PaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Refunded => "refunded",
});

str_enum!(Priority {
    Urgent => "urgent",
    High => "high",
    Normal => "normal",
    Low => "low",
});

str_enum!(MessageStatus {
    New => "new",
    Read => "read",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

str_enum!(InquiryType {
    General => "general",
    TestInquiry => "test_inquiry",
    ReportQuery => "report_query",
    Complaint => "complaint",
    Support => "support",
    Feedback => "feedback",
});
