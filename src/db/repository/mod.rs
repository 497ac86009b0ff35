use std::str::FromStr;

use uuid::Uuid;

use super::DatabaseError;

pub mod booking;
pub mod company;
pub mod contact_message;
pub mod report;
pub mod user;

pub use booking::*;
pub use company::*;
pub use contact_message::*;
pub use lab_test::*;
pub use report::*;
pub use user::*;

/// Page of rows plus the unpaginated total, for list endpoints.
#[derive(Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
}

fn parse_uuid(idx: usize, value: String) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_enum<T>(idx: usize, value: String) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = DatabaseError>,
{
    T::from_str(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
