//! API endpoint handlers, one module per resource.

pub mod auth;
pub mod bookings;
pub mod company;
pub mod health;
pub mod reports;

use axum::Extension;

use crate::api::error::ApiError;
use crate::api::types::CurrentUser;
use crate::models::User;

/// Admin check for routes that share a path with public methods and
/// therefore sit behind the optional-auth layer instead of the admin gate.
pub(crate) fn require_admin_caller(
    caller: Option<&Extension<CurrentUser>>,
) -> Result<&User, ApiError> {
    match caller {
        Some(Extension(CurrentUser(user))) if user.is_admin() => Ok(user),
        Some(_) => Err(ApiError::Forbidden("Not enough permissions".into())),
        None => Err(ApiError::Unauthorized),
    }
}

pub(crate) fn is_admin_caller(caller: Option<&Extension<CurrentUser>>) -> bool {
    matches!(caller, Some(Extension(CurrentUser(user))) if user.is_admin())
}
