//! Authentication endpoints: register, login, token refresh and account
//! self-service.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, CurrentUser};
use crate::auth::{self, jwt, TokenPair, TokenType};
use crate::db::repository;
use crate::models::enums::UserRole;
use crate::models::User;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone_number: user.phone_number.clone(),
            role: user.role,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserView,
    pub tokens: TokenPair,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let ok = (3..=50).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Username must be 3-50 characters of letters, digits, '_' or '-'".into(),
        ))
    }
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    let well_formed = email.len() <= 255
        && email.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::Validation(format!("Invalid email address: {email}")))
    }
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() >= 8 {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ))
    }
}

/// `POST /api/v1/auth/register` — create an account and log it in.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validate_username(&body.username)?;
    validate_email(&body.email)?;
    validate_password(&body.password)?;

    let conn = ctx.open_db()?;
    if repository::username_exists(&conn, &body.username)? {
        return Err(ApiError::Conflict("Username already registered".into()));
    }
    if repository::email_exists(&conn, &body.email)? {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: body.username,
        email: body.email,
        password_hash: auth::hash_password(&body.password)?,
        first_name: body.first_name,
        last_name: body.last_name,
        phone_number: body.phone_number,
        role: UserRole::User,
        is_active: true,
        // Email verification happens out of band.
        is_verified: false,
        created_at: now,
        updated_at: now,
        last_login: Some(now),
    };
    repository::insert_user(&conn, &user)?;

    let tokens = jwt::generate_token_pair(&user.id, &user.username, &ctx.config.auth)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: (&user).into(),
            tokens,
        }),
    ))
}

/// `POST /api/v1/auth/login` — authenticate by username or email.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let conn = ctx.open_db()?;

    // Unknown identifier, wrong password and deactivated account all
    // produce the same generic 401.
    let user = match repository::get_user_by_identifier(&conn, &body.username)? {
        Some(user) if auth::verify_password(&body.password, &user.password_hash) => user,
        _ => return Err(ApiError::Unauthorized),
    };
    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }

    let now = Utc::now();
    repository::touch_last_login(&conn, &user.id, now)?;

    let tokens = jwt::generate_token_pair(&user.id, &user.username, &ctx.config.auth)?;
    Ok(Json(AuthResponse {
        user: (&user).into(),
        tokens,
    }))
}

/// `POST /api/v1/auth/refresh` — exchange a refresh token for a new pair.
pub async fn refresh(
    State(ctx): State<ApiContext>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let claims = auth::verify_token(&body.refresh_token, TokenType::Refresh, &ctx.config.auth)
        .map_err(|_| ApiError::Unauthorized)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

    let conn = ctx.open_db()?;
    let user = repository::get_user(&conn, &user_id)?.ok_or(ApiError::Unauthorized)?;
    if !user.is_active {
        return Err(ApiError::Unauthorized);
    }

    let tokens = jwt::generate_token_pair(&user.id, &user.username, &ctx.config.auth)?;
    Ok(Json(tokens))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// `POST /api/v1/auth/logout` — stateless tokens, logout is client-side.
pub async fn logout(Extension(_current): Extension<CurrentUser>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Successfully logged out",
    })
}

/// `GET /api/v1/auth/me` — the authenticated account.
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<UserView> {
    Json((&current.0).into())
}

/// `PUT /api/v1/auth/change-password`.
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !auth::verify_password(&body.current_password, &current.0.password_hash) {
        return Err(ApiError::BusinessRule("Incorrect current password".into()));
    }
    validate_password(&body.new_password)?;

    let conn = ctx.open_db()?;
    let hash = auth::hash_password(&body.new_password)?;
    repository::update_password_hash(&conn, &current.0.id, &hash, Utc::now())?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[derive(Serialize)]
pub struct TokenStatusResponse {
    pub valid: bool,
    pub user_id: String,
    pub username: String,
    pub expires_at: i64,
}

/// `GET /api/v1/auth/verify-token` — echo the validated claims.
pub async fn verify_token(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
) -> Result<Json<TokenStatusResponse>, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    let claims = auth::verify_token(token, TokenType::Access, &ctx.config.auth)
        .map_err(|_| ApiError::Unauthorized)?;

    Ok(Json(TokenStatusResponse {
        valid: true,
        user_id: claims.sub,
        username: claims.username,
        expires_at: claims.exp,
    }))
}
