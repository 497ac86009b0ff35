use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::AuthConfig;

/// Declared purpose of a token. An access token presented where a refresh
/// token is required (or vice versa) is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Expiry as unix seconds.
    pub exp: i64,
}

/// The pair handed out on register/login/refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

fn create_token(
    user_id: &Uuid,
    username: &str,
    token_type: TokenType,
    lifetime: Duration,
    secret: &str,
) -> Result<String, AuthError> {
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        token_type,
        exp: (Utc::now() + lifetime).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Encode)
}

pub fn create_access_token(
    user_id: &Uuid,
    username: &str,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    create_token(
        user_id,
        username,
        TokenType::Access,
        Duration::minutes(config.access_token_expire_minutes),
        &config.secret_key,
    )
}

pub fn create_refresh_token(
    user_id: &Uuid,
    username: &str,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    create_token(
        user_id,
        username,
        TokenType::Refresh,
        Duration::days(config.refresh_token_expire_days),
        &config.secret_key,
    )
}

pub fn generate_token_pair(
    user_id: &Uuid,
    username: &str,
    config: &AuthConfig,
) -> Result<TokenPair, AuthError> {
    Ok(TokenPair {
        access_token: create_access_token(user_id, username, config)?,
        refresh_token: create_refresh_token(user_id, username, config)?,
        token_type: "bearer".into(),
        expires_in: config.access_token_expire_minutes * 60,
    })
}

/// Verify signature, expiry and declared type. Every failure mode maps to
/// the same `InvalidToken` to avoid leaking which check tripped.
pub fn verify_token(
    token: &str,
    expected: TokenType,
    config: &AuthConfig,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthError::InvalidToken)?;

    if data.claims.token_type != expected {
        return Err(AuthError::InvalidToken);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret_key: "unit-test-secret".into(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
        }
    }

    #[test]
    fn pair_round_trips() {
        let config = config();
        let user_id = Uuid::new_v4();
        let pair = generate_token_pair(&user_id, "alice", &config).unwrap();
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.expires_in, 30 * 60);

        let access = verify_token(&pair.access_token, TokenType::Access, &config).unwrap();
        assert_eq!(access.sub, user_id.to_string());
        assert_eq!(access.username, "alice");

        let refresh = verify_token(&pair.refresh_token, TokenType::Refresh, &config).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
    }

    #[test]
    fn type_confusion_is_rejected() {
        let config = config();
        let pair = generate_token_pair(&Uuid::new_v4(), "alice", &config).unwrap();
        assert!(verify_token(&pair.access_token, TokenType::Refresh, &config).is_err());
        assert!(verify_token(&pair.refresh_token, TokenType::Access, &config).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = config();
        let token = create_token(
            &Uuid::new_v4(),
            "alice",
            TokenType::Access,
            Duration::minutes(-5),
            &config.secret_key,
        )
        .unwrap();
        assert!(verify_token(&token, TokenType::Access, &config).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = config();
        let pair = generate_token_pair(&Uuid::new_v4(), "alice", &config).unwrap();
        let other = AuthConfig {
            secret_key: "another-secret".into(),
            ..config
        };
        assert!(verify_token(&pair.access_token, TokenType::Access, &other).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_token("not-a-jwt", TokenType::Access, &config()).is_err());
    }
}
