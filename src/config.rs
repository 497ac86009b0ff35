use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "VitaLab API";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const API_PREFIX: &str = "/api/v1";

/// Explicit runtime configuration, built once at startup from the
/// environment and passed by reference to the components that need it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub environment: String,
    pub rate_limiting_enabled: bool,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
}

/// Where report files live. S3 is selected when credentials are present,
/// a local directory otherwise.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        prefix: String,
    },
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Read configuration from the environment. `.env` loading is the
    /// caller's job (main does it via dotenvy before this runs).
    pub fn from_env() -> Self {
        let environment = env_or("ENVIRONMENT", "development");
        let rate_limiting_enabled = match env::var("RATE_LIMITING_ENABLED") {
            Ok(value) => value == "1" || value.eq_ignore_ascii_case("true"),
            Err(_) => environment != "development",
        };

        let cors_origins = env::var("BACKEND_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let storage = match (
            env::var("AWS_ACCESS_KEY_ID"),
            env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(access_key_id), Ok(secret_access_key)) => StorageConfig::S3 {
                bucket: env_or("S3_BUCKET_NAME", "vitalab-reports"),
                region: env_or("AWS_REGION", "us-east-1"),
                access_key_id,
                secret_access_key,
                prefix: env_or("S3_REPORTS_PREFIX", "lab-reports/"),
            },
            _ => StorageConfig::Local {
                root: PathBuf::from(env_or("UPLOAD_DIR", "./uploads")),
            },
        };

        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8000")
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8000))),
            database_path: PathBuf::from(env_or("DATABASE_PATH", "./vitalab.db")),
            environment,
            rate_limiting_enabled,
            cors_origins,
            max_upload_bytes: env_or("MAX_FILE_SIZE", "10485760")
                .parse()
                .unwrap_or(10 * 1024 * 1024),
            auth: AuthConfig {
                secret_key: env_or(
                    "SECRET_KEY",
                    "development_secret_key_change_in_production",
                ),
                access_token_expire_minutes: env_or("ACCESS_TOKEN_EXPIRE_MINUTES", "30")
                    .parse()
                    .unwrap_or(30),
                refresh_token_expire_days: env_or("REFRESH_TOKEN_EXPIRE_DAYS", "7")
                    .parse()
                    .unwrap_or(7),
            },
            storage,
        }
    }
}
