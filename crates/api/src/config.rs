use std::path::PathBuf;
use std::time::Duration;

use studyplan_db::bootstrap::BootstrapConfig;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL and JWT secret have defaults suitable
/// for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Database initialization attempts before giving up (default: `5`).
    pub db_connect_attempts: u32,
    /// Pause between initialization attempts in seconds (default: `5`).
    pub db_retry_delay_secs: u64,
    /// Study plan JSON file. `None` uses the built-in plan.
    pub study_plan_path: Option<PathBuf>,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `DATABASE_URL`         | **required**               |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `DB_CONNECT_ATTEMPTS`  | `5`                        |
    /// | `DB_RETRY_DELAY_SECS`  | `5`                        |
    /// | `STUDY_PLAN_PATH`      | unset (built-in plan)      |
    ///
    /// # Panics
    ///
    /// Panics on a missing `DATABASE_URL` or an unparseable numeric value.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let db_connect_attempts: u32 = std::env::var("DB_CONNECT_ATTEMPTS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("DB_CONNECT_ATTEMPTS must be a valid u32");

        let db_retry_delay_secs: u64 = std::env::var("DB_RETRY_DELAY_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("DB_RETRY_DELAY_SECS must be a valid u64");

        let study_plan_path = std::env::var("STUDY_PLAN_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            database_url,
            cors_origins,
            request_timeout_secs,
            db_connect_attempts,
            db_retry_delay_secs,
            study_plan_path,
            jwt,
        }
    }

    pub fn bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            max_attempts: self.db_connect_attempts,
            retry_delay: Duration::from_secs(self.db_retry_delay_secs),
        }
    }
}
