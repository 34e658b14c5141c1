use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Origins that are always allowed, regardless of environment configuration.
const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:3001"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Display-only address printed in the startup banner (LOCAL_IP).
    pub local_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Deduplicated allowed origins; `["*"]` when nothing is configured.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Directory the asset route serves files from.
    pub dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let server_host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid PORT".to_string()))?;
        let local_ip = env::var("LOCAL_IP").ok().filter(|s| !s.is_empty());

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid DB_PORT".to_string()))?;
        let db_username = env::var("DB_USERNAME")
            .map_err(|_| AppError::MissingEnvVar("DB_USERNAME".to_string()))?;
        let db_password = env::var("DB_PASSWORD")
            .map_err(|_| AppError::MissingEnvVar("DB_PASSWORD".to_string()))?;
        let db_name =
            env::var("DB_NAME").map_err(|_| AppError::MissingEnvVar("DB_NAME".to_string()))?;
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid DB_MAX_CONNECTIONS".to_string()))?;
        let db_acquire_timeout = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| {
                AppError::Configuration("Invalid DB_ACQUIRE_TIMEOUT_SECONDS".to_string())
            })?;

        // APP_ENV preferred; NODE_ENV kept as an alias for deployments that
        // still export it.
        let app_env = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let run_migrations =
            should_run_migrations(env::var("DB_RUN_MIGRATIONS").ok().as_deref(), &app_env);

        // CORS config: built-in defaults plus the deployment origin and any
        // comma-separated extras from CORS_ORIGIN.
        let mut default_origins: Vec<String> = DEFAULT_ALLOWED_ORIGINS
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Ok(public_origin) = env::var("PUBLIC_ORIGIN") {
            if !public_origin.trim().is_empty() {
                default_origins.push(public_origin.trim().to_string());
            }
        }
        let env_origins = parse_origin_list(&env::var("CORS_ORIGIN").unwrap_or_default());
        let allowed_origins = merge_origins(default_origins, env_origins);

        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        let config = Config {
            server: ServerConfig {
                host: server_host,
                port: server_port,
                local_ip,
            },
            database: DatabaseConfig {
                host: db_host,
                port: db_port,
                username: db_username,
                password: db_password,
                name: db_name,
                max_connections: db_max_connections,
                acquire_timeout_seconds: db_acquire_timeout,
                run_migrations,
            },
            cors: CorsConfig { allowed_origins },
            uploads: UploadsConfig {
                dir: PathBuf::from(upload_dir),
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Configuration(
                "PORT must be greater than 0".to_string(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Configuration(
                "DB_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }

        if self.database.acquire_timeout_seconds == 0 {
            return Err(AppError::Configuration(
                "DB_ACQUIRE_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.uploads.dir.as_os_str().is_empty() {
            return Err(AppError::Configuration(
                "UPLOAD_DIR must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Split a comma-separated origin list, trimming whitespace and dropping
/// empty entries.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Union the default and environment-supplied origins, deduplicated in
/// first-seen order. An empty result collapses to the `*` wildcard so the
/// gate never ends up rejecting everything by accident.
pub fn merge_origins(defaults: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(defaults.len() + extra.len());
    for origin in defaults.into_iter().chain(extra) {
        if !merged.contains(&origin) {
            merged.push(origin);
        }
    }
    if merged.is_empty() {
        merged.push("*".to_string());
    }
    merged
}

/// Decide whether migrations run on startup: an explicit DB_RUN_MIGRATIONS
/// literal wins, otherwise they run everywhere except production.
pub fn should_run_migrations(flag: Option<&str>, app_env: &str) -> bool {
    match flag {
        Some("true") => true,
        Some("false") => false,
        _ => app_env != "production",
    }
}
