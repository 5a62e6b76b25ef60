use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::annotate::PdfHighlightGate;

const DEV_SECRET_KEY: &str = "dev-secret-key-change-me";
const DEV_CLEANUP_API_KEY: &str = "secret_cleanup_key";

/// Application configuration loaded from environment variables.
/// Every value has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Signs the session cookie.
    pub secret_key: String,
    /// Expected `X-API-Key` value on `POST /cleanup`.
    pub cleanup_api_key: String,
    pub max_file_age_hours: u64,
    pub max_upload_bytes: usize,
    pub session_lifetime_secs: u64,
    pub pdf_gate: PdfHighlightGate,
    pub storage: StorageConfig,
}

/// Environment markers used to pick the storage base directory.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub railway_storage_path: Option<PathBuf>,
    pub render: bool,
    pub render_disk_path: Option<PathBuf>,
    pub local_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let pdf_gate = env_or("PDF_HIGHLIGHT_GATE", "per-page")
            .parse::<PdfHighlightGate>()
            .map_err(anyhow::Error::msg)
            .context("PDF_HIGHLIGHT_GATE must be 'per-page' or 'cumulative'")?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            secret_key: env_or("SECRET_KEY", DEV_SECRET_KEY),
            cleanup_api_key: env_or("CLEANUP_API_KEY", DEV_CLEANUP_API_KEY),
            max_file_age_hours: parse_env("MAX_FILE_AGE_HOURS", 24)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
            session_lifetime_secs: parse_env("SESSION_LIFETIME_SECS", 1800)?,
            pdf_gate,
            storage: StorageConfig {
                railway_storage_path: std::env::var_os("RAILWAY_STORAGE_PATH").map(PathBuf::from),
                render: std::env::var_os("RENDER").is_some(),
                render_disk_path: std::env::var_os("RENDER_DISK_PATH").map(PathBuf::from),
                local_path: std::env::var_os("STORAGE_LOCAL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("storage")),
            },
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
