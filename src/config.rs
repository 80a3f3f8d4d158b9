//! Runtime configuration read from the environment (`.env` is loaded by the
//! binaries through dotenvy before this runs).
//!
//! One service serves every deployment target; the target only changes which
//! collaborator base URL and API key are used.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Local,
    CloudBase,
    Vercel,
}

impl Platform {
    fn env_prefix(&self) -> &'static str {
        match self {
            Platform::Local => "PAWALERT_LOCAL",
            Platform::CloudBase => "PAWALERT_CLOUDBASE",
            Platform::Vercel => "PAWALERT_VERCEL",
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "local" => Ok(Platform::Local),
            "cloudbase" => Ok(Platform::CloudBase),
            "vercel" => Ok(Platform::Vercel),
            other => Err(format!("unknown platform '{}', expected local, cloudbase or vercel", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Collaborator endpoint for the selected platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub platform: PlatformConfig,
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: Option<String>,
    /// Required in `x-api-key` on collaborator-only routes when set.
    pub internal_api_key: Option<String>,
    pub cors_origin: String,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub sweep_interval_secs: u64,
    pub metrics_history: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        let platform: Platform = parse_or(&vars, "PAWALERT_PLATFORM", Platform::Local)?;
        let prefix = platform.env_prefix();
        let platform = PlatformConfig {
            platform,
            base_url: get(format!("{}_BASE_URL", prefix).as_str()),
            api_key: get(format!("{}_API_KEY", prefix).as_str()),
        };

        let log_format = match get("RUST_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let metrics_history: usize = parse_or(&vars, "PAWALERT_METRICS_HISTORY", 1000)?;
        if metrics_history == 0 {
            return Err(ConfigError::Invalid {
                key: "PAWALERT_METRICS_HISTORY",
                value: "0".into(),
                reason: "must keep at least one sample".into(),
            });
        }

        Ok(Self {
            platform,
            bind_addr: parse_or(&vars, "PAWALERT_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8000)))?,
            database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            redis_url: get("REDIS_URL"),
            internal_api_key: get("PAWALERT_INTERNAL_API_KEY"),
            cors_origin: get("PAWALERT_CORS_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            log_format,
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            sweep_interval_secs: parse_or(&vars, "PAWALERT_SWEEP_INTERVAL_SECS", 60)?,
            metrics_history,
        })
    }
}

fn parse_or<T>(vars: &HashMap<String, String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
