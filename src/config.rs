//! Environment-driven service configuration.
//!
//! Every integration is optional at startup. Operations that need a
//! missing value report a configuration error when they run, so a
//! half-configured deployment still serves health checks and webhooks.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "pharmacall";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATABASE_PATH: &str = "pharmacall.db";
const DEFAULT_VAPI_BASE_URL: &str = "https://api.vapi.ai";
const DEFAULT_PHARMACY_NAME: &str = "MedMe Pharmacy";
const DEFAULT_VAPI_TIMEOUT_SECS: u64 = 10;
const DEFAULT_VAPI_MAX_ATTEMPTS: u32 = 2;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "pharmacall_lib=info,pharmacall=info,tower_http=warn"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Where patients and call records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Hosted Postgres behind PostgREST, authenticated with the service key.
    Hosted { url: String, service_role_key: String },
    /// Local SQLite file.
    Sqlite { path: PathBuf },
}

/// Identity provider connection (public anon key, not the service key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub url: String,
    pub anon_key: String,
}

/// Voice platform settings. The three credentials stay optional here;
/// `CallInitiator` refuses to dial until all of them are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub workflow_id: Option<String>,
    pub phone_number_id: Option<String>,
    pub pharmacy_name: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VAPI_BASE_URL.to_string(),
            api_key: None,
            workflow_id: None,
            phone_number_id: None,
            pharmacy_name: DEFAULT_PHARMACY_NAME.to_string(),
            timeout_secs: DEFAULT_VAPI_TIMEOUT_SECS,
            max_attempts: DEFAULT_VAPI_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub storage: StorageBackend,
    pub identity: Option<IdentitySettings>,
    pub voice: VoiceSettings,
    pub webhook_secret: Option<String>,
    /// Shared pharmacy access code. No fallback value is ever shipped.
    pub pharmacy_access_code: Option<String>,
    pub demo_mode: bool,
    pub secure_cookies: bool,
}

impl Settings {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let supabase_url = get("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());

        let storage = match (&supabase_url, get("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(service_role_key)) => StorageBackend::Hosted {
                url: url.clone(),
                service_role_key,
            },
            _ => StorageBackend::Sqlite {
                path: PathBuf::from(
                    get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
                ),
            },
        };

        let identity = match (&supabase_url, get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(IdentitySettings {
                url: url.clone(),
                anon_key,
            }),
            _ => None,
        };

        let timeout_secs = match get("VAPI_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "VAPI_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => DEFAULT_VAPI_TIMEOUT_SECS,
        };

        let max_attempts = match get("VAPI_MAX_ATTEMPTS") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "VAPI_MAX_ATTEMPTS",
                    value: raw,
                })?,
            None => DEFAULT_VAPI_MAX_ATTEMPTS,
        };

        let voice = VoiceSettings {
            base_url: get("VAPI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_VAPI_BASE_URL.to_string()),
            api_key: get("VAPI_API_KEY"),
            workflow_id: get("VAPI_WORKFLOW_ID"),
            phone_number_id: get("VAPI_PHONE_NUMBER_ID"),
            pharmacy_name: get("PHARMACY_NAME")
                .unwrap_or_else(|| DEFAULT_PHARMACY_NAME.to_string()),
            timeout_secs,
            max_attempts,
        };

        Ok(Self {
            bind_addr,
            storage,
            identity,
            voice,
            webhook_secret: get("VAPI_WEBHOOK_SECRET"),
            pharmacy_access_code: get("PHARMACY_ACCESS_CODE"),
            demo_mode: parse_flag(get("DEMO_MODE"), "DEMO_MODE")?,
            secure_cookies: parse_flag(get("SECURE_COOKIES"), "SECURE_COOKIES")?,
        })
    }
}

fn parse_flag(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key,
            value: raw.unwrap_or_default(),
        }),
    }
}
