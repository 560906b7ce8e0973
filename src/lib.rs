pub mod access; // Staff sessions and the pharmacy access gate
pub mod api;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod models;
pub mod store; // Hosted REST and SQLite backends
pub mod verification;
pub mod voice; // Outbound calls via Vapi
pub mod webhook;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::access::{AccessGate, GoTrueClient, IdentityProvider};
use crate::api::ApiContext;
use crate::config::{Settings, StorageBackend};
use crate::dashboard::Dashboard;
use crate::store::{RestStore, SqliteStore, Store};
use crate::voice::{CallInitiator, VapiClient, VoiceClient};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("Storage unavailable: {0}")]
    Store(#[from] store::StoreError),
    #[error("Voice client setup failed: {0}")]
    Voice(#[from] voice::VoiceError),
    #[error("Identity client setup failed: {0}")]
    Identity(#[from] access::AuthError),
    #[error("Server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire the shared services described by `settings`.
pub fn build_context(settings: &Settings) -> Result<ApiContext, StartupError> {
    let store: Arc<dyn Store> = match &settings.storage {
        StorageBackend::Hosted {
            url,
            service_role_key,
        } => Arc::new(RestStore::new(url, service_role_key)?),
        StorageBackend::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
    };

    let voice: Option<Arc<dyn VoiceClient>> = match &settings.voice.api_key {
        Some(key) => Some(Arc::new(VapiClient::new(
            &settings.voice.base_url,
            key,
            settings.voice.timeout_secs,
            settings.voice.max_attempts,
        )?)),
        None => None,
    };

    let identity: Option<Arc<dyn IdentityProvider>> = match &settings.identity {
        Some(id) => Some(Arc::new(GoTrueClient::new(&id.url, &id.anon_key)?)),
        None => None,
    };

    if settings.webhook_secret.is_none() {
        tracing::warn!("VAPI_WEBHOOK_SECRET not set, all webhook deliveries will be rejected");
    }
    if settings.pharmacy_access_code.is_none() {
        tracing::warn!("PHARMACY_ACCESS_CODE not set, dashboard access cannot be granted");
    }
    if settings.demo_mode {
        tracing::warn!("Demo mode enabled, listings fall back to sample data on storage errors");
    }

    let initiator = Arc::new(CallInitiator::new(voice, settings.voice.clone()));

    Ok(ApiContext {
        store: store.clone(),
        dashboard: Arc::new(Dashboard::new(store, initiator, settings.demo_mode)),
        identity,
        gate: Arc::new(AccessGate::new(
            settings.pharmacy_access_code.clone(),
            settings.secure_cookies,
        )),
        webhook_secret: settings.webhook_secret.as_deref().map(Arc::from),
    })
}

/// Initialize logging, load configuration, and serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let settings = Settings::from_env()?;
    let ctx = build_context(&settings)?;
    let mut server = api::start_server_on(ctx, settings.bind_addr).await?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn sqlite_backend_when_hosted_store_is_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.db");
        let ctx = build_context(&settings(&[("DATABASE_PATH", path.to_str().unwrap())])).unwrap();

        assert_eq!(ctx.store.backend(), "sqlite");
        assert!(ctx.identity.is_none());
        assert!(ctx.webhook_secret.is_none());
        assert!(path.exists());
    }

    #[test]
    fn hosted_backend_and_identity_from_supabase_settings() {
        let ctx = build_context(&settings(&[
            ("SUPABASE_URL", "https://project.supabase.co/"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
            ("SUPABASE_ANON_KEY", "anon-key"),
            ("VAPI_WEBHOOK_SECRET", "hook-secret"),
        ]))
        .unwrap();

        assert_eq!(ctx.store.backend(), "hosted");
        assert!(ctx.identity.is_some());
        assert_eq!(ctx.webhook_secret.as_deref(), Some("hook-secret"));
    }
}
