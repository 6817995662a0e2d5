pub mod accounts; // Signup, login, profile reads and edits
pub mod api; // REST router, middleware and server lifecycle
pub mod association; // Patient ↔ preferred doctor links
pub mod config;
pub mod core_state; // Shared state behind every handler
pub mod credentials; // Password hashing, bearer tokens
pub mod db;
pub mod messaging; // Outbound SMS
pub mod models;
pub mod otp; // One-time codes over SMS

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::CoreState;
use crate::messaging::MessageDispatcher;

/// Errors that abort startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Messaging setup failed: {0}")]
    Dispatch(#[from] messaging::DispatchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Startup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Open and migrate the database, report association drift, drop stale
/// sessions, and build the SMS dispatcher. Blocking.
fn prepare(config: &ServerConfig) -> Result<Arc<dyn MessageDispatcher>, StartupError> {
    let conn = db::open_database(&config.db_path)?;
    tracing::info!(path = %config.db_path.display(), "Database ready");

    let report = association::check_associations(&conn)?;
    if report.is_consistent() {
        tracing::info!(
            patients = report.patients_checked,
            doctors = report.doctors_checked,
            "Associations consistent"
        );
    } else {
        for issue in &report.issues {
            tracing::warn!(?issue, "Association inconsistency");
        }
    }

    let purged = db::purge_expired_sessions(&conn, chrono::Utc::now())?;
    if purged > 0 {
        tracing::info!("Purged {purged} expired session(s)");
    }

    Ok(messaging::dispatcher_from_config(config.sms_gateway.as_ref())?)
}

/// Run the server until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env()?;

    // The SMS client is blocking, so it is built (and later dropped) off
    // the async runtime.
    let startup = config.clone();
    let dispatcher = tokio::task::spawn_blocking(move || prepare(&startup)).await??;
    let core = Arc::new(CoreState::new(&config, dispatcher));

    let sweeper = otp::spawn_sweeper(core.otp().clone(), config::OTP_SWEEP_INTERVAL);
    let server = api::start_server_on(core.clone(), config.bind_addr).await?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    server.stop().await;
    sweeper.abort();
    tokio::task::spawn_blocking(move || drop(core)).await?;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
