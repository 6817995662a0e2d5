//! Application state shared by every request handler.
//!
//! Wrapped in `Arc` at startup. Holds no open connection: each request
//! opens its own, so handlers can run on blocking threads independently.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::db;
use crate::messaging::MessageDispatcher;
use crate::otp::OtpVerifier;

pub struct CoreState {
    db_path: PathBuf,
    /// Lifetime of issued bearer tokens.
    pub token_ttl: chrono::Duration,
    otp: OtpVerifier,
    dispatcher: Arc<dyn MessageDispatcher>,
    started_at: Instant,
}

impl CoreState {
    /// State for `config` with an in-memory OTP store.
    pub fn new(config: &ServerConfig, dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        Self::with_parts(
            config.db_path.clone(),
            config.token_ttl,
            OtpVerifier::from_config(config),
            dispatcher,
        )
    }

    pub fn with_parts(
        db_path: PathBuf,
        token_ttl: chrono::Duration,
        otp: OtpVerifier,
        dispatcher: Arc<dyn MessageDispatcher>,
    ) -> Self {
        Self {
            db_path,
            token_ttl,
            otp,
            dispatcher,
            started_at: Instant::now(),
        }
    }

    /// Open a database connection, applying pending migrations.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path).map_err(CoreError::Database)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn otp(&self) -> &OtpVerifier {
        &self.otp
    }

    pub fn dispatcher(&self) -> &dyn MessageDispatcher {
        self.dispatcher.as_ref()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
