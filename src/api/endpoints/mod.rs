//! API endpoint handlers.
//!
//! Handlers stay thin: they extract the request, run the account,
//! association or OTP logic on the blocking pool, and shape the response.

pub mod auth;
pub mod doctors;
pub mod health;
pub mod patients;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Run `f` on the blocking pool with a fresh database connection.
pub(crate) async fn with_db<T, F>(ctx: &ApiContext, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Connection, &CoreState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let core = ctx.core.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = core.open_db()?;
        f(&mut conn, &*core)
    })
    .await?
}
