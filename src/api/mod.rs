//! REST surface.
//!
//! Routes are nested under `/api/`. Public routes are rate limited only;
//! account routes add bearer authentication and an audit log:
//! Rate Limit → Auth → Audit → Handler.
//!
//! The router is composable: `api_router()` returns a `Router` that can
//! be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::{api_router, api_router_with_ctx};
pub use server::{start_server_on, ApiServer, ApiSession};
pub use types::ApiContext;
