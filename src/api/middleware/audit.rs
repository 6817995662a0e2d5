//! Audit logging middleware.
//!
//! Logs every authenticated request with user_id, role, method, path and
//! response status. Runs innermost (after auth has injected AuthContext).

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AuthContext;

pub async fn log_access(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let caller = req.extensions().get::<AuthContext>().cloned();

    let response = next.run(req).await;
    let status = response.status().as_u16();

    match caller {
        Some(auth) => tracing::info!(
            target: "mediconnect_lib::audit",
            user_id = %auth.user_id,
            role = %auth.role,
            %method,
            %path,
            status,
            "API access"
        ),
        None => tracing::info!(
            target: "mediconnect_lib::audit",
            %method,
            %path,
            status,
            "API access (anonymous)"
        ),
    }

    response
}
