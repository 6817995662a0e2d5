//! Sign-up, login and OTP endpoints.
//!
//! `POST /api/signup`: universal signup, returns a session
//! `POST /api/auth/login`: email + password + role
//! `POST /api/auth/request-otp`: send a one-time code to a registered phone
//! `POST /api/auth/verify-otp`: exchange a code for a session
//! `POST /api/auth/logout`: protected, revokes the presented token

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, LoginRequest, SignupRequest};
use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, UserView};
use crate::credentials;
use crate::models::Role;
use crate::otp;

/// A fresh session plus the account it belongs to.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    pub token: String,
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtpRequest {
    pub phone: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: Option<String>,
    pub otp: Option<String>,
    pub role: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn otp_role(role: Option<String>, missing: &str) -> Result<Role, ApiError> {
    let role = non_blank(role).ok_or_else(|| ApiError::BadRequest(missing.to_string()))?;
    Ok(accounts::parse_role(Some(role.as_str()))?)
}

/// `POST /api/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload?;
    let response = with_db(&ctx, move |conn, core| {
        let user = accounts::signup(conn, request)?;
        let token = credentials::issue_token(conn, &user, core.token_ttl)?;
        Ok(SessionResponse {
            message: "Signup successful",
            token,
            user: user.into(),
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    let Json(request) = payload?;
    let response = with_db(&ctx, move |conn, core| {
        let user = accounts::login(conn, &request)?;
        let token = credentials::issue_token(conn, &user, core.token_ttl)?;
        Ok(SessionResponse {
            message: "Login successful",
            token,
            user: user.into(),
        })
    })
    .await?;
    Ok(Json(response))
}

/// `POST /api/auth/request-otp`
///
/// The code itself never appears in the response.
pub async fn request_otp(
    State(ctx): State<ApiContext>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    const MISSING: &str = "Phone and role required";
    let Json(request) = payload?;
    let phone = non_blank(request.phone).ok_or_else(|| ApiError::BadRequest(MISSING.into()))?;
    let role = otp_role(request.role, MISSING)?;

    with_db(&ctx, move |conn, core| {
        otp::request_challenge(conn, core.otp(), core.dispatcher(), &phone, role)?;
        Ok(())
    })
    .await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "OTP sent successfully",
    }))
}

/// `POST /api/auth/verify-otp`
pub async fn verify_otp(
    State(ctx): State<ApiContext>,
    payload: Result<Json<OtpVerifyRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, ApiError> {
    const MISSING: &str = "Phone, OTP and role required";
    let Json(request) = payload?;
    let (Some(phone), Some(code)) = (non_blank(request.phone), non_blank(request.otp)) else {
        return Err(ApiError::BadRequest(MISSING.into()));
    };
    let role = otp_role(request.role, MISSING)?;

    let response = with_db(&ctx, move |conn, core| {
        let user = otp::verify_challenge(conn, core.otp(), &phone, &code, role)?;
        let token = credentials::issue_token(conn, &user, core.token_ttl)?;
        Ok(SessionResponse {
            message: "OTP verified successfully",
            token,
            user: user.into(),
        })
    })
    .await?;
    Ok(Json(response))
}

/// `POST /api/auth/logout`
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user_id = auth.user_id;
    let revoked = with_db(&ctx, move |conn, _| {
        Ok(credentials::revoke_token(conn, &auth.token)?)
    })
    .await?;
    tracing::info!(%user_id, revoked, "Logout");

    Ok(Json(StatusResponse {
        success: true,
        message: "Logged out",
    }))
}
