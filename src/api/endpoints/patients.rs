//! Patient endpoints.
//!
//! `POST /api/patient/signup` is public. Profile reads, edits and doctor
//! selection require a patient token.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::accounts::{self, PatientUpdate, SignupRequest};
use crate::api::endpoints::auth::SessionResponse;
use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, UserView};
use crate::association;
use crate::credentials;
use crate::models::Role;

#[derive(Debug, Serialize)]
pub struct PatientResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub patient: UserView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectDoctorRequest {
    pub preferred_doctor_id: Option<String>,
}

/// `POST /api/patient/signup`: signup with an optional preferred doctor.
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let Json(request) = payload?;
    let response = with_db(&ctx, move |conn, core| {
        let user = accounts::patient_signup(conn, request)?;
        let token = credentials::issue_token(conn, &user, core.token_ttl)?;
        Ok(SessionResponse {
            message: "Patient registered successfully",
            token,
            user: user.into(),
        })
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /api/patient/profile`
pub async fn profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<PatientResponse>, ApiError> {
    auth.require_role(Role::Patient)?;
    let patient = with_db(&ctx, move |conn, _| {
        Ok(accounts::get_account(conn, &auth.user_id, Role::Patient)?)
    })
    .await?;

    Ok(Json(PatientResponse {
        success: true,
        message: None,
        patient: patient.into(),
    }))
}

/// `PUT /api/patient/profile`
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<PatientUpdate>, JsonRejection>,
) -> Result<Json<PatientResponse>, ApiError> {
    auth.require_role(Role::Patient)?;
    let Json(update) = payload?;
    let patient = with_db(&ctx, move |conn, _| {
        Ok(accounts::update_patient_profile(conn, &auth.user_id, update)?)
    })
    .await?;

    Ok(Json(PatientResponse {
        success: true,
        message: Some("Profile updated successfully"),
        patient: patient.into(),
    }))
}

/// `PUT /api/patient/select-doctor`: set or replace the preferred doctor.
pub async fn select_doctor(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<SelectDoctorRequest>, JsonRejection>,
) -> Result<Json<PatientResponse>, ApiError> {
    auth.require_role(Role::Patient)?;
    let Json(request) = payload?;
    let doctor_id = request
        .preferred_doctor_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please provide preferredDoctorId".into()))?;
    let doctor_id = accounts::parse_user_id(doctor_id)?;

    let patient = with_db(&ctx, move |conn, _| {
        Ok(association::assign_preferred_doctor(
            conn,
            &auth.user_id,
            &doctor_id,
        )?)
    })
    .await?;

    Ok(Json(PatientResponse {
        success: true,
        message: Some("Preferred doctor updated successfully"),
        patient: patient.into(),
    }))
}
