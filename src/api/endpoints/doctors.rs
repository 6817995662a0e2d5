//! Doctor directory and doctor-only endpoints.
//!
//! `POST /api/doctor/signup`, `GET /api/doctors/list` and
//! `GET /api/doctor/profile/:doctor_id` are public. Dashboard, schedule
//! and profile edits require a doctor token.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{self, DoctorUpdate, SignupRequest};
use crate::api::endpoints::with_db;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext, DoctorSummary, UserView};
use crate::models::{DoctorFilter, PatientEntry, Role, UserRecord, WeeklySlots};

fn summary(user: &UserRecord) -> Result<DoctorSummary, ApiError> {
    DoctorSummary::from_user(user)
        .ok_or_else(|| ApiError::Internal(format!("user {} has no doctor profile", user.id)))
}

// ─── Signup ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDoctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub clinic_city: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSignupResponse {
    pub message: &'static str,
    pub doctor: CreatedDoctor,
}

/// `POST /api/doctor/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DoctorSignupResponse>), ApiError> {
    let Json(request) = payload?;
    let user = with_db(&ctx, move |conn, _| Ok(accounts::doctor_signup(conn, request)?)).await?;
    let (specialization, clinic_city) = user
        .as_doctor()
        .map(|d| (d.specialization.clone(), d.clinic_city.clone()))
        .unwrap_or_default();

    Ok((
        StatusCode::CREATED,
        Json(DoctorSignupResponse {
            message: "Doctor registered successfully",
            doctor: CreatedDoctor {
                id: user.id,
                full_name: user.full_name,
                email: user.email,
                specialization,
                clinic_city,
            },
        }),
    ))
}

// ─── Directory ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DoctorListResponse {
    pub count: usize,
    pub doctors: Vec<DoctorSummary>,
}

/// `GET /api/doctors/list?specialization=&city=`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<DoctorFilter>, QueryRejection>,
) -> Result<Json<DoctorListResponse>, ApiError> {
    let Query(filter) = query?;
    let doctors = with_db(&ctx, move |conn, _| {
        accounts::list_doctors(conn, &filter)?
            .iter()
            .map(summary)
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(DoctorListResponse {
        count: doctors.len(),
        doctors,
    }))
}

#[derive(Debug, Serialize)]
pub struct DoctorProfileResponse {
    pub doctor: DoctorSummary,
}

/// `GET /api/doctor/profile/:doctor_id`
pub async fn public_profile(
    State(ctx): State<ApiContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DoctorProfileResponse>, ApiError> {
    let id = accounts::parse_user_id(&doctor_id)?;
    let doctor = with_db(&ctx, move |conn, _| {
        let user = accounts::get_account(conn, &id, Role::Doctor)?;
        summary(&user)
    })
    .await?;
    Ok(Json(DoctorProfileResponse { doctor }))
}

// ─── Dashboard ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardDoctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub qualifications: Option<String>,
    pub experience: u32,
    pub license_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardClinic {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: usize,
    /// Always zero: appointments are not tracked.
    pub total_appointments: u32,
    pub rating: f32,
    pub consultation_fee: u32,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub doctor: DashboardDoctor,
    pub clinic: DashboardClinic,
    pub schedule: WeeklySlots,
    pub patients: Vec<PatientEntry>,
    pub stats: DashboardStats,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub message: &'static str,
    pub data: DashboardData,
}

fn dashboard_data(user: UserRecord) -> Result<DashboardData, ApiError> {
    let UserRecord {
        id,
        full_name,
        email,
        phone,
        profile,
        ..
    } = user;
    let crate::models::RoleProfile::Doctor(d) = profile else {
        return Err(ApiError::Internal(format!("user {id} has no doctor profile")));
    };
    let total_patients = d.total_patients();

    Ok(DashboardData {
        doctor: DashboardDoctor {
            id,
            full_name,
            email,
            phone,
            specialization: d.specialization,
            qualifications: d.qualifications,
            experience: d.experience,
            license_number: d.license_number,
        },
        clinic: DashboardClinic {
            address: d.clinic_address,
            city: d.clinic_city,
            state: d.clinic_state,
            pincode: d.clinic_pincode,
            phone: d.clinic_phone,
        },
        schedule: d.available_slots,
        patients: d.patients,
        stats: DashboardStats {
            total_patients,
            total_appointments: 0,
            rating: d.rating,
            consultation_fee: d.consultation_fee,
        },
    })
}

/// `GET /api/doctor/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<DashboardResponse>, ApiError> {
    auth.require_role(Role::Doctor)?;
    let data = with_db(&ctx, move |conn, _| {
        dashboard_data(accounts::get_account(conn, &auth.user_id, Role::Doctor)?)
    })
    .await?;

    Ok(Json(DashboardResponse {
        message: "Dashboard data fetched successfully",
        data,
    }))
}

// ─── Edits ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub available_slots: Option<WeeklySlots>,
}

#[derive(Debug, Serialize)]
pub struct DoctorUpdateResponse {
    pub message: &'static str,
    pub doctor: UserView,
}

/// `PUT /api/doctor/schedule`
pub async fn update_schedule(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<DoctorUpdateResponse>, ApiError> {
    auth.require_role(Role::Doctor)?;
    let Json(request) = payload?;
    let doctor = with_db(&ctx, move |conn, _| {
        Ok(accounts::update_doctor_schedule(
            conn,
            &auth.user_id,
            request.available_slots,
        )?)
    })
    .await?;

    Ok(Json(DoctorUpdateResponse {
        message: "Schedule updated successfully",
        doctor: doctor.into(),
    }))
}

/// `PUT /api/doctor/profile`
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<DoctorUpdate>, JsonRejection>,
) -> Result<Json<DoctorUpdateResponse>, ApiError> {
    auth.require_role(Role::Doctor)?;
    let Json(update) = payload?;
    let doctor = with_db(&ctx, move |conn, _| {
        Ok(accounts::update_doctor_profile(conn, &auth.user_id, update)?)
    })
    .await?;

    Ok(Json(DoctorUpdateResponse {
        message: "Profile updated successfully",
        doctor: doctor.into(),
    }))
}
