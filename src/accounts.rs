//! Account lifecycle: signup, login, profile reads and partial updates,
//! doctor search.
//!
//! Partial updates follow one rule: a field that is absent, or a string
//! that is blank, leaves the stored value alone.

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::association::{self, AssociationError};
use crate::credentials::{self, CredentialError};
use crate::db::{self, DatabaseError};
use crate::models::{
    CommonProfile, DoctorFilter, DoctorProfile, PatientProfile, Role, RoleProfile, UserRecord,
    WeeklySlots, DEFAULT_CONSULTATION_FEE,
};

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Email already exists: {0}")]
    Conflict(String),

    #[error("Invalid password")]
    InvalidPassword,

    #[error("{0}")]
    Association(AssociationError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AccountError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateEmail(email) => Self::Conflict(email),
            other => Self::Database(other),
        }
    }
}

impl From<AssociationError> for AccountError {
    fn from(err: AssociationError) -> Self {
        match err {
            AssociationError::Conflict(email) => Self::Conflict(email),
            other => Self::Association(other),
        }
    }
}

/// Profile fields shared by both roles, as sent by clients.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonInput {
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub medical_conditions: Option<Vec<String>>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub emergency_name: Option<String>,
    pub emergency_phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorInput {
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub experience: Option<u32>,
    pub license_number: Option<String>,
    pub clinic_address: Option<String>,
    pub clinic_city: Option<String>,
    pub clinic_state: Option<String>,
    pub clinic_pincode: Option<String>,
    pub clinic_phone: Option<String>,
    pub consultation_fee: Option<u32>,
}

/// Body of every signup endpoint. Which fields matter depends on the role.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub preferred_doctor_id: Option<String>,
    pub available_slots: Option<WeeklySlots>,
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(flatten)]
    pub patient: PatientInput,
    #[serde(flatten)]
    pub doctor: DoctorInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub phone: Option<String>,
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(flatten)]
    pub patient: PatientInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorUpdate {
    pub phone: Option<String>,
    #[serde(flatten)]
    pub doctor: DoctorInput,
}

/// Trimmed value, or `None` when absent or blank.
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn set_if_present(target: &mut Option<String>, value: Option<String>) {
    if let Some(v) = present(value) {
        *target = Some(v);
    }
}

/// Lowercase and check shape: one `@`, both sides non-empty.
pub fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(AccountError::Validation(format!("Invalid email address: {email}"))),
    }
}

/// Parse a role field; absent means patient.
pub fn parse_role(role: Option<&str>) -> Result<Role, AccountError> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Patient),
        Some(r) => Role::parse_lenient(r)
            .map_err(|_| AccountError::Validation(format!("Unknown role: {r}"))),
    }
}

pub fn parse_user_id(id: &str) -> Result<Uuid, AccountError> {
    Uuid::parse_str(id.trim()).map_err(|_| AccountError::Validation(format!("Invalid id: {id}")))
}

struct Identity {
    full_name: String,
    email: String,
    phone: String,
    password: String,
}

fn required_identity(
    req: &mut SignupRequest,
    require_specialization: bool,
) -> Result<Identity, AccountError> {
    let full_name = present(req.full_name.take());
    let email = present(req.email.take());
    let phone = present(req.phone.take());
    let password = req.password.take().filter(|p| !p.is_empty());
    let specialization_missing =
        require_specialization && present(req.doctor.specialization.clone()).is_none();

    match (full_name, email, phone, password) {
        (Some(full_name), Some(email), Some(phone), Some(password)) if !specialization_missing => {
            Ok(Identity {
                full_name,
                email: normalize_email(&email)?,
                phone,
                password,
            })
        }
        _ if require_specialization => Err(AccountError::Validation(
            "Please provide: fullName, email, phone, password, specialization".into(),
        )),
        _ => Err(AccountError::Validation(
            "Please provide: fullName, email, phone, password".into(),
        )),
    }
}

fn common_profile(input: CommonInput) -> CommonProfile {
    CommonProfile {
        gender: present(input.gender),
        age: input.age,
        blood_group: present(input.blood_group),
        address: present(input.address),
        birth_date: input.birth_date,
    }
}

fn patient_profile(input: PatientInput) -> PatientProfile {
    PatientProfile {
        medical_conditions: input.medical_conditions.unwrap_or_default(),
        allergies: present(input.allergies),
        medications: present(input.medications),
        emergency_name: present(input.emergency_name),
        emergency_phone: present(input.emergency_phone),
        preferred_doctor: None,
    }
}

fn doctor_profile(
    input: DoctorInput,
    slots: Option<WeeklySlots>,
    phone: &str,
) -> Result<DoctorProfile, AccountError> {
    let available_slots = slots.unwrap_or_default();
    available_slots.validate().map_err(AccountError::Validation)?;
    Ok(DoctorProfile {
        specialization: present(input.specialization).unwrap_or_default(),
        qualifications: present(input.qualifications),
        experience: input.experience.unwrap_or(0),
        license_number: present(input.license_number),
        clinic_address: present(input.clinic_address),
        clinic_city: present(input.clinic_city),
        clinic_state: present(input.clinic_state),
        clinic_pincode: present(input.clinic_pincode),
        clinic_phone: present(input.clinic_phone).or_else(|| Some(phone.to_string())),
        consultation_fee: input
            .consultation_fee
            .filter(|fee| *fee > 0)
            .unwrap_or(DEFAULT_CONSULTATION_FEE),
        available_slots,
        ..DoctorProfile::default()
    })
}

fn create_account(
    conn: &mut Connection,
    mut req: SignupRequest,
    role: Role,
    require_specialization: bool,
) -> Result<UserRecord, AccountError> {
    let identity = required_identity(&mut req, require_specialization)?;
    // Only patients carry a preferred doctor.
    let preferred_doctor_id = match role {
        Role::Patient => present(req.preferred_doctor_id.take())
            .map(|id| parse_user_id(&id))
            .transpose()?,
        Role::Doctor => None,
    };
    if db::email_exists(conn, &identity.email)? {
        return Err(AccountError::Conflict(identity.email));
    }

    let profile = match role {
        Role::Patient => RoleProfile::Patient(patient_profile(req.patient)),
        Role::Doctor => RoleProfile::Doctor(doctor_profile(
            req.doctor,
            req.available_slots,
            &identity.phone,
        )?),
    };
    let user = UserRecord {
        id: Uuid::new_v4(),
        email: identity.email,
        phone: identity.phone,
        password_hash: credentials::hash_password(&identity.password),
        full_name: identity.full_name,
        created_at: Utc::now(),
        common: common_profile(req.common),
        profile,
    };

    match role {
        Role::Patient => Ok(association::register_patient_with_optional_doctor(
            conn,
            user,
            preferred_doctor_id,
        )?),
        Role::Doctor => {
            db::insert_user(conn, &user)?;
            tracing::info!(doctor_id = %user.id, "Doctor registered");
            Ok(user)
        }
    }
}

/// Universal signup. `role` defaults to patient.
pub fn signup(conn: &mut Connection, req: SignupRequest) -> Result<UserRecord, AccountError> {
    let role = parse_role(req.role.as_deref())?;
    create_account(conn, req, role, false)
}

/// Doctor signup. Specialization is required.
pub fn doctor_signup(conn: &mut Connection, req: SignupRequest) -> Result<UserRecord, AccountError> {
    create_account(conn, req, Role::Doctor, true)
}

/// Patient signup, optionally selecting a preferred doctor.
pub fn patient_signup(conn: &mut Connection, req: SignupRequest) -> Result<UserRecord, AccountError> {
    create_account(conn, req, Role::Patient, false)
}

/// Check email + password for an account of the given role.
pub fn login(conn: &Connection, req: &LoginRequest) -> Result<UserRecord, AccountError> {
    let (Some(email), Some(password)) = (present(req.email.clone()), req.password.as_deref())
    else {
        return Err(AccountError::Validation("Please provide: email, password".into()));
    };
    let role = parse_role(req.role.as_deref())?;
    let email = normalize_email(&email)?;

    let user = db::find_user_by_email_and_role(conn, &email, role)?
        .ok_or_else(|| AccountError::NotFound("User not found with this role".into()))?;
    if !credentials::verify_password(password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(AccountError::InvalidPassword);
    }
    tracing::info!(user_id = %user.id, role = %role, "Login successful");
    Ok(user)
}

/// Load an account and require it to have `role`.
pub fn get_account(conn: &Connection, id: &Uuid, role: Role) -> Result<UserRecord, AccountError> {
    db::get_user(conn, id)?
        .filter(|u| u.role() == role)
        .ok_or_else(|| {
            let label = match role {
                Role::Patient => "Patient",
                Role::Doctor => "Doctor",
            };
            AccountError::NotFound(format!("{label} not found"))
        })
}

/// Doctors matching `filter`, best rated first.
pub fn list_doctors(conn: &Connection, filter: &DoctorFilter) -> Result<Vec<UserRecord>, AccountError> {
    let mut doctors: Vec<UserRecord> = db::list_users_by_role(conn, Role::Doctor)?
        .into_iter()
        .filter(|u| u.as_doctor().is_some_and(|d| filter.matches(d)))
        .collect();
    doctors.sort_by(|a, b| {
        let rating = |u: &UserRecord| u.as_doctor().map(|d| d.rating).unwrap_or(0.0);
        rating(b)
            .total_cmp(&rating(a))
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    Ok(doctors)
}

fn apply_common(target: &mut CommonProfile, input: CommonInput) {
    set_if_present(&mut target.gender, input.gender);
    if input.age.is_some() {
        target.age = input.age;
    }
    set_if_present(&mut target.blood_group, input.blood_group);
    set_if_present(&mut target.address, input.address);
    if input.birth_date.is_some() {
        target.birth_date = input.birth_date;
    }
}

pub fn update_patient_profile(
    conn: &Connection,
    id: &Uuid,
    update: PatientUpdate,
) -> Result<UserRecord, AccountError> {
    let mut user = get_account(conn, id, Role::Patient)?;
    if let Some(phone) = present(update.phone) {
        user.phone = phone;
    }
    apply_common(&mut user.common, update.common);
    if let Some(profile) = user.as_patient_mut() {
        let input = update.patient;
        if let Some(conditions) = input.medical_conditions.filter(|c| !c.is_empty()) {
            profile.medical_conditions = conditions;
        }
        set_if_present(&mut profile.allergies, input.allergies);
        set_if_present(&mut profile.medications, input.medications);
        set_if_present(&mut profile.emergency_name, input.emergency_name);
        set_if_present(&mut profile.emergency_phone, input.emergency_phone);
    }
    db::update_user(conn, &user)?;
    tracing::info!(patient_id = %id, "Patient profile updated");
    Ok(user)
}

/// Edits do not touch the `preferredDoctor` snapshots held by patients.
pub fn update_doctor_profile(
    conn: &Connection,
    id: &Uuid,
    update: DoctorUpdate,
) -> Result<UserRecord, AccountError> {
    let mut user = get_account(conn, id, Role::Doctor)?;
    if let Some(phone) = present(update.phone) {
        user.phone = phone;
    }
    if let Some(profile) = user.as_doctor_mut() {
        let input = update.doctor;
        if let Some(s) = present(input.specialization) {
            profile.specialization = s;
        }
        set_if_present(&mut profile.qualifications, input.qualifications);
        if let Some(years) = input.experience {
            profile.experience = years;
        }
        set_if_present(&mut profile.license_number, input.license_number);
        set_if_present(&mut profile.clinic_address, input.clinic_address);
        set_if_present(&mut profile.clinic_city, input.clinic_city);
        set_if_present(&mut profile.clinic_state, input.clinic_state);
        set_if_present(&mut profile.clinic_pincode, input.clinic_pincode);
        set_if_present(&mut profile.clinic_phone, input.clinic_phone);
        if let Some(fee) = input.consultation_fee.filter(|fee| *fee > 0) {
            profile.consultation_fee = fee;
        }
    }
    db::update_user(conn, &user)?;
    tracing::info!(doctor_id = %id, "Doctor profile updated");
    Ok(user)
}

pub fn update_doctor_schedule(
    conn: &Connection,
    id: &Uuid,
    slots: Option<WeeklySlots>,
) -> Result<UserRecord, AccountError> {
    let slots =
        slots.ok_or_else(|| AccountError::Validation("Please provide availableSlots".into()))?;
    slots.validate().map_err(AccountError::Validation)?;

    let mut user = get_account(conn, id, Role::Doctor)?;
    if let Some(profile) = user.as_doctor_mut() {
        profile.available_slots = slots;
    }
    db::update_user(conn, &user)?;
    tracing::info!(doctor_id = %id, "Doctor schedule updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::TimeSlot;

    fn signup_req(name: &str, email: &str) -> SignupRequest {
        SignupRequest {
            full_name: Some(name.into()),
            email: Some(email.into()),
            phone: Some("9999999999".into()),
            password: Some("hunter22".into()),
            ..SignupRequest::default()
        }
    }

    fn doctor_req(name: &str, email: &str, specialization: &str, city: &str) -> SignupRequest {
        let mut req = signup_req(name, email);
        req.doctor.specialization = Some(specialization.into());
        req.doctor.clinic_city = Some(city.into());
        req
    }

    #[test]
    fn universal_signup_defaults_to_patient() {
        let mut conn = open_memory_database().unwrap();
        let user = signup(&mut conn, signup_req("Asha", " Asha@Example.com ")).unwrap();
        assert_eq!(user.role(), Role::Patient);
        assert_eq!(user.email, "asha@example.com");
        assert_ne!(user.password_hash, "hunter22");
    }

    #[test]
    fn universal_signup_accepts_mixed_case_role() {
        let mut conn = open_memory_database().unwrap();
        let mut req = signup_req("Rao", "rao@example.com");
        req.role = Some("Doctor".into());
        let user = signup(&mut conn, req).unwrap();
        let doctor = user.as_doctor().unwrap();
        assert_eq!(doctor.consultation_fee, 500);
        assert_eq!(doctor.rating, 4.5);
        assert_eq!(doctor.specialization, "");
    }

    #[test]
    fn doctor_signup_ignores_preferred_doctor() {
        let mut conn = open_memory_database().unwrap();
        let mut req = doctor_req("Rao", "rao@example.com", "Cardiology", "Pune");
        req.preferred_doctor_id = Some("not-a-uuid".into());
        let user = doctor_signup(&mut conn, req).unwrap();
        assert_eq!(user.role(), Role::Doctor);

        let mut req = signup_req("Mehta", "mehta@example.com");
        req.role = Some("doctor".into());
        req.preferred_doctor_id = Some(user.id.to_string());
        let other = signup(&mut conn, req).unwrap();
        assert_eq!(other.preferred_doctor_id(), None);
        let first = get_account(&conn, &user.id, Role::Doctor).unwrap();
        assert_eq!(first.as_doctor().unwrap().total_patients(), 0);
    }

    #[test]
    fn unknown_role_is_validation_error() {
        let mut conn = open_memory_database().unwrap();
        let mut req = signup_req("X", "x@example.com");
        req.role = Some("nurse".into());
        assert!(matches!(signup(&mut conn, req), Err(AccountError::Validation(_))));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut conn = open_memory_database().unwrap();
        let mut req = signup_req("Asha", "asha@example.com");
        req.password = None;
        assert!(matches!(signup(&mut conn, req), Err(AccountError::Validation(_))));

        let mut req = signup_req("Asha", "asha@example.com");
        req.phone = Some("   ".into());
        assert!(matches!(signup(&mut conn, req), Err(AccountError::Validation(_))));
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["plain", "@example.com", "a@", "a@b@c"] {
            assert!(normalize_email(email).is_err(), "{email}");
        }
        assert_eq!(normalize_email("A@B.co").unwrap(), "a@b.co");
    }

    #[test]
    fn duplicate_email_conflicts_across_roles() {
        let mut conn = open_memory_database().unwrap();
        signup(&mut conn, signup_req("Asha", "same@example.com")).unwrap();
        let err = doctor_signup(
            &mut conn,
            doctor_req("Rao", "SAME@example.com", "Cardiology", "Pune"),
        )
        .unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));
    }

    #[test]
    fn doctor_signup_requires_specialization_and_applies_defaults() {
        let mut conn = open_memory_database().unwrap();
        let err = doctor_signup(&mut conn, signup_req("Rao", "rao@example.com")).unwrap_err();
        assert!(matches!(err, AccountError::Validation(m) if m.contains("specialization")));

        let user = doctor_signup(
            &mut conn,
            doctor_req("Rao", "rao@example.com", "Cardiology", "Pune"),
        )
        .unwrap();
        let doctor = user.as_doctor().unwrap();
        assert_eq!(doctor.experience, 0);
        assert_eq!(doctor.consultation_fee, 500);
        assert_eq!(doctor.clinic_phone.as_deref(), Some("9999999999"));
        assert_eq!(doctor.available_slots, WeeklySlots::default());
        assert_eq!(doctor.total_patients(), 0);
    }

    #[test]
    fn doctor_signup_rejects_bad_schedule() {
        let mut conn = open_memory_database().unwrap();
        let mut req = doctor_req("Rao", "rao@example.com", "Cardiology", "Pune");
        req.available_slots = Some(WeeklySlots {
            monday: Some(TimeSlot::new("18:00", "09:00")),
            ..WeeklySlots::default()
        });
        assert!(matches!(doctor_signup(&mut conn, req), Err(AccountError::Validation(_))));
    }

    #[test]
    fn patient_signup_with_doctor_links_both() {
        let mut conn = open_memory_database().unwrap();
        let doctor = doctor_signup(
            &mut conn,
            doctor_req("Rao", "rao@example.com", "Cardiology", "Pune"),
        )
        .unwrap();
        let mut req = signup_req("Asha", "asha@example.com");
        req.preferred_doctor_id = Some(doctor.id.to_string());

        let patient = patient_signup(&mut conn, req).unwrap();
        assert_eq!(patient.preferred_doctor_id(), Some(doctor.id));
        let doctor = get_account(&conn, &doctor.id, Role::Doctor).unwrap();
        assert!(doctor.as_doctor().unwrap().has_patient(&patient.id));
    }

    #[test]
    fn patient_signup_with_bad_doctor_id() {
        let mut conn = open_memory_database().unwrap();
        let mut req = signup_req("Asha", "asha@example.com");
        req.preferred_doctor_id = Some("not-a-uuid".into());
        assert!(matches!(
            patient_signup(&mut conn, req),
            Err(AccountError::Validation(_))
        ));

        let mut req = signup_req("Asha", "asha@example.com");
        req.preferred_doctor_id = Some(Uuid::new_v4().to_string());
        assert!(matches!(
            patient_signup(&mut conn, req),
            Err(AccountError::Association(AssociationError::NotFound { .. }))
        ));
        assert!(!db::email_exists(&conn, "asha@example.com").unwrap());
    }

    #[test]
    fn login_distinguishes_role_and_password() {
        let mut conn = open_memory_database().unwrap();
        signup(&mut conn, signup_req("Asha", "asha@example.com")).unwrap();

        let mut req = LoginRequest {
            email: Some("ASHA@example.com".into()),
            password: Some("hunter22".into()),
            role: Some("patient".into()),
        };
        assert!(login(&conn, &req).is_ok());

        req.role = Some("doctor".into());
        assert!(matches!(login(&conn, &req), Err(AccountError::NotFound(_))));

        req.role = None;
        req.password = Some("wrong".into());
        assert!(matches!(login(&conn, &req), Err(AccountError::InvalidPassword)));
    }

    #[test]
    fn list_doctors_filters_and_sorts() {
        let mut conn = open_memory_database().unwrap();
        let a = doctor_signup(&mut conn, doctor_req("Zed", "z@example.com", "Cardiology", "Pune"))
            .unwrap();
        doctor_signup(&mut conn, doctor_req("Amy", "a@example.com", "Dermatology", "Mumbai"))
            .unwrap();
        doctor_signup(&mut conn, doctor_req("Bob", "b@example.com", "Pediatric Cardiology", "Pune"))
            .unwrap();

        let mut top = get_account(&conn, &a.id, Role::Doctor).unwrap();
        top.as_doctor_mut().unwrap().rating = 4.9;
        db::update_user(&conn, &top).unwrap();

        let filter = DoctorFilter {
            specialization: Some("cardio".into()),
            city: Some("PUNE".into()),
        };
        let names: Vec<String> = list_doctors(&conn, &filter)
            .unwrap()
            .into_iter()
            .map(|u| u.full_name)
            .collect();
        assert_eq!(names, vec!["Zed", "Bob"]);

        let all = list_doctors(&conn, &DoctorFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].full_name, "Amy");
    }

    #[test]
    fn patient_update_ignores_blank_fields() {
        let mut conn = open_memory_database().unwrap();
        let mut req = signup_req("Asha", "asha@example.com");
        req.patient.allergies = Some("Peanuts".into());
        let user = signup(&mut conn, req).unwrap();

        let updated = update_patient_profile(
            &conn,
            &user.id,
            PatientUpdate {
                phone: Some("".into()),
                common: CommonInput {
                    blood_group: Some("O+".into()),
                    ..CommonInput::default()
                },
                patient: PatientInput {
                    allergies: Some("  ".into()),
                    medications: Some("Metformin".into()),
                    ..PatientInput::default()
                },
            },
        )
        .unwrap();
        assert_eq!(updated.phone, "9999999999");
        assert_eq!(updated.common.blood_group.as_deref(), Some("O+"));
        let p = updated.as_patient().unwrap();
        assert_eq!(p.allergies.as_deref(), Some("Peanuts"));
        assert_eq!(p.medications.as_deref(), Some("Metformin"));
    }

    #[test]
    fn doctor_update_keeps_patient_snapshot() {
        let mut conn = open_memory_database().unwrap();
        let doctor = doctor_signup(
            &mut conn,
            doctor_req("Rao", "rao@example.com", "Cardiology", "Pune"),
        )
        .unwrap();
        let mut req = signup_req("Asha", "asha@example.com");
        req.preferred_doctor_id = Some(doctor.id.to_string());
        let patient = patient_signup(&mut conn, req).unwrap();

        let updated = update_doctor_profile(
            &conn,
            &doctor.id,
            DoctorUpdate {
                phone: None,
                doctor: DoctorInput {
                    specialization: Some("Neurology".into()),
                    consultation_fee: Some(800),
                    ..DoctorInput::default()
                },
            },
        )
        .unwrap();
        let d = updated.as_doctor().unwrap();
        assert_eq!(d.specialization, "Neurology");
        assert_eq!(d.consultation_fee, 800);
        assert_eq!(d.total_patients(), 1);

        let patient = get_account(&conn, &patient.id, Role::Patient).unwrap();
        let snapshot = patient.as_patient().unwrap().preferred_doctor.clone().unwrap();
        assert_eq!(snapshot.doctor_specialization, "Cardiology");
    }

    #[test]
    fn schedule_update_requires_valid_slots() {
        let mut conn = open_memory_database().unwrap();
        let doctor = doctor_signup(
            &mut conn,
            doctor_req("Rao", "rao@example.com", "Cardiology", "Pune"),
        )
        .unwrap();

        assert!(matches!(
            update_doctor_schedule(&conn, &doctor.id, None),
            Err(AccountError::Validation(_))
        ));

        let slots = WeeklySlots {
            sunday: Some(TimeSlot::new("10:00", "12:00")),
            ..WeeklySlots::default()
        };
        let updated = update_doctor_schedule(&conn, &doctor.id, Some(slots.clone())).unwrap();
        assert_eq!(updated.as_doctor().unwrap().available_slots, slots);
    }

    #[test]
    fn role_mismatch_reads_as_not_found() {
        let mut conn = open_memory_database().unwrap();
        let patient = signup(&mut conn, signup_req("Asha", "asha@example.com")).unwrap();
        assert!(matches!(
            get_account(&conn, &patient.id, Role::Doctor),
            Err(AccountError::NotFound(_))
        ));
    }
}
