//! Patient ↔ preferred-doctor association.
//!
//! A patient points at one doctor through `preferredDoctor`; that doctor
//! lists the patient in `patients`. Every change to either side happens in
//! one IMMEDIATE transaction, so both records move together.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{Role, UserRecord};

#[derive(Error, Debug)]
pub enum AssociationError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{id} is not a {expected}")]
    InvalidRole { id: Uuid, expected: Role },

    #[error("Email already registered: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AssociationError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::DuplicateEmail(email) => Self::Conflict(email),
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for AssociationError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

/// Load `id` and require it to be a doctor.
fn load_doctor(conn: &Connection, id: &Uuid) -> Result<UserRecord, AssociationError> {
    let doctor = db::get_user(conn, id)?.ok_or(AssociationError::NotFound {
        entity: "Doctor",
        id: *id,
    })?;
    if doctor.role() != Role::Doctor {
        return Err(AssociationError::InvalidRole {
            id: *id,
            expected: Role::Doctor,
        });
    }
    Ok(doctor)
}

/// Add `patient` to `doctor`'s list and point the patient at the doctor.
/// Both records are modified in memory only.
fn link(patient: &mut UserRecord, doctor: &mut UserRecord) {
    let snapshot = doctor.doctor_snapshot();
    let entry = patient.patient_entry(Utc::now());
    if let Some(profile) = patient.as_patient_mut() {
        profile.preferred_doctor = snapshot;
    }
    if let Some(profile) = doctor.as_doctor_mut() {
        profile.attach_patient(entry);
    }
}

/// Set `doctor_id` as the patient's preferred doctor, moving the patient off
/// the previous doctor's list. Re-assigning the current doctor refreshes the
/// snapshot and leaves the list untouched.
pub fn assign_preferred_doctor(
    conn: &mut Connection,
    patient_id: &Uuid,
    doctor_id: &Uuid,
) -> Result<UserRecord, AssociationError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut patient = db::get_user(&tx, patient_id)?.ok_or(AssociationError::NotFound {
        entity: "Patient",
        id: *patient_id,
    })?;
    if patient.role() != Role::Patient {
        return Err(AssociationError::InvalidRole {
            id: *patient_id,
            expected: Role::Patient,
        });
    }
    let mut doctor = load_doctor(&tx, doctor_id)?;

    if let Some(old_id) = patient.preferred_doctor_id().filter(|old| old != doctor_id) {
        match db::get_user(&tx, &old_id)? {
            Some(mut old) => {
                let removed = old
                    .as_doctor_mut()
                    .map(|d| d.detach_patient(patient_id))
                    .unwrap_or(false);
                if removed {
                    db::update_user(&tx, &old)?;
                }
            }
            None => tracing::warn!(
                patient_id = %patient_id,
                doctor_id = %old_id,
                "Previous preferred doctor missing, skipping detach"
            ),
        }
    }

    link(&mut patient, &mut doctor);
    db::update_user(&tx, &doctor)?;
    db::update_user(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(patient_id = %patient_id, doctor_id = %doctor_id, "Preferred doctor assigned");
    Ok(patient)
}

/// Insert a new patient and, if `doctor_id` is given, attach them to that
/// doctor. The doctor is validated first; on failure nothing is written.
pub fn register_patient_with_optional_doctor(
    conn: &mut Connection,
    mut patient: UserRecord,
    doctor_id: Option<Uuid>,
) -> Result<UserRecord, AssociationError> {
    if patient.role() != Role::Patient {
        return Err(AssociationError::InvalidRole {
            id: patient.id,
            expected: Role::Patient,
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let doctor = doctor_id.map(|id| load_doctor(&tx, &id)).transpose()?;

    match doctor {
        Some(mut doctor) => {
            link(&mut patient, &mut doctor);
            db::insert_user(&tx, &patient)?;
            db::update_user(&tx, &doctor)?;
        }
        None => {
            if let Some(profile) = patient.as_patient_mut() {
                profile.preferred_doctor = None;
            }
            db::insert_user(&tx, &patient)?;
        }
    }
    tx.commit()?;

    tracing::info!(
        patient_id = %patient.id,
        doctor_id = ?patient.preferred_doctor_id(),
        "Patient registered"
    );
    Ok(patient)
}

/// Clear the patient's preferred doctor and remove them from that doctor's
/// list. A patient without a preferred doctor is returned unchanged.
pub fn detach_patient(
    conn: &mut Connection,
    patient_id: &Uuid,
) -> Result<UserRecord, AssociationError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut patient = db::get_user(&tx, patient_id)?.ok_or(AssociationError::NotFound {
        entity: "Patient",
        id: *patient_id,
    })?;
    let Some(profile) = patient.as_patient_mut() else {
        return Err(AssociationError::InvalidRole {
            id: *patient_id,
            expected: Role::Patient,
        });
    };
    let Some(previous) = profile.preferred_doctor.take() else {
        return Ok(patient);
    };

    if let Some(mut doctor) = db::get_user(&tx, &previous.doctor_id)? {
        if doctor
            .as_doctor_mut()
            .map(|d| d.detach_patient(patient_id))
            .unwrap_or(false)
        {
            db::update_user(&tx, &doctor)?;
        }
    }
    db::update_user(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(patient_id = %patient_id, doctor_id = %previous.doctor_id, "Patient detached");
    Ok(patient)
}

/// One broken link between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssociationIssue {
    /// The patient names a doctor whose list does not contain them.
    MissingEntry { patient_id: Uuid, doctor_id: Uuid },
    /// The patient names an id that is not a doctor.
    DanglingPreference { patient_id: Uuid, doctor_id: Uuid },
    /// A doctor lists a patient who points elsewhere (or nowhere).
    StaleEntry { doctor_id: Uuid, patient_id: Uuid },
    /// A doctor lists the same patient more than once.
    DuplicateEntry { doctor_id: Uuid, patient_id: Uuid },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssociationReport {
    pub patients_checked: usize,
    pub doctors_checked: usize,
    pub issues: Vec<AssociationIssue>,
}

impl AssociationReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Scan every account and report association links that disagree.
pub fn check_associations(conn: &Connection) -> Result<AssociationReport, DatabaseError> {
    let patients = db::list_users_by_role(conn, Role::Patient)?;
    let doctors = db::list_users_by_role(conn, Role::Doctor)?;
    let mut issues = Vec::new();

    let preferred: HashMap<Uuid, Option<Uuid>> = patients
        .iter()
        .map(|p| (p.id, p.preferred_doctor_id()))
        .collect();
    let listed: HashMap<Uuid, HashSet<Uuid>> = doctors
        .iter()
        .filter_map(|d| {
            d.as_doctor()
                .map(|p| (d.id, p.patients.iter().map(|e| e.patient_id).collect()))
        })
        .collect();

    for patient in &patients {
        let Some(doctor_id) = patient.preferred_doctor_id() else {
            continue;
        };
        match listed.get(&doctor_id) {
            Some(entries) if entries.contains(&patient.id) => {}
            Some(_) => issues.push(AssociationIssue::MissingEntry {
                patient_id: patient.id,
                doctor_id,
            }),
            None => issues.push(AssociationIssue::DanglingPreference {
                patient_id: patient.id,
                doctor_id,
            }),
        }
    }

    for doctor in &doctors {
        let Some(profile) = doctor.as_doctor() else {
            continue;
        };
        let mut seen = HashSet::new();
        for entry in &profile.patients {
            if !seen.insert(entry.patient_id) {
                issues.push(AssociationIssue::DuplicateEntry {
                    doctor_id: doctor.id,
                    patient_id: entry.patient_id,
                });
                continue;
            }
            if preferred.get(&entry.patient_id).copied().flatten() != Some(doctor.id) {
                issues.push(AssociationIssue::StaleEntry {
                    doctor_id: doctor.id,
                    patient_id: entry.patient_id,
                });
            }
        }
    }

    Ok(AssociationReport {
        patients_checked: patients.len(),
        doctors_checked: doctors.len(),
        issues,
    })
}
