use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;
use super::schedule::WeeklySlots;

/// Rating assigned to newly registered doctors.
pub const DEFAULT_DOCTOR_RATING: f32 = 4.5;

/// Consultation fee assigned when a doctor signs up without one.
pub const DEFAULT_CONSULTATION_FEE: u32 = 500;

/// A registered account. Role-specific data lives in `profile`; the role
/// itself is the variant, so it cannot change after creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub common: CommonProfile,
    #[serde(flatten)]
    pub profile: RoleProfile,
}

/// Profile fields shared by both roles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonProfile {
    pub gender: Option<String>,
    pub age: Option<u32>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    pub allergies: Option<String>,
    pub medications: Option<String>,
    pub emergency_name: Option<String>,
    pub emergency_phone: Option<String>,
    /// Denormalized copy of the doctor's name and specialization, taken at
    /// assignment time. Later doctor edits are not reflected here.
    pub preferred_doctor: Option<PreferredDoctor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredDoctor {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub doctor_specialization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub specialization: String,
    pub qualifications: Option<String>,
    #[serde(default)]
    pub experience: u32,
    pub license_number: Option<String>,
    pub clinic_address: Option<String>,
    pub clinic_city: Option<String>,
    pub clinic_state: Option<String>,
    pub clinic_pincode: Option<String>,
    pub clinic_phone: Option<String>,
    pub consultation_fee: u32,
    #[serde(default)]
    pub available_slots: WeeklySlots,
    pub rating: f32,
    #[serde(default)]
    pub patients: Vec<PatientEntry>,
}

impl Default for DoctorProfile {
    fn default() -> Self {
        Self {
            specialization: String::new(),
            qualifications: None,
            experience: 0,
            license_number: None,
            clinic_address: None,
            clinic_city: None,
            clinic_state: None,
            clinic_pincode: None,
            clinic_phone: None,
            consultation_fee: DEFAULT_CONSULTATION_FEE,
            available_slots: WeeklySlots::default(),
            rating: DEFAULT_DOCTOR_RATING,
            patients: Vec::new(),
        }
    }
}

/// A patient as listed on their preferred doctor's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientEntry {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl DoctorProfile {
    /// Patient count, always the length of the list.
    pub fn total_patients(&self) -> usize {
        self.patients.len()
    }

    pub fn has_patient(&self, patient_id: &Uuid) -> bool {
        self.patients.iter().any(|p| &p.patient_id == patient_id)
    }

    /// Append an entry unless the patient is already listed. Returns `true` if added.
    pub fn attach_patient(&mut self, entry: PatientEntry) -> bool {
        if self.has_patient(&entry.patient_id) {
            return false;
        }
        self.patients.push(entry);
        true
    }

    /// Remove every entry for the patient. Returns `true` if anything was removed.
    pub fn detach_patient(&mut self, patient_id: &Uuid) -> bool {
        let before = self.patients.len();
        self.patients.retain(|p| &p.patient_id != patient_id);
        self.patients.len() != before
    }
}

impl UserRecord {
    pub fn role(&self) -> Role {
        match self.profile {
            RoleProfile::Patient(_) => Role::Patient,
            RoleProfile::Doctor(_) => Role::Doctor,
        }
    }

    pub fn as_patient(&self) -> Option<&PatientProfile> {
        match &self.profile {
            RoleProfile::Patient(p) => Some(p),
            RoleProfile::Doctor(_) => None,
        }
    }

    pub fn as_patient_mut(&mut self) -> Option<&mut PatientProfile> {
        match &mut self.profile {
            RoleProfile::Patient(p) => Some(p),
            RoleProfile::Doctor(_) => None,
        }
    }

    pub fn as_doctor(&self) -> Option<&DoctorProfile> {
        match &self.profile {
            RoleProfile::Doctor(d) => Some(d),
            RoleProfile::Patient(_) => None,
        }
    }

    pub fn as_doctor_mut(&mut self) -> Option<&mut DoctorProfile> {
        match &mut self.profile {
            RoleProfile::Doctor(d) => Some(d),
            RoleProfile::Patient(_) => None,
        }
    }

    pub fn preferred_doctor_id(&self) -> Option<Uuid> {
        self.as_patient()
            .and_then(|p| p.preferred_doctor.as_ref())
            .map(|d| d.doctor_id)
    }

    /// The entry this patient gets on a doctor's list.
    pub fn patient_entry(&self, created_at: DateTime<Utc>) -> PatientEntry {
        PatientEntry {
            patient_id: self.id,
            patient_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            created_at,
        }
    }

    /// Snapshot of this doctor for a patient's `preferredDoctor`.
    pub fn doctor_snapshot(&self) -> Option<PreferredDoctor> {
        self.as_doctor().map(|d| PreferredDoctor {
            doctor_id: self.id,
            doctor_name: self.full_name.clone(),
            doctor_specialization: d.specialization.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "asha@example.com".into(),
            phone: "9999999999".into(),
            password_hash: "hash".into(),
            full_name: "Asha Rao".into(),
            created_at: Utc::now(),
            common: CommonProfile::default(),
            profile: RoleProfile::Patient(PatientProfile::default()),
        }
    }

    #[test]
    fn role_follows_variant() {
        let mut user = patient();
        assert_eq!(user.role(), Role::Patient);
        user.profile = RoleProfile::Doctor(DoctorProfile::default());
        assert_eq!(user.role(), Role::Doctor);
        assert!(user.as_patient().is_none());
    }

    #[test]
    fn doctor_defaults_match_registration_rules() {
        let doctor = DoctorProfile::default();
        assert_eq!(doctor.rating, 4.5);
        assert_eq!(doctor.consultation_fee, 500);
        assert_eq!(doctor.total_patients(), 0);
    }

    #[test]
    fn attach_is_idempotent_per_patient() {
        let p = patient();
        let mut doctor = DoctorProfile::default();
        assert!(doctor.attach_patient(p.patient_entry(Utc::now())));
        assert!(!doctor.attach_patient(p.patient_entry(Utc::now())));
        assert_eq!(doctor.total_patients(), 1);
    }

    #[test]
    fn detach_unknown_patient_is_noop() {
        let mut doctor = DoctorProfile::default();
        assert!(!doctor.detach_patient(&Uuid::new_v4()));
        assert_eq!(doctor.total_patients(), 0);
    }

    #[test]
    fn serialization_hides_password_and_tags_role() {
        let json = serde_json::to_value(patient()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["role"], "patient");
        assert_eq!(json["fullName"], "Asha Rao");
        assert!(json["preferredDoctor"].is_null());
    }

    #[test]
    fn role_profile_json_round_trip_keeps_variant() {
        let profile = RoleProfile::Doctor(DoctorProfile {
            specialization: "Cardiology".into(),
            ..DoctorProfile::default()
        });
        let json = serde_json::to_string(&profile).unwrap();
        let back: RoleProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
