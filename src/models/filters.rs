use serde::Deserialize;

use super::user::DoctorProfile;

/// Doctor directory filter. Both fields are case-insensitive substring matches.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DoctorFilter {
    pub specialization: Option<String>,
    pub city: Option<String>,
}

impl DoctorFilter {
    pub fn matches(&self, doctor: &DoctorProfile) -> bool {
        contains_ci(Some(&doctor.specialization), self.specialization.as_deref())
            && contains_ci(doctor.clinic_city.as_deref(), self.city.as_deref())
    }
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match needle.map(str::trim).filter(|n| !n.is_empty()) {
        None => true,
        Some(needle) => haystack
            .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
    }
}
