//! Shared types for the API layer: router state, request identity,
//! rate limiting and response views.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::{Role, UserRecord, WeeklySlots};

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self::with_rate_limiter(core, RateLimiter::new())
    }

    pub fn with_rate_limiter(core: Arc<CoreState>, limiter: RateLimiter) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(limiter)),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Auth context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Caller identity, injected into request extensions by the auth
/// middleware after the bearer token has been verified.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    /// The presented token, kept so logout can revoke it.
    pub token: String,
}

impl AuthContext {
    /// Reject callers whose role differs from `role`.
    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Only {role}s can access this")))
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, client: &str) -> Result<(), u64> {
        let now = Instant::now();
        let entries = self.windows.entry(client.to_string()).or_default();

        // Clean entries older than 1 hour
        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Response views
// ═══════════════════════════════════════════════════════════

/// Full account view. Doctors additionally carry `totalPatients`,
/// computed from their patient list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    #[serde(flatten)]
    pub user: UserRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_patients: Option<usize>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            total_patients: user.as_doctor().map(|d| d.total_patients()),
            user,
        }
    }
}

/// Public doctor card used by listings and the public profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: Uuid,
    pub full_name: String,
    pub specialization: String,
    pub qualifications: Option<String>,
    pub experience: u32,
    pub clinic_city: Option<String>,
    pub clinic_phone: Option<String>,
    pub rating: f32,
    pub consultation_fee: u32,
    pub available_slots: WeeklySlots,
    pub total_patients: usize,
}

impl DoctorSummary {
    pub fn from_user(user: &UserRecord) -> Option<Self> {
        let d = user.as_doctor()?;
        Some(Self {
            id: user.id,
            full_name: user.full_name.clone(),
            specialization: d.specialization.clone(),
            qualifications: d.qualifications.clone(),
            experience: d.experience,
            clinic_city: d.clinic_city.clone(),
            clinic_phone: d.clinic_phone.clone(),
            rating: d.rating,
            consultation_fee: d.consultation_fee,
            available_slots: d.available_slots.clone(),
            total_patients: d.total_patients(),
        })
    }
}
