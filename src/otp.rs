//! One-time-password login.
//!
//! A challenge is keyed by the normalized phone number. Requesting a new
//! code replaces the old one; a successful check consumes it. Expired
//! challenges are dropped on read and by a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::Connection;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::db::{self, DatabaseError};
use crate::messaging::{DispatchError, MessageDispatcher};
use crate::models::{Role, UserRecord};

pub const CODE_LENGTH: usize = 6;

#[derive(Error, Debug)]
pub enum OtpError {
    #[error("Phone number is required")]
    InvalidPhone,

    #[error("No {role} registered with this phone number")]
    UserNotFound { role: Role },

    #[error("OTP not found or expired")]
    NoChallenge,

    #[error("OTP expired")]
    Expired,

    #[error("Invalid OTP, {remaining} attempt(s) left")]
    Invalid { remaining: u32 },

    #[error("Too many invalid attempts, request a new OTP")]
    Exhausted,

    #[error("Challenge store unavailable")]
    StoreUnavailable,

    #[error("Failed to send OTP: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// A pending code for one phone number.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub failed_attempts: u32,
}

impl Challenge {
    /// A code is still good at exactly `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Storage for pending challenges.
pub trait ChallengeStore: Send + Sync {
    /// Store a challenge, replacing any existing one for `phone`.
    fn put(&self, phone: &str, challenge: Challenge) -> Result<(), OtpError>;

    /// Remove and return the challenge for `phone`.
    fn take(&self, phone: &str) -> Result<Option<Challenge>, OtpError>;

    /// Put a challenge back only if no newer one was stored meanwhile.
    fn restore(&self, phone: &str, challenge: Challenge) -> Result<(), OtpError>;

    /// Drop every challenge expired at `now`. Returns how many were dropped.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpError>;
}

#[derive(Default)]
pub struct InMemoryChallengeStore {
    entries: Mutex<HashMap<String, Challenge>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn put(&self, phone: &str, challenge: Challenge) -> Result<(), OtpError> {
        let mut entries = self.entries.lock().map_err(|_| OtpError::StoreUnavailable)?;
        entries.insert(phone.to_string(), challenge);
        Ok(())
    }

    fn take(&self, phone: &str) -> Result<Option<Challenge>, OtpError> {
        let mut entries = self.entries.lock().map_err(|_| OtpError::StoreUnavailable)?;
        Ok(entries.remove(phone))
    }

    fn restore(&self, phone: &str, challenge: Challenge) -> Result<(), OtpError> {
        let mut entries = self.entries.lock().map_err(|_| OtpError::StoreUnavailable)?;
        entries.entry(phone.to_string()).or_insert(challenge);
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpError> {
        let mut entries = self.entries.lock().map_err(|_| OtpError::StoreUnavailable)?;
        let before = entries.len();
        entries.retain(|_, c| !c.is_expired_at(now));
        Ok(before - entries.len())
    }
}

/// Strip spaces and dashes; numbers without a leading `+` get `country_code`.
pub fn normalize_phone(phone: &str, country_code: &str) -> String {
    let digits: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if digits.starts_with('+') {
        digits
    } else {
        format!("{country_code}{digits}")
    }
}

/// Every spelling under which a number may have been stored at signup.
pub fn phone_candidates(phone: &str, country_code: &str) -> Vec<String> {
    let raw = phone.trim().to_string();
    let normalized = normalize_phone(phone, country_code);
    let local = normalized.strip_prefix(country_code).map(str::to_string);

    let mut candidates: Vec<String> = Vec::new();
    for candidate in [Some(raw), local, Some(normalized)].into_iter().flatten() {
        if !candidate.is_empty() && !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:0width$}", width = CODE_LENGTH)
}

/// Issues and checks challenges against an injected store.
#[derive(Clone)]
pub struct OtpVerifier {
    store: Arc<dyn ChallengeStore>,
    ttl: chrono::Duration,
    max_attempts: u32,
    country_code: String,
}

impl OtpVerifier {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        ttl: chrono::Duration,
        max_attempts: u32,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            store,
            ttl,
            max_attempts: max_attempts.max(1),
            country_code: country_code.into(),
        }
    }

    /// In-memory verifier with the configured TTL, attempt limit and country code.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryChallengeStore::new()),
            config.otp_ttl,
            config.otp_max_attempts,
            config.country_code.clone(),
        )
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn normalize(&self, phone: &str) -> String {
        normalize_phone(phone, &self.country_code)
    }

    /// Create a fresh challenge for `phone`, replacing any pending one.
    /// Returns the code so the caller can deliver it.
    pub fn issue_at(&self, phone: &str, now: DateTime<Utc>) -> Result<String, OtpError> {
        let code = generate_code();
        self.store.put(
            &self.normalize(phone),
            Challenge {
                code: code.clone(),
                created_at: now,
                expires_at: now + self.ttl,
                failed_attempts: 0,
            },
        )?;
        Ok(code)
    }

    /// Remove the challenge carrying `code`, leaving a newer one in place.
    pub fn withdraw(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        let key = self.normalize(phone);
        if let Some(challenge) = self.store.take(&key)? {
            if challenge.code != code {
                self.store.restore(&key, challenge)?;
            }
        }
        Ok(())
    }

    /// Check `code` for `phone`. Success consumes the challenge; a wrong
    /// code counts against the attempt limit.
    pub fn verify_at(&self, phone: &str, code: &str, now: DateTime<Utc>) -> Result<(), OtpError> {
        let key = self.normalize(phone);
        let mut challenge = self.store.take(&key)?.ok_or(OtpError::NoChallenge)?;

        if challenge.is_expired_at(now) {
            return Err(OtpError::Expired);
        }

        let supplied = code.trim().as_bytes();
        if challenge.code.as_bytes().ct_eq(supplied).unwrap_u8() == 1 {
            return Ok(());
        }

        challenge.failed_attempts += 1;
        if challenge.failed_attempts >= self.max_attempts {
            tracing::warn!("OTP challenge exhausted after {} attempts", challenge.failed_attempts);
            return Err(OtpError::Exhausted);
        }
        let remaining = self.max_attempts - challenge.failed_attempts;
        self.store.restore(&key, challenge)?;
        Err(OtpError::Invalid { remaining })
    }

    pub fn verify(&self, phone: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(phone, code, Utc::now())
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<usize, OtpError> {
        self.store.purge_expired(now)
    }
}

fn find_user_by_phone(
    conn: &Connection,
    phone: &str,
    role: Role,
    country_code: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let candidates = phone_candidates(phone, country_code);
    let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
    db::find_user_by_phone_and_role(conn, &refs, role)
}

/// Send a new code to a registered `phone` of `role`. Returns the
/// normalized number the code went to.
pub fn request_challenge(
    conn: &Connection,
    verifier: &OtpVerifier,
    dispatcher: &dyn MessageDispatcher,
    phone: &str,
    role: Role,
) -> Result<String, OtpError> {
    if phone.trim().is_empty() {
        return Err(OtpError::InvalidPhone);
    }
    let user = find_user_by_phone(conn, phone, role, verifier.country_code())?
        .ok_or(OtpError::UserNotFound { role })?;

    let to = verifier.normalize(phone);
    let code = verifier.issue_at(phone, Utc::now())?;
    let body = format!("Your OTP for Mediconnect is {code}");
    if let Err(err) = dispatcher.send(&to, &body) {
        verifier.withdraw(phone, &code)?;
        tracing::error!(user_id = %user.id, error = %err, "OTP dispatch failed");
        return Err(err.into());
    }

    tracing::info!(user_id = %user.id, role = %role, "OTP issued");
    Ok(to)
}

/// Check a code and resolve the account it logs into.
pub fn verify_challenge(
    conn: &Connection,
    verifier: &OtpVerifier,
    phone: &str,
    code: &str,
    role: Role,
) -> Result<UserRecord, OtpError> {
    if phone.trim().is_empty() {
        return Err(OtpError::InvalidPhone);
    }
    verifier.verify(phone, code)?;
    let user = find_user_by_phone(conn, phone, role, verifier.country_code())?
        .ok_or(OtpError::UserNotFound { role })?;
    tracing::info!(user_id = %user.id, role = %role, "OTP verified");
    Ok(user)
}

/// Periodically drop expired challenges until the task is aborted.
pub fn spawn_sweeper(verifier: OtpVerifier, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match verifier.sweep(Utc::now()) {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Purged {n} expired OTP challenge(s)"),
                Err(e) => tracing::warn!("OTP sweep failed: {e}"),
            }
        }
    })
}
