//! Credential store: password hashing and opaque bearer-token sessions.
//!
//! Passwords are stored as `pbkdf2-sha256$<iterations>$<salt>$<hash>`
//! (standard base64). Tokens are 32 random bytes, URL-safe base64; only
//! their SHA-256 reaches the database.

use base64::Engine;
use chrono::{DateTime, Utc};
use pbkdf2::pbkdf2_hmac;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

use crate::db::{self, AuthSession, DatabaseError};
use crate::models::UserRecord;

pub const HASH_SCHEME: &str = "pbkdf2-sha256";
pub const PBKDF2_ITERATIONS: u32 = if cfg!(test) { 1_000 } else { 210_000 };
pub const KEY_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Unknown or revoked token")]
    UnknownToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    let mut out = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

/// Generate a cryptographically random salt
fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Hash a password with a fresh salt.
pub fn hash_password(password: &str) -> String {
    let b64 = base64::engine::general_purpose::STANDARD;
    let salt = generate_salt();
    let mut key = derive(password, &salt, PBKDF2_ITERATIONS);
    let encoded = format!(
        "{HASH_SCHEME}${PBKDF2_ITERATIONS}${}${}",
        b64.encode(salt),
        b64.encode(key)
    );
    key.zeroize();
    encoded
}

/// Check a password against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CredentialError> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(CredentialError::MalformedHash);
    };
    if scheme != HASH_SCHEME {
        return Err(CredentialError::MalformedHash);
    }
    let iterations: u32 = iterations
        .parse()
        .map_err(|_| CredentialError::MalformedHash)?;
    let salt = b64.decode(salt).map_err(|_| CredentialError::MalformedHash)?;
    let expected = b64
        .decode(expected)
        .map_err(|_| CredentialError::MalformedHash)?;
    if iterations == 0 || expected.len() != KEY_LENGTH {
        return Err(CredentialError::MalformedHash);
    }

    let mut key = derive(password, &salt, iterations);
    let matches = key.ct_eq(expected.as_slice()).unwrap_u8() == 1;
    key.zeroize();
    Ok(matches)
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Issue a bearer token for `user`, valid for `ttl`.
pub fn issue_token(
    conn: &Connection,
    user: &UserRecord,
    ttl: chrono::Duration,
) -> Result<String, CredentialError> {
    let token = generate_token();
    let now = Utc::now();
    db::insert_session(
        conn,
        &hash_token(&token),
        &AuthSession {
            user_id: user.id,
            role: user.role(),
            issued_at: now,
            expires_at: now + ttl,
        },
    )?;
    tracing::debug!(user_id = %user.id, role = %user.role(), "Session issued");
    Ok(token)
}

/// Resolve a bearer token to its session. Expired sessions are deleted.
pub fn verify_token(
    conn: &Connection,
    token: &str,
    now: DateTime<Utc>,
) -> Result<AuthSession, CredentialError> {
    let hash = hash_token(token);
    let session = db::find_session(conn, &hash)?.ok_or(CredentialError::UnknownToken)?;
    if session.is_expired_at(now) {
        db::delete_session(conn, &hash)?;
        return Err(CredentialError::TokenExpired);
    }
    Ok(session)
}

/// Revoke a bearer token. Returns `false` if it was not known.
pub fn revoke_token(conn: &Connection, token: &str) -> Result<bool, CredentialError> {
    Ok(db::delete_session(conn, &hash_token(token))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_user, open_memory_database};
    use crate::models::{CommonProfile, DoctorProfile, Role, RoleProfile};
    use uuid::Uuid;

    fn seed_doctor(conn: &Connection) -> UserRecord {
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: "doc@example.com".into(),
            phone: "1".into(),
            password_hash: hash_password("secret"),
            full_name: "Doc".into(),
            created_at: Utc::now(),
            common: CommonProfile::default(),
            profile: RoleProfile::Doctor(DoctorProfile::default()),
        };
        insert_user(conn, &user).unwrap();
        user
    }

    #[test]
    fn password_verifies_against_its_hash() {
        let stored = hash_password("correct horse");
        assert!(stored.starts_with("pbkdf2-sha256$"));
        assert!(verify_password("correct horse", &stored).unwrap());
        assert!(!verify_password("wrong horse", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("pw"), hash_password("pw"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        for stored in ["", "plain", "bcrypt$10$a$b", "pbkdf2-sha256$x$AAAA$AAAA", "pbkdf2-sha256$10$AAAA$AAAA"] {
            assert!(
                matches!(verify_password("pw", stored), Err(CredentialError::MalformedHash)),
                "expected malformed for {stored:?}"
            );
        }
    }

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn issued_token_resolves_to_subject_and_role() {
        let conn = open_memory_database().unwrap();
        let user = seed_doctor(&conn);
        let token = issue_token(&conn, &user, chrono::Duration::days(7)).unwrap();

        let session = verify_token(&conn, &token, Utc::now()).unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.role, Role::Doctor);
    }

    #[test]
    fn expired_token_is_rejected_and_removed() {
        let conn = open_memory_database().unwrap();
        let user = seed_doctor(&conn);
        let token = issue_token(&conn, &user, chrono::Duration::minutes(1)).unwrap();

        let later = Utc::now() + chrono::Duration::minutes(2);
        assert!(matches!(
            verify_token(&conn, &token, later),
            Err(CredentialError::TokenExpired)
        ));
        assert!(matches!(
            verify_token(&conn, &token, Utc::now()),
            Err(CredentialError::UnknownToken)
        ));
    }

    #[test]
    fn revoked_token_no_longer_verifies() {
        let conn = open_memory_database().unwrap();
        let user = seed_doctor(&conn);
        let token = issue_token(&conn, &user, chrono::Duration::days(1)).unwrap();
        assert!(revoke_token(&conn, &token).unwrap());
        assert!(verify_token(&conn, &token, Utc::now()).is_err());
    }
}
