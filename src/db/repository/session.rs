use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::Role;

/// A stored bearer-token session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Fixed-width UTC timestamps so SQL string comparison orders correctly.
fn encode_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    session: &AuthSession,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO auth_sessions (token_hash, user_id, role, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            token_hash.as_slice(),
            session.user_id.to_string(),
            session.role.as_str(),
            encode_ts(session.issued_at),
            encode_ts(session.expires_at),
        ],
    )?;
    Ok(())
}

pub fn find_session(
    conn: &Connection,
    token_hash: &[u8; 32],
) -> Result<Option<AuthSession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT user_id, role, issued_at, expires_at FROM auth_sessions WHERE token_hash = ?1",
            params![token_hash.as_slice()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((user_id, role, issued_at, expires_at)) = row else {
        return Ok(None);
    };

    let corrupt = |reason: String| DatabaseError::CorruptDocument {
        id: format!("session of {user_id}"),
        reason,
    };
    let parse_ts = |s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(e.to_string()))
    };

    Ok(Some(AuthSession {
        user_id: Uuid::parse_str(&user_id).map_err(|e| corrupt(e.to_string()))?,
        role: role.parse()?,
        issued_at: parse_ts(&issued_at)?,
        expires_at: parse_ts(&expires_at)?,
    }))
}

pub fn delete_session(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_sessions WHERE token_hash = ?1",
        params![token_hash.as_slice()],
    )?;
    Ok(deleted > 0)
}

/// Drop sessions that expired before `now`.
pub fn purge_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM auth_sessions WHERE expires_at <= ?1",
        params![encode_ts(now)],
    )?;
    Ok(deleted)
}
