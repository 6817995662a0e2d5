use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const USER_COLUMNS: &str =
    "id, role, email, phone, password_hash, full_name, created_at, common, profile";

/// Raw column values, decoded outside the rusqlite row closure so JSON
/// errors surface as `DatabaseError` instead of conversion failures.
struct UserRow {
    id: String,
    role: String,
    email: String,
    phone: String,
    password_hash: String,
    full_name: String,
    created_at: String,
    common: String,
    profile: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            role: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            password_hash: row.get(4)?,
            full_name: row.get(5)?,
            created_at: row.get(6)?,
            common: row.get(7)?,
            profile: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<UserRecord, DatabaseError> {
        let corrupt = |reason: String| DatabaseError::CorruptDocument {
            id: self.id.clone(),
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("id: {e}")))?;
        let role: Role = self.role.parse()?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt(format!("created_at: {e}")))?
            .with_timezone(&Utc);
        let common: CommonProfile =
            serde_json::from_str(&self.common).map_err(|e| corrupt(format!("common: {e}")))?;
        let profile: RoleProfile =
            serde_json::from_str(&self.profile).map_err(|e| corrupt(format!("profile: {e}")))?;

        let record = UserRecord {
            id,
            email: self.email,
            phone: self.phone,
            password_hash: self.password_hash,
            full_name: self.full_name,
            created_at,
            common,
            profile,
        };
        if record.role() != role {
            return Err(DatabaseError::CorruptDocument {
                id: self.id,
                reason: format!("role column '{role}' disagrees with profile"),
            });
        }
        Ok(record)
    }
}

fn encode_documents(user: &UserRecord) -> Result<(String, String), DatabaseError> {
    let encode = |e: serde_json::Error| DatabaseError::CorruptDocument {
        id: user.id.to_string(),
        reason: e.to_string(),
    };
    let common = serde_json::to_string(&user.common).map_err(encode)?;
    let profile = serde_json::to_string(&user.profile).map_err(encode)?;
    Ok((common, profile))
}

fn is_email_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("users.email")
    )
}

/// Insert a new account. A taken email (any role, any case) is `DuplicateEmail`.
pub fn insert_user(conn: &Connection, user: &UserRecord) -> Result<(), DatabaseError> {
    let (common, profile) = encode_documents(user)?;
    conn.execute(
        "INSERT INTO users (id, role, email, phone, password_hash, full_name, created_at, common, profile)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id.to_string(),
            user.role().as_str(),
            user.email,
            user.phone,
            user.password_hash,
            user.full_name,
            user.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            common,
            profile,
        ],
    )
    .map_err(|e| {
        if is_email_conflict(&e) {
            DatabaseError::DuplicateEmail(user.email.clone())
        } else {
            DatabaseError::from(e)
        }
    })?;
    Ok(())
}

/// Persist mutable fields. Id, email, role and creation time never change.
pub fn update_user(conn: &Connection, user: &UserRecord) -> Result<(), DatabaseError> {
    let (common, profile) = encode_documents(user)?;
    let updated = conn.execute(
        "UPDATE users SET phone = ?3, password_hash = ?4, full_name = ?5, common = ?6, profile = ?7
         WHERE id = ?1 AND role = ?2",
        params![
            user.id.to_string(),
            user.role().as_str(),
            user.phone,
            user.password_hash,
            user.full_name,
            common,
            profile,
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: format!("{} user", user.role()),
            id: user.id.to_string(),
        });
    }
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<UserRecord>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        UserRow::from_row,
    )
    .optional()?
    .map(UserRow::into_record)
    .transpose()
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn find_user_by_email_and_role(
    conn: &Connection,
    email: &str,
    role: Role,
) -> Result<Option<UserRecord>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND role = ?2"),
        params![email, role.as_str()],
        UserRow::from_row,
    )
    .optional()?
    .map(UserRow::into_record)
    .transpose()
}

/// Find an account of `role` whose stored phone equals any of `phones`.
/// Callers pass every accepted spelling of one number (raw, prefixed, bare).
pub fn find_user_by_phone_and_role(
    conn: &Connection,
    phones: &[&str],
    role: Role,
) -> Result<Option<UserRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE phone = ?1 AND role = ?2
         ORDER BY created_at LIMIT 1"
    ))?;
    for phone in phones {
        let found = stmt
            .query_row(params![phone, role.as_str()], UserRow::from_row)
            .optional()?;
        if let Some(row) = found {
            return row.into_record().map(Some);
        }
    }
    Ok(None)
}

pub fn list_users_by_role(conn: &Connection, role: Role) -> Result<Vec<UserRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt
        .query_map(params![role.as_str()], UserRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(UserRow::into_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn make_user(email: &str, phone: &str, profile: RoleProfile) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: email.into(),
            phone: phone.into(),
            password_hash: "pbkdf2$x$y".into(),
            full_name: "Test User".into(),
            created_at: Utc::now(),
            common: CommonProfile {
                age: Some(31),
                ..CommonProfile::default()
            },
            profile,
        }
    }

    fn patient(email: &str) -> UserRecord {
        make_user(email, "9999999999", RoleProfile::Patient(PatientProfile::default()))
    }

    fn doctor(email: &str) -> UserRecord {
        make_user(
            email,
            "8888888888",
            RoleProfile::Doctor(DoctorProfile {
                specialization: "Cardiology".into(),
                ..DoctorProfile::default()
            }),
        )
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let user = doctor("house@example.com");
        insert_user(&conn, &user).unwrap();

        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.email, user.email);
        assert_eq!(loaded.role(), Role::Doctor);
        assert_eq!(loaded.common.age, Some(31));
        assert_eq!(loaded.as_doctor().unwrap().specialization, "Cardiology");
    }

    #[test]
    fn get_missing_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_user(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn duplicate_email_rejected_across_roles() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &patient("same@example.com")).unwrap();
        let err = insert_user(&conn, &doctor("SAME@example.com")).unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
    }

    #[test]
    fn email_exists_is_case_insensitive() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &patient("case@example.com")).unwrap();
        assert!(email_exists(&conn, "CASE@example.com").unwrap());
        assert!(!email_exists(&conn, "other@example.com").unwrap());
    }

    #[test]
    fn find_by_email_requires_matching_role() {
        let conn = open_memory_database().unwrap();
        let user = patient("p@example.com");
        insert_user(&conn, &user).unwrap();
        assert!(find_user_by_email_and_role(&conn, "p@example.com", Role::Patient)
            .unwrap()
            .is_some());
        assert!(find_user_by_email_and_role(&conn, "p@example.com", Role::Doctor)
            .unwrap()
            .is_none());
    }

    #[test]
    fn find_by_phone_tries_each_spelling() {
        let conn = open_memory_database().unwrap();
        let user = patient("phone@example.com");
        insert_user(&conn, &user).unwrap();

        let found =
            find_user_by_phone_and_role(&conn, &["+919999999999", "9999999999"], Role::Patient)
                .unwrap()
                .unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_user_by_phone_and_role(&conn, &["9999999999"], Role::Doctor)
            .unwrap()
            .is_none());
    }

    #[test]
    fn update_persists_profile_document() {
        let conn = open_memory_database().unwrap();
        let mut user = patient("upd@example.com");
        insert_user(&conn, &user).unwrap();

        user.as_patient_mut()
            .unwrap()
            .medical_conditions
            .push("Asthma".into());
        update_user(&conn, &user).unwrap();

        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.as_patient().unwrap().medical_conditions, vec!["Asthma"]);
    }

    #[test]
    fn update_cannot_change_role() {
        let conn = open_memory_database().unwrap();
        let mut user = patient("role@example.com");
        insert_user(&conn, &user).unwrap();

        user.profile = RoleProfile::Doctor(DoctorProfile::default());
        let err = update_user(&conn, &user).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.role(), Role::Patient);
    }

    #[test]
    fn list_by_role_filters() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &patient("a@example.com")).unwrap();
        insert_user(&conn, &doctor("b@example.com")).unwrap();
        insert_user(&conn, &doctor("c@example.com")).unwrap();
        assert_eq!(list_users_by_role(&conn, Role::Doctor).unwrap().len(), 2);
        assert_eq!(list_users_by_role(&conn, Role::Patient).unwrap().len(), 1);
    }

    #[test]
    fn mismatched_role_column_is_reported_corrupt() {
        let conn = open_memory_database().unwrap();
        let user = patient("corrupt@example.com");
        insert_user(&conn, &user).unwrap();
        conn.execute(
            "UPDATE users SET role = 'doctor' WHERE id = ?1",
            params![user.id.to_string()],
        )
        .unwrap();
        let err = get_user(&conn, &user.id).unwrap_err();
        assert!(matches!(err, DatabaseError::CorruptDocument { .. }));
    }
}
