use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_enum, parse_uuid};
use crate::db::DatabaseError;
use crate::models::User;

const COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
     phone_number, role, is_active, is_verified, created_at, updated_at, last_login";

fn user_from_row(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: parse_uuid(0, row.get(0)?)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone_number: row.get(6)?,
        role: parse_enum(7, row.get(7)?)?,
        is_active: row.get(8)?,
        is_verified: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        last_login: row.get(12)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, first_name, last_name,
         phone_number, role, is_active, is_verified, created_at, updated_at, last_login)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            user.id.to_string(),
            user.username,
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.phone_number,
            user.role.as_str(),
            user.is_active,
            user.is_verified,
            user.created_at,
            user.updated_at,
            user.last_login,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {COLUMNS} FROM users WHERE id = ?1"))?;
    let result = stmt.query_row(params![id.to_string()], user_from_row);
    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Look up by username or email — login accepts either.
pub fn get_user_by_identifier(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE username = ?1 OR email = ?1"
    ))?;
    let result = stmt.query_row(params![identifier], user_from_row);
    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn touch_last_login(
    conn: &Connection,
    id: &Uuid,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
        params![now, id.to_string()],
    )?;
    Ok(())
}

pub fn update_password_hash(
    conn: &Connection,
    id: &Uuid,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now, id.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::UserRole;

    pub(crate) fn sample_user(username: &str, email: &str, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: "$2b$12$hash".into(),
            first_name: None,
            last_name: None,
            phone_number: None,
            role,
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let user = sample_user("alice", "alice@x.com", UserRole::User);
        insert_user(&conn, &user).unwrap();

        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.role, UserRole::User);
        assert!(loaded.is_active);
        assert!(loaded.last_login.is_none());
    }

    #[test]
    fn identifier_lookup_matches_username_and_email() {
        let conn = open_memory_database().unwrap();
        let user = sample_user("alice", "alice@x.com", UserRole::User);
        insert_user(&conn, &user).unwrap();

        let by_name = get_user_by_identifier(&conn, "alice").unwrap().unwrap();
        let by_email = get_user_by_identifier(&conn, "alice@x.com").unwrap().unwrap();
        assert_eq!(by_name.id, by_email.id);
        assert!(get_user_by_identifier(&conn, "bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_a_typed_unique_violation() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &sample_user("alice", "a@x.com", UserRole::User)).unwrap();
        let err = insert_user(&conn, &sample_user("alice", "b@x.com", UserRole::User)).unwrap_err();
        assert!(err.is_unique_violation(), "got {err:?}");
    }

    #[test]
    fn last_login_and_password_updates() {
        let conn = open_memory_database().unwrap();
        let user = sample_user("alice", "alice@x.com", UserRole::User);
        insert_user(&conn, &user).unwrap();

        let now = Utc::now();
        touch_last_login(&conn, &user.id, now).unwrap();
        update_password_hash(&conn, &user.id, "$2b$12$other", now).unwrap();

        let loaded = get_user(&conn, &user.id).unwrap().unwrap();
        assert!(loaded.last_login.is_some());
        assert_eq!(loaded.password_hash, "$2b$12$other");
    }
}
