//! User accounts and caller identification.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::{HostelError, Result};
use crate::roles::{Actor, Role};
use crate::sql::unique_as_validation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub phone: String,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            role: row.get(5)?,
            phone: row.get(6)?,
            address: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

const COLUMNS: &str =
    "id, username, email, first_name, last_name, role, phone, address, is_active, created_at";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

pub fn create_user(conn: &Connection, new: &NewUser) -> Result<User> {
    let username = new.username.trim();
    if username.is_empty() {
        return Err(HostelError::validation("username", "must not be empty"));
    }
    let role = new
        .role
        .ok_or_else(|| HostelError::validation("role", "is required"))?;

    conn.execute(
        "INSERT INTO users (username, email, first_name, last_name, role, phone, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            username,
            new.email.trim(),
            new.first_name.trim(),
            new.last_name.trim(),
            role,
            new.phone.trim(),
            new.address.trim(),
            Utc::now(),
        ],
    )
    .map_err(|e| unique_as_validation(e, "username", "is already taken"))?;

    let id = conn.last_insert_rowid();
    tracing::info!(user_id = id, username, role = %role, "user created");
    get_user(conn, id)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        [id],
        User::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("user", id))
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM users WHERE (?1 IS NULL OR role = ?1) ORDER BY id"
    ))?;
    let users = stmt
        .query_map([role], User::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Deactivated users keep their history but can no longer act.
pub fn deactivate_user(conn: &Connection, id: i64) -> Result<User> {
    let changed = conn.execute("UPDATE users SET is_active = 0 WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(HostelError::not_found("user", id));
    }
    tracing::info!(user_id = id, "user deactivated");
    get_user(conn, id)
}

/// Turn a caller-supplied user id into an [`Actor`]. Unknown and inactive
/// users are unidentified, not forbidden.
pub fn resolve_actor(conn: &Connection, user_id: i64) -> Result<Actor> {
    let found: Option<(Role, bool)> = conn
        .query_row(
            "SELECT role, is_active FROM users WHERE id = ?1",
            [user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match found {
        Some((role, true)) => Ok(Actor::new(user_id, role)),
        Some((_, false)) => Err(HostelError::Unidentified(format!(
            "user {user_id} is deactivated"
        ))),
        None => Err(HostelError::Unidentified(format!("no user with id {user_id}"))),
    }
}
