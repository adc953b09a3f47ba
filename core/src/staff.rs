//! Staff records attached to existing non-student accounts.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{HostelError, Result};
use crate::roles::Role;
use crate::sql::{sql_text_enum, unique_as_validation};
use crate::users;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StaffType {
    Warden,
    DeputyRt,
    MessStaff,
    Maintenance,
    Security,
}

sql_text_enum!(StaffType);

impl StaffType {
    /// The account role this staff type is tied to, if any. Maintenance and
    /// security staff can sit on any staff account.
    pub fn role(self) -> Option<Role> {
        match self {
            StaffType::Warden => Some(Role::Warden),
            StaffType::DeputyRt => Some(Role::DeputyRt),
            StaffType::MessStaff => Some(Role::MessStaff),
            StaffType::Maintenance | StaffType::Security => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffMember {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub staff_code: String,
    pub staff_type: StaffType,
    pub department: String,
    pub hire_date: NaiveDate,
    pub salary: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl StaffMember {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            staff_code: row.get(3)?,
            staff_type: row.get(4)?,
            department: row.get(5)?,
            hire_date: row.get(6)?,
            salary: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

const SELECT: &str = "SELECT st.id, st.user_id, u.username, st.staff_code, st.staff_type,
        st.department, st.hire_date, st.salary, st.is_active, st.created_at
    FROM staff st
    JOIN users u ON u.id = st.user_id";

#[derive(Debug, Clone, Deserialize)]
pub struct NewStaff {
    pub user_id: i64,
    pub staff_code: String,
    pub staff_type: StaffType,
    #[serde(default)]
    pub department: String,
    pub hire_date: NaiveDate,
    pub salary: i64,
}

pub fn create_staff(conn: &Connection, new: &NewStaff) -> Result<StaffMember> {
    let code = new.staff_code.trim();
    if code.is_empty() {
        return Err(HostelError::validation("staff_code", "must not be empty"));
    }
    if new.salary < 0 {
        return Err(HostelError::validation("salary", "must not be negative"));
    }

    let user = users::get_user(conn, new.user_id)?;
    if !user.role.is_staff() {
        return Err(HostelError::validation(
            "user_id",
            "student accounts cannot hold a staff record",
        ));
    }
    if let Some(required) = new.staff_type.role()
        && user.role != required
    {
        return Err(HostelError::validation(
            "staff_type",
            format!(
                "{} staff must hold the {required} role, not {}",
                new.staff_type,
                user.role
            ),
        ));
    }

    conn.execute(
        "INSERT INTO staff (user_id, staff_code, staff_type, department, hire_date, salary, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
        params![
            user.id,
            code,
            new.staff_type,
            new.department.trim(),
            new.hire_date,
            new.salary,
            Utc::now()
        ],
    )
    .map_err(|e| {
        unique_as_validation(
            e,
            "staff_code",
            "staff code or user already has a staff record",
        )
    })?;

    let id = conn.last_insert_rowid();
    tracing::info!(
        staff_id = id,
        user_id = user.id,
        staff_type = %new.staff_type,
        "staff record created"
    );
    conn.query_row(
        &format!("{SELECT} WHERE st.id = ?1"),
        [id],
        StaffMember::from_row,
    )
    .map_err(Into::into)
}

pub fn list_staff(conn: &Connection, staff_type: Option<StaffType>) -> Result<Vec<StaffMember>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT} WHERE (?1 IS NULL OR st.staff_type = ?1) ORDER BY st.staff_code"
    ))?;
    let rows = stmt
        .query_map([staff_type], StaffMember::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count_active(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM staff WHERE is_active = 1",
        [],
        |r| r.get(0),
    )?)
}
