//! Student profiles.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};

use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::ledger;
use crate::notifications::{self, NotificationKind};
use crate::roles::Role;
use crate::sql::unique_as_validation;
use crate::users::{self, NewUser};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_code: String,
    pub department: String,
    pub year_of_study: i64,
    pub parent_name: String,
    pub parent_phone: String,
    pub emergency_contact: String,
    pub room_id: Option<i64>,
    pub room_number: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        match full.trim() {
            "" => self.username.clone(),
            name => name.to_string(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            first_name: row.get(3)?,
            last_name: row.get(4)?,
            email: row.get(5)?,
            student_code: row.get(6)?,
            department: row.get(7)?,
            year_of_study: row.get(8)?,
            parent_name: row.get(9)?,
            parent_phone: row.get(10)?,
            emergency_contact: row.get(11)?,
            room_id: row.get(12)?,
            room_number: row.get(13)?,
            check_in_date: row.get(14)?,
            check_out_date: row.get(15)?,
            is_active: row.get(16)?,
            created_at: row.get(17)?,
        })
    }
}

const SELECT: &str = "SELECT s.id, s.user_id, u.username, u.first_name, u.last_name, u.email,
        s.student_code, s.department, s.year_of_study, s.parent_name, s.parent_phone,
        s.emergency_contact, s.room_id, r.room_number, s.check_in_date, s.check_out_date,
        s.is_active, s.created_at
    FROM students s
    JOIN users u ON u.id = s.user_id
    LEFT JOIN rooms r ON r.id = s.room_id";

/// Registration payload: the account and the profile in one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudent {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    pub student_code: String,
    pub department: String,
    pub year_of_study: i64,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub parent_phone: String,
    #[serde(default)]
    pub emergency_contact: String,
    #[serde(default)]
    pub check_out_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    /// Case-insensitive substring of the department
    pub department: Option<String>,
    pub year_of_study: Option<i64>,
}

/// Create the user account (role student) and the profile atomically.
pub fn create_student(conn: &mut Connection, new: &NewStudent) -> Result<Student> {
    if !(1..=5).contains(&new.year_of_study) {
        return Err(HostelError::validation("year_of_study", "must be between 1 and 5"));
    }
    let code = new.student_code.trim();
    if code.is_empty() {
        return Err(HostelError::validation("student_code", "must not be empty"));
    }
    if new.department.trim().is_empty() {
        return Err(HostelError::validation("department", "must not be empty"));
    }

    let account = NewUser {
        username: new.username.clone(),
        email: new.email.clone(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        role: Some(Role::Student),
        phone: new.phone.clone(),
        address: new.address.clone(),
    };

    let id = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let user = users::create_user(tx, &account)?;
        tx.execute(
            "INSERT INTO students (user_id, student_code, department, year_of_study, parent_name,
                                   parent_phone, emergency_contact, check_out_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id,
                code,
                new.department.trim(),
                new.year_of_study,
                new.parent_name.trim(),
                new.parent_phone.trim(),
                new.emergency_contact.trim(),
                new.check_out_date,
                Utc::now(),
            ],
        )
        .map_err(|e| unique_as_validation(e, "student_code", "is already registered"))?;
        Ok::<_, HostelError>(tx.last_insert_rowid())
    })?;

    tracing::info!(student_id = id, student_code = code, "student registered");
    get_student(conn, id)
}

pub fn get_student(conn: &Connection, id: i64) -> Result<Student> {
    conn.query_row(
        &format!("{SELECT} WHERE s.id = ?1"),
        [id],
        Student::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("student", id))
}

/// The profile belonging to a user account.
pub fn student_for_user(conn: &Connection, user_id: i64) -> Result<Student> {
    conn.query_row(
        &format!("{SELECT} WHERE s.user_id = ?1"),
        [user_id],
        Student::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("student profile for user", user_id))
}

pub fn list_students(conn: &Connection, filter: &StudentFilter) -> Result<Vec<Student>> {
    let department = filter
        .department
        .as_deref()
        .map(|d| format!("%{}%", d.trim().to_lowercase()));
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR lower(s.department) LIKE ?1)
           AND (?2 IS NULL OR s.year_of_study = ?2)
         ORDER BY s.student_code"
    ))?;
    let students = stmt
        .query_map(params![department, filter.year_of_study], Student::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(students)
}

/// Active students registered at or after `since`, newest first.
pub fn registered_since(conn: &Connection, since: DateTime<Utc>) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE s.is_active = 1 AND s.created_at >= ?1
         ORDER BY s.created_at DESC, s.id DESC"
    ))?;
    let students = stmt
        .query_map([since], Student::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(students)
}

/// Active students without a room who registered before `cutoff`.
pub fn unhoused_registered_before(
    conn: &Connection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE s.is_active = 1 AND s.room_id IS NULL AND s.created_at < ?1
         ORDER BY s.created_at, s.id"
    ))?;
    let students = stmt
        .query_map([cutoff], Student::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(students)
}

/// Remove a student and their account.
///
/// Deputies are told first. A room the student holds is released so room
/// occupancy keeps matching the assigned students.
pub fn delete_student(conn: &mut Connection, id: i64) -> Result<()> {
    let student = get_student(conn, id)?;

    execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        notifications::notify_role(
            tx,
            Role::DeputyRt,
            NotificationKind::StudentAction,
            "Student Removed",
            &format!(
                "Student {} has been removed from the system by admin.",
                student.full_name()
            ),
        )?;
        if let Some(room_id) = ledger::release_in_tx(tx, student.id)? {
            tracing::info!(student_id = student.id, room_id, "room released on delete");
        }
        tx.execute("DELETE FROM students WHERE id = ?1", [student.id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", [student.user_id])?;
        Ok::<_, HostelError>(())
    })?;

    tracing::info!(student_id = id, student_code = %student.student_code, "student deleted");
    Ok(())
}
