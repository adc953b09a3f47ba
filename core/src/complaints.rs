//! Student complaints.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{HostelError, Result};
use crate::sql::sql_text_enum;
use crate::students;
use crate::users;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplaintType {
    Maintenance,
    Food,
    Noise,
    Security,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComplaintStatus {
    Pending,
    InProgress,
    Resolved,
    Rejected,
}

sql_text_enum!(ComplaintType, ComplaintStatus);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Complaint {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub complaint_type: ComplaintType,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub assigned_to: Option<i64>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Complaint {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            complaint_type: row.get(3)?,
            title: row.get(4)?,
            description: row.get(5)?,
            status: row.get(6)?,
            assigned_to: row.get(7)?,
            resolution: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            resolved_at: row.get(11)?,
        })
    }
}

const SELECT: &str = "SELECT c.id, c.student_id, s.student_code, c.complaint_type, c.title,
        c.description, c.status, c.assigned_to, c.resolution, c.created_at, c.updated_at,
        c.resolved_at
    FROM complaints c
    JOIN students s ON s.id = c.student_id";

#[derive(Debug, Clone, Deserialize)]
pub struct NewComplaint {
    pub complaint_type: ComplaintType,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComplaintUpdate {
    pub status: ComplaintStatus,
    #[serde(default)]
    pub assigned_to: Option<i64>,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    pub complaint_type: Option<ComplaintType>,
    /// Restrict to one student's complaints
    pub student_id: Option<i64>,
}

pub fn submit_complaint(
    conn: &Connection,
    student_user_id: i64,
    new: &NewComplaint,
) -> Result<Complaint> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(HostelError::validation("title", "must not be empty"));
    }
    let description = new.description.trim();
    if description.is_empty() {
        return Err(HostelError::validation("description", "must not be empty"));
    }
    let student = students::student_for_user(conn, student_user_id)?;

    let now = Utc::now();
    conn.execute(
        "INSERT INTO complaints (student_id, complaint_type, title, description, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            student.id,
            new.complaint_type,
            title,
            description,
            ComplaintStatus::Pending,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(
        complaint_id = id,
        student_id = student.id,
        kind = %new.complaint_type,
        "complaint submitted"
    );
    get_complaint(conn, id)
}

pub fn get_complaint(conn: &Connection, id: i64) -> Result<Complaint> {
    conn.query_row(
        &format!("{SELECT} WHERE c.id = ?1"),
        [id],
        Complaint::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("complaint", id))
}

pub fn list_complaints(conn: &Connection, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR c.status = ?1)
           AND (?2 IS NULL OR c.complaint_type = ?2)
           AND (?3 IS NULL OR c.student_id = ?3)
         ORDER BY c.created_at DESC, c.id DESC"
    ))?;
    let rows = stmt
        .query_map(
            params![filter.status, filter.complaint_type, filter.student_id],
            Complaint::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Move a complaint along. Resolving stamps `resolved_at`; moving away from
/// resolved clears it.
pub fn update_status(conn: &Connection, id: i64, update: &ComplaintUpdate) -> Result<Complaint> {
    if let Some(assignee) = update.assigned_to {
        users::get_user(conn, assignee)?;
    }
    let now = Utc::now();
    let resolved_at = (update.status == ComplaintStatus::Resolved).then_some(now);
    let changed = conn.execute(
        "UPDATE complaints
         SET status = ?2,
             assigned_to = COALESCE(?3, assigned_to),
             resolution = COALESCE(?4, resolution),
             resolved_at = ?5,
             updated_at = ?6
         WHERE id = ?1",
        params![
            id,
            update.status,
            update.assigned_to,
            update.resolution.as_deref().map(str::trim),
            resolved_at,
            now
        ],
    )?;
    if changed == 0 {
        return Err(HostelError::not_found("complaint", id));
    }
    tracing::info!(complaint_id = id, status = %update.status, "complaint updated");
    get_complaint(conn, id)
}
