//! Attendance marking.
//!
//! Each mark is one transaction: upsert the (student, date) record with the
//! normalized shifts and their summary, then bring the night-shift penalty in
//! line with the stored night value. Bulk marking runs one such transaction
//! per row, so a bad row never undoes its siblings.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;

use crate::config::PenaltyConfig;
use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::penalties::{self, PenaltyEffect};
use crate::shift::{DayShifts, Shift};

/// One validated row of attendance input.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub date: NaiveDate,
    pub morning: Shift,
    pub evening: Shift,
    pub night: Shift,
    pub remarks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub date: NaiveDate,
    pub morning: Shift,
    pub evening: Shift,
    pub night: Shift,
    pub summary: Shift,
    pub remarks: String,
    pub marked_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            date: row.get(3)?,
            morning: row.get(4)?,
            evening: row.get(5)?,
            night: row.get(6)?,
            summary: row.get(7)?,
            remarks: row.get(8)?,
            marked_by: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

const SELECT: &str = "SELECT a.id, a.student_id, s.student_code, a.date, a.morning, a.evening,
        a.night, a.summary, a.remarks, a.marked_by, a.created_at, a.updated_at
    FROM attendance a
    JOIN students s ON s.id = a.student_id";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkOutcome {
    pub record: AttendanceRecord,
    pub created: bool,
    pub penalty: PenaltyEffect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkMarkSummary {
    pub created: usize,
    pub updated: usize,
    /// Rows that were not applied, in input order
    pub skipped: Vec<SkippedRow>,
}

/// A bulk row that was rejected, either while parsing or while writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub student_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl SkippedRow {
    pub fn new(student_id: i64, err: &HostelError) -> Self {
        Self {
            student_id,
            field: err.field().map(str::to_string),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub date: Option<NaiveDate>,
    pub student_code: Option<String>,
}

/// Record one student's attendance for a day.
///
/// An existing record for the same (student, date) is overwritten: shifts,
/// summary, remarks and marker all take the new values.
pub fn mark_attendance(
    conn: &mut Connection,
    marked_by: i64,
    entry: &AttendanceEntry,
    penalties: &PenaltyConfig,
) -> Result<MarkOutcome> {
    let shifts = DayShifts::normalized(entry.morning, entry.evening, entry.night);
    let summary = shifts.summary();

    let outcome = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let exists: Option<i64> = tx
            .query_row("SELECT id FROM students WHERE id = ?1", [entry.student_id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(HostelError::not_found("student", entry.student_id));
        }

        let previous: Option<i64> = tx
            .query_row(
                "SELECT id FROM attendance WHERE student_id = ?1 AND date = ?2",
                params![entry.student_id, entry.date],
                |r| r.get(0),
            )
            .optional()?;

        let now = Utc::now();
        let id: i64 = tx.query_row(
            "INSERT INTO attendance (student_id, date, morning, evening, night, summary, remarks,
                                     marked_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(student_id, date) DO UPDATE SET
                morning = excluded.morning,
                evening = excluded.evening,
                night = excluded.night,
                summary = excluded.summary,
                remarks = excluded.remarks,
                marked_by = excluded.marked_by,
                updated_at = excluded.updated_at
             RETURNING id",
            params![
                entry.student_id,
                entry.date,
                shifts.morning,
                shifts.evening,
                shifts.night,
                summary,
                entry.remarks.trim(),
                marked_by,
                now,
            ],
            |r| r.get(0),
        )?;

        let penalty =
            penalties::apply_night_shift(tx, entry.student_id, shifts.night, marked_by, penalties)?;

        let record = tx.query_row(
            &format!("{SELECT} WHERE a.id = ?1"),
            [id],
            AttendanceRecord::from_row,
        )?;
        Ok::<_, HostelError>(MarkOutcome {
            record,
            created: previous.is_none(),
            penalty,
        })
    })?;

    tracing::debug!(
        student_id = entry.student_id,
        date = %entry.date,
        summary = %summary,
        created = outcome.created,
        penalty = ?outcome.penalty,
        "attendance marked"
    );
    Ok(outcome)
}

/// Mark many students, each row in its own transaction.
///
/// Rows arrive already parsed; a row that failed parsing is carried as its
/// `SkippedRow`. Rows that fail while writing (typically an unknown student)
/// are skipped too. Neither kind stops the remaining rows.
pub fn bulk_mark<I>(
    conn: &mut Connection,
    marked_by: i64,
    rows: I,
    penalties: &PenaltyConfig,
) -> BulkMarkSummary
where
    I: IntoIterator<Item = std::result::Result<AttendanceEntry, SkippedRow>>,
{
    let mut summary = BulkMarkSummary::default();
    for row in rows {
        let entry = match row {
            Ok(entry) => entry,
            Err(skipped) => {
                tracing::warn!(
                    student_id = skipped.student_id,
                    reason = %skipped.reason,
                    "skipping invalid attendance row"
                );
                summary.skipped.push(skipped);
                continue;
            }
        };
        match mark_attendance(conn, marked_by, &entry, penalties) {
            Ok(outcome) if outcome.created => summary.created += 1,
            Ok(_) => summary.updated += 1,
            Err(err) => {
                tracing::warn!(
                    student_id = entry.student_id,
                    date = %entry.date,
                    category = err.category().as_str(),
                    error = %err,
                    "skipping attendance row"
                );
                summary.skipped.push(SkippedRow::new(entry.student_id, &err));
            }
        }
    }
    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        skipped = summary.skipped.len(),
        "bulk attendance marked"
    );
    summary
}

pub fn list_attendance(
    conn: &Connection,
    filter: &AttendanceFilter,
) -> Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR a.date = ?1)
           AND (?2 IS NULL OR s.student_code = ?2)
         ORDER BY a.date DESC, s.student_code"
    ))?;
    let records = stmt
        .query_map(
            params![filter.date, filter.student_code],
            AttendanceRecord::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

/// One student's records, most recent day first.
pub fn student_history(conn: &Connection, student_id: i64) -> Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT} WHERE a.student_id = ?1 ORDER BY a.date DESC"))?;
    let records = stmt
        .query_map([student_id], AttendanceRecord::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}
