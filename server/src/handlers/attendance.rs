//! Attendance marking and penalties.

use chrono::NaiveDate;
use hostel_core::attendance::{self, AttendanceFilter, SkippedRow};
use hostel_core::penalties::{self, NewPenalty};
use hostel_core::{Capability, sql, students};
use rusqlite::Connection;

use crate::error::ApiError;
use crate::protocol::{AttendanceInput, BulkAttendanceRequest};
use crate::router::{Ctx, Reply};

pub fn mark(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::MarkAttendance)?;
    let input: AttendanceInput = cx.req.json()?;
    let entry = input.into_entry(sql::today())?;
    let outcome = attendance::mark_attendance(
        conn,
        cx.actor.user_id,
        &entry,
        &cx.app.config().penalties,
    )?;
    if outcome.created {
        Reply::created(outcome)
    } else {
        Reply::ok(outcome)
    }
}

/// Rows are parsed one by one; a row with a bad shift value is reported as
/// skipped and the rest are still marked.
pub fn bulk_mark(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::MarkAttendance)?;
    let request: BulkAttendanceRequest = cx.req.json()?;
    let fallback = request.date.unwrap_or_else(sql::today);
    let rows = request.records.into_iter().map(|row| {
        let student_id = row.student_id;
        row.into_entry(fallback)
            .map_err(|err| SkippedRow::new(student_id, &err))
    });

    Reply::ok(attendance::bulk_mark(conn, cx.actor.user_id, rows, &cx.app.config().penalties))
}

pub fn list(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::MarkAttendance)?;
    let date: Option<NaiveDate> = cx.req.query("date")?;
    let filter = AttendanceFilter {
        date,
        student_code: cx.req.query("student_code")?,
    };
    Reply::ok(attendance::list_attendance(conn, &filter)?)
}

pub fn history(cx: &Ctx<'_>, conn: &mut Connection, student_id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewStudents)?;
    students::get_student(conn, student_id)?;
    Reply::ok(attendance::student_history(conn, student_id)?)
}

pub fn issue_penalty(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManagePenalties)?;
    let new: NewPenalty = cx.req.json()?;
    Reply::created(penalties::issue_penalty(conn, cx.actor.user_id, &new)?)
}

pub fn list_penalties(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManagePenalties)?;
    Reply::ok(penalties::list_penalties(conn, cx.req.query("student_id")?)?)
}

pub fn mark_penalty_paid(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManagePenalties)?;
    Reply::ok(penalties::mark_paid(conn, id)?)
}
