//! Complaints and stay-extension requests.
//!
//! Students see only their own requests; reviewers see everything.

use hostel_core::complaints::{
    self, ComplaintFilter, ComplaintStatus, ComplaintType, ComplaintUpdate, NewComplaint,
};
use hostel_core::extensions::{self, NewExtension, RequestStatus};
use hostel_core::{Capability, Role, students};
use rusqlite::Connection;

use crate::error::ApiError;
use crate::protocol::RejectRequest;
use crate::router::{Ctx, Reply};

/// The caller's own student id when the caller is a student.
fn own_scope(cx: &Ctx<'_>, conn: &Connection) -> Result<Option<i64>, ApiError> {
    if cx.actor.role == Role::Student {
        Ok(Some(students::student_for_user(conn, cx.actor.user_id)?.id))
    } else {
        Ok(None)
    }
}

pub fn submit_complaint(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::SubmitComplaint)?;
    let new: NewComplaint = cx.req.json()?;
    Reply::created(complaints::submit_complaint(conn, cx.actor.user_id, &new)?)
}

pub fn list_complaints(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewComplaints)?;
    let status: Option<ComplaintStatus> = cx.req.query("status")?;
    let complaint_type: Option<ComplaintType> = cx.req.query("complaint_type")?;
    let filter = ComplaintFilter {
        status,
        complaint_type,
        student_id: own_scope(cx, conn)?,
    };
    Reply::ok(complaints::list_complaints(conn, &filter)?)
}

pub fn update_complaint(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageComplaints)?;
    let update: ComplaintUpdate = cx.req.json()?;
    Reply::ok(complaints::update_status(conn, id, &update)?)
}

pub fn submit_extension(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::SubmitExtension)?;
    let new: NewExtension = cx.req.json()?;
    Reply::created(extensions::submit_extension(conn, cx.actor.user_id, &new)?)
}

pub fn list_extensions(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewExtensions)?;
    let status: Option<RequestStatus> = cx.req.query("status")?;
    let scope = own_scope(cx, conn)?;
    Reply::ok(extensions::list_extensions(conn, status, scope)?)
}

pub fn approve_extension(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ReviewExtensions)?;
    Reply::ok(extensions::approve_extension(conn, id, cx.actor.user_id)?)
}

pub fn reject_extension(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ReviewExtensions)?;
    let body: RejectRequest = cx.req.json()?;
    Reply::ok(extensions::reject_extension(conn, id, cx.actor.user_id, &body.reason)?)
}
