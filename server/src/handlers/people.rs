//! Accounts, student profiles and staff records.

use hostel_core::staff::{self, NewStaff, StaffType};
use hostel_core::students::{self, NewStudent, StudentFilter};
use hostel_core::users::{self, NewUser};
use hostel_core::{Capability, Role};
use rusqlite::Connection;
use serde_json::json;

use crate::error::ApiError;
use crate::router::{Ctx, Reply};

pub fn create_user(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageUsers)?;
    let new: NewUser = cx.req.json()?;
    Reply::created(users::create_user(conn, &new)?)
}

pub fn list_users(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageUsers)?;
    let role: Option<Role> = cx.req.query("role")?;
    Reply::ok(users::list_users(conn, role)?)
}

pub fn get_user(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageUsers)?;
    Reply::ok(users::get_user(conn, id)?)
}

pub fn deactivate_user(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageUsers)?;
    Reply::ok(users::deactivate_user(conn, id)?)
}

pub fn create_student(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageStudents)?;
    let new: NewStudent = cx.req.json()?;
    Reply::created(students::create_student(conn, &new)?)
}

pub fn list_students(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewStudents)?;
    let filter = StudentFilter {
        department: cx.req.query("department")?,
        year_of_study: cx.req.query("year")?,
    };
    Reply::ok(students::list_students(conn, &filter)?)
}

pub fn my_profile(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewOwnProfile)?;
    Reply::ok(students::student_for_user(conn, cx.actor.user_id)?)
}

pub fn get_student(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewStudents)?;
    Reply::ok(students::get_student(conn, id)?)
}

pub fn delete_student(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageStudents)?;
    students::delete_student(conn, id)?;
    Reply::ok(json!({ "deleted": id }))
}

pub fn create_staff(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageStaff)?;
    let new: NewStaff = cx.req.json()?;
    Reply::created(staff::create_staff(conn, &new)?)
}

pub fn list_staff(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageStaff)?;
    let staff_type: Option<StaffType> = cx.req.query("staff_type")?;
    Reply::ok(staff::list_staff(conn, staff_type)?)
}
