//! Notifications, system settings and dashboards.

use chrono::Utc;
use hostel_core::settings::{self, SettingsPatch};
use hostel_core::{Capability, alerts, dashboard, notifications, sql};
use rusqlite::Connection;

use crate::error::ApiError;
use crate::protocol::{CountResponse, NewStudentsResponse};
use crate::router::{Ctx, Reply};

pub fn list_notifications(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ReadNotifications)?;
    let limit: Option<usize> = cx.req.query("limit")?;
    Reply::ok(notifications::list_for(conn, cx.actor.user_id, limit)?)
}

pub fn mark_read(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ReadNotifications)?;
    Reply::ok(notifications::mark_read(conn, cx.actor.user_id, id)?)
}

pub fn mark_all_read(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ReadNotifications)?;
    let count = notifications::mark_all_read(conn, cx.actor.user_id)?;
    Reply::ok(CountResponse { count })
}

pub fn admin_alerts(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewAdminAlerts)?;
    Reply::ok(alerts::admin_feed(conn, Utc::now(), &cx.app.config().students)?)
}

pub fn get_settings(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewOverview)?;
    Reply::ok(settings::get_settings(conn)?)
}

pub fn update_settings(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageSettings)?;
    let patch: SettingsPatch = cx.req.json()?;
    Reply::ok(settings::update_settings(conn, &patch)?)
}

pub fn overview(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewOverview)?;
    Reply::ok(dashboard::overview(conn, sql::today())?)
}

pub fn warden_dashboard(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewWardenDashboard)?;
    Reply::ok(dashboard::warden(conn, cx.actor.user_id)?)
}

pub fn deputy_dashboard(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewDeputyDashboard)?;
    Reply::ok(dashboard::deputy(conn, cx.actor.user_id, sql::today())?)
}

pub fn new_students(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewDeputyDashboard)?;
    Reply::ok(NewStudentsResponse {
        new_students: dashboard::new_students(conn, sql::today())?,
    })
}

pub fn mess_dashboard(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewMessDashboard)?;
    Reply::ok(dashboard::mess(conn, cx.actor.user_id, sql::today())?)
}

pub fn student_dashboard(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewStudentDashboard)?;
    Reply::ok(dashboard::student(
        conn,
        cx.actor.user_id,
        sql::today(),
        &cx.app.config().students,
    )?)
}
