//! Transport-independent request routing.
//!
//! [`dispatch`] turns an [`ApiRequest`] into a [`Reply`]. Every route under
//! `/api` first identifies the caller from the `X-Hostel-User` header; the
//! handler then checks the capability it needs.

use std::str::FromStr;

use hostel_core::db;
use hostel_core::{Actor, HostelError, sql, users};
use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::App;
use crate::error::ApiError;
use crate::handlers::{attendance, housing, mess, notices, people, requests};
use crate::protocol::HealthResponse;

/// Header carrying the calling user's id.
pub const USER_HEADER: &str = "X-Hostel-User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Other,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub user: Option<String>,
    pub body: Vec<u8>,
}

impl ApiRequest {
    /// Build from a request target such as `/api/rooms?available=true`.
    pub fn new(method: HttpMethod, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            method,
            path: path.to_string(),
            query: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            user: None,
            body: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// A query parameter parsed as `T`. Empty values count as absent.
    pub fn query<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.query.iter().find(|(k, _)| k == name) {
            Some((_, raw)) if !raw.trim().is_empty() => Ok(Some(sql::parse_field(name, raw)?)),
            _ => Ok(None),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Body(e.to_string()))
    }

    /// Like [`ApiRequest::json`], but an empty body yields `T::default()`.
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            Ok(T::default())
        } else {
            self.json()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl Reply {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn ok(value: impl Serialize) -> Result<Self, ApiError> {
        Self::with_status(200, value)
    }

    pub fn created(value: impl Serialize) -> Result<Self, ApiError> {
        Self::with_status(201, value)
    }

    fn with_status(status: u16, value: impl Serialize) -> Result<Self, ApiError> {
        let body = serde_json::to_value(value)
            .map_err(|e| HostelError::Internal(format!("serialize response: {e}")))?;
        Ok(Self::new(status, body))
    }
}

/// Everything a handler needs besides the connection.
pub struct Ctx<'a> {
    pub app: &'a App,
    pub actor: Actor,
    pub req: &'a ApiRequest,
}

/// Route a request. Never fails: errors become error replies.
pub fn dispatch(app: &App, req: &ApiRequest) -> Reply {
    let reply = route(app, req).unwrap_or_else(Reply::from);
    tracing::debug!(
        method = req.method.as_str(),
        path = %req.path,
        status = reply.status,
        "request handled"
    );
    reply
}

/// Parse a numeric path segment.
pub fn path_id(raw: &str) -> Result<i64, ApiError> {
    Ok(sql::parse_field("id", raw)?)
}

fn identify(conn: &Connection, req: &ApiRequest) -> Result<Actor, ApiError> {
    let raw = req
        .user
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HostelError::Unidentified(format!("missing {USER_HEADER} header")))?;
    let user_id: i64 = raw
        .parse()
        .map_err(|_| HostelError::Unidentified(format!("{USER_HEADER} must be a user id")))?;
    Ok(users::resolve_actor(conn, user_id)?)
}

fn health(app: &App) -> Result<Reply, ApiError> {
    let conn = app.conn()?;
    let schema_version = db::schema_version(&conn).map_err(HostelError::from)?;
    Reply::ok(HealthResponse {
        status: "ok".to_string(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version,
        uptime_s: app.uptime_s(),
    })
}

fn route(app: &App, req: &ApiRequest) -> Result<Reply, ApiError> {
    use HttpMethod::{Delete, Get, Patch, Post};

    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
    let rest = match segments.as_slice() {
        ["health"] if req.method == Get => return health(app),
        ["api", rest @ ..] => rest,
        _ => return Err(no_route(req)),
    };

    let mut conn = app.conn()?;
    let actor = identify(&conn, req)?;
    let cx = Ctx { app, actor, req };
    let conn: &mut Connection = &mut conn;

    match (req.method, rest) {
        // dashboards
        (Get, ["dashboard"]) => notices::overview(&cx, conn),
        (Get, ["dashboard", "warden"]) => notices::warden_dashboard(&cx, conn),
        (Get, ["dashboard", "deputy"]) => notices::deputy_dashboard(&cx, conn),
        (Get, ["dashboard", "deputy", "new-students"]) => notices::new_students(&cx, conn),
        (Get, ["dashboard", "mess"]) => notices::mess_dashboard(&cx, conn),
        (Get, ["dashboard", "student"]) => notices::student_dashboard(&cx, conn),

        // people
        (Post, ["users"]) => people::create_user(&cx, conn),
        (Get, ["users"]) => people::list_users(&cx, conn),
        (Get, ["users", id]) => people::get_user(&cx, conn, path_id(id)?),
        (Post, ["users", id, "deactivate"]) => people::deactivate_user(&cx, conn, path_id(id)?),
        (Post, ["students"]) => people::create_student(&cx, conn),
        (Get, ["students"]) => people::list_students(&cx, conn),
        (Get, ["students", "me"]) => people::my_profile(&cx, conn),
        (Get, ["students", id]) => people::get_student(&cx, conn, path_id(id)?),
        (Delete, ["students", id]) => people::delete_student(&cx, conn, path_id(id)?),
        (Post, ["staff"]) => people::create_staff(&cx, conn),
        (Get, ["staff"]) => people::list_staff(&cx, conn),

        // housing
        (Post, ["students", id, "allocate-room"]) => housing::allocate(&cx, conn, path_id(id)?),
        (Post, ["students", id, "deallocate-room"]) => housing::deallocate(&cx, conn, path_id(id)?),
        (Post, ["rooms"]) => housing::create_room(&cx, conn),
        (Get, ["rooms"]) => housing::list_rooms(&cx, conn),
        (Get, ["rooms", id]) => housing::get_room(&cx, conn, path_id(id)?),
        (Post, ["room-applications"]) => housing::apply_for_room(&cx, conn),
        (Get, ["payments"]) => housing::list_payments(&cx, conn),
        (Post, ["payments", id, "verify"]) => housing::verify_payment(&cx, conn, path_id(id)?),
        (Post, ["payments", id, "reject"]) => housing::reject_payment(&cx, conn, path_id(id)?),

        // attendance and penalties
        (Post, ["attendance"]) => attendance::mark(&cx, conn),
        (Post, ["attendance", "bulk"]) => attendance::bulk_mark(&cx, conn),
        (Get, ["attendance"]) => attendance::list(&cx, conn),
        (Get, ["students", id, "attendance"]) => attendance::history(&cx, conn, path_id(id)?),
        (Post, ["penalties"]) => attendance::issue_penalty(&cx, conn),
        (Get, ["penalties"]) => attendance::list_penalties(&cx, conn),
        (Post, ["penalties", id, "paid"]) => attendance::mark_penalty_paid(&cx, conn, path_id(id)?),

        // mess
        (Post, ["meals"]) => mess::upsert_meal(&cx, conn),
        (Get, ["meals"]) => mess::list_meals(&cx, conn),
        (Post, ["meal-feedback"]) => mess::submit_feedback(&cx, conn),
        (Get, ["meal-feedback"]) => mess::list_feedback(&cx, conn),
        (Post, ["food-shortages"]) => mess::report_shortage(&cx, conn),
        (Get, ["food-shortages"]) => mess::list_shortages(&cx, conn),
        (Post, ["food-shortages", "acknowledge"]) => mess::acknowledge_shortages(&cx, conn),

        // requests
        (Post, ["complaints"]) => requests::submit_complaint(&cx, conn),
        (Get, ["complaints"]) => requests::list_complaints(&cx, conn),
        (Post, ["complaints", id, "status"]) => requests::update_complaint(&cx, conn, path_id(id)?),
        (Post, ["stay-extensions"]) => requests::submit_extension(&cx, conn),
        (Get, ["stay-extensions"]) => requests::list_extensions(&cx, conn),
        (Post, ["stay-extensions", id, "approve"]) => {
            requests::approve_extension(&cx, conn, path_id(id)?)
        }
        (Post, ["stay-extensions", id, "reject"]) => {
            requests::reject_extension(&cx, conn, path_id(id)?)
        }

        // notifications and settings
        (Get, ["notifications"]) => notices::list_notifications(&cx, conn),
        (Get, ["notifications", "admin"]) => notices::admin_alerts(&cx, conn),
        (Post, ["notifications", "read-all"]) => notices::mark_all_read(&cx, conn),
        (Post, ["notifications", id, "read"]) => notices::mark_read(&cx, conn, path_id(id)?),
        (Get, ["settings"]) => notices::get_settings(&cx, conn),
        (Patch, ["settings"]) => notices::update_settings(&cx, conn),

        _ => Err(no_route(req)),
    }
}

fn no_route(req: &ApiRequest) -> ApiError {
    ApiError::NoRoute {
        method: req.method.as_str().to_string(),
        path: req.path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn target_splits_path_and_query() {
        let req = ApiRequest::new(
            HttpMethod::Get,
            "/api/students?department=Computer%20Science&year=2",
        );
        assert_eq!(req.path, "/api/students");
        assert_eq!(
            req.query::<String>("department").unwrap().as_deref(),
            Some("Computer Science")
        );
        assert_eq!(req.query::<i64>("year").unwrap(), Some(2));
        assert_eq!(req.query::<i64>("missing").unwrap(), None);
    }

    #[test]
    fn bad_query_value_is_a_validation_error() {
        let req = ApiRequest::new(HttpMethod::Get, "/api/students?year=second");
        let err = req.query::<i64>("year").unwrap_err();
        assert!(matches!(err, ApiError::Hostel(HostelError::Validation { .. })));
    }

    #[test]
    fn empty_body_falls_back_to_default() {
        #[derive(Debug, Default, serde::Deserialize, PartialEq)]
        struct Body {
            id: Option<i64>,
        }
        let req = ApiRequest::new(HttpMethod::Post, "/x");
        assert_eq!(req.json_or_default::<Body>().unwrap(), Body::default());
        let req = req.with_body(r#"{"id": 4}"#);
        assert_eq!(req.json_or_default::<Body>().unwrap(), Body { id: Some(4) });
    }
}
