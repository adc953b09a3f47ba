#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end checks against a live listener on an ephemeral port.

use std::sync::Arc;

use hostel_core::users::{self, NewUser};
use hostel_core::{HostelConfig, Role};
use hostel_server::App;
use hostel_server::http::{self, ServerHandle};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    handle: ServerHandle,
    client: Client,
    base: String,
    admin: i64,
}

impl Harness {
    fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = HostelConfig::default();
        config.db_path = dir.path().join("hostel.db").display().to_string();
        config.server.bind = "127.0.0.1:0".to_string();

        let app = App::open(config).expect("open app");
        let admin = {
            let conn = app.conn().unwrap();
            users::create_user(
                &conn,
                &NewUser {
                    username: "root".to_string(),
                    role: Some(Role::Admin),
                    ..NewUser::default()
                },
            )
            .unwrap()
            .id
        };

        let handle = http::start(Arc::new(app), "127.0.0.1:0", 2).expect("bind");
        let base = format!("http://{}", handle.addr());
        Self {
            _dir: dir,
            handle,
            client: Client::new(),
            base,
            admin,
        }
    }

    fn get(&self, user: Option<i64>, path: &str) -> (StatusCode, Value) {
        let mut req = self.client.get(format!("{}{path}", self.base));
        if let Some(user) = user {
            req = req.header("X-Hostel-User", user.to_string());
        }
        let resp = req.send().unwrap();
        (resp.status(), resp.json().unwrap())
    }

    fn post(&self, user: i64, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(format!("{}{path}", self.base))
            .header("X-Hostel-User", user.to_string())
            .json(&body)
            .send()
            .unwrap();
        (resp.status(), resp.json().unwrap())
    }

    fn add_student(&self, code: &str, year: i64) -> Value {
        let (status, student) = self.post(
            self.admin,
            "/api/students",
            json!({
                "username": code.to_lowercase(),
                "student_code": code,
                "department": "Physics",
                "year_of_study": year
            }),
        );
        assert_eq!(status, StatusCode::CREATED);
        student
    }
}

#[test]
fn health_needs_no_identity() {
    let h = Harness::start();
    let (status, body) = h.get(None, "/health");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["schema_version"].as_i64().unwrap() >= 1);
    h.handle.shutdown();
}

#[test]
fn api_calls_without_identity_are_rejected() {
    let h = Harness::start();
    let (status, body) = h.get(None, "/api/rooms");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "UNIDENTIFIED");

    let (status, _) = h.get(Some(9999), "/api/rooms");
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h.get(Some(h.admin), "/api/nowhere");
    assert_eq!(status, StatusCode::NOT_FOUND);
    h.handle.shutdown();
}

#[test]
fn student_is_housed_after_payment_is_verified() {
    let h = Harness::start();

    let (status, room) = h.post(
        h.admin,
        "/api/rooms",
        json!({
            "room_number": "A-101",
            "room_type": "double",
            "capacity": 2,
            "price_per_month": 15000
        }),
    );
    assert_eq!(status, StatusCode::CREATED);
    let room_id = room["id"].as_i64().unwrap();

    let student = h.add_student("S1001", 2);
    let student_id = student["id"].as_i64().unwrap();
    let student_user = student["user_id"].as_i64().unwrap();

    // Not allowed before a verified payment.
    let (status, body) = h.post(
        h.admin,
        &format!("/api/students/{student_id}/allocate-room"),
        json!({ "room_id": room_id }),
    );
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "PRECONDITION_FAILED");

    let (status, payment) = h.post(
        student_user,
        "/api/room-applications",
        json!({ "room_type": "double", "payment_method": "cash" }),
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "pending");
    let payment_id = payment["id"].as_i64().unwrap();

    let verify = format!("/api/payments/{payment_id}/verify");
    let (status, payment) = h.post(h.admin, &verify, json!({}));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "verified");

    let (status, allocation) = h.post(
        h.admin,
        &format!("/api/students/{student_id}/allocate-room"),
        json!({ "room_id": room_id }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(allocation["room_number"], "A-101");

    let (status, room) = h.get(Some(student_user), &format!("/api/rooms/{room_id}"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["occupied"], 1);

    let (status, notes) = h.get(Some(student_user), "/api/notifications");
    assert_eq!(status, StatusCode::OK);
    assert!(!notes.as_array().unwrap().is_empty());

    h.handle.shutdown();
}

#[test]
fn students_cannot_manage_rooms() {
    let h = Harness::start();
    let student = h.add_student("S2002", 1);
    let student_user = student["user_id"].as_i64().unwrap();

    let (status, body) = h.post(
        student_user,
        "/api/rooms",
        json!({
            "room_number": "B-1",
            "room_type": "single",
            "capacity": 1,
            "price_per_month": 20000
        }),
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "FORBIDDEN");
    h.handle.shutdown();
}

#[test]
fn unknown_shift_value_is_a_bad_request() {
    let h = Harness::start();
    let student = h.add_student("S3003", 1);
    let student_id = student["id"].as_i64().unwrap();

    let (status, body) = h.post(
        h.admin,
        "/api/attendance",
        json!({ "student_id": student_id, "morning": "Sleeping" }),
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "morning");

    let (status, record) = h.post(
        h.admin,
        "/api/attendance",
        json!({ "student_id": student_id, "morning": "Present", "night": "Absent" }),
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["record"]["morning"], "Present");
    assert_eq!(record["created"], true);
    h.handle.shutdown();
}

#[test]
fn bulk_attendance_skips_bad_rows_and_marks_the_rest() {
    let h = Harness::start();
    let mut ids = Vec::new();
    for code in ["S4001", "S4002"] {
        ids.push(h.add_student(code, 1)["id"].as_i64().unwrap());
    }

    let (status, summary) = h.post(
        h.admin,
        "/api/attendance/bulk",
        json!({
            "date": "2024-03-04",
            "records": [
                { "student_id": ids[0], "morning": "Present", "evening": "Present" },
                { "student_id": ids[1], "morning": "Late" },
                { "student_id": 9999, "morning": "Present" }
            ]
        }),
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["created"], 1);
    assert_eq!(summary["updated"], 0);
    assert_eq!(summary["skipped"][0]["student_id"], ids[1]);
    assert_eq!(summary["skipped"][0]["field"], "morning");
    assert_eq!(summary["skipped"][1]["student_id"], 9999);

    let (_, records) = h.get(Some(h.admin), "/api/attendance?date=2024-03-04");
    assert_eq!(records.as_array().unwrap().len(), 1);
    h.handle.shutdown();
}

#[test]
fn admin_alerts_and_deputy_new_students() {
    let h = Harness::start();
    let student = h.add_student("S5005", 1);
    let student_user = student["user_id"].as_i64().unwrap();
    h.post(
        student_user,
        "/api/room-applications",
        json!({
            "room_type": "single",
            "payment_method": "bank_transfer",
            "transaction_id": "TX-1"
        }),
    );

    let (status, alerts) = h.get(Some(h.admin), "/api/notifications/admin");
    assert_eq!(status, StatusCode::OK);
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["kind"], "payment");
    assert_eq!(alerts[0]["student_code"], "S5005");

    let (status, _) = h.get(Some(student_user), "/api/notifications/admin");
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, deputy) = h.post(
        h.admin,
        "/api/users",
        json!({ "username": "deputy", "role": "deputy_rt" }),
    );
    assert_eq!(status, StatusCode::CREATED);
    let deputy = deputy["id"].as_i64();
    let (status, listed) = h.get(deputy, "/api/dashboard/deputy/new-students");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["new_students"][0]["student_code"], "S5005");
    h.handle.shutdown();
}
