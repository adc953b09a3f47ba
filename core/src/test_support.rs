//! Fixtures for unit tests: an in-memory database and a few seeded rows.

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::db;
use crate::ledger;
use crate::payments::{PaymentMethod, PaymentStatus};
use crate::roles::Role;
use crate::rooms::{self, NewRoom, Room, RoomType};
use crate::sql;
use crate::students::{self, NewStudent, Student};
use crate::users::{self, NewUser};

pub(crate) fn conn() -> Connection {
    db::open_in_memory().expect("in-memory database")
}

pub(crate) fn user(conn: &Connection, username: &str, role: Role) -> i64 {
    let new = NewUser {
        username: username.to_string(),
        role: Some(role),
        ..NewUser::default()
    };
    users::create_user(conn, &new).expect("create user").id
}

pub(crate) fn new_student(code: &str, department: &str, year_of_study: i64) -> NewStudent {
    NewStudent {
        username: code.to_lowercase(),
        first_name: "Student".to_string(),
        last_name: code.to_string(),
        student_code: code.to_string(),
        department: department.to_string(),
        year_of_study,
        ..NewStudent::default()
    }
}

pub(crate) fn student(conn: &mut Connection, code: &str) -> Student {
    students::create_student(conn, &new_student(code, "Computer Science", 1))
        .expect("create student")
}

pub(crate) fn room(conn: &Connection, number: &str, capacity: i64) -> Room {
    let room_type = match capacity {
        1 => RoomType::Single,
        2 => RoomType::Double,
        _ => RoomType::Triple,
    };
    let new = NewRoom {
        room_number: number.to_string(),
        room_type,
        floor: 1,
        capacity,
        price_per_month: 7000,
        description: String::new(),
    };
    rooms::create_room(conn, &new).expect("create room")
}

/// Insert a payment row directly, bypassing the application flow.
pub(crate) fn payment(conn: &Connection, student_id: i64, status: PaymentStatus) -> i64 {
    conn.execute(
        "INSERT INTO payments (student_id, amount, payment_date, payment_method, description, status, created_at)
         VALUES (?1, 7000, ?2, ?3, 'fixture', ?4, ?5)",
        params![
            student_id,
            sql::today(),
            PaymentMethod::Cash,
            status,
            Utc::now()
        ],
    )
    .expect("insert payment");
    conn.last_insert_rowid()
}

/// A student whose latest payment is verified.
pub(crate) fn paid_student(conn: &mut Connection, code: &str) -> Student {
    let s = student(conn, code);
    payment(conn, s.id, PaymentStatus::Verified);
    s
}

/// A paid student already allocated to `room_id`.
pub(crate) fn housed_student(conn: &mut Connection, code: &str, room_id: i64) -> Student {
    let s = paid_student(conn, code);
    ledger::allocate_room(conn, s.id, room_id).expect("allocate room");
    students::get_student(conn, s.id).expect("reload student")
}
