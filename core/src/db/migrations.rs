//! Schema versioning and migrations
//!
//! Forward-only. The applied version lives in `PRAGMA user_version`; each
//! step runs in its own IMMEDIATE transaction together with the version bump.

use rusqlite::{Connection, TransactionBehavior};

use super::{DbError, Result, execute_in_transaction};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_V1)];

/// Apply all pending migrations.
pub fn migrate_to_latest(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
            tx.execute_batch(sql)?;
            set_schema_version(tx, version)
        })
        .map_err(|e| DbError::Migration(format!("migration v{version} failed: {e}")))?;
        tracing::info!(version, "applied schema migration");
    }

    Ok(())
}

/// Get current schema version
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Migration V1: full hostel schema
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE,
    email       TEXT NOT NULL DEFAULT '',
    first_name  TEXT NOT NULL DEFAULT '',
    last_name   TEXT NOT NULL DEFAULT '',
    role        TEXT NOT NULL,
    phone       TEXT NOT NULL DEFAULT '',
    address     TEXT NOT NULL DEFAULT '',
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

CREATE TABLE IF NOT EXISTS rooms (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    room_number      TEXT NOT NULL UNIQUE,
    room_type        TEXT NOT NULL,
    floor            INTEGER NOT NULL,
    capacity         INTEGER NOT NULL CHECK (capacity >= 1),
    occupied         INTEGER NOT NULL DEFAULT 0
                     CHECK (occupied >= 0 AND occupied <= capacity),
    price_per_month  INTEGER NOT NULL CHECK (price_per_month >= 0),
    is_available     INTEGER NOT NULL DEFAULT 1,
    description      TEXT NOT NULL DEFAULT '',
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id            INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    student_code       TEXT NOT NULL UNIQUE,
    department         TEXT NOT NULL,
    year_of_study      INTEGER NOT NULL CHECK (year_of_study BETWEEN 1 AND 5),
    parent_name        TEXT NOT NULL DEFAULT '',
    parent_phone       TEXT NOT NULL DEFAULT '',
    emergency_contact  TEXT NOT NULL DEFAULT '',
    room_id            INTEGER REFERENCES rooms(id),
    check_in_date      TEXT,
    check_out_date     TEXT,
    is_active          INTEGER NOT NULL DEFAULT 1,
    created_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_students_room ON students(room_id);

CREATE TABLE IF NOT EXISTS payments (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id      INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    amount          INTEGER NOT NULL CHECK (amount >= 0),
    payment_date    TEXT NOT NULL,
    payment_method  TEXT NOT NULL,
    transaction_id  TEXT,
    description     TEXT NOT NULL DEFAULT '',
    status          TEXT NOT NULL DEFAULT 'pending',
    reject_reason   TEXT,
    verified_by     INTEGER REFERENCES users(id) ON DELETE SET NULL,
    verified_at     TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id, created_at);

CREATE TABLE IF NOT EXISTS attendance (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    date        TEXT NOT NULL,
    morning     TEXT NOT NULL DEFAULT 'Null',
    evening     TEXT NOT NULL DEFAULT 'Null',
    night       TEXT NOT NULL DEFAULT 'Null',
    summary     TEXT NOT NULL DEFAULT 'Null',
    remarks     TEXT NOT NULL DEFAULT '',
    marked_by   INTEGER REFERENCES users(id) ON DELETE SET NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (student_id, date)
);
CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date);

CREATE TABLE IF NOT EXISTS penalties (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id    INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    penalty_type  TEXT NOT NULL,
    amount        INTEGER NOT NULL DEFAULT 0 CHECK (amount >= 0),
    reason        TEXT NOT NULL,
    issued_by     INTEGER REFERENCES users(id) ON DELETE SET NULL,
    issued_date   TEXT NOT NULL,
    is_paid       INTEGER NOT NULL DEFAULT 0,
    paid_date     TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_penalties_one_night_shift
    ON penalties(student_id) WHERE penalty_type = 'night_shift';

CREATE TABLE IF NOT EXISTS meals (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    meal_type     TEXT NOT NULL,
    date          TEXT NOT NULL,
    menu          TEXT NOT NULL,
    prepared_by   INTEGER REFERENCES users(id) ON DELETE SET NULL,
    is_available  INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    UNIQUE (meal_type, date)
);

CREATE TABLE IF NOT EXISTS meal_feedback (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    meal_id     INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    feedback    TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,
    UNIQUE (student_id, meal_id)
);

CREATE TABLE IF NOT EXISTS complaints (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id      INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    complaint_type  TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'pending',
    assigned_to     INTEGER REFERENCES users(id) ON DELETE SET NULL,
    resolution      TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    resolved_at     TEXT
);

CREATE TABLE IF NOT EXISTS stay_extensions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id          INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    current_checkout    TEXT,
    requested_checkout  TEXT NOT NULL,
    reason              TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'pending',
    approved_by         INTEGER REFERENCES users(id) ON DELETE SET NULL,
    approved_at         TEXT,
    rejection_reason    TEXT,
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    notification_type  TEXT NOT NULL,
    title              TEXT NOT NULL,
    message            TEXT NOT NULL,
    is_read            INTEGER NOT NULL DEFAULT 0,
    created_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient_id, created_at);

CREATE TABLE IF NOT EXISTS staff (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    staff_code  TEXT NOT NULL UNIQUE,
    staff_type  TEXT NOT NULL,
    department  TEXT NOT NULL DEFAULT '',
    hire_date   TEXT NOT NULL,
    salary      INTEGER NOT NULL CHECK (salary >= 0),
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS food_shortages (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    meal_id           INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
    reported_by       INTEGER REFERENCES users(id) ON DELETE SET NULL,
    shortage_type     TEXT NOT NULL,
    description       TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'reported',
    resolved_by       INTEGER REFERENCES users(id) ON DELETE SET NULL,
    resolution_notes  TEXT,
    created_at        TEXT NOT NULL,
    resolved_at       TEXT
);

CREATE TABLE IF NOT EXISTS system_settings (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    hostel_name     TEXT NOT NULL,
    address         TEXT NOT NULL,
    contact_number  TEXT NOT NULL,
    email           TEXT NOT NULL,
    website         TEXT,
    updated_at      TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_reaches_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        migrate_to_latest(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 14);
    }

    #[test]
    fn migrating_twice_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to_latest(&mut conn).unwrap();
        migrate_to_latest(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn newer_database_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let err = migrate_to_latest(&mut conn).unwrap_err();
        assert!(matches!(err, DbError::Migration(_)));
    }

    #[test]
    fn night_shift_penalty_is_unique_per_student() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to_latest(&mut conn).unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, username, role, created_at) VALUES (1, 'amna', 'student', 'now');
             INSERT INTO students (id, user_id, student_code, department, year_of_study, created_at)
                 VALUES (1, 1, 'S-1', 'CS', 2, 'now');
             INSERT INTO penalties (student_id, penalty_type, reason, issued_date)
                 VALUES (1, 'fine', 'late', '2024-01-01'), (1, 'fine', 'late', '2024-01-02');
             INSERT INTO penalties (student_id, penalty_type, reason, issued_date)
                 VALUES (1, 'night_shift', 'night', '2024-01-01');",
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO penalties (student_id, penalty_type, reason, issued_date)
             VALUES (1, 'night_shift', 'night', '2024-01-02')",
            [],
        );
        assert!(dup.is_err());
    }
}
