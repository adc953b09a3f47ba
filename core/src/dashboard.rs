//! Read-only summaries for the per-role landing pages.
//!
//! Every function takes the calendar date explicitly so counts that depend
//! on "today" are deterministic under test.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::config::StudentConfig;
use crate::error::Result;
use crate::meals::{self, Meal};
use crate::notifications::{self, Notification};
use crate::payments::{self, Payment};
use crate::shift::Shift;
use crate::staff;
use crate::students::{self, Student, StudentFilter};

const RECENT_WINDOW_DAYS: u64 = 7;
const RECENT_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_students: i64,
    pub total_rooms: i64,
    pub available_rooms: i64,
    pub occupied_rooms: i64,
    pub pending_payments: i64,
    pub pending_complaints: i64,
    pub pending_extensions: i64,
    pub todays_meals: i64,
    pub total_staff: i64,
    pub present_today: i64,
    pub absent_today: i64,
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
    Ok(conn.query_row(sql, params, |row| row.get(0))?)
}

fn window_start(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(RECENT_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN)
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

pub fn overview(conn: &Connection, today: NaiveDate) -> Result<Overview> {
    Ok(Overview {
        total_students: count(
            conn,
            "SELECT COUNT(*) FROM students WHERE is_active = 1",
            params![],
        )?,
        total_rooms: count(conn, "SELECT COUNT(*) FROM rooms", params![])?,
        available_rooms: count(
            conn,
            "SELECT COUNT(*) FROM rooms WHERE is_available = 1",
            params![],
        )?,
        occupied_rooms: count(
            conn,
            "SELECT COUNT(*) FROM rooms WHERE occupied > 0",
            params![],
        )?,
        pending_payments: count(
            conn,
            "SELECT COUNT(*) FROM payments WHERE status = 'pending'",
            params![],
        )?,
        pending_complaints: count(
            conn,
            "SELECT COUNT(*) FROM complaints WHERE status = 'pending'",
            params![],
        )?,
        pending_extensions: count(
            conn,
            "SELECT COUNT(*) FROM stay_extensions WHERE status = 'pending'",
            params![],
        )?,
        todays_meals: count(conn, "SELECT COUNT(*) FROM meals WHERE date = ?1", [today])?,
        total_staff: staff::count_active(conn)?,
        present_today: count(
            conn,
            "SELECT COUNT(*) FROM attendance WHERE date = ?1 AND summary = ?2",
            params![today, Shift::Present],
        )?,
        absent_today: count(
            conn,
            "SELECT COUNT(*) FROM attendance WHERE date = ?1 AND summary = ?2",
            params![today, Shift::Absent],
        )?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomAllocationRow {
    pub student_id: i64,
    pub student_code: String,
    pub name: String,
    pub room_number: String,
    pub check_in_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WardenDashboard {
    pub open_complaints: i64,
    pub allocations: Vec<RoomAllocationRow>,
    pub recent_notifications: Vec<Notification>,
}

pub fn warden(conn: &Connection, user_id: i64) -> Result<WardenDashboard> {
    let allocations = students::list_students(conn, &StudentFilter::default())?
        .into_iter()
        .filter_map(|s| {
            let room_number = s.room_number.clone()?;
            Some(RoomAllocationRow {
                name: s.full_name(),
                student_id: s.id,
                student_code: s.student_code,
                room_number,
                check_in_date: s.check_in_date,
            })
        })
        .collect();

    Ok(WardenDashboard {
        open_complaints: count(
            conn,
            "SELECT COUNT(*) FROM complaints WHERE status IN ('pending', 'in_progress')",
            params![],
        )?,
        allocations,
        recent_notifications: notifications::list_for(conn, user_id, Some(RECENT_NOTIFICATIONS))?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeputyDashboard {
    pub housed_students: i64,
    pub latest_meal: Option<Meal>,
    pub feedback_count: i64,
    pub unread_notifications: i64,
    pub new_students: i64,
}

pub fn deputy(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<DeputyDashboard> {
    Ok(DeputyDashboard {
        housed_students: count(
            conn,
            "SELECT COUNT(*) FROM students WHERE is_active = 1 AND room_id IS NOT NULL",
            params![],
        )?,
        latest_meal: meals::latest_meal(conn)?,
        feedback_count: count(conn, "SELECT COUNT(*) FROM meal_feedback", params![])?,
        unread_notifications: notifications::unread_count(conn, user_id)?,
        new_students: count(
            conn,
            "SELECT COUNT(*) FROM students WHERE is_active = 1 AND created_at >= ?1",
            [start_of(window_start(today))],
        )?,
    })
}

/// Students registered during the last week, newest first. The deputy
/// dashboard's `new_students` count is the length of this list.
pub fn new_students(conn: &Connection, today: NaiveDate) -> Result<Vec<Student>> {
    students::registered_since(conn, start_of(window_start(today)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessDashboard {
    pub total_feedback: i64,
    pub my_shortage_reports: i64,
    pub recent_meals: i64,
}

pub fn mess(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<MessDashboard> {
    Ok(MessDashboard {
        total_feedback: count(conn, "SELECT COUNT(*) FROM meal_feedback", params![])?,
        my_shortage_reports: count(
            conn,
            "SELECT COUNT(*) FROM food_shortages WHERE reported_by = ?1",
            [user_id],
        )?,
        recent_meals: count(
            conn,
            "SELECT COUNT(*) FROM meals WHERE date >= ?1 AND date <= ?2",
            [window_start(today), today],
        )?,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub profile: Student,
    pub latest_payment: Option<Payment>,
    pub has_room: bool,
    pub application_deadline: NaiveDate,
    pub days_left: i64,
}

/// A student's own summary. New students have a fixed window after
/// registration to apply for a room.
pub fn student(
    conn: &Connection,
    user_id: i64,
    today: NaiveDate,
    config: &StudentConfig,
) -> Result<StudentDashboard> {
    let profile = students::student_for_user(conn, user_id)?;
    let latest_payment = payments::latest_payment(conn, profile.id)?;

    let registered = profile.created_at.date_naive();
    let window = config.room_application_window_days;
    let application_deadline = registered
        .checked_add_days(Days::new(u64::try_from(window).unwrap_or(0)))
        .unwrap_or(NaiveDate::MAX);
    let elapsed = (today - registered).num_days();
    let days_left = (window - elapsed).max(0);

    Ok(StudentDashboard {
        has_room: profile.room_id.is_some(),
        profile,
        latest_payment,
        application_deadline,
        days_left,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{self, AttendanceEntry};
    use crate::config::PenaltyConfig;
    use crate::meals::{MealType, NewMeal};
    use crate::payments::PaymentStatus;
    use crate::roles::Role;
    use crate::sql;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn overview_counts_today() {
        let mut conn = test_support::conn();
        let deputy = test_support::user(&conn, "deputy", Role::DeputyRt);
        let room = test_support::room(&conn, "A-101", 2);
        test_support::room(&conn, "A-102", 1);
        let housed = test_support::housed_student(&mut conn, "S-1", room.id);
        let other = test_support::student(&mut conn, "S-2");
        test_support::payment(&conn, other.id, PaymentStatus::Pending);

        let today = sql::today();
        for (student_id, shift) in [(housed.id, Shift::Present), (other.id, Shift::Absent)] {
            let entry = AttendanceEntry {
                student_id,
                date: today,
                morning: shift,
                evening: shift,
                night: Shift::Null,
                remarks: String::new(),
            };
            attendance::mark_attendance(&mut conn, deputy, &entry, &PenaltyConfig::default())
                .unwrap();
        }

        let o = overview(&conn, today).unwrap();
        assert_eq!(o.total_students, 2);
        assert_eq!(o.total_rooms, 2);
        assert_eq!(o.available_rooms, 2);
        assert_eq!(o.occupied_rooms, 1);
        assert_eq!(o.pending_payments, 1);
        assert_eq!(o.present_today, 1);
        assert_eq!(o.absent_today, 1);
        assert_eq!(o.todays_meals, 0);
    }

    #[test]
    fn warden_sees_allocations() {
        let mut conn = test_support::conn();
        let warden = test_support::user(&conn, "warden", Role::Warden);
        let room = test_support::room(&conn, "B-1", 1);
        test_support::housed_student(&mut conn, "S-1", room.id);
        test_support::student(&mut conn, "S-2");

        let w = super::warden(&conn, warden).unwrap();
        assert_eq!(w.allocations.len(), 1);
        assert_eq!(w.allocations[0].room_number, "B-1");
        assert_eq!(w.open_complaints, 0);
    }

    #[test]
    fn deputy_and_mess_windows() {
        let mut conn = test_support::conn();
        let deputy = test_support::user(&conn, "deputy", Role::DeputyRt);
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        test_support::student(&mut conn, "S-1");
        let today = sql::today();
        for date in [today, today - Days::new(30)] {
            meals::upsert_meal(
                &conn,
                cook,
                &NewMeal {
                    meal_type: MealType::Lunch,
                    date,
                    menu: "Daal".to_string(),
                    is_available: true,
                },
            )
            .unwrap();
        }

        let d = super::deputy(&conn, deputy, today).unwrap();
        assert_eq!(d.new_students, 1);
        assert_eq!(d.housed_students, 0);
        assert!(d.latest_meal.is_some());

        let m = mess(&conn, cook, today).unwrap();
        assert_eq!(m.recent_meals, 1);
        assert_eq!(m.my_shortage_reports, 0);
    }

    #[test]
    fn new_students_lists_last_week_registrations() {
        let mut conn = test_support::conn();
        let deputy = test_support::user(&conn, "deputy", Role::DeputyRt);
        test_support::student(&mut conn, "S-1");
        let old = test_support::student(&mut conn, "S-2");
        conn.execute(
            "UPDATE students SET created_at = ?2 WHERE id = ?1",
            params![old.id, Utc::now() - chrono::TimeDelta::days(20)],
        )
        .unwrap();
        let today = sql::today();

        let listed: Vec<String> = new_students(&conn, today)
            .unwrap()
            .into_iter()
            .map(|s| s.student_code)
            .collect();
        assert_eq!(listed, vec!["S-1"]);
        assert_eq!(super::deputy(&conn, deputy, today).unwrap().new_students, 1);
    }

    #[test]
    fn student_application_window_counts_down() {
        let mut conn = test_support::conn();
        let s = test_support::student(&mut conn, "S-1");
        let config = StudentConfig {
            room_application_window_days: 7,
        };
        let registered = s.created_at.date_naive();

        let fresh = student(&conn, s.user_id, registered, &config).unwrap();
        assert_eq!(fresh.days_left, 7);
        assert!(!fresh.has_room);
        assert_eq!(fresh.application_deadline, registered + Days::new(7));

        let late = student(&conn, s.user_id, registered + Days::new(10), &config).unwrap();
        assert_eq!(late.days_left, 0);
    }
}
