//! Admin alert feed.
//!
//! Unlike notifications these are not stored: each call collects whatever
//! is currently waiting on an admin (pending payment receipts, unacknowledged
//! food shortages and students still without a room after the application
//! window), newest first.

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::config::StudentConfig;
use crate::error::Result;
use crate::food_shortages::{self, ShortageFilter, ShortageStatus};
use crate::payments::{self, PaymentFilter, PaymentStatus};
use crate::students;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Payment,
    FoodShortage,
    InactiveStudent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminAlert {
    /// Stable per source row, e.g. `payment_12`
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    pub created_at: DateTime<Utc>,
}

pub fn admin_feed(
    conn: &Connection,
    now: DateTime<Utc>,
    config: &StudentConfig,
) -> Result<Vec<AdminAlert>> {
    let mut alerts = Vec::new();

    let pending = PaymentFilter {
        status: Some(PaymentStatus::Pending),
        student_code: None,
    };
    for payment in payments::list_payments(conn, &pending)? {
        let name = students::get_student(conn, payment.student_id)?.full_name();
        alerts.push(AdminAlert {
            id: format!("payment_{}", payment.id),
            kind: AlertKind::Payment,
            title: "New Payment Receipt".to_string(),
            message: format!("Payment received from {name}"),
            student_code: Some(payment.student_code),
            student_name: Some(name),
            amount: Some(payment.amount),
            created_at: payment.created_at,
        });
    }

    let reported = ShortageFilter {
        status: Some(ShortageStatus::Reported),
        reported_by: None,
    };
    for shortage in food_shortages::list_shortages(conn, &reported)? {
        alerts.push(AdminAlert {
            id: format!("shortage_{}", shortage.id),
            kind: AlertKind::FoodShortage,
            title: "Food Shortage Alert".to_string(),
            message: format!(
                "Food shortage reported for {} on {}: {}",
                shortage.meal_type, shortage.meal_date, shortage.description
            ),
            student_code: None,
            student_name: None,
            amount: None,
            created_at: shortage.created_at,
        });
    }

    let window = config.room_application_window_days;
    let cutoff = TimeDelta::try_days(window)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(now);
    for student in students::unhoused_registered_before(conn, cutoff)? {
        let name = student.full_name();
        alerts.push(AdminAlert {
            id: format!("inactive_{}", student.id),
            kind: AlertKind::InactiveStudent,
            title: "Inactive Student".to_string(),
            message: format!(
                "Student {name} has not been given a room {window} days after registering"
            ),
            student_code: Some(student.student_code),
            student_name: Some(name),
            amount: None,
            created_at: student.created_at,
        });
    }

    alerts.sort_by_key(|a| std::cmp::Reverse(a.created_at));
    Ok(alerts)
}
