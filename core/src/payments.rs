//! Payments and room applications.
//!
//! A room application is a pending payment whose amount comes from the fee
//! table; allocation later requires the student's latest payment to be
//! verified.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::config::FeeConfig;
use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::notifications::{self, NotificationKind};
use crate::roles::Role;
use crate::sql::{self, sql_text_enum};
use crate::students;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
    Completed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    CreditCard,
    MobilePayment,
    Cash,
}

sql_text_enum!(PaymentStatus, PaymentMethod);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub amount: i64,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub description: String,
    pub status: PaymentStatus,
    pub reject_reason: Option<String>,
    pub verified_by: Option<i64>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            amount: row.get(3)?,
            payment_date: row.get(4)?,
            payment_method: row.get(5)?,
            transaction_id: row.get(6)?,
            description: row.get(7)?,
            status: row.get(8)?,
            reject_reason: row.get(9)?,
            verified_by: row.get(10)?,
            verified_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

const SELECT: &str = "SELECT p.id, p.student_id, s.student_code, p.amount, p.payment_date,
        p.payment_method, p.transaction_id, p.description, p.status, p.reject_reason,
        p.verified_by, p.verified_at, p.created_at
    FROM payments p
    JOIN students s ON s.id = p.student_id";

#[derive(Debug, Clone, Deserialize)]
pub struct RoomApplication {
    /// `single`, or any shared arrangement (`double`, `triple`, `shared`)
    pub room_type: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub student_code: Option<String>,
}

/// Fee for a requested room type. Single rooms have their own fee; every
/// other arrangement is charged the shared fee.
pub fn application_fee(room_type: &str, fees: &FeeConfig) -> Result<i64> {
    match room_type.trim().to_lowercase().as_str() {
        "single" => Ok(fees.single_room),
        "double" | "triple" | "shared" => Ok(fees.shared_room),
        other => Err(HostelError::validation("room_type", format!("unknown room type '{other}'"))),
    }
}

/// A student applies for a room by submitting a pending payment.
/// Admins are told about it and the student gets a receipt notification.
pub fn submit_room_application(
    conn: &mut Connection,
    student_user_id: i64,
    application: &RoomApplication,
    fees: &FeeConfig,
) -> Result<Payment> {
    let amount = application_fee(&application.room_type, fees)?;
    let student = students::student_for_user(conn, student_user_id)?;
    let room_type = application.room_type.trim().to_lowercase();

    let id = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        tx.execute(
            "INSERT INTO payments (student_id, amount, payment_date, payment_method, transaction_id,
                                   description, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                student.id,
                amount,
                sql::today(),
                application.payment_method,
                application.transaction_id,
                format!("Room application for {room_type} room"),
                PaymentStatus::Pending,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        notifications::notify_role(
            tx,
            Role::Admin,
            NotificationKind::Payment,
            "New Room Application",
            &format!(
                "Student {} has submitted a room application with payment of PKR {amount}",
                student.full_name()
            ),
        )?;
        notifications::notify(
            tx,
            student.user_id,
            NotificationKind::RegistrationSuccess,
            "Application Submitted",
            "Your room application has been submitted successfully. Payment will be verified by admin.",
        )?;
        Ok::<_, HostelError>(id)
    })?;

    tracing::info!(
        payment_id = id,
        student_id = student.id,
        amount,
        "room application submitted"
    );
    get_payment(conn, id)
}

pub fn get_payment(conn: &Connection, id: i64) -> Result<Payment> {
    conn.query_row(
        &format!("{SELECT} WHERE p.id = ?1"),
        [id],
        Payment::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("payment", id))
}

pub fn list_payments(conn: &Connection, filter: &PaymentFilter) -> Result<Vec<Payment>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR p.status = ?1)
           AND (?2 IS NULL OR s.student_code = ?2)
         ORDER BY p.created_at DESC, p.id DESC"
    ))?;
    let payments = stmt
        .query_map(
            params![filter.status, filter.student_code],
            Payment::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(payments)
}

/// Status of the student's most recent payment, if any.
pub fn latest_status(conn: &Connection, student_id: i64) -> Result<Option<PaymentStatus>> {
    Ok(conn
        .query_row(
            "SELECT status FROM payments WHERE student_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1",
            [student_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn latest_payment(conn: &Connection, student_id: i64) -> Result<Option<Payment>> {
    Ok(conn
        .query_row(
            &format!(
                "{SELECT} WHERE p.student_id = ?1 ORDER BY p.created_at DESC, p.id DESC LIMIT 1"
            ),
            [student_id],
            Payment::from_row,
        )
        .optional()?)
}

pub fn verify_payment(conn: &mut Connection, id: i64, verifier: i64) -> Result<Payment> {
    execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let payment = pending_payment(tx, id)?;
        tx.execute(
            "UPDATE payments
             SET status = ?2, verified_by = ?3, verified_at = ?4, reject_reason = NULL
             WHERE id = ?1",
            params![id, PaymentStatus::Verified, verifier, Utc::now()],
        )?;
        notifications::notify(
            tx,
            student_user_id(tx, payment.student_id)?,
            NotificationKind::PaymentVerified,
            "Payment Verified",
            &format!(
                "Your payment of PKR {} has been verified successfully. You can now apply for room assignment.",
                payment.amount
            ),
        )?;
        Ok::<_, HostelError>(())
    })?;

    tracing::info!(payment_id = id, verifier, "payment verified");
    get_payment(conn, id)
}

pub fn reject_payment(
    conn: &mut Connection,
    id: i64,
    verifier: i64,
    reason: &str,
) -> Result<Payment> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(HostelError::validation(
            "reject_reason",
            "is required when rejecting a payment",
        ));
    }

    execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let payment = pending_payment(tx, id)?;
        tx.execute(
            "UPDATE payments
             SET status = ?2, verified_by = ?3, verified_at = ?4, reject_reason = ?5
             WHERE id = ?1",
            params![id, PaymentStatus::Rejected, verifier, Utc::now(), reason],
        )?;
        notifications::notify(
            tx,
            student_user_id(tx, payment.student_id)?,
            NotificationKind::PaymentRejected,
            "Payment Rejected",
            &format!(
                "Your payment of PKR {} has been rejected. Reason: {reason}. Please submit a new payment.",
                payment.amount
            ),
        )?;
        Ok::<_, HostelError>(())
    })?;

    tracing::info!(payment_id = id, verifier, "payment rejected");
    get_payment(conn, id)
}

fn pending_payment(conn: &Connection, id: i64) -> Result<Payment> {
    let payment = get_payment(conn, id)?;
    if payment.status != PaymentStatus::Pending {
        return Err(HostelError::precondition(format!(
            "Payment {id} is already {}",
            payment.status
        )));
    }
    Ok(payment)
}

fn student_user_id(conn: &Connection, student_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT user_id FROM students WHERE id = ?1",
        [student_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("student", student_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn application(room_type: &str) -> RoomApplication {
        RoomApplication {
            room_type: room_type.to_string(),
            payment_method: PaymentMethod::BankTransfer,
            transaction_id: Some("TX-1".to_string()),
        }
    }

    #[test]
    fn fee_follows_room_type() {
        let fees = FeeConfig::default();
        assert_eq!(application_fee("single", &fees).unwrap(), 15000);
        assert_eq!(application_fee("Shared", &fees).unwrap(), 7000);
        assert_eq!(application_fee("triple", &fees).unwrap(), 7000);
        assert_eq!(
            application_fee("penthouse", &fees).unwrap_err().field(),
            Some("room_type")
        );
    }

    #[test]
    fn application_creates_pending_payment_and_notifies() {
        let mut conn = test_support::conn();
        let admin = test_support::user(&conn, "admin", Role::Admin);
        let student = test_support::student(&mut conn, "S-1");

        let payment = submit_room_application(

            &mut conn,

            student.user_id,

            &application("single"),

            &FeeConfig::default(),

        )

        .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, 15000);
        assert_eq!(payment.student_code, "S-1");
        assert_eq!(
            latest_status(&conn, student.id).unwrap(),
            Some(PaymentStatus::Pending)
        );

        let admin_notes = notifications::list_for(&conn, admin, None).unwrap();
        assert_eq!(admin_notes[0].title, "New Room Application");
        let own = notifications::list_for(&conn, student.user_id, None).unwrap();
        assert_eq!(own[0].kind, NotificationKind::RegistrationSuccess);
    }

    #[test]
    fn non_students_cannot_apply() {
        let mut conn = test_support::conn();
        let warden = test_support::user(&conn, "warden", Role::Warden);
        let err = submit_room_application(
            &mut conn,
            warden,
            &application("single"),
            &FeeConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HostelError::NotFound { .. }));
    }

    #[test]
    fn verify_then_reprocess_is_refused() {
        let mut conn = test_support::conn();
        let admin = test_support::user(&conn, "admin", Role::Admin);
        let student = test_support::student(&mut conn, "S-1");
        let payment = submit_room_application(
            &mut conn,
            student.user_id,
            &application("double"),
            &FeeConfig::default(),
        )
        .unwrap();

        let verified = verify_payment(&mut conn, payment.id, admin).unwrap();
        assert_eq!(verified.status, PaymentStatus::Verified);
        assert_eq!(verified.verified_by, Some(admin));
        assert!(verified.verified_at.is_some());

        let err = reject_payment(&mut conn, payment.id, admin, "late").unwrap_err();
        assert!(matches!(err, HostelError::Precondition(_)));

        let notes = notifications::list_for(&conn, student.user_id, None).unwrap();
        assert_eq!(notes[0].kind, NotificationKind::PaymentVerified);
    }

    #[test]
    fn rejection_needs_a_reason() {
        let mut conn = test_support::conn();
        let admin = test_support::user(&conn, "admin", Role::Admin);
        let student = test_support::student(&mut conn, "S-1");
        let payment = submit_room_application(
            &mut conn,
            student.user_id,
            &application("single"),
            &FeeConfig::default(),
        )
        .unwrap();

        let err = reject_payment(&mut conn, payment.id, admin, "  ").unwrap_err();
        assert_eq!(err.field(), Some("reject_reason"));

        let rejected = reject_payment(&mut conn, payment.id, admin, "blurry receipt").unwrap();
        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.reject_reason.as_deref(), Some("blurry receipt"));
    }

    #[test]
    fn list_filters_status_and_code() {
        let mut conn = test_support::conn();
        let admin = test_support::user(&conn, "admin", Role::Admin);
        let a = test_support::student(&mut conn, "S-1");
        let b = test_support::student(&mut conn, "S-2");
        let fees = FeeConfig::default();
        let pa =
            submit_room_application(&mut conn, a.user_id, &application("single"), &fees).unwrap();
        submit_room_application(&mut conn, b.user_id, &application("single"), &fees).unwrap();
        verify_payment(&mut conn, pa.id, admin).unwrap();

        let pending = PaymentFilter {
            status: Some(PaymentStatus::Pending),
            student_code: None,
        };
        let listed = list_payments(&conn, &pending).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].student_code, "S-2");

        let by_code = PaymentFilter {
            status: None,
            student_code: Some("S-1".to_string()),
        };
        assert_eq!(
            list_payments(&conn, &by_code).unwrap()[0].status,
            PaymentStatus::Verified
        );
    }
}
