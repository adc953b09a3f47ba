//! Request and response bodies that exist only at the HTTP edge.
//!
//! Domain payloads (`NewStudent`, `NewRoom`, ...) deserialize straight from
//! `hostel-core`; the types here cover path actions and inputs that need
//! checking before they reach a service.

use chrono::NaiveDate;
use hostel_core::attendance::AttendanceEntry;
use hostel_core::shift::Shift;
use hostel_core::sql;
use hostel_core::students::Student;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service_version: String,
    pub schema_version: i32,
    pub uptime_s: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Housing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AllocateRoomRequest {
    pub room_id: i64,
}

/// Body for every reject action (payments, stay extensions).
#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    #[serde(alias = "reject_reason", alias = "rejection_reason")]
    pub reason: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Attendance
// ─────────────────────────────────────────────────────────────────────────────

/// One attendance row as sent by a client. Shifts arrive as text so an
/// unknown value can be reported against the field that carried it.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceInput {
    pub student_id: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub morning: Option<String>,
    #[serde(default)]
    pub evening: Option<String>,
    #[serde(default)]
    pub night: Option<String>,
    #[serde(default)]
    pub remarks: String,
}

fn shift(field: &str, raw: Option<&str>) -> hostel_core::Result<Shift> {
    raw.map_or(Ok(Shift::Null), |raw| sql::parse_field(field, raw))
}

impl AttendanceInput {
    /// Validate shifts and settle the date (`fallback` when absent).
    pub fn into_entry(self, fallback: NaiveDate) -> hostel_core::Result<AttendanceEntry> {
        Ok(AttendanceEntry {
            student_id: self.student_id,
            date: self.date.unwrap_or(fallback),
            morning: shift("morning", self.morning.as_deref())?,
            evening: shift("evening", self.evening.as_deref())?,
            night: shift("night", self.night.as_deref())?,
            remarks: self.remarks,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAttendanceRequest {
    /// Applies to every row that has no date of its own
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub records: Vec<AttendanceInput>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mess
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcknowledgeRequest {
    /// One shortage; omitted means every reported shortage
    #[serde(default)]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Dashboards
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct NewStudentsResponse {
    pub new_students: Vec<Student>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostel_core::HostelError;
    use pretty_assertions::assert_eq;

    fn input(morning: Option<&str>) -> AttendanceInput {
        AttendanceInput {
            student_id: 1,
            date: None,
            morning: morning.map(str::to_string),
            evening: Some("Present".to_string()),
            night: None,
            remarks: String::new(),
        }
    }

    #[test]
    fn missing_shifts_default_to_null() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let entry = input(None).into_entry(day).unwrap();
        assert_eq!(entry.morning, Shift::Null);
        assert_eq!(entry.evening, Shift::Present);
        assert_eq!(entry.date, day);
    }

    #[test]
    fn unknown_shift_names_its_field() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let err = input(Some("Late")).into_entry(day).unwrap_err();
        assert!(matches!(err, HostelError::Validation { .. }));
        assert_eq!(err.field(), Some("morning"));
    }

    #[test]
    fn reject_reason_aliases() {
        let r: RejectRequest =
            serde_json::from_str(r#"{"reject_reason":"blurry receipt"}"#).unwrap();
        assert_eq!(r.reason, "blurry receipt");
    }
}
