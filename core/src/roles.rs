//! Roles, capabilities and the calling actor.
//!
//! Authorization is a pure table lookup: [`Role::allows`] answers whether a
//! role holds a [`Capability`]. Services never inspect roles directly except
//! to scope "own records" for students.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::{HostelError, Result};
use crate::sql::sql_text_enum;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    Warden,
    DeputyRt,
    MessStaff,
    Student,
}

sql_text_enum!(Role);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    ManageUsers,
    ManageStudents,
    ViewStudents,
    ViewOwnProfile,
    ManageRooms,
    AllocateRooms,
    VerifyPayments,
    SubmitRoomApplication,
    MarkAttendance,
    ManagePenalties,
    ManageMeals,
    ViewMeals,
    SubmitMealFeedback,
    ViewMealFeedback,
    SubmitComplaint,
    ViewComplaints,
    ManageComplaints,
    SubmitExtension,
    ViewExtensions,
    ReviewExtensions,
    ReadNotifications,
    ManageStaff,
    TrackFoodShortages,
    AcknowledgeFoodShortages,
    ManageSettings,
    ViewOverview,
    ViewAdminAlerts,
    ViewWardenDashboard,
    ViewDeputyDashboard,
    ViewMessDashboard,
    ViewStudentDashboard,
}

impl Role {
    pub fn allows(self, capability: Capability) -> bool {
        use Capability::*;
        use Role::*;

        match capability {
            ManageUsers | ManageStudents | ManageRooms | AllocateRooms | VerifyPayments
            | ManageComplaints | ReviewExtensions | ManageStaff | ManageSettings
            | AcknowledgeFoodShortages | ViewWardenDashboard => matches!(self, Admin | Warden),
            ViewStudents | MarkAttendance | ManagePenalties => {
                matches!(self, Admin | Warden | DeputyRt)
            }
            ManageMeals | TrackFoodShortages => matches!(self, Admin | Warden | MessStaff),
            ViewMealFeedback => matches!(self, Admin | Warden | DeputyRt | MessStaff),
            ViewComplaints | ViewExtensions => matches!(self, Admin | Warden | Student),
            ViewOwnProfile | SubmitRoomApplication | SubmitMealFeedback | SubmitComplaint
            | SubmitExtension | ViewStudentDashboard => self == Student,
            ViewDeputyDashboard => matches!(self, Admin | DeputyRt),
            ViewMessDashboard => matches!(self, Admin | MessStaff),
            ViewAdminAlerts => self == Admin,
            ViewMeals | ReadNotifications | ViewOverview => true,
        }
    }

    pub fn is_staff(self) -> bool {
        self != Role::Student
    }
}

/// The identified caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fail with `Forbidden` unless the actor's role holds `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = self.user_id,
                role = %self.role,
                capability = %capability,
                "capability denied"
            );
            Err(HostelError::Forbidden {
                role: self.role,
                capability,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn admin_holds_every_capability_except_student_only_ones() {
        for cap in Capability::iter() {
            let student_only = matches!(
                cap,
                Capability::ViewOwnProfile
                    | Capability::SubmitRoomApplication
                    | Capability::SubmitMealFeedback
                    | Capability::SubmitComplaint
                    | Capability::SubmitExtension
                    | Capability::ViewStudentDashboard
            );
            assert_eq!(Role::Admin.allows(cap), !student_only, "{cap}");
        }
    }

    #[test]
    fn students_cannot_touch_the_ledger() {
        assert!(!Role::Student.allows(Capability::AllocateRooms));
        assert!(!Role::Student.allows(Capability::MarkAttendance));
        assert!(!Role::Student.allows(Capability::VerifyPayments));
        assert!(Role::Student.allows(Capability::SubmitRoomApplication));
    }

    #[test]
    fn deputy_marks_attendance_but_does_not_allocate() {
        assert!(Role::DeputyRt.allows(Capability::MarkAttendance));
        assert!(Role::DeputyRt.allows(Capability::ManagePenalties));
        assert!(!Role::DeputyRt.allows(Capability::AllocateRooms));
    }

    #[test]
    fn alert_feed_is_admin_only() {
        let holders: Vec<Role> = Role::iter()
            .filter(|r| r.allows(Capability::ViewAdminAlerts))
            .collect();
        assert_eq!(holders, vec![Role::Admin]);
    }

    #[test]
    fn every_role_reads_notifications() {
        for role in Role::iter() {
            assert!(role.allows(Capability::ReadNotifications));
            assert!(role.allows(Capability::ViewOverview));
        }
    }

    #[test]
    fn require_reports_role_and_capability() {
        let actor = Actor::new(3, Role::MessStaff);
        assert!(actor.require(Capability::ManageMeals).is_ok());
        let err = actor.require(Capability::ManageStaff).unwrap_err();
        assert!(matches!(
            err,
            HostelError::Forbidden {
                role: Role::MessStaff,
                capability: Capability::ManageStaff
            }
        ));
    }

    #[test]
    fn role_text_matches_wire_names() {
        assert_eq!(Role::DeputyRt.as_ref(), "deputy_rt");
        assert_eq!("mess_staff".parse::<Role>().unwrap(), Role::MessStaff);
        assert_eq!(
            serde_json::to_string(&Role::DeputyRt).unwrap(),
            "\"deputy_rt\""
        );
    }
}
