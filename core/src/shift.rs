//! Attendance shift values and the daily summary rule.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::sql::sql_text_enum;

/// One shift observation. Stored and exchanged by variant name
/// (`"Present"`, `"Null"`, ...).
#[derive(
    Debug,
    Default,
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
pub enum Shift {
    Present,
    Absent,
    Holiday,
    Leave,
    /// Not recorded
    #[default]
    Null,
}

sql_text_enum!(Shift);

/// Daily summary for a (morning, evening, night) triple.
///
/// First matching rule wins:
/// 1. both day shifts Present -> Present
/// 2. both Absent -> Absent
/// 3. both Holiday -> Holiday
/// 4. both Leave -> Leave
/// 5. either day shift Present -> Present
/// 6. otherwise Absent
///
/// The night shift never changes the summary; it only drives the
/// night-shift penalty.
pub fn reconcile(morning: Shift, evening: Shift, _night: Shift) -> Shift {
    use Shift::*;

    match (morning, evening) {
        (Present, Present) => Present,
        (Absent, Absent) => Absent,
        (Holiday, Holiday) => Holiday,
        (Leave, Leave) => Leave,
        (Present, _) | (_, Present) => Present,
        _ => Absent,
    }
}

/// The three shifts of one student-day, as they will be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayShifts {
    pub morning: Shift,
    pub evening: Shift,
    pub night: Shift,
}

impl DayShifts {
    /// Build the stored form. A student present for both day shifts has no
    /// night observation, so night is forced to Null.
    pub fn normalized(morning: Shift, evening: Shift, night: Shift) -> Self {
        let night = if morning == Shift::Present && evening == Shift::Present {
            Shift::Null
        } else {
            night
        };
        Self {
            morning,
            evening,
            night,
        }
    }

    pub fn summary(&self) -> Shift {
        reconcile(self.morning, self.evening, self.night)
    }
}
