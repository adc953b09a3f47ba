//! Room occupancy ledger.
//!
//! A room's `occupied` counter equals the number of students assigned to
//! it, and `is_available` holds exactly when `occupied < capacity`. Both are
//! changed only here, inside IMMEDIATE transactions, and the counter update
//! is guarded in SQL so two concurrent allocations cannot overfill a room.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde::Serialize;

use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::notifications::{self, NotificationKind};
use crate::payments::{self, PaymentStatus};
use crate::rooms;
use crate::sql;

/// The occupancy aggregate owned by a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occupancy {
    pub occupied: i64,
    pub capacity: i64,
}

impl Occupancy {
    pub fn is_available(&self) -> bool {
        self.occupied < self.capacity
    }

    /// One more occupant, or `Precondition` when the room is full.
    pub fn admit(self) -> Result<Self> {
        if !self.is_available() {
            return Err(HostelError::precondition("Room is full"));
        }
        Ok(Self {
            occupied: self.occupied + 1,
            ..self
        })
    }

    /// One fewer occupant; never drops below zero.
    pub fn release(self) -> Self {
        Self {
            occupied: (self.occupied - 1).max(0),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub student_id: i64,
    pub room_id: i64,
    pub room_number: String,
    pub check_in_date: NaiveDate,
    pub occupancy: Occupancy,
    pub is_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deallocation {
    pub student_id: i64,
    pub room_id: i64,
    pub room_number: String,
    pub occupancy: Occupancy,
    pub is_available: bool,
}

struct StudentSlot {
    user_id: i64,
    room_id: Option<i64>,
    is_active: bool,
}

fn student_slot(conn: &Connection, student_id: i64) -> Result<StudentSlot> {
    conn.query_row(
        "SELECT user_id, room_id, is_active FROM students WHERE id = ?1",
        [student_id],
        |row| {
            Ok(StudentSlot {
                user_id: row.get(0)?,
                room_id: row.get(1)?,
                is_active: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("student", student_id))
}

/// Assign `room_id` to `student_id`.
///
/// Requires an active student without a room whose latest payment is
/// verified, and a room with spare capacity. Checks in today and notifies
/// the student.
pub fn allocate_room(conn: &mut Connection, student_id: i64, room_id: i64) -> Result<Allocation> {
    let allocation = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let student = student_slot(tx, student_id)?;
        if !student.is_active {
            return Err(HostelError::precondition("Student is not active"));
        }
        if let Some(current) = student.room_id {
            return Err(HostelError::precondition(format!(
                "Student is already assigned to room {current}"
            )));
        }
        if payments::latest_status(tx, student_id)? != Some(PaymentStatus::Verified) {
            return Err(HostelError::precondition(
                "Student must have verified payment before room assignment",
            ));
        }

        let room = rooms::find_room(tx, room_id)?
            .ok_or_else(|| HostelError::not_found("room", room_id))?;
        let after = room.occupancy().admit()?;
        if !room.is_available {
            return Err(HostelError::precondition("Room is not available"));
        }

        let claimed = tx.execute(
            "UPDATE rooms
             SET occupied = occupied + 1,
                 is_available = (occupied + 1 < capacity)
             WHERE id = ?1 AND is_available = 1 AND occupied < capacity",
            [room_id],
        )?;
        if claimed == 0 {
            return Err(HostelError::precondition("Room is full"));
        }

        let check_in = sql::today();
        tx.execute(
            "UPDATE students SET room_id = ?2, check_in_date = ?3 WHERE id = ?1 AND room_id IS NULL",
            params![student_id, room_id, check_in],
        )?;

        notifications::notify(
            tx,
            student.user_id,
            NotificationKind::RoomAssigned,
            "Room Assigned",
            &format!(
                "You have been assigned to room {}. Please log out and log back in to access your full dashboard.",
                room.room_number
            ),
        )?;

        Ok::<_, HostelError>(Allocation {
            student_id,
            room_id,
            room_number: room.room_number,
            check_in_date: check_in,
            occupancy: after,
            is_available: after.is_available(),
        })
    })?;

    tracing::info!(
        student_id,
        room_id,
        occupied = allocation.occupancy.occupied,
        capacity = allocation.occupancy.capacity,
        "room allocated"
    );
    Ok(allocation)
}

/// Remove the student's room assignment and notify them.
pub fn deallocate_room(conn: &mut Connection, student_id: i64) -> Result<Deallocation> {
    let deallocation = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let student = student_slot(tx, student_id)?;
        let room_id = student
            .room_id
            .ok_or_else(|| HostelError::precondition("Student has no room assigned"))?;

        release_room(tx, student_id, room_id)?;
        let room = rooms::get_room(tx, room_id)?;

        notifications::notify(
            tx,
            student.user_id,
            NotificationKind::RoomDeallocated,
            "Room Deallocated",
            &format!("Your room {} has been deallocated.", room.room_number),
        )?;

        Ok::<_, HostelError>(Deallocation {
            student_id,
            room_id,
            occupancy: room.occupancy(),
            is_available: room.is_available,
            room_number: room.room_number,
        })
    })?;

    tracing::info!(
        student_id,
        room_id = deallocation.room_id,
        occupied = deallocation.occupancy.occupied,
        "room deallocated"
    );
    Ok(deallocation)
}

/// Release whatever room the student holds, inside the caller's
/// transaction. Returns the released room id.
pub(crate) fn release_in_tx(tx: &Connection, student_id: i64) -> Result<Option<i64>> {
    let student = student_slot(tx, student_id)?;
    match student.room_id {
        Some(room_id) => {
            release_room(tx, student_id, room_id)?;
            Ok(Some(room_id))
        }
        None => Ok(None),
    }
}

fn release_room(tx: &Connection, student_id: i64, room_id: i64) -> Result<()> {
    let released = tx.execute(
        "UPDATE rooms SET occupied = occupied - 1, is_available = 1
         WHERE id = ?1 AND occupied > 0",
        [room_id],
    )?;
    if released == 0 {
        tracing::warn!(
            student_id,
            room_id,
            "room counter already at zero on release"
        );
    }
    tx.execute(
        "UPDATE students SET room_id = NULL, check_in_date = NULL WHERE id = ?1",
        [student_id],
    )?;
    Ok(())
}
