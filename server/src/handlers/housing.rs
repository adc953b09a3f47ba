//! Rooms, room applications, payment review and allocation.

use hostel_core::Capability;
use hostel_core::ledger;
use hostel_core::payments::{self, PaymentFilter, PaymentStatus, RoomApplication};
use hostel_core::rooms::{self, NewRoom, RoomFilter, RoomType};
use rusqlite::Connection;

use crate::error::ApiError;
use crate::protocol::{AllocateRoomRequest, RejectRequest};
use crate::router::{Ctx, Reply};

pub fn create_room(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageRooms)?;
    let new: NewRoom = cx.req.json()?;
    Reply::created(rooms::create_room(conn, &new)?)
}

/// Room listings are open to every identified caller.
pub fn list_rooms(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    let room_type: Option<RoomType> = cx.req.query("room_type")?;
    let filter = RoomFilter {
        room_type,
        available: cx.req.query("available")?,
    };
    Reply::ok(rooms::list_rooms(conn, &filter)?)
}

pub fn get_room(_cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    Reply::ok(rooms::get_room(conn, id)?)
}

pub fn apply_for_room(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::SubmitRoomApplication)?;
    let application: RoomApplication = cx.req.json()?;
    let payment = payments::submit_room_application(
        conn,
        cx.actor.user_id,
        &application,
        &cx.app.config().fees,
    )?;
    Reply::created(payment)
}

pub fn list_payments(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::VerifyPayments)?;
    let status: Option<PaymentStatus> = cx.req.query("status")?;
    let filter = PaymentFilter {
        status,
        student_code: cx.req.query("student_code")?,
    };
    Reply::ok(payments::list_payments(conn, &filter)?)
}

pub fn verify_payment(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::VerifyPayments)?;
    Reply::ok(payments::verify_payment(conn, id, cx.actor.user_id)?)
}

pub fn reject_payment(cx: &Ctx<'_>, conn: &mut Connection, id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::VerifyPayments)?;
    let body: RejectRequest = cx.req.json()?;
    Reply::ok(payments::reject_payment(conn, id, cx.actor.user_id, &body.reason)?)
}

pub fn allocate(cx: &Ctx<'_>, conn: &mut Connection, student_id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::AllocateRooms)?;
    let body: AllocateRoomRequest = cx.req.json()?;
    Reply::ok(ledger::allocate_room(conn, student_id, body.room_id)?)
}

pub fn deallocate(cx: &Ctx<'_>, conn: &mut Connection, student_id: i64) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::AllocateRooms)?;
    Reply::ok(ledger::deallocate_room(conn, student_id)?)
}
