//! Rooms. Occupancy columns are written only by [`crate::ledger`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{HostelError, Result};
use crate::ledger::Occupancy;
use crate::sql::{sql_text_enum, unique_as_validation};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoomType {
    Single,
    Double,
    Triple,
}

sql_text_enum!(RoomType);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: i64,
    pub room_number: String,
    pub room_type: RoomType,
    pub floor: i64,
    pub capacity: i64,
    pub occupied: i64,
    pub price_per_month: i64,
    pub is_available: bool,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn occupancy(&self) -> Occupancy {
        Occupancy {
            occupied: self.occupied,
            capacity: self.capacity,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            room_number: row.get(1)?,
            room_type: row.get(2)?,
            floor: row.get(3)?,
            capacity: row.get(4)?,
            occupied: row.get(5)?,
            price_per_month: row.get(6)?,
            is_available: row.get(7)?,
            description: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

const COLUMNS: &str = "id, room_number, room_type, floor, capacity, occupied, price_per_month,
    is_available, description, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewRoom {
    pub room_number: String,
    pub room_type: RoomType,
    #[serde(default)]
    pub floor: i64,
    pub capacity: i64,
    pub price_per_month: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    pub room_type: Option<RoomType>,
    pub available: Option<bool>,
}

pub fn create_room(conn: &Connection, new: &NewRoom) -> Result<Room> {
    let number = new.room_number.trim();
    if number.is_empty() {
        return Err(HostelError::validation("room_number", "must not be empty"));
    }
    if new.capacity < 1 {
        return Err(HostelError::validation("capacity", "must be at least 1"));
    }
    if new.price_per_month < 0 {
        return Err(HostelError::validation("price_per_month", "must not be negative"));
    }

    conn.execute(
        "INSERT INTO rooms (room_number, room_type, floor, capacity, price_per_month, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            number,
            new.room_type,
            new.floor,
            new.capacity,
            new.price_per_month,
            new.description.trim(),
            Utc::now(),
        ],
    )
    .map_err(|e| unique_as_validation(e, "room_number", "already exists"))?;

    let id = conn.last_insert_rowid();
    tracing::info!(
        room_id = id,
        room_number = number,
        capacity = new.capacity,
        "room created"
    );
    get_room(conn, id)
}

pub fn get_room(conn: &Connection, id: i64) -> Result<Room> {
    find_room(conn, id)?.ok_or_else(|| HostelError::not_found("room", id))
}

pub(crate) fn find_room(conn: &Connection, id: i64) -> Result<Option<Room>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM rooms WHERE id = ?1"),
            [id],
            Room::from_row,
        )
        .optional()?)
}

pub fn list_rooms(conn: &Connection, filter: &RoomFilter) -> Result<Vec<Room>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM rooms
         WHERE (?1 IS NULL OR room_type = ?1)
           AND (?2 IS NULL OR is_available = ?2)
         ORDER BY room_number"
    ))?;
    let rooms = stmt
        .query_map(params![filter.room_type, filter.available], Room::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rooms)
}
