//! Hostel-wide settings, stored as a single row.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::{HostelError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSettings {
    pub hostel_name: String,
    pub address: String,
    pub contact_number: String,
    pub email: String,
    pub website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SystemSettings {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hostel_name: row.get(0)?,
            address: row.get(1)?,
            contact_number: row.get(2)?,
            email: row.get(3)?,
            website: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

const COLUMNS: &str = "hostel_name, address, contact_number, email, website, updated_at";

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub hostel_name: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

fn ensure_row(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO system_settings
            (id, hostel_name, address, contact_number, email, website, updated_at)
         VALUES (1, 'Hostify Hostel', 'Hostel Address', '+92-300-0000000', 'admin@hostify.com', NULL, ?1)",
        [Utc::now()],
    )?;
    Ok(())
}

pub fn get_settings(conn: &Connection) -> Result<SystemSettings> {
    ensure_row(conn)?;
    Ok(conn.query_row(
        &format!("SELECT {COLUMNS} FROM system_settings WHERE id = 1"),
        [],
        SystemSettings::from_row,
    )?)
}

pub fn update_settings(conn: &Connection, patch: &SettingsPatch) -> Result<SystemSettings> {
    let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).map(str::to_string);
    let hostel_name = trimmed(&patch.hostel_name);
    if hostel_name.as_deref() == Some("") {
        return Err(HostelError::validation("hostel_name", "must not be empty"));
    }

    ensure_row(conn)?;
    let settings = conn.query_row(
        &format!(
            "UPDATE system_settings SET
                hostel_name = COALESCE(?1, hostel_name),
                address = COALESCE(?2, address),
                contact_number = COALESCE(?3, contact_number),
                email = COALESCE(?4, email),
                website = COALESCE(?5, website),
                updated_at = ?6
             WHERE id = 1
             RETURNING {COLUMNS}"
        ),
        params![
            hostel_name,
            trimmed(&patch.address),
            trimmed(&patch.contact_number),
            trimmed(&patch.email),
            trimmed(&patch.website),
            Utc::now()
        ],
        SystemSettings::from_row,
    )?;
    tracing::info!(hostel_name = %settings.hostel_name, "system settings updated");
    Ok(settings)
}
