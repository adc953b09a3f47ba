//! Food shortage reports raised against a planned meal.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::db::execute_in_transaction;
use crate::error::{HostelError, Result};
use crate::meals::{self, MealType};
use crate::notifications::{self, NotificationKind};
use crate::roles::Role;
use crate::sql::sql_text_enum;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShortageStatus {
    Reported,
    Acknowledged,
    Resolved,
    Cancelled,
}

sql_text_enum!(ShortageStatus);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodShortage {
    pub id: i64,
    pub meal_id: i64,
    pub meal_type: MealType,
    pub meal_date: NaiveDate,
    pub reported_by: Option<i64>,
    pub shortage_type: String,
    pub description: String,
    pub status: ShortageStatus,
    pub resolved_by: Option<i64>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl FoodShortage {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            meal_id: row.get(1)?,
            meal_type: row.get(2)?,
            meal_date: row.get(3)?,
            reported_by: row.get(4)?,
            shortage_type: row.get(5)?,
            description: row.get(6)?,
            status: row.get(7)?,
            resolved_by: row.get(8)?,
            resolution_notes: row.get(9)?,
            created_at: row.get(10)?,
            resolved_at: row.get(11)?,
        })
    }
}

const SELECT: &str = "SELECT f.id, f.meal_id, m.meal_type, m.date, f.reported_by, f.shortage_type,
        f.description, f.status, f.resolved_by, f.resolution_notes, f.created_at, f.resolved_at
    FROM food_shortages f
    JOIN meals m ON m.id = f.meal_id";

#[derive(Debug, Clone, Deserialize)]
pub struct NewShortage {
    pub meal_id: i64,
    pub shortage_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ShortageFilter {
    pub status: Option<ShortageStatus>,
    pub reported_by: Option<i64>,
}

/// Record a shortage and alert mess staff and admins.
pub fn report_shortage(
    conn: &mut Connection,
    reported_by: i64,
    new: &NewShortage,
) -> Result<FoodShortage> {
    let shortage_type = new.shortage_type.trim();
    if shortage_type.is_empty() {
        return Err(HostelError::validation("shortage_type", "must not be empty"));
    }
    let description = new.description.trim();
    if description.is_empty() {
        return Err(HostelError::validation("description", "must not be empty"));
    }

    let id = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        let meal = meals::get_meal(tx, new.meal_id)?;
        tx.execute(
            "INSERT INTO food_shortages (meal_id, reported_by, shortage_type, description, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                meal.id,
                reported_by,
                shortage_type,
                description,
                ShortageStatus::Reported,
                Utc::now()
            ],
        )?;
        let id = tx.last_insert_rowid();

        let message = format!(
            "Food shortage reported for {} on {}",
            meal.meal_type, meal.date
        );
        for role in [Role::MessStaff, Role::Admin] {
            notifications::notify_role(
                tx,
                role,
                NotificationKind::FoodShortage,
                "Food Shortage Reported",
                &message,
            )?;
        }
        Ok::<_, HostelError>(id)
    })?;

    tracing::info!(
        shortage_id = id,
        meal_id = new.meal_id,
        "food shortage reported"
    );
    get_shortage(conn, id)
}

pub fn get_shortage(conn: &Connection, id: i64) -> Result<FoodShortage> {
    conn.query_row(
        &format!("{SELECT} WHERE f.id = ?1"),
        [id],
        FoodShortage::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("food shortage", id))
}

pub fn list_shortages(conn: &Connection, filter: &ShortageFilter) -> Result<Vec<FoodShortage>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT}
         WHERE (?1 IS NULL OR f.status = ?1)
           AND (?2 IS NULL OR f.reported_by = ?2)
         ORDER BY f.created_at DESC, f.id DESC"
    ))?;
    let rows = stmt
        .query_map(
            params![filter.status, filter.reported_by],
            FoodShortage::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Acknowledge one reported shortage, or every reported shortage when `id`
/// is `None`. Returns how many rows moved. Mess staff get one notification
/// per call.
pub fn acknowledge(conn: &mut Connection, acknowledged_by: i64, id: Option<i64>) -> Result<usize> {
    let count = execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
        if let Some(id) = id {
            let shortage = get_shortage(tx, id)?;
            if shortage.status != ShortageStatus::Reported {
                return Err(HostelError::precondition(format!(
                    "Food shortage {id} is already {}",
                    shortage.status
                )));
            }
        }

        let now = Utc::now();
        let count = tx.execute(
            "UPDATE food_shortages
             SET status = ?1, resolved_by = ?2, resolved_at = ?3
             WHERE status = ?4 AND (?5 IS NULL OR id = ?5)",
            params![
                ShortageStatus::Acknowledged,
                acknowledged_by,
                now,
                ShortageStatus::Reported,
                id
            ],
        )?;

        if count > 0 {
            let message = if count == 1 {
                "A reported food shortage has been acknowledged by management.".to_string()
            } else {
                format!("{count} reported food shortages have been acknowledged by management.")
            };
            notifications::notify_role(
                tx,
                Role::MessStaff,
                NotificationKind::FoodShortageAcknowledged,
                "Food Shortage Acknowledged",
                &message,
            )?;
        }
        Ok::<_, HostelError>(count)
    })?;

    tracing::info!(count, acknowledged_by, "food shortages acknowledged");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meals::NewMeal;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn dinner(conn: &Connection, cook: i64) -> meals::Meal {
        let (meal, _) = meals::upsert_meal(
            conn,
            cook,
            &NewMeal {
                meal_type: MealType::Dinner,
                date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                menu: "Nihari".to_string(),
                is_available: true,
            },
        )
        .unwrap();
        meal
    }

    fn shortage(meal_id: i64) -> NewShortage {
        NewShortage {
            meal_id,
            shortage_type: "bread".to_string(),
            description: "Ran out of naan at 8pm".to_string(),
        }
    }

    #[test]
    fn report_notifies_mess_and_admins() {
        let mut conn = test_support::conn();
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        let admin = test_support::user(&conn, "admin", Role::Admin);
        let meal = dinner(&conn, cook);

        let s = report_shortage(&mut conn, cook, &shortage(meal.id)).unwrap();
        assert_eq!(s.status, ShortageStatus::Reported);
        assert_eq!(s.meal_type, MealType::Dinner);

        let note = &notifications::list_for(&conn, admin, None).unwrap()[0];
        assert_eq!(note.title, "Food Shortage Reported");
        assert_eq!(
            note.message,
            "Food shortage reported for dinner on 2024-06-03"
        );
        assert_eq!(notifications::unread_count(&conn, cook).unwrap(), 1);
    }

    #[test]
    fn unknown_meal_is_not_found() {
        let mut conn = test_support::conn();
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        assert!(matches!(
            report_shortage(&mut conn, cook, &shortage(77)),
            Err(HostelError::NotFound { entity: "meal", .. })
        ));
    }

    #[test]
    fn acknowledge_one_then_all() {
        let mut conn = test_support::conn();
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        let warden = test_support::user(&conn, "warden", Role::Warden);
        let meal = dinner(&conn, cook);
        let first = report_shortage(&mut conn, cook, &shortage(meal.id)).unwrap();
        report_shortage(&mut conn, cook, &shortage(meal.id)).unwrap();
        report_shortage(&mut conn, cook, &shortage(meal.id)).unwrap();

        assert_eq!(acknowledge(&mut conn, warden, Some(first.id)).unwrap(), 1);
        let first = get_shortage(&conn, first.id).unwrap();
        assert_eq!(first.status, ShortageStatus::Acknowledged);
        assert_eq!(first.resolved_by, Some(warden));

        assert!(matches!(
            acknowledge(&mut conn, warden, Some(first.id)),
            Err(HostelError::Precondition(_))
        ));

        assert_eq!(acknowledge(&mut conn, warden, None).unwrap(), 2);
        assert_eq!(acknowledge(&mut conn, warden, None).unwrap(), 0);

        let pending = ShortageFilter {
            status: Some(ShortageStatus::Reported),
            ..ShortageFilter::default()
        };
        assert!(list_shortages(&conn, &pending).unwrap().is_empty());
    }
}
