//! Meal plans and student feedback.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::{HostelError, Result};
use crate::sql::{sql_text_enum, unique_as_validation};
use crate::students;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

sql_text_enum!(MealType);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meal {
    pub id: i64,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub menu: String,
    pub prepared_by: Option<i64>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl Meal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            meal_type: row.get(1)?,
            date: row.get(2)?,
            menu: row.get(3)?,
            prepared_by: row.get(4)?,
            is_available: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

const MEAL_COLUMNS: &str = "id, meal_type, date, menu, prepared_by, is_available, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewMeal {
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub menu: String,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct MealFilter {
    pub meal_type: Option<MealType>,
    pub date: Option<NaiveDate>,
}

/// Create or replace the plan for a (meal type, date). Returns the meal and
/// whether it was newly created.
pub fn upsert_meal(conn: &Connection, prepared_by: i64, new: &NewMeal) -> Result<(Meal, bool)> {
    let menu = new.menu.trim();
    if menu.is_empty() {
        return Err(HostelError::validation("menu", "must not be empty"));
    }

    let existed: Option<i64> = conn
        .query_row(
            "SELECT id FROM meals WHERE meal_type = ?1 AND date = ?2",
            params![new.meal_type, new.date],
            |r| r.get(0),
        )
        .optional()?;

    let meal = conn.query_row(
        &format!(
            "INSERT INTO meals (meal_type, date, menu, prepared_by, is_available, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(meal_type, date) DO UPDATE SET
                menu = excluded.menu,
                prepared_by = excluded.prepared_by,
                is_available = excluded.is_available
             RETURNING {MEAL_COLUMNS}"
        ),
        params![
            new.meal_type,
            new.date,
            menu,
            prepared_by,
            new.is_available,
            Utc::now()
        ],
        Meal::from_row,
    )?;

    tracing::info!(
        meal_id = meal.id,
        meal_type = %meal.meal_type,
        date = %meal.date,
        "meal planned"
    );
    Ok((meal, existed.is_none()))
}

pub fn get_meal(conn: &Connection, id: i64) -> Result<Meal> {
    conn.query_row(
        &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ?1"),
        [id],
        Meal::from_row,
    )
    .optional()?
    .ok_or_else(|| HostelError::not_found("meal", id))
}

pub fn list_meals(conn: &Connection, filter: &MealFilter) -> Result<Vec<Meal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEAL_COLUMNS} FROM meals
         WHERE (?1 IS NULL OR meal_type = ?1)
           AND (?2 IS NULL OR date = ?2)
         ORDER BY date DESC,
                  CASE meal_type WHEN 'breakfast' THEN 0 WHEN 'lunch' THEN 1 ELSE 2 END"
    ))?;
    let meals = stmt
        .query_map(params![filter.meal_type, filter.date], Meal::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(meals)
}

/// The most recently planned meal.
pub fn latest_meal(conn: &Connection) -> Result<Option<Meal>> {
    Ok(conn
        .query_row(
            &format!("SELECT {MEAL_COLUMNS} FROM meals ORDER BY created_at DESC, id DESC LIMIT 1"),
            [],
            Meal::from_row,
        )
        .optional()?)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealFeedback {
    pub id: i64,
    pub student_id: i64,
    pub student_code: String,
    pub meal_id: i64,
    pub rating: i64,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

impl MealFeedback {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            student_code: row.get(2)?,
            meal_id: row.get(3)?,
            rating: row.get(4)?,
            feedback: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

const FEEDBACK_SELECT: &str = "SELECT f.id, f.student_id, s.student_code, f.meal_id, f.rating,
        f.feedback, f.created_at
    FROM meal_feedback f
    JOIN students s ON s.id = f.student_id";

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub meal_id: i64,
    pub rating: i64,
    #[serde(default)]
    pub feedback: String,
}

/// One rating per student per meal.
pub fn submit_feedback(
    conn: &Connection,
    student_user_id: i64,
    new: &NewFeedback,
) -> Result<MealFeedback> {
    if !(1..=5).contains(&new.rating) {
        return Err(HostelError::validation("rating", "must be between 1 and 5"));
    }
    let student = students::student_for_user(conn, student_user_id)?;
    get_meal(conn, new.meal_id)?;

    conn.execute(
        "INSERT INTO meal_feedback (student_id, meal_id, rating, feedback, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            student.id,
            new.meal_id,
            new.rating,
            new.feedback.trim(),
            Utc::now()
        ],
    )
    .map_err(|e| unique_as_validation(e, "meal_id", "feedback already submitted for this meal"))?;

    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("{FEEDBACK_SELECT} WHERE f.id = ?1"),
        [id],
        MealFeedback::from_row,
    )
    .map_err(Into::into)
}

pub fn list_feedback(conn: &Connection, meal_id: Option<i64>) -> Result<Vec<MealFeedback>> {
    let mut stmt = conn.prepare(&format!(
        "{FEEDBACK_SELECT} WHERE (?1 IS NULL OR f.meal_id = ?1) ORDER BY f.created_at DESC, f.id DESC"
    ))?;
    let rows = stmt
        .query_map([meal_id], MealFeedback::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::test_support;
    use pretty_assertions::assert_eq;

    fn lunch(date: NaiveDate, menu: &str) -> NewMeal {
        NewMeal {
            meal_type: MealType::Lunch,
            date,
            menu: menu.to_string(),
            is_available: true,
        }
    }

    #[test]
    fn upsert_replaces_same_slot() {
        let conn = test_support::conn();
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        let (first, created) = upsert_meal(&conn, cook, &lunch(date, "Daal chawal")).unwrap();
        assert!(created);
        let (second, created) = upsert_meal(&conn, cook, &lunch(date, "Biryani")).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.menu, "Biryani");

        let filter = MealFilter {
            meal_type: Some(MealType::Lunch),
            date: Some(date),
        };
        assert_eq!(list_meals(&conn, &filter).unwrap().len(), 1);
    }

    #[test]
    fn feedback_once_per_meal_with_valid_rating() {
        let mut conn = test_support::conn();
        let cook = test_support::user(&conn, "cook", Role::MessStaff);
        let s = test_support::student(&mut conn, "S-1");
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let (meal, _) = upsert_meal(&conn, cook, &lunch(date, "Karahi")).unwrap();

        let bad = NewFeedback {
            meal_id: meal.id,
            rating: 6,
            feedback: String::new(),
        };
        assert_eq!(
            submit_feedback(&conn, s.user_id, &bad)
                .unwrap_err()
                .field(),
            Some("rating")
        );

        let good = NewFeedback {
            meal_id: meal.id,
            rating: 4,
            feedback: "a bit salty".to_string(),
        };
        let fb = submit_feedback(&conn, s.user_id, &good).unwrap();
        assert_eq!(fb.student_code, "S-1");
        assert_eq!(
            submit_feedback(&conn, s.user_id, &good)
                .unwrap_err()
                .field(),
            Some("meal_id")
        );
        assert_eq!(list_feedback(&conn, Some(meal.id)).unwrap().len(), 1);

        let missing = NewFeedback {
            meal_id: 999,
            rating: 3,
            feedback: String::new(),
        };
        assert!(matches!(
            submit_feedback(&conn, s.user_id, &missing),
            Err(HostelError::NotFound { entity: "meal", .. })
        ));
    }
}
