//! Meal plans, feedback and food shortages.

use hostel_core::Capability;
use hostel_core::food_shortages::{self, NewShortage, ShortageFilter, ShortageStatus};
use hostel_core::meals::{self, MealFilter, MealType, NewFeedback, NewMeal};
use rusqlite::Connection;

use crate::error::ApiError;
use crate::protocol::{AcknowledgeRequest, CountResponse};
use crate::router::{Ctx, Reply};

pub fn upsert_meal(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ManageMeals)?;
    let new: NewMeal = cx.req.json()?;
    let (meal, created) = meals::upsert_meal(conn, cx.actor.user_id, &new)?;
    if created {
        Reply::created(meal)
    } else {
        Reply::ok(meal)
    }
}

pub fn list_meals(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewMeals)?;
    let meal_type: Option<MealType> = cx.req.query("meal_type")?;
    let filter = MealFilter {
        meal_type,
        date: cx.req.query("date")?,
    };
    Reply::ok(meals::list_meals(conn, &filter)?)
}

pub fn submit_feedback(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::SubmitMealFeedback)?;
    let new: NewFeedback = cx.req.json()?;
    Reply::created(meals::submit_feedback(conn, cx.actor.user_id, &new)?)
}

pub fn list_feedback(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::ViewMealFeedback)?;
    Reply::ok(meals::list_feedback(conn, cx.req.query("meal_id")?)?)
}

pub fn report_shortage(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::TrackFoodShortages)?;
    let new: NewShortage = cx.req.json()?;
    Reply::created(food_shortages::report_shortage(conn, cx.actor.user_id, &new)?)
}

pub fn list_shortages(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::TrackFoodShortages)?;
    let status: Option<ShortageStatus> = cx.req.query("status")?;
    let filter = ShortageFilter {
        status,
        reported_by: cx.req.query("reported_by")?,
    };
    Reply::ok(food_shortages::list_shortages(conn, &filter)?)
}

pub fn acknowledge_shortages(cx: &Ctx<'_>, conn: &mut Connection) -> Result<Reply, ApiError> {
    cx.actor.require(Capability::AcknowledgeFoodShortages)?;
    let body: AcknowledgeRequest = cx.req.json_or_default()?;
    let count = food_shortages::acknowledge(conn, cx.actor.user_id, body.id)?;
    Reply::ok(CountResponse { count })
}
