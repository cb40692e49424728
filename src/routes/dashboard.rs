use chrono::Utc;
use rocket::State;
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{count_notes, count_supplies, count_upcoming_tasks};
use crate::error::AppError;

#[derive(Serialize)]
pub struct DashboardCounts {
    pub upcoming_count: i64,
    pub supplies_count: i64,
    pub notes_count: i64,
}

#[get("/")]
pub async fn index(db: &State<SqlitePool>) -> Result<Json<DashboardCounts>, AppError> {
    let today = Utc::now().date_naive();

    Ok(Json(DashboardCounts {
        upcoming_count: count_upcoming_tasks(db, today).await?,
        supplies_count: count_supplies(db).await?,
        notes_count: count_notes(db).await?,
    }))
}
