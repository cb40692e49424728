use chrono::Utc;
use rocket::State;
use rocket::http::Header;
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::db::list_tasks;
use crate::error::AppError;
use crate::feeds::{render_csv, render_ics};
use crate::models::{DueFilter, TaskSort};

#[derive(Responder)]
#[response(content_type = "text/calendar")]
pub struct IcsFeed(pub String);

#[derive(Responder)]
#[response(content_type = "text/csv")]
pub struct CsvExport {
    pub content: String,
    pub disposition: Header<'static>,
}

#[get("/tasks.ics")]
pub async fn tasks_ics(
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<IcsFeed, AppError> {
    let today = Utc::now().date_naive();
    let tasks = list_tasks(db, None, None, DueFilter::None, TaskSort::DueAsc, today).await?;

    Ok(IcsFeed(render_ics(&tasks, config.ics_render_mode)))
}

#[get("/export/csv")]
pub async fn export_csv(db: &State<SqlitePool>) -> Result<CsvExport, AppError> {
    let today = Utc::now().date_naive();
    let tasks = list_tasks(db, None, None, DueFilter::None, TaskSort::DueAsc, today).await?;

    Ok(CsvExport {
        content: render_csv(&tasks),
        disposition: Header::new("Content-Disposition", "attachment; filename=tasks.csv"),
    })
}
