use chrono::{NaiveDate, Utc};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use sqlx::SqlitePool;
use tracing::warn;

use crate::auth::AdminContext;
use crate::config::{AppConfig, DateInputMode};
use crate::db::{
    create_task, delete_task, get_task, list_tasks, set_gcal_added, toggle_task_complete,
};
use crate::error::AppError;
use crate::models::{Category, DueFilter, Task, TaskSort};
use crate::uploads::store_attachment;

#[get("/tasks?<q>&<sort>&<cat>&<due>")]
pub async fn tasks_index(
    q: Option<String>,
    sort: Option<String>,
    cat: Option<String>,
    due: Option<String>,
    db: &State<SqlitePool>,
) -> Result<Json<Vec<Task>>, AppError> {
    let search = q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let category = cat.as_deref().and_then(|c| Category::from_str(c).ok());
    let due_filter = due.as_deref().map(DueFilter::from_param).unwrap_or_default();
    let task_sort = sort.as_deref().map(TaskSort::from_param).unwrap_or_default();
    let today = Utc::now().date_naive();

    let tasks = list_tasks(db, search, category, due_filter, task_sort, today).await?;
    Ok(Json(tasks))
}

#[derive(FromForm)]
pub struct TaskForm<'f> {
    pub title: String,
    pub category: String,
    pub due_date: Option<String>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub color: Option<String>,
    pub attachment: Option<TempFile<'f>>,
}

/// Resolves the form's due-date fields against the configured input mode.
pub fn parse_due_date(
    mode: DateInputMode,
    due_date: Option<&str>,
    month: Option<u32>,
    day: Option<u32>,
) -> Result<NaiveDate, AppError> {
    match mode {
        DateInputMode::FullIso => {
            let raw = due_date
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::Validation("Due date is required".to_string()))?;
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                AppError::Validation("Due date must be formatted YYYY-MM-DD".to_string())
            })
        }
        DateInputMode::FixedYear(year) => {
            let (month, day) = match (month, day) {
                (Some(m), Some(d)) => (m, d),
                _ => {
                    return Err(AppError::Validation(
                        "Month and day are required".to_string(),
                    ));
                }
            };
            NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| AppError::Validation("Invalid month/day".to_string()))
        }
    }
}

#[post("/tasks/add", data = "<form>")]
pub async fn add_task(
    form: Form<TaskForm<'_>>,
    ctx: AdminContext,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/tasks")), "Admin only"));
    }

    let mut form = form.into_inner();

    let title = form.title.trim().to_string();
    if title.is_empty() {
        return Ok(Flash::error(Redirect::to(uri!("/tasks")), "Missing input"));
    }

    let category = match Category::from_str(&form.category) {
        Ok(category) => category,
        Err(_) => return Ok(Flash::error(Redirect::to(uri!("/tasks")), "Invalid category")),
    };

    let due = match parse_due_date(
        config.date_input_mode,
        form.due_date.as_deref(),
        form.month,
        form.day,
    ) {
        Ok(due) => due,
        Err(AppError::Validation(msg)) => {
            return Ok(Flash::error(Redirect::to(uri!("/tasks")), msg));
        }
        Err(e) => return Err(e),
    };

    let color = form
        .color
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("#2563eb")
        .to_string();

    // Disallowed attachments are skipped rather than failing the whole form.
    let mut attachment_path = None;
    if let Some(file) = form.attachment.as_mut() {
        if file.len() > 0 {
            let subdir = Utc::now().format("%Y%m%d").to_string();
            match store_attachment(file, &config.upload_dir, &subdir).await {
                Ok(path) => attachment_path = Some(path),
                Err(AppError::Validation(msg)) => {
                    warn!(message = %msg, "Skipping disallowed attachment");
                }
                Err(e) => return Err(e),
            }
        }
    }

    create_task(db, &title, category, due, &color, attachment_path.as_deref()).await?;

    Ok(Flash::success(Redirect::to(uri!("/tasks")), "Task added"))
}

#[post("/tasks/delete/<id>")]
pub async fn remove_task(
    id: i64,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/tasks")), "Admin only"));
    }

    delete_task(db, id).await?;
    Ok(Flash::success(Redirect::to(uri!("/tasks")), "Task deleted"))
}

#[post("/tasks/complete/<id>")]
pub async fn complete_task(
    id: i64,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/tasks")), "Admin only"));
    }

    toggle_task_complete(db, id).await?;
    Ok(Flash::success(Redirect::to(uri!("/tasks")), "Task updated"))
}

fn gcal_url(task: &Task) -> String {
    let day = task.due_date.format("%Y%m%d");
    let text = utf8_percent_encode(&task.title, NON_ALPHANUMERIC);
    let details = format!("category:{}", task.category);
    format!(
        "https://calendar.google.com/calendar/u/0/r/eventedit?text={}&dates={}/{}&details={}",
        text,
        day,
        day,
        utf8_percent_encode(&details, NON_ALPHANUMERIC)
    )
}

#[get("/tasks/<id>/gcal")]
pub async fn task_gcal(id: i64, db: &State<SqlitePool>) -> Result<Redirect, AppError> {
    match get_task(db, id).await? {
        Some(task) => {
            let url = gcal_url(&task);
            set_gcal_added(db, id).await?;
            Ok(Redirect::to(url))
        }
        None => Ok(Redirect::to(uri!("/tasks"))),
    }
}
