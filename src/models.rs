use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Assessment,
    Assignment,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Assessment => "assessment",
            Category::Assignment => "assignment",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "assessment" => Ok(Category::Assessment),
            "assignment" => Ok(Category::Assignment),
            _ => Err(AppError::Validation(format!("Unknown category: {}", s))),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort orders accepted by the task listing. Unknown values fall back to
/// due date ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    DueAsc,
    DueDesc,
    CreatedAsc,
    CreatedDesc,
    /// Category ascending, ties broken by due date ascending.
    Category,
}

impl TaskSort {
    pub fn from_param(s: &str) -> Self {
        match s {
            "due_desc" => TaskSort::DueDesc,
            "created_asc" => TaskSort::CreatedAsc,
            "created_desc" => TaskSort::CreatedDesc,
            "category" => TaskSort::Category,
            _ => TaskSort::DueAsc,
        }
    }

    pub fn order_clause(&self) -> &'static str {
        match self {
            TaskSort::DueAsc => "due_date ASC",
            TaskSort::DueDesc => "due_date DESC",
            TaskSort::CreatedAsc => "created_at ASC",
            TaskSort::CreatedDesc => "created_at DESC",
            TaskSort::Category => "category ASC, due_date ASC",
        }
    }
}

/// Due-date predicate relative to the caller's current date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueFilter {
    #[default]
    None,
    Today,
    Tomorrow,
    Upcoming,
}

impl DueFilter {
    pub fn from_param(s: &str) -> Self {
        match s {
            "today" => DueFilter::Today,
            "tomorrow" => DueFilter::Tomorrow,
            "upcoming" => DueFilter::Upcoming,
            _ => DueFilter::None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub due_date: NaiveDate,
    pub category: Category,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub color: String,
    pub attachment_path: Option<String>,
    pub gcal_added: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTask {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub completed: Option<bool>,
    pub color: Option<String>,
    pub attachment_path: Option<String>,
    pub gcal_added: Option<bool>,
}

impl From<DbTask> for Task {
    fn from(task: DbTask) -> Self {
        Self {
            id: task.id.unwrap_or_default(),
            title: task.title.unwrap_or_default(),
            due_date: task.due_date.unwrap_or_default(),
            category: Category::from_str(task.category.as_deref().unwrap_or("assignment"))
                .unwrap_or(Category::Assignment),
            created_at: task
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
            completed: task.completed.unwrap_or_default(),
            color: task.color.unwrap_or_else(|| "#2563eb".to_string()),
            attachment_path: task.attachment_path,
            gcal_added: task.gcal_added.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Supply {
    pub id: i64,
    pub item_text: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSupply {
    pub id: Option<i64>,
    pub item_text: Option<String>,
}

impl From<DbSupply> for Supply {
    fn from(supply: DbSupply) -> Self {
        Self {
            id: supply.id.unwrap_or_default(),
            item_text: supply.item_text.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: i64,
    pub content: String,
    /// Derived from content at write time and stored comma-joined; treated
    /// as a cache of the extraction.
    pub tags: Vec<String>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub attachment_path: Option<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbNote {
    pub id: Option<i64>,
    pub content: Option<String>,
    pub tags: Option<String>,
    pub pinned: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub attachment_path: Option<String>,
}

impl From<DbNote> for Note {
    fn from(note: DbNote) -> Self {
        Self {
            id: note.id.unwrap_or_default(),
            content: note.content.unwrap_or_default(),
            tags: note
                .tags
                .unwrap_or_default()
                .split(',')
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            pinned: note.pinned.unwrap_or_default(),
            created_at: note
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
            attachment_path: note.attachment_path,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PushSubscription {
    pub id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub user_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPushSubscription {
    pub id: Option<i64>,
    pub endpoint: Option<String>,
    pub p256dh: Option<String>,
    pub auth: Option<String>,
    pub user_id: Option<i64>,
}

impl From<DbPushSubscription> for PushSubscription {
    fn from(sub: DbPushSubscription) -> Self {
        Self {
            id: sub.id.unwrap_or_default(),
            endpoint: sub.endpoint.unwrap_or_default(),
            p256dh: sub.p256dh.unwrap_or_default(),
            auth: sub.auth.unwrap_or_default(),
            user_id: sub.user_id,
        }
    }
}
