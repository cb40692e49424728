use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, User, UserSession};
use crate::error::AppError;
use crate::models::{
    Category, DbNote, DbPushSubscription, DbSupply, DbTask, DueFilter, Note, PushSubscription,
    Supply, Task, TaskSort,
};

// ---- users ----

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, notifications_enabled FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, role, notifications_enabled FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed_password)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, password FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    match row {
        Some((id, hash)) => match bcrypt::verify(password, &hash) {
            Ok(true) => Ok(Some(get_user(pool, id).await?)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument]
pub async fn promote_to_admin(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    info!("Promoting user to admin role");
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn set_notifications_enabled(
    pool: &Pool<Sqlite>,
    user_id: i64,
    enabled: bool,
) -> Result<(), AppError> {
    info!("Updating notification preference");
    sqlx::query("UPDATE users SET notifications_enabled = ? WHERE id = ?")
        .bind(enabled)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Seeds the default `admin` account when no admin row exists yet.
#[instrument(skip_all)]
pub async fn seed_default_admin(pool: &Pool<Sqlite>, admin_code: &str) -> Result<(), AppError> {
    let existing =
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(pool)
            .await?;

    if existing.is_none() {
        info!("No admin account found, seeding default admin");
        create_user(pool, "admin", admin_code, "admin").await?;
    }

    Ok(())
}

// ---- sessions ----

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---- tasks ----

#[instrument(skip(pool))]
pub async fn list_tasks(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    category: Option<Category>,
    due: DueFilter,
    sort: TaskSort,
    today: NaiveDate,
) -> Result<Vec<Task>, AppError> {
    info!("Listing tasks");

    let mut sql = String::from("SELECT * FROM tasks WHERE 1=1");
    if search.is_some() {
        sql.push_str(" AND title LIKE ?");
    }
    if category.is_some() {
        sql.push_str(" AND category = ?");
    }
    match due {
        DueFilter::None => {}
        DueFilter::Today | DueFilter::Tomorrow => sql.push_str(" AND due_date = ?"),
        DueFilter::Upcoming => sql.push_str(" AND due_date >= ?"),
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(sort.order_clause());

    let mut query = sqlx::query_as::<_, DbTask>(&sql);
    if let Some(q) = search {
        query = query.bind(format!("%{}%", q));
    }
    if let Some(cat) = category {
        query = query.bind(cat.as_str());
    }
    match due {
        DueFilter::None => {}
        DueFilter::Today => query = query.bind(today),
        DueFilter::Tomorrow => query = query.bind(today + chrono::Duration::days(1)),
        DueFilter::Upcoming => query = query.bind(today),
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Task::from).collect())
}

#[instrument(skip(pool))]
pub async fn create_task(
    pool: &Pool<Sqlite>,
    title: &str,
    category: Category,
    due_date: NaiveDate,
    color: &str,
    attachment_path: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating task");
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "INSERT INTO tasks (title, category, due_date, created_at, color, attachment_path)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(title)
    .bind(category.as_str())
    .bind(due_date)
    .bind(now)
    .bind(color)
    .bind(attachment_path)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_task(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, DbTask>("SELECT * FROM tasks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(Task::from))
}

/// Flips the completed flag. Unknown ids are a silent no-op.
#[instrument]
pub async fn toggle_task_complete(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Toggling task completion");
    sqlx::query("UPDATE tasks SET completed = NOT completed WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Unknown ids are a silent no-op.
#[instrument]
pub async fn delete_task(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting task");
    sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn set_gcal_added(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    sqlx::query("UPDATE tasks SET gcal_added = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn tasks_due_on(
    pool: &Pool<Sqlite>,
    date: NaiveDate,
    only_incomplete: bool,
) -> Result<Vec<Task>, AppError> {
    let sql = if only_incomplete {
        "SELECT * FROM tasks WHERE due_date = ? AND completed = 0 ORDER BY due_date ASC"
    } else {
        "SELECT * FROM tasks WHERE due_date = ? ORDER BY due_date ASC"
    };

    let rows = sqlx::query_as::<_, DbTask>(sql)
        .bind(date)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Task::from).collect())
}

#[instrument(skip(pool))]
pub async fn count_upcoming_tasks(
    pool: &Pool<Sqlite>,
    today: NaiveDate,
) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE due_date >= ?")
        .bind(today)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ---- supplies ----

#[instrument]
pub async fn list_supplies(pool: &Pool<Sqlite>) -> Result<Vec<Supply>, AppError> {
    let rows = sqlx::query_as::<_, DbSupply>("SELECT * FROM supplies ORDER BY id ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Supply::from).collect())
}

#[instrument(skip(pool))]
pub async fn create_supply(pool: &Pool<Sqlite>, item_text: &str) -> Result<i64, AppError> {
    info!("Creating supply item");
    let res = sqlx::query("INSERT INTO supplies (item_text) VALUES (?)")
        .bind(item_text)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Unknown ids are a silent no-op.
#[instrument]
pub async fn delete_supply(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting supply item");
    sqlx::query("DELETE FROM supplies WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn count_supplies(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM supplies")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ---- config ----

#[instrument]
pub async fn get_config(pool: &Pool<Sqlite>, key: &str) -> Result<Option<String>, AppError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM config WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Set-if-absent-else-update.
#[instrument(skip(pool, value))]
pub async fn set_config(pool: &Pool<Sqlite>, key: &str, value: &str) -> Result<(), AppError> {
    info!("Upserting config entry");
    sqlx::query(
        "INSERT INTO config (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

// ---- notes ----

#[instrument(skip(pool, content))]
pub async fn create_note(
    pool: &Pool<Sqlite>,
    content: &str,
    tags_column: &str,
    attachment_path: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating note");
    let now = Utc::now().naive_utc();
    let res = sqlx::query(
        "INSERT INTO notes (content, tags, created_at, attachment_path) VALUES (?, ?, ?, ?)",
    )
    .bind(content)
    .bind(tags_column)
    .bind(now)
    .bind(attachment_path)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn list_notes(
    pool: &Pool<Sqlite>,
    search: Option<&str>,
    tag: Option<&str>,
) -> Result<Vec<Note>, AppError> {
    info!("Listing notes");

    let mut sql = String::from("SELECT * FROM notes WHERE 1=1");
    if search.is_some() {
        sql.push_str(" AND content LIKE ?");
    }
    if tag.is_some() {
        sql.push_str(" AND tags LIKE ?");
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut query = sqlx::query_as::<_, DbNote>(&sql);
    if let Some(q) = search {
        query = query.bind(format!("%{}%", q));
    }
    if let Some(t) = tag {
        query = query.bind(format!("%{}%", t.trim_start_matches('#').to_lowercase()));
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Note::from).collect())
}

/// Pinned notes form a separate leading group, not merely a sort key; both
/// groups keep their creation-time-descending order.
pub fn split_pinned(notes: Vec<Note>) -> (Vec<Note>, Vec<Note>) {
    notes.into_iter().partition(|n| n.pinned)
}

/// Unknown ids are a silent no-op.
#[instrument]
pub async fn toggle_note_pin(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Toggling note pin");
    sqlx::query("UPDATE notes SET pinned = NOT pinned WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Unknown ids are a silent no-op.
#[instrument]
pub async fn delete_note(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting note");
    sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn count_notes(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notes")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ---- push subscriptions ----

/// Idempotent on endpoint: an already-recorded endpoint is returned as-is,
/// no duplicate row.
#[instrument(skip(pool, p256dh, auth))]
pub async fn upsert_subscription(
    pool: &Pool<Sqlite>,
    endpoint: &str,
    p256dh: &str,
    auth: &str,
    user_id: Option<i64>,
) -> Result<i64, AppError> {
    let existing =
        sqlx::query_scalar::<_, i64>("SELECT id FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .fetch_optional(pool)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    info!("Recording push subscription");
    let res = sqlx::query(
        "INSERT INTO push_subscriptions (endpoint, p256dh, auth, user_id) VALUES (?, ?, ?, ?)",
    )
    .bind(endpoint)
    .bind(p256dh)
    .bind(auth)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn delete_subscription_by_endpoint(
    pool: &Pool<Sqlite>,
    endpoint: &str,
) -> Result<(), AppError> {
    info!("Removing push subscription");
    sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
        .bind(endpoint)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn delete_subscriptions_for_user(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<u64, AppError> {
    info!("Removing all push subscriptions for user");
    let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument]
pub async fn all_subscriptions(pool: &Pool<Sqlite>) -> Result<Vec<PushSubscription>, AppError> {
    let rows = sqlx::query_as::<_, DbPushSubscription>("SELECT * FROM push_subscriptions")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(PushSubscription::from).collect())
}
