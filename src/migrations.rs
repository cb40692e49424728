use sqlx::{Executor, Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Ordered schema history. Each entry runs at most once, tracked by the
/// SQLite `user_version` pragma, so re-running on every boot is a no-op.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "base schema",
        sql: r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'student'
);

CREATE TABLE IF NOT EXISTS user_sessions (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    token TEXT NOT NULL UNIQUE,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    expires_at TIMESTAMP NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (id)
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    due_date DATE NOT NULL,
    category TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    completed BOOLEAN NOT NULL DEFAULT 0,
    color TEXT NOT NULL DEFAULT '#2563eb',
    attachment_path TEXT
);

CREATE TABLE IF NOT EXISTS supplies (
    id INTEGER PRIMARY KEY,
    item_text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT
);

CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY,
    content TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    pinned BOOLEAN NOT NULL DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: 2,
        description: "task external-calendar flag and note attachments",
        sql: r#"
ALTER TABLE tasks ADD COLUMN gcal_added BOOLEAN NOT NULL DEFAULT 0;
ALTER TABLE notes ADD COLUMN attachment_path TEXT;
"#,
    },
    Migration {
        version: 3,
        description: "push subscriptions and notification preference",
        sql: r#"
CREATE TABLE IF NOT EXISTS push_subscriptions (
    id INTEGER PRIMARY KEY,
    endpoint TEXT NOT NULL UNIQUE,
    p256dh TEXT NOT NULL,
    auth TEXT NOT NULL,
    user_id INTEGER,
    FOREIGN KEY (user_id) REFERENCES users (id)
);
ALTER TABLE users ADD COLUMN notifications_enabled BOOLEAN NOT NULL DEFAULT 1;
"#,
    },
];

#[instrument(skip(pool))]
pub async fn schema_version(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Applies every migration above the stored schema version, in order, each in
/// its own transaction. Returns the number of migrations applied.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<u32, AppError> {
    let current = schema_version(pool).await?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }

        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );

        // The version marker commits together with the schema change, so a
        // crash mid-migration never leaves it applied but unrecorded.
        // PRAGMA does not accept bound parameters; version comes from the
        // static migration table above.
        let mut tx = pool.begin().await?;
        // Calling through the Executor trait instead of RawSql::execute (which
        // just delegates here) sidesteps a rustc "implementation of Executor
        // is not general enough" false positive that makes this future !Send.
        (&mut *tx).execute(sqlx::raw_sql(migration.sql)).await?;
        sqlx::query(&format!("PRAGMA user_version = {}", migration.version))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        applied += 1;
    }

    if applied > 0 {
        info!("Applied {} schema migrations", applied);
    }

    Ok(applied)
}
