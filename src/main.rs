#[macro_use]
extern crate rocket;

mod auth;
mod config;
mod db;
mod error;
mod feeds;
mod migrations;
mod models;
mod routes;
mod tags;
mod telemetry;
#[cfg(test)]
mod test;
mod uploads;
mod webpush;

use std::sync::Arc;

use auth::routes::{
    admin_login_page, admin_logout, login_page, logout, process_admin_login, process_login,
    process_register, register_page, settings_page, unauthorized, update_settings,
};
use config::AppConfig;
use db::{clean_expired_sessions, seed_default_admin};
use rocket::{Build, Rocket, tokio};
use routes::dashboard::index;
use routes::feeds::{export_csv, tasks_ics};
use routes::notes::{add_note, notes_index, pin_note, remove_note};
use routes::push::{cron_due_reminders, push_subscribe, push_unsubscribe};
use routes::supplies::{add_supply, remove_supply, supplies_index};
use routes::tasks::{add_task, complete_task, remove_task, task_gcal, tasks_index};
use routes::timetable::{timetable_index, upload_timetable};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_tracing};
use tracing::{error, info, warn};
use webpush::{DisabledPushDelivery, HttpPushDelivery, PushDelivery};

#[launch]
async fn rocket() -> _ {
    init_tracing();

    if let Err(e) = config::load_environment() {
        warn!("Failed to load environment files: {}", e);
    }

    let app_config = AppConfig::from_env();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:classhub.db?mode=rwc".to_string());

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match migrations::run_migrations(&pool).await {
        Ok(applied) => info!("Migrations completed, {} applied", applied),
        // Startup continues on a failed upgrade; the previous schema keeps
        // serving.
        Err(e) => error!("Schema migration failed: {}", e),
    }

    if let Err(e) = seed_default_admin(&pool, &app_config.admin_code).await {
        error!("Failed to seed default admin: {}", e);
    }

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    let delivery: Arc<dyn PushDelivery> = match &app_config.vapid {
        Some(vapid) => Arc::new(HttpPushDelivery::new(vapid.clone())),
        None => Arc::new(DisabledPushDelivery),
    };

    init_rocket(pool, app_config, delivery).await
}

pub async fn init_rocket(
    pool: SqlitePool,
    config: AppConfig,
    delivery: Arc<dyn PushDelivery>,
) -> Rocket<Build> {
    info!("Starting classhub");

    rocket::build()
        .manage(pool)
        .manage(config)
        .manage(delivery)
        .mount(
            "/",
            routes![
                index,
                tasks_index,
                add_task,
                remove_task,
                complete_task,
                task_gcal,
                tasks_ics,
                export_csv,
                supplies_index,
                add_supply,
                remove_supply,
                timetable_index,
                upload_timetable,
                notes_index,
                add_note,
                pin_note,
                remove_note,
                push_subscribe,
                push_unsubscribe,
                cron_due_reminders,
                login_page,
                process_login,
                register_page,
                process_register,
                logout,
                admin_login_page,
                process_admin_login,
                admin_logout,
                settings_page,
                update_settings,
            ],
        )
        .register("/", catchers![unauthorized])
        .attach(TelemetryFairing)
}
