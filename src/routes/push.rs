use std::sync::Arc;

use chrono::Utc;
use rocket::State;
use rocket::http::Status;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::User;
use crate::config::AppConfig;
use crate::db::{
    delete_subscription_by_endpoint, delete_subscriptions_for_user, upsert_subscription,
};
use crate::error::AppError;
use crate::webpush::{PushDelivery, ReminderOutcome, due_tomorrow_reminder};

#[derive(Deserialize)]
pub struct SubscribeKeys {
    p256dh: Option<String>,
    auth: Option<String>,
}

#[derive(Deserialize)]
pub struct SubscribeRequest {
    endpoint: Option<String>,
    keys: Option<SubscribeKeys>,
}

#[post("/push/subscribe", data = "<request>")]
pub async fn push_subscribe(
    request: Json<SubscribeRequest>,
    user: Option<User>,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Status, AppError> {
    if config.vapid.is_none() {
        return Err(AppError::Configuration(
            "VAPID keys not configured".to_string(),
        ));
    }

    let request = request.into_inner();
    let endpoint = request.endpoint.filter(|e| !e.is_empty());
    let keys = request.keys;
    let (endpoint, p256dh, auth) = match (
        endpoint,
        keys.as_ref().and_then(|k| k.p256dh.clone()),
        keys.as_ref().and_then(|k| k.auth.clone()),
    ) {
        (Some(endpoint), Some(p256dh), Some(auth)) => (endpoint, p256dh, auth),
        _ => {
            return Err(AppError::Validation(
                "Incomplete subscription data".to_string(),
            ));
        }
    };

    upsert_subscription(db, &endpoint, &p256dh, &auth, user.map(|u| u.id)).await?;

    Ok(Status::Ok)
}

#[derive(Deserialize)]
pub struct UnsubscribeRequest {
    endpoint: Option<String>,
    all_for_user: Option<bool>,
}

#[post("/push/unsubscribe", data = "<request>")]
pub async fn push_unsubscribe(
    request: Json<UnsubscribeRequest>,
    user: Option<User>,
    db: &State<SqlitePool>,
) -> Result<Status, AppError> {
    if let Some(endpoint) = request.endpoint.as_deref().filter(|e| !e.is_empty()) {
        delete_subscription_by_endpoint(db, endpoint).await?;
    }

    if let Some(user) = user {
        if request.all_for_user.unwrap_or(false) {
            delete_subscriptions_for_user(db, user.id).await?;
        }
    }

    Ok(Status::NoContent)
}

/// Hit by an external scheduler. Re-triggering on the same day sends
/// duplicate notifications; nothing is deduplicated here.
#[get("/cron/due-reminders")]
pub async fn cron_due_reminders(
    db: &State<SqlitePool>,
    delivery: &State<Arc<dyn PushDelivery>>,
) -> Result<String, AppError> {
    let today = Utc::now().date_naive();

    match due_tomorrow_reminder(db, delivery.inner().as_ref(), today).await? {
        ReminderOutcome::NoneDue => Ok("no due".to_string()),
        ReminderOutcome::Sent(count) => Ok(format!("sent {}", count)),
    }
}
