use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::config::VapidConfig;
use crate::db::{all_subscriptions, tasks_due_on};
use crate::error::AppError;
use crate::models::PushSubscription;

/// Delivery capability: hand the payload to one subscriber's endpoint and
/// report the outcome. Payload encryption and the push-service protocol live
/// behind this seam.
#[rocket::async_trait]
pub trait PushDelivery: Send + Sync {
    async fn deliver(&self, sub: &PushSubscription, payload: &str) -> Result<(), AppError>;
}

pub struct HttpPushDelivery {
    client: reqwest::Client,
    vapid: VapidConfig,
}

/// RFC 8292 token claims: the push service origin, an expiry and the
/// operator contact.
#[derive(Serialize)]
struct VapidClaims {
    aud: String,
    exp: i64,
    sub: String,
}

impl HttpPushDelivery {
    pub fn new(vapid: VapidConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            vapid,
        }
    }

    /// Signs a short-lived ES256 token over the endpoint's origin and
    /// renders the `vapid t=..., k=...` authorization value.
    pub(crate) fn vapid_authorization(&self, endpoint: &str) -> Result<String, AppError> {
        let url = reqwest::Url::parse(endpoint).map_err(|e| {
            AppError::Validation(format!("Invalid subscription endpoint: {}", e))
        })?;

        let claims = VapidClaims {
            aud: url.origin().ascii_serialization(),
            exp: (Utc::now() + chrono::Duration::hours(12)).timestamp(),
            sub: self.vapid.claim_email.clone(),
        };

        let key = EncodingKey::from_ec_pem(self.vapid.private_key.as_bytes())
            .map_err(|e| AppError::Configuration(format!("Invalid VAPID private key: {}", e)))?;
        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &key)
            .map_err(|e| AppError::Configuration(format!("VAPID signing failed: {}", e)))?;

        Ok(format!("vapid t={}, k={}", token, self.vapid.public_key))
    }
}

#[rocket::async_trait]
impl PushDelivery for HttpPushDelivery {
    async fn deliver(&self, sub: &PushSubscription, payload: &str) -> Result<(), AppError> {
        let authorization = self.vapid_authorization(&sub.endpoint)?;

        let response = self
            .client
            .post(&sub.endpoint)
            .header("TTL", "86400")
            .header("Content-Type", "application/json")
            .header("Authorization", authorization)
            .header("Crypto-Key", format!("p256ecdsa={}", self.vapid.public_key))
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Push delivery failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Push endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Stands in when VAPID keys are not configured; every delivery fails with a
/// configuration error, so broadcasts report zero sent.
pub struct DisabledPushDelivery;

#[rocket::async_trait]
impl PushDelivery for DisabledPushDelivery {
    async fn deliver(&self, _sub: &PushSubscription, _payload: &str) -> Result<(), AppError> {
        Err(AppError::Configuration(
            "VAPID keys not configured".to_string(),
        ))
    }
}

/// Attempts delivery to every stored subscription. A failing subscriber is
/// logged and skipped; the rest still receive the payload. Returns the count
/// of successful deliveries.
#[instrument(skip(pool, delivery, body))]
pub async fn broadcast(
    pool: &Pool<Sqlite>,
    delivery: &dyn PushDelivery,
    title: &str,
    body: &str,
    link: &str,
) -> Result<usize, AppError> {
    let payload = json!({ "title": title, "body": body, "url": link }).to_string();

    let mut sent = 0;
    for sub in all_subscriptions(pool).await? {
        match delivery.deliver(&sub, &payload).await {
            Ok(()) => sent += 1,
            Err(e) => {
                warn!(endpoint = %sub.endpoint, error = %e, "Push delivery failed, continuing");
            }
        }
    }

    info!("Broadcast delivered to {} subscribers", sent);
    Ok(sent)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReminderOutcome {
    NoneDue,
    Sent(usize),
}

/// Finds incomplete tasks due tomorrow and sends one broadcast with their
/// titles. Re-triggering on the same day sends duplicates; the caller's
/// scheduler owns that.
#[instrument(skip(pool, delivery))]
pub async fn due_tomorrow_reminder(
    pool: &Pool<Sqlite>,
    delivery: &dyn PushDelivery,
    today: chrono::NaiveDate,
) -> Result<ReminderOutcome, AppError> {
    let tomorrow = today + chrono::Duration::days(1);
    let due = tasks_due_on(pool, tomorrow, true).await?;

    if due.is_empty() {
        return Ok(ReminderOutcome::NoneDue);
    }

    let titles: Vec<&str> = due.iter().map(|t| t.title.as_str()).collect();
    let body = titles.join(", ");

    let sent = broadcast(pool, delivery, "Due tomorrow", &body, "/tasks?due=tomorrow").await?;
    Ok(ReminderOutcome::Sent(sent))
}
