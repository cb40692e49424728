#[cfg(test)]
pub mod test_db {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, Once};

    use chrono::NaiveDate;
    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    use crate::config::AppConfig;
    use crate::db::{
        create_note, create_supply, create_task, create_user, toggle_task_complete,
        upsert_subscription,
    };
    use crate::error::AppError;
    use crate::migrations::run_migrations;
    use crate::models::{Category, PushSubscription};
    use crate::tags::{extract_tags, tags_to_column};
    use crate::webpush::PushDelivery;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        tasks: Vec<TestTask>,
        supplies: Vec<String>,
        notes: Vec<TestNote>,
        subscriptions: Vec<TestSubscription>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: String,
        pub password: String,
    }

    pub struct TestTask {
        pub title: String,
        pub category: Category,
        pub due: NaiveDate,
        pub completed: bool,
    }

    pub struct TestNote {
        pub content: String,
        pub pinned: bool,
    }

    pub struct TestSubscription {
        pub endpoint: String,
        pub user: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn student(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: "student".to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: "admin".to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn task(mut self, title: &str, category: Category, due: &str) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                category,
                due: NaiveDate::parse_from_str(due, "%Y-%m-%d").expect("valid test date"),
                completed: false,
            });
            self
        }

        pub fn completed_task(mut self, title: &str, category: Category, due: &str) -> Self {
            self.tasks.push(TestTask {
                title: title.to_string(),
                category,
                due: NaiveDate::parse_from_str(due, "%Y-%m-%d").expect("valid test date"),
                completed: true,
            });
            self
        }

        pub fn supply(mut self, item_text: &str) -> Self {
            self.supplies.push(item_text.to_string());
            self
        }

        pub fn note(mut self, content: &str) -> Self {
            self.notes.push(TestNote {
                content: content.to_string(),
                pinned: false,
            });
            self
        }

        pub fn pinned_note(mut self, content: &str) -> Self {
            self.notes.push(TestNote {
                content: content.to_string(),
                pinned: true,
            });
            self
        }

        pub fn subscription(mut self, endpoint: &str, user: Option<&str>) -> Self {
            self.subscriptions.push(TestSubscription {
                endpoint: endpoint.to_string(),
                user: user.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_test_writer()
                    .with_env_filter("info")
                    .try_init();
            });

            // One connection so the in-memory database is shared.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            run_migrations(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut task_id_map: HashMap<String, i64> = HashMap::new();
            let mut note_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let id = create_user(&pool, &user.username, &user.password, &user.role).await?;
                user_id_map.insert(user.username.clone(), id);
            }

            for task in &self.tasks {
                let id = create_task(&pool, &task.title, task.category, task.due, "#2563eb", None)
                    .await?;
                if task.completed {
                    toggle_task_complete(&pool, id).await?;
                }
                task_id_map.insert(task.title.clone(), id);
            }

            for item in &self.supplies {
                create_supply(&pool, item).await?;
            }

            for note in &self.notes {
                let tags = extract_tags(&note.content);
                let id = create_note(&pool, &note.content, &tags_to_column(&tags), None).await?;
                if note.pinned {
                    crate::db::toggle_note_pin(&pool, id).await?;
                }
                note_id_map.insert(note.content.clone(), id);
            }

            for sub in &self.subscriptions {
                let user_id = sub
                    .user
                    .as_deref()
                    .and_then(|name| user_id_map.get(name).copied());
                upsert_subscription(&pool, &sub.endpoint, "p256dh-key", "auth-key", user_id)
                    .await?;
            }

            Ok(TestDb {
                pool,
                user_id_map,
                task_id_map,
                note_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub task_id_map: HashMap<String, i64>,
        pub note_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn task_id(&self, title: &str) -> Option<i64> {
            self.task_id_map.get(title).copied()
        }

        pub fn note_id(&self, content: &str) -> Option<i64> {
            self.note_id_map.get(content).copied()
        }
    }

    /// Push delivery fake: records every payload, fails for configured
    /// endpoints.
    #[derive(Default)]
    pub struct RecordingPushDelivery {
        pub failing_endpoints: Vec<String>,
        pub delivered: Mutex<Vec<(String, String)>>,
    }

    impl RecordingPushDelivery {
        pub fn failing(endpoints: &[&str]) -> Self {
            Self {
                failing_endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
                delivered: Mutex::new(Vec::new()),
            }
        }

        pub fn payloads(&self) -> Vec<(String, String)> {
            self.delivered.lock().expect("delivery log lock").clone()
        }
    }

    #[rocket::async_trait]
    impl PushDelivery for RecordingPushDelivery {
        async fn deliver(&self, sub: &PushSubscription, payload: &str) -> Result<(), AppError> {
            if self.failing_endpoints.contains(&sub.endpoint) {
                return Err(AppError::ExternalService(format!(
                    "Simulated failure for {}",
                    sub.endpoint
                )));
            }

            self.delivered
                .lock()
                .expect("delivery log lock")
                .push((sub.endpoint.clone(), payload.to_string()));
            Ok(())
        }
    }

    pub fn vapid_test_config() -> AppConfig {
        AppConfig {
            vapid: Some(crate::config::VapidConfig {
                public_key: "test-public".to_string(),
                private_key: "test-private".to_string(),
                claim_email: "mailto:test@example.com".to_string(),
            }),
            ..AppConfig::default()
        }
    }

    pub async fn setup_test_client(pool: Pool<Sqlite>, config: AppConfig) -> Client {
        let delivery: Arc<dyn PushDelivery> = Arc::new(RecordingPushDelivery::default());
        let rocket = crate::init_rocket(pool, config, delivery).await;

        Client::tracked(rocket)
            .await
            .expect("valid rocket instance")
    }

    /// Turns on admin mode through the shared-code endpoint; the tracked
    /// client keeps the cookie for later requests.
    pub async fn enable_admin_mode(client: &Client) {
        use rocket::http::ContentType;

        let response = client
            .post("/admin/login")
            .header(ContentType::Form)
            .body("code=1234")
            .dispatch()
            .await;

        assert!(response.status().code < 400, "admin login failed");
    }
}
