use chrono::Utc;
use rocket::http::{ContentType, Status};

use crate::auth::{Role, UserSession};
use crate::config::AppConfig;
use crate::db::{
    authenticate_user, clean_expired_sessions, create_user, create_user_session, find_user_by_username,
    get_session_by_token, invalidate_session, promote_to_admin, seed_default_admin,
};
use crate::error::AppError;
use crate::test::utils::test_db::{
    STANDARD_PASSWORD, TestDbBuilder, enable_admin_mode, setup_test_client,
};

#[test]
fn admin_context_grants_or_denies_the_capability() {
    use crate::auth::AdminContext;

    assert!(AdminContext { is_admin: true }.require_admin().is_ok());
    assert!(matches!(
        AdminContext { is_admin: false }.require_admin(),
        Err(AppError::Authorization(_))
    ));
}

#[rocket::async_test]
async fn authentication_checks_the_stored_hash() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");

    let user = authenticate_user(&test_db.pool, "minji", STANDARD_PASSWORD)
        .await
        .expect("lookup succeeds")
        .expect("correct password authenticates");
    assert_eq!(user.username, "minji");
    assert_eq!(user.role, Role::Student);
    assert!(!user.is_admin());

    let wrong = authenticate_user(&test_db.pool, "minji", "wrong password")
        .await
        .expect("lookup succeeds");
    assert!(wrong.is_none());

    let unknown = authenticate_user(&test_db.pool, "nobody", STANDARD_PASSWORD)
        .await
        .expect("lookup succeeds");
    assert!(unknown.is_none());
}

#[rocket::async_test]
async fn duplicate_usernames_are_rejected() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");

    let result = create_user(&test_db.pool, "minji", "another password", "student").await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[rocket::async_test]
async fn promotion_changes_the_stored_role() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");

    let id = test_db.user_id("minji").expect("user was created");
    promote_to_admin(&test_db.pool, id)
        .await
        .expect("promotion succeeds");

    let user = find_user_by_username(&test_db.pool, "minji")
        .await
        .expect("lookup succeeds")
        .expect("user exists");
    assert!(user.is_admin());
}

#[rocket::async_test]
async fn default_admin_is_seeded_once() {
    let test_db = TestDbBuilder::new().build().await.expect("test db builds");

    seed_default_admin(&test_db.pool, "1234")
        .await
        .expect("seeding succeeds");
    seed_default_admin(&test_db.pool, "1234")
        .await
        .expect("repeat seeding succeeds");

    let admin = find_user_by_username(&test_db.pool, "admin")
        .await
        .expect("lookup succeeds")
        .expect("admin exists");
    assert!(admin.is_admin());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(&test_db.pool)
        .await
        .expect("count succeeds");
    assert_eq!(count, 1);
}

#[rocket::async_test]
async fn sessions_expire_and_can_be_swept() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");
    let id = test_db.user_id("minji").expect("user was created");

    let live_token = UserSession::generate_token();
    let live_expiry = (Utc::now() + chrono::Duration::days(7)).naive_utc();
    create_user_session(&test_db.pool, id, &live_token, live_expiry)
        .await
        .expect("session stored");

    let stale_token = UserSession::generate_token();
    let stale_expiry = (Utc::now() - chrono::Duration::hours(1)).naive_utc();
    create_user_session(&test_db.pool, id, &stale_token, stale_expiry)
        .await
        .expect("session stored");

    let live = get_session_by_token(&test_db.pool, &live_token)
        .await
        .expect("session found");
    assert!(live.is_valid());

    let stale = get_session_by_token(&test_db.pool, &stale_token)
        .await
        .expect("session found");
    assert!(!stale.is_valid());

    let swept = clean_expired_sessions(&test_db.pool)
        .await
        .expect("sweep succeeds");
    assert_eq!(swept, 1);

    // The live session survives the sweep.
    get_session_by_token(&test_db.pool, &live_token)
        .await
        .expect("live session still present");
    let gone = get_session_by_token(&test_db.pool, &stale_token).await;
    assert!(matches!(gone, Err(AppError::Authentication(_))));
}

#[rocket::async_test]
async fn invalidating_a_session_removes_it() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");
    let id = test_db.user_id("minji").expect("user was created");

    let token = UserSession::generate_token();
    let expiry = (Utc::now() + chrono::Duration::days(7)).naive_utc();
    create_user_session(&test_db.pool, id, &token, expiry)
        .await
        .expect("session stored");

    invalidate_session(&test_db.pool, &token)
        .await
        .expect("invalidation succeeds");

    let gone = get_session_by_token(&test_db.pool, &token).await;
    assert!(matches!(gone, Err(AppError::Authentication(_))));
}

#[rocket::async_test]
async fn logging_in_sets_a_session_cookie() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");
    let client = setup_test_client(test_db.pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/login")
        .header(ContentType::Form)
        .body(format!("username=minji&password={}", STANDARD_PASSWORD))
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/"));
    assert!(client.cookies().get_private("session_token").is_some());
}

#[rocket::async_test]
async fn login_with_the_admin_code_grants_admin_mode() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");
    let pool = test_db.pool.clone();
    let client = setup_test_client(pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/login")
        .header(ContentType::Form)
        .body(format!(
            "username=minji&password={}&admin_code=1234",
            STANDARD_PASSWORD
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);
    assert!(client.cookies().get_private("admin_mode").is_some());

    let user = find_user_by_username(&pool, "minji")
        .await
        .expect("lookup succeeds")
        .expect("user exists");
    assert!(user.is_admin());
}

#[rocket::async_test]
async fn failed_login_redirects_back_without_a_session() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .build()
        .await
        .expect("test db builds");
    let client = setup_test_client(test_db.pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/login")
        .header(ContentType::Form)
        .body("username=minji&password=wrong")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/login"));
    assert!(client.cookies().get_private("session_token").is_none());
}

#[rocket::async_test]
async fn registration_creates_a_student_account() {
    let test_db = TestDbBuilder::new().build().await.expect("test db builds");
    let pool = test_db.pool.clone();
    let client = setup_test_client(pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/register")
        .header(ContentType::Form)
        .body("username=newkid&password=secret1")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/login"));

    let user = find_user_by_username(&pool, "newkid")
        .await
        .expect("lookup succeeds")
        .expect("user exists");
    assert_eq!(user.role, Role::Student);
}

#[rocket::async_test]
async fn wrong_admin_code_is_rejected() {
    let test_db = TestDbBuilder::new().build().await.expect("test db builds");
    let client = setup_test_client(test_db.pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/admin/login")
        .header(ContentType::Form)
        .body("code=0000")
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin/login"));
    assert!(client.cookies().get_private("admin_mode").is_none());
}

#[rocket::async_test]
async fn admin_logout_drops_admin_mode() {
    let test_db = TestDbBuilder::new().build().await.expect("test db builds");
    let client = setup_test_client(test_db.pool.clone(), AppConfig::default()).await;

    enable_admin_mode(&client).await;
    assert!(client.cookies().get_private("admin_mode").is_some());

    let response = client.post("/admin/logout").dispatch().await;
    assert_eq!(response.status(), Status::SeeOther);
    assert!(client.cookies().get_private("admin_mode").is_none());
}

#[rocket::async_test]
async fn settings_require_a_logged_in_user() {
    let test_db = TestDbBuilder::new().build().await.expect("test db builds");
    let client = setup_test_client(test_db.pool.clone(), AppConfig::default()).await;

    let response = client.get("/settings").dispatch().await;

    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/login"));
}

#[rocket::async_test]
async fn disabling_notifications_drops_the_users_subscriptions() {
    let test_db = TestDbBuilder::new()
        .student("minji")
        .subscription("https://push.example/mine", Some("minji"))
        .subscription("https://push.example/other", None)
        .build()
        .await
        .expect("test db builds");
    let pool = test_db.pool.clone();
    let client = setup_test_client(pool.clone(), AppConfig::default()).await;

    let response = client
        .post("/login")
        .header(ContentType::Form)
        .body(format!("username=minji&password={}", STANDARD_PASSWORD))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);

    let response = client
        .post("/settings")
        .header(ContentType::Form)
        .body("")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::SeeOther);

    let subs = crate::db::all_subscriptions(&pool)
        .await
        .expect("listing succeeds");
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].endpoint, "https://push.example/other");

    let user = find_user_by_username(&pool, "minji")
        .await
        .expect("lookup succeeds")
        .expect("user exists");
    assert!(!user.notifications_enabled);
}
