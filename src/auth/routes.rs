use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::config::AppConfig;
use crate::db::{
    authenticate_user, create_user, create_user_session, delete_subscriptions_for_user,
    invalidate_session, promote_to_admin, set_notifications_enabled,
};
use crate::error::AppError;

use super::{User, UserSession};

const SESSION_DAYS: i64 = 7;

#[derive(Serialize)]
pub struct PageInfo {
    pub message: Option<String>,
}

impl PageInfo {
    fn from_flash(flash: Option<FlashMessage<'_>>) -> Json<Self> {
        Json(Self {
            message: flash.map(|f| f.message().to_string()),
        })
    }
}

#[derive(FromForm, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
    admin_code: Option<String>,
}

#[get("/login")]
pub fn login_page(flash: Option<FlashMessage<'_>>) -> Json<PageInfo> {
    PageInfo::from_flash(flash)
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Flash<Redirect>, AppError> {
    if form.validate().is_err() {
        return Ok(Flash::error(Redirect::to(uri!("/login")), "Missing input"));
    }

    info!("Login attempt: {}", &form.username);

    match authenticate_user(db, &form.username, &form.password).await? {
        Some(user) => {
            let admin_code = form.admin_code.as_deref().unwrap_or("").trim();
            if !admin_code.is_empty() && admin_code == config.admin_code {
                promote_to_admin(db, user.id).await?;
                cookies.add_private(
                    Cookie::build(("admin_mode", "1"))
                        .same_site(SameSite::Lax)
                        .http_only(true),
                );
            }

            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::days(SESSION_DAYS);
            create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;

            cookies.add_private(
                Cookie::build(("session_token", token))
                    .same_site(SameSite::Lax)
                    .http_only(true)
                    .max_age(rocket::time::Duration::days(SESSION_DAYS)),
            );

            Ok(Flash::success(Redirect::to(uri!("/")), "Logged in"))
        }
        None => Ok(Flash::error(Redirect::to(uri!("/login")), "Login failed")),
    }
}

#[derive(FromForm, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, max = 80, message = "Username is required"))]
    username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[get("/register")]
pub fn register_page(flash: Option<FlashMessage<'_>>) -> Json<PageInfo> {
    PageInfo::from_flash(flash)
}

#[post("/register", data = "<form>")]
pub async fn process_register(
    form: Form<RegisterForm>,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if form.validate().is_err() {
        return Ok(Flash::error(
            Redirect::to(uri!("/register")),
            "Missing input",
        ));
    }

    match create_user(db, form.username.trim(), &form.password, "student").await {
        Ok(_) => Ok(Flash::success(
            Redirect::to(uri!("/login")),
            "Registration complete",
        )),
        Err(AppError::Validation(msg)) => {
            Ok(Flash::error(Redirect::to(uri!("/register")), msg))
        }
        Err(e) => Err(e),
    }
}

#[post("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<SqlitePool>) -> Flash<Redirect> {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(Cookie::build("session_token"));
    cookies.remove_private(Cookie::build("admin_mode"));

    Flash::success(Redirect::to(uri!("/")), "Logged out")
}

#[derive(FromForm)]
pub struct AdminLoginForm {
    code: String,
}

#[get("/admin/login")]
pub fn admin_login_page(flash: Option<FlashMessage<'_>>) -> Json<PageInfo> {
    PageInfo::from_flash(flash)
}

#[post("/admin/login", data = "<form>")]
pub fn process_admin_login(
    form: Form<AdminLoginForm>,
    cookies: &CookieJar<'_>,
    config: &State<AppConfig>,
) -> Flash<Redirect> {
    if form.code == config.admin_code {
        cookies.add_private(
            Cookie::build(("admin_mode", "1"))
                .same_site(SameSite::Lax)
                .http_only(true),
        );
        Flash::success(Redirect::to(uri!("/")), "Admin mode on")
    } else {
        Flash::error(Redirect::to(uri!("/admin/login")), "Wrong code")
    }
}

#[post("/admin/logout")]
pub fn admin_logout(cookies: &CookieJar<'_>) -> Flash<Redirect> {
    cookies.remove_private(Cookie::build("admin_mode"));
    Flash::success(Redirect::to(uri!("/")), "Admin mode off")
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub notifications_enabled: bool,
}

#[get("/settings")]
pub fn settings_page(user: User) -> Json<SettingsResponse> {
    Json(SettingsResponse {
        notifications_enabled: user.notifications_enabled,
    })
}

#[derive(FromForm)]
pub struct SettingsForm {
    notifications_enabled: Option<String>,
}

#[post("/settings", data = "<form>")]
pub async fn update_settings(
    form: Form<SettingsForm>,
    user: User,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    let enable = form.notifications_enabled.as_deref() == Some("on");
    set_notifications_enabled(db, user.id, enable).await?;

    // Turning notifications off also drops this account's subscriptions.
    if !enable {
        delete_subscriptions_for_user(db, user.id).await?;
    }

    Ok(Flash::success(
        Redirect::to(uri!("/settings")),
        "Settings saved",
    ))
}

#[catch(401)]
pub fn unauthorized(_req: &rocket::Request) -> Redirect {
    Redirect::to(uri!("/login"))
}
