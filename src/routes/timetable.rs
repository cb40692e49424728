use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::AdminContext;
use crate::config::AppConfig;
use crate::db::{get_config, set_config};
use crate::error::AppError;
use crate::uploads::store_attachment;

pub const TIMETABLE_IMAGE_KEY: &str = "timetable_image";

#[derive(Serialize)]
pub struct TimetableResponse {
    pub image_path: Option<String>,
}

#[get("/timetable")]
pub async fn timetable_index(db: &State<SqlitePool>) -> Result<Json<TimetableResponse>, AppError> {
    Ok(Json(TimetableResponse {
        image_path: get_config(db, TIMETABLE_IMAGE_KEY).await?,
    }))
}

#[derive(FromForm)]
pub struct TimetableForm<'f> {
    image: TempFile<'f>,
}

#[post("/timetable", data = "<form>")]
pub async fn upload_timetable(
    form: Form<TimetableForm<'_>>,
    ctx: AdminContext,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/timetable")), "Admin only"));
    }

    let mut form = form.into_inner();

    if form.image.len() == 0 {
        return Ok(Flash::error(
            Redirect::to(uri!("/timetable")),
            "Select an image file",
        ));
    }

    match store_attachment(&mut form.image, &config.upload_dir, "timetable").await {
        Ok(path) => {
            set_config(db, TIMETABLE_IMAGE_KEY, &path).await?;
            Ok(Flash::success(
                Redirect::to(uri!("/timetable")),
                "Timetable updated",
            ))
        }
        Err(AppError::Validation(msg)) => {
            Ok(Flash::error(Redirect::to(uri!("/timetable")), msg))
        }
        Err(e) => Err(e),
    }
}
