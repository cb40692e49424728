use rocket::State;
use rocket::form::Form;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use sqlx::SqlitePool;

use crate::auth::AdminContext;
use crate::db::{create_supply, delete_supply, list_supplies};
use crate::error::AppError;
use crate::models::Supply;

#[get("/supplies")]
pub async fn supplies_index(db: &State<SqlitePool>) -> Result<Json<Vec<Supply>>, AppError> {
    Ok(Json(list_supplies(db).await?))
}

#[derive(FromForm)]
pub struct SupplyForm {
    item_text: String,
}

#[post("/supplies/add", data = "<form>")]
pub async fn add_supply(
    form: Form<SupplyForm>,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/supplies")), "Admin only"));
    }

    let text = form.item_text.trim();
    if text.is_empty() {
        return Ok(Flash::error(
            Redirect::to(uri!("/supplies")),
            "Missing input",
        ));
    }

    create_supply(db, text).await?;
    Ok(Flash::success(Redirect::to(uri!("/supplies")), "Item added"))
}

#[post("/supplies/delete/<id>")]
pub async fn remove_supply(
    id: i64,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/supplies")), "Admin only"));
    }

    delete_supply(db, id).await?;
    Ok(Flash::success(
        Redirect::to(uri!("/supplies")),
        "Item deleted",
    ))
}
