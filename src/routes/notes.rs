use chrono::{DateTime, Utc};
use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::auth::AdminContext;
use crate::config::AppConfig;
use crate::db::{create_note, delete_note, list_notes, split_pinned, toggle_note_pin};
use crate::error::AppError;
use crate::models::Note;
use crate::tags::{extract_tags, linkify, tags_to_column};
use crate::uploads::store_attachment;

#[derive(Serialize)]
pub struct NoteView {
    pub id: i64,
    pub content: String,
    pub html: String,
    pub tags: Vec<String>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub attachment_path: Option<String>,
}

impl From<Note> for NoteView {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            html: linkify(&note.content),
            content: note.content,
            tags: note.tags,
            pinned: note.pinned,
            created_at: note.created_at,
            attachment_path: note.attachment_path,
        }
    }
}

#[derive(Serialize)]
pub struct NotesResponse {
    pub pinned: Vec<NoteView>,
    pub notes: Vec<NoteView>,
}

#[get("/misc?<q>&<tag>")]
pub async fn notes_index(
    q: Option<String>,
    tag: Option<String>,
    db: &State<SqlitePool>,
) -> Result<Json<NotesResponse>, AppError> {
    let search = q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let tag = tag.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let notes = list_notes(db, search, tag).await?;
    let (pinned, unpinned) = split_pinned(notes);

    Ok(Json(NotesResponse {
        pinned: pinned.into_iter().map(NoteView::from).collect(),
        notes: unpinned.into_iter().map(NoteView::from).collect(),
    }))
}

#[derive(FromForm)]
pub struct NoteForm<'f> {
    pub content: Option<String>,
    pub attachment: Option<TempFile<'f>>,
}

#[post("/misc/add", data = "<form>")]
pub async fn add_note(
    form: Form<NoteForm<'_>>,
    ctx: AdminContext,
    db: &State<SqlitePool>,
    config: &State<AppConfig>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/misc")), "Admin only"));
    }

    let mut form = form.into_inner();

    let content = form
        .content
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    let mut attachment_path = None;
    if let Some(file) = form.attachment.as_mut() {
        if file.len() > 0 {
            match store_attachment(file, &config.upload_dir, "misc").await {
                Ok(path) => attachment_path = Some(path),
                Err(AppError::Validation(msg)) => {
                    warn!(message = %msg, "Skipping disallowed attachment");
                }
                Err(e) => return Err(e),
            }
        }
    }

    // A note needs at least one of content or attachment.
    if content.is_empty() && attachment_path.is_none() {
        return Ok(Flash::error(Redirect::to(uri!("/misc")), "Missing input"));
    }

    let tags = extract_tags(&content);
    create_note(db, &content, &tags_to_column(&tags), attachment_path.as_deref()).await?;

    Ok(Flash::success(Redirect::to(uri!("/misc")), "Note added"))
}

#[post("/misc/pin/<id>")]
pub async fn pin_note(
    id: i64,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/misc")), "Admin only"));
    }

    toggle_note_pin(db, id).await?;
    Ok(Flash::success(Redirect::to(uri!("/misc")), "Note updated"))
}

#[post("/misc/delete/<id>")]
pub async fn remove_note(
    id: i64,
    ctx: AdminContext,
    db: &State<SqlitePool>,
) -> Result<Flash<Redirect>, AppError> {
    if !ctx.is_admin {
        return Ok(Flash::error(Redirect::to(uri!("/misc")), "Admin only"));
    }

    delete_note(db, id).await?;
    Ok(Flash::success(Redirect::to(uri!("/misc")), "Note deleted"))
}
