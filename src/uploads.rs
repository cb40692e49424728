use std::path::{Path, PathBuf};

use rocket::fs::TempFile;
use rocket::tokio::fs;
use tracing::{info, instrument};

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "zip",
];

/// Filename must carry an extension and the lowercased suffix after the last
/// `.` must be on the allow-list.
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
        }
        _ => false,
    }
}

/// Strips directory components and unsafe characters so the name is usable
/// as a single path segment.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // No hidden files or traversal-shaped names.
    cleaned.trim_start_matches('.').to_string()
}

/// Validates an upload name against the allow-list and returns the sanitized
/// filename to store under.
pub fn checked_filename(raw: &str) -> Result<String, AppError> {
    if !allowed_file(raw) {
        return Err(AppError::Validation(format!(
            "File type not allowed: {}",
            raw
        )));
    }

    let name = sanitize_filename(raw);
    if name.is_empty() || !name.contains('.') {
        return Err(AppError::Validation("Invalid file name".to_string()));
    }

    Ok(name)
}

/// Persists a multipart upload under `<upload_root>/<subdir>/`, creating the
/// directory if absent. Returns the stored path relative to the upload
/// root's parent (never an absolute filesystem path), forward-slashed.
#[instrument(skip(file))]
pub async fn store_attachment(
    file: &mut TempFile<'_>,
    upload_root: &str,
    subdir: &str,
) -> Result<String, AppError> {
    let raw_name = file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .ok_or_else(|| AppError::Validation("Upload has no file name".to_string()))?;

    let name = checked_filename(&raw_name)?;

    let dir: PathBuf = Path::new(upload_root).join(subdir);
    fs::create_dir_all(&dir).await?;

    let dest = dir.join(&name);
    file.copy_to(&dest).await?;

    info!(path = %dest.display(), "Stored attachment");

    let relative = match Path::new(upload_root).file_name() {
        Some(base) => format!("{}/{}/{}", base.to_string_lossy(), subdir, name),
        None => format!("{}/{}", subdir, name),
    };

    Ok(relative)
}
