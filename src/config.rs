use std::path::Path;

use tracing::{info, warn};

pub fn load_environment() -> anyhow::Result<()> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// How the task-add form supplies due dates. One deployment uses full
/// `YYYY-MM-DD` strings, another a fixed year with month/day fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInputMode {
    FullIso,
    FixedYear(i32),
}

/// How the calendar feed renders event times: as midnight KST converted to
/// UTC timestamps, or as all-day DATE values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcsRenderMode {
    UtcFromKst,
    AllDay,
}

#[derive(Debug, Clone)]
pub struct VapidConfig {
    pub public_key: String,
    pub private_key: String,
    pub claim_email: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub admin_code: String,
    pub upload_dir: String,
    pub vapid: Option<VapidConfig>,
    pub date_input_mode: DateInputMode,
    pub ics_render_mode: IcsRenderMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_code: "1234".to_string(),
            upload_dir: "static/uploads".to_string(),
            vapid: None,
            date_input_mode: DateInputMode::FullIso,
            ics_render_mode: IcsRenderMode::UtcFromKst,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let admin_code = std::env::var("ADMIN_CODE").unwrap_or_else(|_| "1234".to_string());
        let upload_dir =
            std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "static/uploads".to_string());

        let public_key = std::env::var("VAPID_PUBLIC_KEY").unwrap_or_default();
        let private_key = std::env::var("VAPID_PRIVATE_KEY").unwrap_or_default();
        let vapid = if public_key.is_empty() || private_key.is_empty() {
            None
        } else {
            Some(VapidConfig {
                public_key,
                private_key,
                claim_email: std::env::var("VAPID_CLAIM_EMAIL")
                    .unwrap_or_else(|_| "mailto:admin@example.com".to_string()),
            })
        };

        let date_input_mode = match std::env::var("DATE_INPUT_MODE").as_deref() {
            Ok("fixed_year") => {
                let year = std::env::var("FIXED_YEAR")
                    .ok()
                    .and_then(|y| y.parse().ok())
                    .unwrap_or(2025);
                DateInputMode::FixedYear(year)
            }
            _ => DateInputMode::FullIso,
        };

        let ics_render_mode = match std::env::var("ICS_RENDER_MODE").as_deref() {
            Ok("all_day") => IcsRenderMode::AllDay,
            _ => IcsRenderMode::UtcFromKst,
        };

        Self {
            admin_code,
            upload_dir,
            vapid,
            date_input_mode,
            ics_render_mode,
        }
    }
}
