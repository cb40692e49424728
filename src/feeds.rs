use chrono::Duration;

use crate::config::IcsRenderMode;
use crate::models::Task;

/// Renders the task list as an iCalendar document, one VEVENT per task.
/// `UtcFromKst` treats a due date as midnight KST and converts to UTC;
/// `AllDay` emits date-only values.
pub fn render_ics(tasks: &[Task], mode: IcsRenderMode) -> String {
    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//ClassHub//KST//KO".to_string(),
    ];

    for task in tasks {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:task-{}@classhub", task.id));

        match mode {
            IcsRenderMode::UtcFromKst => {
                let midnight = task.due_date.and_hms_opt(0, 0, 0).expect("valid midnight");
                let utc = midnight - Duration::hours(9);
                let stamp = utc.format("%Y%m%dT%H%M%SZ").to_string();
                lines.push(format!("DTSTAMP:{}", stamp));
                lines.push(format!("DTSTART:{}", stamp));
            }
            IcsRenderMode::AllDay => {
                // DTSTAMP must be a UTC DATE-TIME even for all-day events.
                let midnight = task.due_date.and_hms_opt(0, 0, 0).expect("valid midnight");
                lines.push(format!("DTSTAMP:{}", midnight.format("%Y%m%dT%H%M%SZ")));
                lines.push(format!(
                    "DTSTART;VALUE=DATE:{}",
                    task.due_date.format("%Y%m%d")
                ));
            }
        }

        lines.push(format!("SUMMARY:{}", task.title));
        lines.push(format!("DESCRIPTION:카테고리:{}", task.category));
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());
    lines.join("\r\n")
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders the task list as RFC-4180 CSV with a fixed header row. Dates are
/// ISO-8601 strings, the completed flag is 0/1.
pub fn render_csv(tasks: &[Task]) -> String {
    let mut lines = vec![
        "id,title,category,due_date,created_at,completed,color,attachment_path".to_string(),
    ];

    for task in tasks {
        let fields = [
            task.id.to_string(),
            csv_field(&task.title),
            task.category.to_string(),
            task.due_date.format("%Y-%m-%d").to_string(),
            task.created_at
                .naive_utc()
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string(),
            if task.completed { "1" } else { "0" }.to_string(),
            csv_field(&task.color),
            csv_field(task.attachment_path.as_deref().unwrap_or("")),
        ];
        lines.push(fields.join(","));
    }

    lines.join("\n")
}
