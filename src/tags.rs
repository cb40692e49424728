use once_cell::sync::Lazy;
use regex::Regex;

// Hangul syllables are part of the supported tag alphabet.
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([0-9A-Za-z가-힣_]+)").unwrap());

static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(https?://[^\s<]+)").unwrap());

/// Extracts hashtag tokens from free text: lower-cased, de-duplicated,
/// sorted, `#` stripped.
pub fn extract_tags(content: &str) -> Vec<String> {
    let mut tags: Vec<String> = TAG_RE
        .captures_iter(content)
        .map(|c| c[1].to_lowercase())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// Comma-joined form stored on the note row.
pub fn tags_to_column(tags: &[String]) -> String {
    tags.join(",")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// HTML-escapes note content, wraps bare URLs in anchors and converts
/// newlines to `<br>` for display.
pub fn linkify(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let safe = escape_html(text);
    let linked = LINK_RE.replace_all(&safe, |caps: &regex::Captures| {
        format!(
            "<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{url}</a>",
            url = &caps[1]
        )
    });
    linked
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br>")
}
