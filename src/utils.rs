use crate::PdfError;
use std::time::Duration;
use url::Url;

/// Replaces characters that are unsafe in a file name and strips leading dots.
pub fn sanitize_filename(input: &str) -> String {
    let cleaned = input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();

    cleaned.trim().trim_start_matches('.').trim().to_string()
}

/// Sanitized file name that always ends in `.pdf`.
pub fn pdf_filename(input: &str) -> String {
    let mut name = sanitize_filename(input);
    if name.is_empty() {
        name.push_str("document");
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let millis = duration.subsec_millis();

    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else if seconds > 0 {
        format!("{}.{}s", seconds, millis / 100)
    } else {
        format!("{millis}ms")
    }
}

pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Parses a page address; only http(s) and file URLs can be loaded for capture.
pub fn validate_url(url: &str) -> Result<Url, PdfError> {
    let parsed = Url::parse(url)
        .map_err(|e| PdfError::ConfigurationError(format!("invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        other => Err(PdfError::ConfigurationError(format!(
            "unsupported URL scheme '{other}' in '{url}'"
        ))),
    }
}
