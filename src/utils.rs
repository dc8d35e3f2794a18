use crate::{ArtifactKind, ContentSource};
use std::time::Duration;
use url::Url;

/// Human-readable duration for log lines.
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
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Short description of where a render's content comes from, safe to log.
///
/// URLs are reduced to scheme and host so query strings never reach the logs.
pub fn describe_source(source: &ContentSource) -> String {
    match source {
        ContentSource::Html(html) => format!("inline html ({})", format_bytes(html.len())),
        ContentSource::Url(raw) => match Url::parse(raw) {
            Ok(url) => match url.host_str() {
                Some(host) => format!("{}://{}", url.scheme(), host),
                None => url.scheme().to_string(),
            },
            Err(_) => "unparseable url".to_string(),
        },
    }
}

/// Default file name for a one-shot render written to disk.
pub fn default_output_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Pdf => "output.pdf",
        ArtifactKind::Png => "output.png",
    }
}
