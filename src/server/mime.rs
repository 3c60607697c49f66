//! Static MIME table mapping file extensions to content-type strings.

use std::path::Path;

/// Served when a file's extension has no table entry.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// The extensions the static-file path recognizes. Read-only after
/// initialization; shared freely across workers.
const MIME_TABLE: &[(&str, &str)] = &[
    ("js", "application/js"),
    ("json", "application/json"),
    ("html", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("text", "text/text; charset=utf-8"),
    ("jpg", "image/jpeg"),
    ("png", "image/png"),
];

/// Look up the content-type for a file extension (with or without the
/// leading dot). `None` when the extension is not in the table, which also
/// means a path with that extension is not classified as a file request.
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    MIME_TABLE
        .iter()
        .find(|(known, _)| *known == extension)
        .map(|(_, content_type)| *content_type)
}

/// The content-type a file at `path` is served with,
/// `application/octet-stream` when the extension is unknown.
pub fn content_type_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|extension| extension.to_str())
        .and_then(content_type_for_extension)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
