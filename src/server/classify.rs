//! Request classification.

use std::path::Path;

use crate::server::mime;

/// Request paths ending in this suffix are dispatched to the host's action
/// handler.
pub const ACTION_SUFFIX: &str = ".action";

/// The category a request resolves to. Derived from the request path alone
/// and recomputed per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// Empty path or `/`: serve the root index document.
    Default,
    /// The path's extension is in the MIME table: serve the file from the
    /// root directory.
    StaticFile(String),
    /// The path ends in `.action`: dispatch to the host's handler.
    Action,
    /// None of the above.
    Unknown(String),
}

/// Classify a request by its absolute path (no query string).
///
/// The rules are ordered and the first match wins; the order is part of the
/// contract. In particular the extension check runs before the `.action`
/// suffix check, so a path like `/index.action.html` is a file request.
pub fn classify(path: &str) -> RequestKind {
    if path.is_empty() || path == "/" {
        return RequestKind::Default;
    }

    let extension = Path::new(path).extension().and_then(|e| e.to_str());
    if extension.is_some_and(|e| mime::content_type_for_extension(e).is_some()) {
        return RequestKind::StaticFile(path.to_string());
    }

    if path.ends_with(ACTION_SUFFIX) {
        return RequestKind::Action;
    }

    RequestKind::Unknown(path.to_string())
}
