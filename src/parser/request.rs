//! HTTP request parsing and representation.

use std::collections::HashMap;
use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::version::HttpVersion;

/// A parsed HTTP/1.x request.
///
/// The head (request line and headers) is parsed as UTF-8; the body is kept
/// as raw bytes.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The raw request-target exactly as it appeared on the request line,
    /// path plus optional `?query`.
    pub target: String,
    /// The HTTP version
    pub version: HttpVersion,
    /// The HTTP headers
    pub headers: HashMap<String, String>,
    /// Query parameters in the order they appeared in the query string.
    pub query_params: Vec<(String, String)>,
    /// The request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a new HTTP request. Query parameters are parsed out of the
    /// target's query string, preserving their order.
    pub fn new(
        method: Method,
        target: impl Into<String>,
        version: HttpVersion,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Self {
        let target = target.into();
        let query_params = target
            .split_once('?')
            .map(|(_, query)| parse_query(query))
            .unwrap_or_default();

        Self {
            method,
            target,
            version,
            headers,
            query_params,
            body,
        }
    }

    /// The absolute path: the target up to but excluding the `?` separator.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// Get a header value. Header names are case-insensitive.
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(name).then_some(v))
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// The declared body length, if a Content-Length header is present.
    pub fn content_length(&self) -> Result<Option<usize>, Error> {
        match self.header("Content-Length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| Error::InvalidContentLength(value.clone())),
            None => Ok(None),
        }
    }

    /// The body as text, or `None` when the request has no body.
    pub fn body_text(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.body).into_owned())
        }
    }

    /// Reconstruct the query string as `key=value` pairs joined with `&`,
    /// without a leading `&`. `None` when there are no query parameters.
    pub fn query_string(&self) -> Option<String> {
        if self.query_params.is_empty() {
            return None;
        }

        let joined = self
            .query_params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        Some(joined)
    }

    /// Get the first query parameter with the given name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v.as_str()))
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader(
                "Content-Type: application/json".to_string(),
            ));
        }

        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Check if the request declares a JSON body.
    pub fn is_json(&self) -> bool {
        self.header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Parse an HTTP request from a byte slice.
///
/// The head is everything up to the first blank line; whatever follows it is
/// kept verbatim as the body (callers compare against Content-Length to
/// decide whether more bytes are still in flight).
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let (head, body) = match find_blank_line(input) {
        Some(at) => (&input[..at], input[at + 4..].to_vec()),
        None => (input, Vec::new()),
    };

    let head = std::str::from_utf8(head)
        .map_err(|_| Error::MalformedRequestLine("invalid UTF-8 in request head".to_string()))?;

    let mut lines = head.lines();

    let request_line = lines.next().ok_or(Error::EmptyRequest)?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(Error::MalformedRequestLine(request_line.to_string()));
    }

    let method = Method::from_str(parts[0])?;

    let target = parts[1];
    if target.is_empty() {
        return Err(Error::InvalidTarget);
    }

    let version = HttpVersion::from_str(parts[2])?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    if version == HttpVersion::Http11 && !headers.keys().any(|k| k.eq_ignore_ascii_case("Host")) {
        return Err(Error::MissingHeader("Host".to_string()));
    }

    Ok(HttpRequest::new(method, target, version, headers, body))
}

fn find_blank_line(input: &[u8]) -> Option<usize> {
    input.windows(4).position(|window| window == b"\r\n\r\n")
}
