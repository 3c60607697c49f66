//! HTTP parser module.
//!
//! Parses HTTP/1.x request heads and bodies from the bytes read off a
//! connection, with a focus on simplicity and correctness.

mod error;
mod method;
mod request;
mod version;

// Re-export public items
pub use error::Error;
pub use method::Method;
pub use request::HttpRequest;
pub use version::HttpVersion;

// Re-export the parse_request function
pub use request::parse_request;
