//! Embeddable HTTP server: lifecycle, request classification and dispatch.
//!
//! The server binds to the host's registered addresses, serves static files
//! from a configured root directory and hands `.action` requests to a
//! host-supplied callback. One task accepts connections per listener; one
//! task serves each accepted connection.

mod classify;
mod config;
mod context;
mod error;
mod handler;
mod http_server;
pub mod mime;
mod response;
mod tests;
mod worker;
mod writer;

// Re-export public items
pub use classify::{classify, RequestKind, ACTION_SUFFIX};
pub use config::ServerConfig;
pub use context::RequestContext;
pub use error::Error;
pub use handler::{ActionFuture, ActionHandler};
pub use http_server::{Server, ServerState};
pub use response::{HttpResponse, StatusCode};
