//! A minimal embeddable HTTP server library.
//!
//! This library runs an HTTP server inside a host process, under host
//! control: the host registers binding addresses and a root directory,
//! starts the server, and stops it when done. Incoming requests are
//! classified into four kinds, in order:
//!
//! 1. **Default** — an empty path or `/`; serves `<root>/index.html`.
//! 2. **Static file** — the path's extension is in the MIME table; serves
//!    the file from the root directory.
//! 3. **Action** — the path ends in `.action`; dispatched to the host's
//!    action handler (or answered with a built-in diagnostic when none is
//!    registered).
//! 4. **Unknown** — anything else; answered with a short text message.
//!
//! The order is part of the contract: a registered extension wins over the
//! `.action` suffix.
//!
//! # Examples
//!
//! ## Embedding the server
//!
//! ```no_run
//! use embedhttp_rs::{Server, ServerConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new(ServerConfig::default());
//! server.add_binding_address("http://127.0.0.1:9999/");
//! server.set_root_path("/var/wwwroot");
//!
//! server.start().await?;
//! // ... the host does its own work while requests are served ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Handling action requests
//!
//! ```no_run
//! use embedhttp_rs::{ActionFuture, RequestContext, Server, ServerConfig};
//!
//! fn handle_action(ctx: &mut RequestContext) -> ActionFuture<'_> {
//!     Box::pin(async move {
//!         let action = ctx.request().path().to_string();
//!         ctx.write_text(&format!("ran {action}"), true).await
//!     })
//! }
//!
//! # fn configure() {
//! let server = Server::new(ServerConfig::default());
//! server.set_action_handler(handle_action);
//! # }
//! ```
//!
//! ## Classification
//!
//! ```
//! use embedhttp_rs::{classify, RequestKind};
//!
//! assert_eq!(classify("/"), RequestKind::Default);
//! assert!(matches!(classify("/index.html"), RequestKind::StaticFile(_)));
//! assert_eq!(classify("/report.action"), RequestKind::Action);
//! assert!(matches!(classify("/other.xyz"), RequestKind::Unknown(_)));
//! ```
//!
//! See the demo targets under `demos/` for complete embedding examples.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{parse_request, Error as ParserError, HttpRequest, HttpVersion, Method};
pub use server::{
    classify, ActionFuture, ActionHandler, Error as ServerError, HttpResponse, RequestContext,
    RequestKind, Server, ServerConfig, ServerState, StatusCode,
};
