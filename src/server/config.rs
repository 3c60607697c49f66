//! Server configuration.

use std::time::Duration;

/// Tuning knobs for the embedded server.
///
/// Binding addresses and the document root are runtime state on
/// [`Server`](crate::server::Server), mutable while the server is stopped;
/// they are not configuration fields.
#[derive(Clone)]
pub struct ServerConfig {
    /// Size of the buffer used to read request bytes off a connection.
    pub read_buffer_size: usize,
    /// How long `stop()` waits for in-flight connections to finish before
    /// aborting them.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
