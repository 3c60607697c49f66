//! Per-connection request context.

use std::net::SocketAddr;
use std::path::Path;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::parser::HttpRequest;
use crate::server::error::Error;
use crate::server::response::HttpResponse;
use crate::server::writer;

/// The stream a context writes its response to: a live TCP connection in
/// production, an in-memory duplex stream in tests.
pub(crate) trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// One accepted connection: the parsed request plus the live stream.
///
/// A context is owned exclusively by its connection's worker (or by the
/// action handler the worker dispatches to) and is never shared across
/// workers. Dropping it closes the connection; the worker shuts the stream
/// down explicitly on every exit path first.
pub struct RequestContext {
    request: HttpRequest,
    stream: Box<dyn Connection>,
    peer_addr: SocketAddr,
}

impl RequestContext {
    pub(crate) fn new(
        request: HttpRequest,
        stream: Box<dyn Connection>,
        peer_addr: SocketAddr,
    ) -> Self {
        Self {
            request,
            stream,
            peer_addr,
        }
    }

    /// The parsed request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    /// The remote end of the connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Parse the request body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(self.request.json()?)
    }

    /// Stream the file at `path` to the connection, content-type from the
    /// MIME table.
    pub async fn write_file(&mut self, path: &Path) -> Result<(), Error> {
        writer::write_file(&mut self.stream, path).await
    }

    /// Write a text message to the connection, optionally with an HTML
    /// content-type header.
    pub async fn write_text(&mut self, message: &str, with_header: bool) -> Result<(), Error> {
        writer::write_text(&mut self.stream, message, with_header).await
    }

    /// Write a prebuilt response to the connection.
    pub async fn write_response(&mut self, response: &HttpResponse) -> Result<(), Error> {
        self.stream.write_all(&response.to_bytes()).await?;
        Ok(())
    }

    /// Write the built-in action diagnostic: timestamp, request URL, action
    /// name, method, body and reconstructed query string.
    ///
    /// Fails with [`Error::MalformedActionUrl`] when the request target has
    /// no `?` separator.
    pub async fn write_default_action(&mut self) -> Result<(), Error> {
        let body = writer::default_action_body(&self.request)?;
        self.write_text(&body, true).await
    }

    /// Flush and shut down the connection. Failures are ignored; the stream
    /// is closed either way when the context is dropped.
    pub(crate) async fn shutdown(&mut self) {
        let _ = self.stream.flush().await;
        let _ = self.stream.shutdown().await;
    }
}
