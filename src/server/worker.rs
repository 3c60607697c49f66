//! Per-connection worker: read and classify the request, produce the
//! response, then unconditionally close the connection.

use std::net::SocketAddr;
use std::path::{PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::parser::{parse_request, HttpRequest};
use crate::server::classify::{classify, RequestKind};
use crate::server::context::{Connection, RequestContext};
use crate::server::error::Error;
use crate::server::http_server::Shared;
use crate::server::response::{HttpResponse, StatusCode};

/// Run one connection to completion.
///
/// Failures are contained here: nothing a single connection does affects
/// other connections or the server lifecycle. The connection is shut down
/// on every exit path; the caller removes the worker from the worker set
/// once this returns.
pub(crate) async fn serve_connection(
    mut stream: Box<dyn Connection>,
    peer_addr: SocketAddr,
    shared: Arc<Shared>,
) {
    match read_request(&mut stream, shared.config.read_buffer_size).await {
        Ok(Some(request)) => {
            let mut ctx = RequestContext::new(request, stream, peer_addr);
            if let Err(error) = respond(&mut ctx, &shared).await {
                warn!("request from {peer_addr} failed: {error}");
                render_failure(&mut ctx, &error).await;
            }
            ctx.shutdown().await;
        }
        Ok(None) => {
            debug!("connection from {peer_addr} closed before sending a request");
        }
        Err(error) => {
            warn!("unreadable request from {peer_addr}: {error}");
            let response = HttpResponse::new(StatusCode::BadRequest)
                .with_content_type("text/plain")
                .with_body_string(format!("error parsing request: {error}"));
            let _ = stream.write_all(&response.to_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }
}

/// Read and parse one request. `Ok(None)` when the peer closed without
/// sending anything. A body cut short by the first read is completed using
/// the declared Content-Length.
async fn read_request(
    stream: &mut Box<dyn Connection>,
    buffer_size: usize,
) -> Result<Option<HttpRequest>, Error> {
    let mut buffer = vec![0u8; buffer_size];

    let read = stream.read(&mut buffer).await?;
    if read == 0 {
        return Ok(None);
    }

    let mut request = parse_request(&buffer[..read])?;

    if let Some(content_length) = request.content_length()? {
        while request.body.len() < content_length {
            let read = stream.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            request.body.extend_from_slice(&buffer[..read]);
        }
    }

    Ok(Some(request))
}

/// Dispatch the classified request to its response path.
async fn respond(ctx: &mut RequestContext, shared: &Arc<Shared>) -> Result<(), Error> {
    let kind = classify(ctx.request().path());
    debug!(
        "{method} {target} from {peer} classified as {kind:?}",
        method = ctx.request().method,
        target = ctx.request().target,
        peer = ctx.peer_addr(),
    );

    match kind {
        RequestKind::Default => {
            let index_path = shared.root_path().join("index.html");
            ctx.write_file(&index_path).await
        }
        RequestKind::StaticFile(logical_path) => {
            let file_path = shared.root_path().join(physical_path(&logical_path));
            if tokio::fs::try_exists(&file_path).await.unwrap_or(false) {
                ctx.write_file(&file_path).await
            } else {
                let message =
                    format!("requested file does not exist: {}", ctx.request().target);
                ctx.write_text(&message, true).await
            }
        }
        RequestKind::Action => match shared.action_handler() {
            Some(handler) => (handler)(ctx).await,
            None => ctx.write_default_action().await,
        },
        RequestKind::Unknown(_) => {
            let message = format!("requested URL does not exist: {}", ctx.request().target);
            ctx.write_text(&message, true).await
        }
    }
}

/// Map a request path to a path relative to the root directory: separators
/// normalized to the platform's, leading separator stripped.
fn physical_path(logical_path: &str) -> PathBuf {
    let replaced = logical_path.replace('/', MAIN_SEPARATOR_STR);
    PathBuf::from(replaced.trim_start_matches(MAIN_SEPARATOR))
}

/// Render a failure into the response body: the error message followed by
/// its source chain. The connection is closed right after, so a partially
/// written response ends here either way.
async fn render_failure(ctx: &mut RequestContext, error: &Error) {
    let mut body = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        body.push_str(" // ");
        body.push_str(&cause.to_string());
        source = cause.source();
    }

    if let Err(write_error) = ctx.write_text(&body, true).await {
        debug!("failed to write failure response: {write_error}");
    }
}

#[cfg(test)]
mod tests {
    use super::physical_path;
    use std::path::{PathBuf, MAIN_SEPARATOR};

    #[test]
    fn physical_path_strips_leading_separator() {
        assert_eq!(physical_path("/css/site.css"), PathBuf::from("css/site.css"));
    }

    #[test]
    fn physical_path_normalizes_separators() {
        let expected: PathBuf = ["img", "logo.png"].iter().collect();
        assert_eq!(physical_path("/img/logo.png"), expected);
        assert!(!physical_path("/img/logo.png")
            .to_string_lossy()
            .starts_with(MAIN_SEPARATOR));
    }
}
