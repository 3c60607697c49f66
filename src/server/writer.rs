//! Response writing: file streaming, text bodies and the default action
//! diagnostic.

use std::path::Path;

use chrono::Local;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::parser::HttpRequest;
use crate::server::error::Error;
use crate::server::mime;
use crate::server::response::{HttpResponse, StatusCode};

/// File bytes are streamed to the connection in chunks of this size.
const CHUNK_SIZE: usize = 4096;

/// Stream the file at `file_path` to the sink.
///
/// The content-type comes from the MIME table (`application/octet-stream`
/// for unknown extensions). The body is streamed in fixed-size chunks until
/// end-of-file; it carries no Content-Length and is delimited by the
/// connection close. Open and read failures surface as [`Error::FileIo`] —
/// the caller decides the fallback.
pub async fn write_file(
    sink: &mut (impl AsyncWrite + Unpin),
    file_path: &Path,
) -> Result<(), Error> {
    let content_type = mime::content_type_for_path(file_path);

    let mut file = File::open(file_path).await.map_err(|source| Error::FileIo {
        path: file_path.display().to_string(),
        source,
    })?;

    let head = HttpResponse::new(StatusCode::Ok).with_content_type(content_type);
    sink.write_all(&head.head_bytes()).await?;

    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await.map_err(|source| Error::FileIo {
            path: file_path.display().to_string(),
            source,
        })?;
        if read == 0 {
            break;
        }
        sink.write_all(&buffer[..read]).await?;
    }

    Ok(())
}

/// Write a small text message to the sink, optionally with a
/// `text/html; charset=utf-8` content-type header. No chunking; the message
/// is assumed small.
pub async fn write_text(
    sink: &mut (impl AsyncWrite + Unpin),
    message: &str,
    with_header: bool,
) -> Result<(), Error> {
    let mut response = HttpResponse::new(StatusCode::Ok);
    if with_header {
        response = response.with_content_type("text/html; charset=utf-8");
    }
    let response = response.with_body_string(message);

    sink.write_all(&response.to_bytes()).await?;
    Ok(())
}

/// Build the diagnostic HTML fragment served when no action handler is
/// registered.
///
/// The action name is the request target up to but excluding the `?`
/// separator; a target without one fails with
/// [`Error::MalformedActionUrl`].
pub fn default_action_body(request: &HttpRequest) -> Result<String, Error> {
    let query_at = request
        .target
        .find('?')
        .ok_or_else(|| Error::MalformedActionUrl(request.target.clone()))?;
    let action_name = &request.target[..query_at];

    Ok(format!(
        "request time : {time}<br>\n\
         request URL : {target}<br>\n\
         action name : {action_name}<br>\n\
         request method : {method}<br>\n\
         POST DATA : {post_data}<br>\n\
         QUERY STRING : {query_string}<br>\n",
        time = Local::now().format("%Y-%m-%d %H:%M:%S"),
        target = request.target,
        method = request.method,
        post_data = request.body_text().unwrap_or_default(),
        query_string = request.query_string().unwrap_or_default(),
    ))
}
