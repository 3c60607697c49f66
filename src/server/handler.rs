//! Action dispatch types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::server::context::RequestContext;
use crate::server::error::Error;

/// Future returned by an action handler.
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>>;

/// The host-supplied action callback.
///
/// Invoked on the connection's worker task whenever a request classifies as
/// an action, with exclusive access to the [`RequestContext`]: the handler
/// reads the request and writes the response. A single handler slot, not a
/// subscriber list — installing a new handler replaces the previous one.
///
/// Plain functions fit the signature directly:
///
/// ```
/// use embedhttp_rs::{ActionFuture, RequestContext};
///
/// fn handle_action(ctx: &mut RequestContext) -> ActionFuture<'_> {
///     Box::pin(async move {
///         let target = ctx.request().target.clone();
///         ctx.write_text(&format!("ran {target}"), true).await
///     })
/// }
/// ```
pub type ActionHandler =
    Arc<dyn for<'a> Fn(&'a mut RequestContext) -> ActionFuture<'a> + Send + Sync>;
