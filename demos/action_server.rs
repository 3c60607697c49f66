//! Embedding with a custom action handler that answers in JSON.
//!
//! Run with `cargo run --example action_server`, then try
//! `curl 'http://127.0.0.1:9999/echo.action?a=1&b=2'`.

use embedhttp_rs::{
    ActionFuture, HttpResponse, RequestContext, Server, ServerConfig, StatusCode,
};
use serde::Serialize;

#[derive(Serialize)]
struct EchoReply {
    action: String,
    method: String,
    query: Option<String>,
    body: Option<String>,
}

fn handle_action(ctx: &mut RequestContext) -> ActionFuture<'_> {
    Box::pin(async move {
        let request = ctx.request();
        let reply = EchoReply {
            action: request.path().to_string(),
            method: request.method.to_string(),
            query: request.query_string(),
            body: request.body_text(),
        };

        let response = HttpResponse::new(StatusCode::Ok).with_json(&reply)?;
        ctx.write_response(&response).await
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let server = Server::new(ServerConfig::default());
    server.add_binding_address("http://127.0.0.1:9999/");
    server.set_root_path("demos/wwwroot");
    server.set_action_handler(handle_action);

    server.start().await?;
    println!("action server on http://127.0.0.1:9999/ (Ctrl-C to stop)");
    println!("try: curl 'http://127.0.0.1:9999/echo.action?a=1&b=2'");

    tokio::signal::ctrl_c().await?;

    server.stop().await;
    Ok(())
}
