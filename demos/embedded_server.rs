//! Minimal embedding: serve a directory of static files and stop on Ctrl-C.
//!
//! Run with `cargo run --example embedded_server`, then open
//! http://127.0.0.1:9999/ in a browser.

use embedhttp_rs::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let server = Server::new(ServerConfig::default());
    server.add_binding_address("http://127.0.0.1:9999/");
    server.set_root_path("demos/wwwroot");

    server.start().await?;
    println!("serving demos/wwwroot on http://127.0.0.1:9999/ (Ctrl-C to stop)");

    tokio::signal::ctrl_c().await?;

    server.stop().await;
    Ok(())
}
