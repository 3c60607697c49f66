//! Tests for the HTTP server implementation.

#[cfg(test)]
mod server_tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use crate::parser::{HttpRequest, HttpVersion, Method};
    use crate::server::classify::{classify, RequestKind};
    use crate::server::error::Error;
    use crate::server::mime;
    use crate::server::response::{HttpResponse, StatusCode};
    use crate::server::writer;
    use crate::server::{worker, Server, ServerState};

    static NEXT_ROOT_ID: AtomicUsize = AtomicUsize::new(0);

    /// A throwaway root directory for static-file tests.
    struct TempRoot {
        path: PathBuf,
    }

    impl TempRoot {
        fn new(tag: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "embedhttp-test-{tag}-{pid}-{id}",
                pid = std::process::id(),
                id = NEXT_ROOT_ID.fetch_add(1, Ordering::SeqCst),
            ));
            std::fs::create_dir_all(&path).unwrap();
            Self { path }
        }

        fn write_file(&self, name: &str, contents: &[u8]) {
            let full = self.path.join(name);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, contents).unwrap();
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    /// Run one request through a worker over an in-memory stream and return
    /// the raw response.
    async fn run_request(server: &Server, request: &[u8]) -> String {
        let (mut client, server_side) = duplex(64 * 1024);
        client.write_all(request).await.unwrap();

        let shared = Arc::clone(&server.shared);
        let peer_addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let worker_task = tokio::spawn(async move {
            worker::serve_connection(Box::new(server_side), peer_addr, shared).await;
        });

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        worker_task.await.unwrap();

        String::from_utf8_lossy(&response).into_owned()
    }

    fn response_body(response: &str) -> &str {
        response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body)
            .unwrap_or("")
    }

    // --- classification ---

    #[test]
    fn classify_default_paths() {
        assert_eq!(classify(""), RequestKind::Default);
        assert_eq!(classify("/"), RequestKind::Default);
    }

    #[test]
    fn classify_static_file_paths() {
        assert_eq!(
            classify("/index.html"),
            RequestKind::StaticFile("/index.html".to_string())
        );
        assert_eq!(
            classify("/css/site.css"),
            RequestKind::StaticFile("/css/site.css".to_string())
        );
    }

    #[test]
    fn classify_action_paths() {
        assert_eq!(classify("/report.action"), RequestKind::Action);
        assert_eq!(classify("/deep/nested/run.action"), RequestKind::Action);
    }

    #[test]
    fn classify_unknown_paths() {
        assert_eq!(
            classify("/unknown.xyz"),
            RequestKind::Unknown("/unknown.xyz".to_string())
        );
        assert_eq!(
            classify("/no-extension"),
            RequestKind::Unknown("/no-extension".to_string())
        );
    }

    #[test]
    fn classify_registered_extension_wins_over_action_suffix() {
        // Rule order decides, not specificity: an extension in the MIME
        // table makes this a file request even though `.action` appears in
        // the name.
        assert_eq!(
            classify("/index.action.html"),
            RequestKind::StaticFile("/index.action.html".to_string())
        );
    }

    // --- MIME table ---

    #[test]
    fn mime_table_known_extensions() {
        assert_eq!(
            mime::content_type_for_extension("js"),
            Some("application/js")
        );
        assert_eq!(
            mime::content_type_for_extension(".json"),
            Some("application/json")
        );
        assert_eq!(
            mime::content_type_for_extension("html"),
            Some("text/html; charset=utf-8")
        );
        assert_eq!(
            mime::content_type_for_extension("css"),
            Some("text/css; charset=utf-8")
        );
        assert_eq!(
            mime::content_type_for_extension("text"),
            Some("text/text; charset=utf-8")
        );
        assert_eq!(mime::content_type_for_extension("jpg"), Some("image/jpeg"));
        assert_eq!(mime::content_type_for_extension("png"), Some("image/png"));
    }

    #[test]
    fn mime_table_unknown_extension() {
        assert_eq!(mime::content_type_for_extension("xyz"), None);
        assert_eq!(mime::content_type_for_extension("action"), None);
        assert_eq!(
            mime::content_type_for_path(Path::new("archive.tar.gz")),
            "application/octet-stream"
        );
        assert_eq!(
            mime::content_type_for_path(Path::new("logo.png")),
            "image/png"
        );
    }

    // --- responses ---

    #[test]
    fn response_bytes_carry_status_line_and_headers() {
        let response = HttpResponse::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body_string("hello");
        let bytes = String::from_utf8(response.to_bytes()).unwrap();

        assert!(bytes.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(bytes.contains("Content-Type: text/plain\r\n"));
        assert!(bytes.contains("Content-Length: 5\r\n"));
        assert!(bytes.contains("Connection: close\r\n"));
        assert!(bytes.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn response_head_bytes_exclude_the_body() {
        let response = HttpResponse::new(StatusCode::Ok).with_body_string("hello");
        let head = String::from_utf8(response.head_bytes()).unwrap();
        assert!(head.ends_with("\r\n\r\n"));
        assert!(!head.contains("hello"));
    }

    // --- default action diagnostic ---

    fn action_request(target: &str, body: &[u8]) -> HttpRequest {
        HttpRequest::new(
            Method::POST,
            target,
            HttpVersion::Http11,
            HashMap::new(),
            body.to_vec(),
        )
    }

    #[test]
    fn default_action_body_renders_request_details() {
        let request = action_request("/do.action?a=1&b=2", b"x=1");
        let body = writer::default_action_body(&request).unwrap();

        assert!(body.contains("request URL : /do.action?a=1&b=2"));
        assert!(body.contains("action name : /do.action"));
        assert!(body.contains("request method : POST"));
        assert!(body.contains("POST DATA : x=1"));
        assert!(body.contains("QUERY STRING : a=1&b=2"));
    }

    #[test]
    fn default_action_body_requires_a_query_separator() {
        let request = action_request("/do.action", b"");
        let result = writer::default_action_body(&request);
        assert!(matches!(result, Err(Error::MalformedActionUrl(_))));
    }

    // --- worker behavior over in-memory streams ---

    #[tokio::test]
    async fn default_request_serves_index_html() {
        let root = TempRoot::new("default");
        root.write_file("index.html", b"<html>home</html>");

        let server = Server::default();
        server.set_root_path(root.path());

        let response = run_request(&server, b"GET / HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert_eq!(response_body(&response), "<html>home</html>");
    }

    #[tokio::test]
    async fn static_file_request_serves_the_file() {
        let root = TempRoot::new("static");
        root.write_file("css/site.css", b"body { margin: 0 }");

        let server = Server::default();
        server.set_root_path(root.path());

        let response =
            run_request(&server, b"GET /css/site.css HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/css; charset=utf-8\r\n"));
        assert_eq!(response_body(&response), "body { margin: 0 }");
    }

    #[tokio::test]
    async fn missing_static_file_answers_200_with_a_message() {
        let root = TempRoot::new("missing");

        let server = Server::default();
        server.set_root_path(root.path());

        let response =
            run_request(&server, b"GET /missing.png HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(response_body(&response).contains("requested file does not exist: /missing.png"));
    }

    #[tokio::test]
    async fn unknown_path_answers_200_with_a_message() {
        let server = Server::default();

        let response =
            run_request(&server, b"GET /whatever.xyz HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response_body(&response).contains("requested URL does not exist: /whatever.xyz"));
    }

    #[tokio::test]
    async fn action_without_handler_gets_the_default_diagnostic() {
        let server = Server::default();

        let response = run_request(
            &server,
            b"GET /run.action?a=1&b=2 HTTP/1.1\r\nHost: test\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        let body = response_body(&response);
        assert!(body.contains("action name : /run.action"));
        assert!(body.contains("request method : GET"));
        assert!(body.contains("QUERY STRING : a=1&b=2"));
    }

    #[tokio::test]
    async fn action_without_query_separator_renders_the_failure() {
        let server = Server::default();

        let response =
            run_request(&server, b"GET /run.action HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response_body(&response).contains("malformed action URL"));
    }

    #[tokio::test]
    async fn registered_action_handler_is_invoked() {
        use crate::server::{ActionFuture, RequestContext};

        fn handler(ctx: &mut RequestContext) -> ActionFuture<'_> {
            Box::pin(async move {
                let target = ctx.request().target.clone();
                ctx.write_text(&format!("handled {target}"), true).await
            })
        }

        let server = Server::default();
        server.set_action_handler(handler);

        let response =
            run_request(&server, b"GET /run.action HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response_body(&response).contains("handled /run.action"));
    }

    #[tokio::test]
    async fn action_handler_reads_a_json_body() {
        use crate::server::{ActionFuture, RequestContext};
        use serde::Deserialize;

        #[derive(Deserialize)]
        struct SavePayload {
            name: String,
        }

        fn handler(ctx: &mut RequestContext) -> ActionFuture<'_> {
            Box::pin(async move {
                let payload: SavePayload = ctx.json()?;
                ctx.write_text(&format!("saved {}", payload.name), true).await
            })
        }

        let server = Server::default();
        server.set_action_handler(handler);

        let response = run_request(
            &server,
            b"POST /save.action HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"name\":\"demo\"}",
        )
        .await;
        assert!(response_body(&response).contains("saved demo"));
    }

    #[tokio::test]
    async fn action_handler_failure_is_rendered_into_the_body() {
        use crate::server::{ActionFuture, RequestContext};

        fn failing_handler(_ctx: &mut RequestContext) -> ActionFuture<'_> {
            Box::pin(async move { Err(Error::Handler("boom".to_string())) })
        }

        let server = Server::default();
        server.set_action_handler(failing_handler);

        let response =
            run_request(&server, b"GET /run.action HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response_body(&response).contains("boom"));
    }

    #[tokio::test]
    async fn cleared_action_handler_falls_back_to_the_diagnostic() {
        use crate::server::{ActionFuture, RequestContext};

        fn handler(ctx: &mut RequestContext) -> ActionFuture<'_> {
            Box::pin(async move { ctx.write_text("handled", true).await })
        }

        let server = Server::default();
        server.set_action_handler(handler);
        server.clear_action_handler();

        let response = run_request(
            &server,
            b"GET /run.action?a=1 HTTP/1.1\r\nHost: test\r\n\r\n",
        )
        .await;
        let body = response_body(&response);
        assert!(!body.contains("handled"));
        assert!(body.contains("action name : /run.action"));
    }

    #[tokio::test]
    async fn missing_index_renders_the_failure() {
        let root = TempRoot::new("no-index");

        let server = Server::default();
        server.set_root_path(root.path());

        let response = run_request(&server, b"GET / HTTP/1.1\r\nHost: test\r\n\r\n").await;
        assert!(response_body(&response).contains("file I/O error"));
    }

    #[tokio::test]
    async fn unparseable_request_gets_400() {
        let server = Server::default();

        let response = run_request(&server, b"NOT A REQUEST").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response_body(&response).contains("error parsing request"));
    }

    #[tokio::test]
    async fn post_body_reaches_the_diagnostic() {
        let server = Server::default();

        let response = run_request(
            &server,
            b"POST /save.action?id=7 HTTP/1.1\r\nHost: test\r\nContent-Length: 9\r\n\r\nname=test",
        )
        .await;
        let body = response_body(&response);
        assert!(body.contains("POST DATA : name=test"));
        assert!(body.contains("QUERY STRING : id=7"));
    }

    // --- registry and root path ---

    #[test]
    fn registry_add_remove_contains_clear() {
        let server = Server::default();

        server.add_binding_address("http://127.0.0.1:9999/");
        assert!(server.contains_binding_address("http://127.0.0.1:9999/"));

        // duplicate add is ignored
        server.add_binding_address("http://127.0.0.1:9999/");
        assert_eq!(server.binding_addresses().len(), 1);

        // removing an absent address is a no-op
        server.remove_binding_address("http://127.0.0.1:1234/");
        assert_eq!(server.binding_addresses().len(), 1);

        server.remove_binding_address("http://127.0.0.1:9999/");
        assert!(!server.contains_binding_address("http://127.0.0.1:9999/"));

        server.add_binding_address("http://127.0.0.1:9999/");
        server.add_binding_address("http://127.0.0.1:9998/");
        server.clear_binding_addresses();
        assert!(server.binding_addresses().is_empty());
    }

    // --- lifecycle over real listeners ---

    #[tokio::test]
    async fn start_without_addresses_is_a_noop() {
        let server = Server::default();
        server.start().await.unwrap();
        assert!(!server.is_running());
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn start_stop_round_trip_preserves_the_registry() {
        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");

        let before = server.binding_addresses();

        server.start().await.unwrap();
        assert!(server.is_running());
        assert_eq!(server.state(), ServerState::Running);
        assert_eq!(server.local_addrs().len(), 1);

        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.binding_addresses(), before);
        assert!(server.local_addrs().is_empty());
    }

    #[tokio::test]
    async fn mutation_while_running_has_no_observable_effect() {
        let root = TempRoot::new("frozen");

        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");
        server.set_root_path(root.path());

        server.start().await.unwrap();

        let addresses_before = server.binding_addresses();
        let root_before = server.root_path();

        server.add_binding_address("http://127.0.0.1:1234/");
        server.remove_binding_address("http://127.0.0.1:0/");
        server.clear_binding_addresses();
        server.set_root_path("/elsewhere");

        assert_eq!(server.binding_addresses(), addresses_before);
        assert_eq!(server.root_path(), root_before);

        server.stop().await;

        // mutable again once stopped
        server.set_root_path("/elsewhere");
        assert_eq!(server.root_path(), PathBuf::from("/elsewhere"));
    }

    #[tokio::test]
    async fn serves_requests_over_tcp() {
        let root = TempRoot::new("tcp");
        root.write_file("index.html", b"<html>over tcp</html>");

        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");
        server.set_root_path(root.path());

        server.start().await.unwrap();
        let addr = server.local_addrs()[0];

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response);

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("<html>over tcp</html>"));

        server.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_the_listener_and_empties_the_worker_set() {
        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");

        server.start().await.unwrap();
        let addr = server.local_addrs()[0];

        server.stop().await;

        assert_eq!(server.shared.worker_count(), 0);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_requests_complete_independently() {
        let root = TempRoot::new("concurrent");
        root.write_file("a.text", b"AAAAAAAAAA");
        root.write_file("b.text", b"BBBBBBBBBB");

        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");
        server.set_root_path(root.path());

        server.start().await.unwrap();
        let addr = server.local_addrs()[0];

        async fn fetch(addr: SocketAddr, target: &str) -> String {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(format!("GET {target} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
                .await
                .unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            String::from_utf8_lossy(&response).into_owned()
        }

        let (response_a, response_b) = tokio::join!(fetch(addr, "/a.text"), fetch(addr, "/b.text"));

        assert!(response_a.contains("AAAAAAAAAA"));
        assert!(!response_a.contains('B'));
        assert!(response_b.contains("BBBBBBBBBB"));
        assert!(!response_b.contains('A'));

        server.stop().await;
    }

    #[tokio::test]
    async fn restart_after_stop_binds_again() {
        let root = TempRoot::new("restart");
        root.write_file("index.html", b"again");

        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");
        server.set_root_path(root.path());

        server.start().await.unwrap();
        server.stop().await;

        server.start().await.unwrap();
        assert!(server.is_running());
        let addr = server.local_addrs()[0];

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: test\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert!(String::from_utf8_lossy(&response).contains("again"));

        server.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_aborts_startup_and_stays_stopped() {
        // Occupy a port so the server's bind fails.
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let server = Server::default();
        server.add_binding_address(&format!("http://127.0.0.1:{port}/"));

        let result = server.start().await;
        assert!(matches!(result, Err(Error::Bind { .. })));
        assert!(!server.is_running());
        assert!(server.local_addrs().is_empty());
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let server = Server::default();
        server.add_binding_address("ftp://127.0.0.1:21/");

        let result = server.start().await;
        assert!(matches!(result, Err(Error::InvalidBindingAddress { .. })));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");

        server.stop().await; // never started
        assert!(!server.is_running());

        server.start().await.unwrap();
        server.stop().await;
        server.stop().await; // second stop is a no-op
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn start_while_running_is_a_noop() {
        let server = Server::default();
        server.add_binding_address("http://127.0.0.1:0/");

        server.start().await.unwrap();
        let addrs = server.local_addrs();

        server.start().await.unwrap();
        assert_eq!(server.local_addrs(), addrs);

        server.stop().await;
    }
}
