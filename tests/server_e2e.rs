//! End-to-end socket tests for spec.md §8's concrete scenarios: drive
//! `conn::serve`/`editor::serve` directly over an in-memory duplex pipe
//! instead of a real TCP listener, reading the raw HTTP/1.1 bytes back out
//! with a small hand-rolled client parser.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Notify;

use turq::{conn, editor, Program, RulesStore, DEFAULT_RULES};

const BUF: usize = 64 * 1024;

fn store(rules: &str) -> Arc<RulesStore> {
    Arc::new(RulesStore::new(Program::compile(rules).expect("rules compile")))
}

fn peer() -> std::net::SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

struct RawResponse {
    status: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    trailers: Vec<(String, String)>,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    line.split_once(':').map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
}

async fn fill_more(stream: &mut DuplexStream, buf: &mut Vec<u8>) -> bool {
    let mut tmp = [0u8; 4096];
    match stream.read(&mut tmp).await {
        Ok(0) | Err(_) => false,
        Ok(n) => {
            buf.extend_from_slice(&tmp[..n]);
            true
        }
    }
}

async fn read_until(stream: &mut DuplexStream, buf: &mut Vec<u8>, needle: &[u8]) -> usize {
    loop {
        if let Some(pos) = find(buf, needle) {
            return pos;
        }
        assert!(fill_more(stream, buf).await, "connection closed early");
    }
}

/// Trailer headers follow the zero-size chunk one `\r\n`-terminated line at
/// a time, ending on a blank line (there may be none at all).
async fn read_trailers(stream: &mut DuplexStream, buf: &mut Vec<u8>) -> Vec<(String, String)> {
    let mut trailers = Vec::new();
    loop {
        let line_end = read_until(stream, buf, b"\r\n").await;
        let line: Vec<u8> = buf.drain(..line_end + 2).collect();
        let line = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
        if line.is_empty() {
            return trailers;
        }
        if let Some(pair) = parse_header_line(&line) {
            trailers.push(pair);
        }
    }
}

async fn read_chunked_body(stream: &mut DuplexStream, buf: &mut Vec<u8>) -> (Vec<u8>, Vec<(String, String)>) {
    let mut body = Vec::new();
    loop {
        let line_end = read_until(stream, buf, b"\r\n").await;
        let line: Vec<u8> = buf.drain(..line_end + 2).collect();
        let size_str = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
        let size_hex = size_str.split(';').next().unwrap().trim();
        let size = usize::from_str_radix(size_hex, 16).expect("chunk size");
        if size == 0 {
            let trailers = read_trailers(stream, buf).await;
            return (body, trailers);
        }
        while buf.len() < size + 2 {
            assert!(fill_more(stream, buf).await, "connection closed mid chunk");
        }
        body.extend_from_slice(&buf[..size]);
        buf.drain(..size + 2);
    }
}

/// Read one HTTP response off `stream`, using `buf` as a carry-over buffer
/// so bytes belonging to the next pipelined response aren't lost. `is_head`
/// must be set for responses to a HEAD request: the status line may still
/// carry a Content-Length, but no body bytes actually follow it.
async fn next_message(stream: &mut DuplexStream, buf: &mut Vec<u8>, is_head: bool) -> RawResponse {
    let head_end = read_until(stream, buf, b"\r\n\r\n").await;
    let head_bytes: Vec<u8> = buf.drain(..head_end + 4).collect();
    let head_str = String::from_utf8_lossy(&head_bytes[..head_bytes.len() - 4]).into_owned();
    let mut lines = head_str.split("\r\n");
    let status_line = lines.next().expect("status line");
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next().expect("version token");
    let status: u16 = parts.next().expect("status code").parse().expect("numeric status code");
    let reason = parts.next().unwrap_or("").to_string();
    let headers: Vec<(String, String)> = lines.filter_map(parse_header_line).collect();

    if is_head || (100..200).contains(&status) || status == 204 || status == 304 {
        return RawResponse { status, reason, headers, body: Vec::new(), trailers: Vec::new() };
    }

    let chunked = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("transfer-encoding"))
        .map(|(_, v)| v.eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    if chunked {
        let (body, trailers) = read_chunked_body(stream, buf).await;
        RawResponse { status, reason, headers, body, trailers }
    } else if let Some(len) =
        headers.iter().find(|(n, _)| n.eq_ignore_ascii_case("content-length")).and_then(|(_, v)| v.parse::<usize>().ok())
    {
        while buf.len() < len {
            assert!(fill_more(stream, buf).await, "connection closed mid body");
        }
        let body: Vec<u8> = buf.drain(..len).collect();
        RawResponse { status, reason, headers, body, trailers: Vec::new() }
    } else {
        RawResponse { status, reason, headers, body: Vec::new(), trailers: Vec::new() }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn default_rules_return_404() {
    let rules_store = store(DEFAULT_RULES);
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 404);
    assert!(String::from_utf8_lossy(&resp.body).contains("Error!"));
    assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_ne!(resp.header("connection"), Some("close"));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_script_sets_code_and_leaves_body_empty() {
    let rules_store = store("status(403);\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET /foo HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 403);
    assert!(resp.body.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn header_and_body_round_trip() {
    let rules_store = store("header(\"X-Foo\", \"bar\");\nbody(\"hello world\");\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("X-Foo")).count(), 1);
    assert_eq!(resp.header("x-foo"), Some("bar"));
    assert_eq!(resp.body, b"hello world");
}

#[tokio::test(flavor = "multi_thread")]
async fn pipelined_requests_answered_in_order() {
    let rules_store = store("text(\"Hi\");\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    let request = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
    client.write_all(request).await.unwrap();
    client.write_all(request).await.unwrap();
    client.write_all(request).await.unwrap();

    let mut buf = Vec::new();
    for _ in 0..3 {
        let resp = next_message(&mut client, &mut buf, false).await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"Hi");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn expect_100_continue_precedes_the_final_response() {
    let rules_store = store("interim(|| status(100));\nbody(\"ok\");\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 14\r\n\r\n").await.unwrap();

    let mut buf = Vec::new();
    let informational = next_message(&mut client, &mut buf, false).await;
    assert_eq!(informational.status, 100);
    assert_eq!(informational.reason, "Continue");
    assert!(informational.headers.is_empty());

    client.write_all(b"Hello world!\r\n").await.unwrap();

    let final_resp = next_message(&mut client, &mut buf, false).await;
    assert_eq!(final_resp.status, 200);
    assert_eq!(final_resp.body, b"ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn chunked_streaming_with_trailer() {
    let rules_store =
        store("status(200);\nchunk(\"Hello \");\nchunk(\"world!\");\nadd_header(\"X-Trailer\", \"done\");\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("transfer-encoding"), Some("chunked"));
    assert!(resp.header("content-length").is_none());
    assert_eq!(resp.body, b"Hello world!");
    assert_eq!(resp.trailers, vec![("X-Trailer".to_string(), "done".to_string())]);
}

#[tokio::test(flavor = "multi_thread")]
async fn head_request_suppresses_the_body() {
    let rules_store = store("text(\"Hello\");\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"HEAD / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, true).await;

    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
    assert!(resp.body.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn hot_reload_affects_the_next_cycle_on_an_already_open_connection() {
    let rules_store = store(DEFAULT_RULES);
    let (mut main_client, main_server_io) = tokio::io::duplex(BUF);
    let _main_handle = tokio::spawn(conn::serve(main_server_io, peer(), rules_store.clone(), 1));

    main_client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut main_buf = Vec::new();
    let first = next_message(&mut main_client, &mut main_buf, false).await;
    assert_eq!(first.status, 404);

    let (mut editor_client, editor_server_io) = tokio::io::duplex(BUF);
    let shutdown = Arc::new(Notify::new());
    let _editor_handle =
        tokio::spawn(editor::serve(editor_server_io, peer(), rules_store.clone(), None, shutdown, 2));

    let new_rules = "text(\"Hi there!\");\n";
    let form_body = url::form_urlencoded::Serializer::new(String::new()).append_pair("rules", new_rules).finish();
    let request = format!(
        "POST /editor HTTP/1.1\r\nHost: x\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{}",
        form_body.len(),
        form_body
    );
    editor_client.write_all(request.as_bytes()).await.unwrap();
    let mut editor_buf = Vec::new();
    let install_resp = next_message(&mut editor_client, &mut editor_buf, false).await;
    assert_eq!(install_resp.status, 303);
    assert_eq!(install_resp.header("location"), Some("/editor"));

    main_client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let second = next_message(&mut main_client, &mut main_buf, false).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body, b"Hi there!");
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_framing_without_a_host_header_yields_400() {
    let rules_store = store(DEFAULT_RULES);
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"POST / HTTP/1.1\r\nContent-Length: 9001\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 400);
    assert_eq!(resp.header("content-type"), Some("text/plain; charset=utf-8"));
    assert!(String::from_utf8_lossy(&resp.body).starts_with("Error:"));
}

#[tokio::test(flavor = "multi_thread")]
async fn editor_static_rejects_path_traversal() {
    let rules_store = store(DEFAULT_RULES);
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let shutdown = Arc::new(Notify::new());
    let _handle = tokio::spawn(editor::serve(server_io, peer(), rules_store, None, shutdown, 1));

    client.write_all(b"GET /static/../../etc/passwd HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_rules_script_defaults_to_200_and_keeps_the_connection_alive() {
    let rules_store = store("");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let mut buf = Vec::new();
    let resp = next_message(&mut client, &mut buf, false).await;

    assert_eq!(resp.status, 200);
    assert!(resp.body.is_empty());
    assert!(resp.header("date").is_some());
    assert_ne!(resp.header("connection"), Some("close"));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let second = next_message(&mut client, &mut buf, false).await;
    assert_eq!(second.status, 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn flush_called_twice_emits_the_response_once() {
    let rules_store = store("body(\"ab\");\nflush();\nflush();\n");
    let (mut client, server_io) = tokio::io::duplex(BUF);
    let _handle = tokio::spawn(conn::serve(server_io, peer(), rules_store, 1));

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

    let mut buf = Vec::new();
    let first = next_message(&mut client, &mut buf, false).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.body, b"ab");

    let second = next_message(&mut client, &mut buf, false).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.body, b"ab");
}
