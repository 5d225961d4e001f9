//! Request/Response data model (spec.md §3, §4.6). Grounded on
//! `original_source/turq/rules.py`'s `Request`/`Response` classes for
//! semantics, restructured as plain Rust data types.

use std::collections::BTreeMap;

use crate::enums::Version;
use crate::headers::HeaderMap;

/// One HTTP request, captured at the start of a cycle (spec.md §3).
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub http_version: Version,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub body_drained: bool,
}

impl Request {
    pub fn new(method: String, target: String, http_version: Version, headers: HeaderMap) -> Request {
        let (path, query) = split_target(&target);
        Request {
            method,
            target,
            http_version,
            path,
            query,
            headers,
            body: Vec::new(),
            body_drained: false,
        }
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
        self.body_drained = true;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Parsed JSON body, if Content-Type says so; `None` otherwise or on
    /// parse failure (spec.md §3: "derived views").
    pub fn json(&self) -> Option<serde_json::Value> {
        if !self.content_type()?.to_ascii_lowercase().contains("json") {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Parsed form body: URL-encoded or multipart, dispatched by
    /// Content-Type (spec.md §4.6).
    pub fn form(&self) -> Option<BTreeMap<String, String>> {
        let ct = self.content_type()?.to_ascii_lowercase();
        if ct.starts_with("application/x-www-form-urlencoded") {
            Some(parse_urlencoded(&self.body))
        } else if ct.starts_with("multipart/form-data") {
            let boundary = ct.split("boundary=").nth(1)?.trim_matches('"').to_string();
            Some(parse_multipart(&self.body, &boundary))
        } else {
            None
        }
    }
}

/// Split a raw request-target into its path component and a
/// first-value-per-name query mapping (spec.md §3).
fn split_target(target: &str) -> (String, BTreeMap<String, String>) {
    let (path, query_str) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q)),
        None => (target.to_string(), None),
    };
    let mut query = BTreeMap::new();
    if let Some(q) = query_str {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            query.entry(k.into_owned()).or_insert_with(|| v.into_owned());
        }
    }
    (path, query)
}

fn parse_urlencoded(body: &[u8]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for (k, v) in url::form_urlencoded::parse(body) {
        map.entry(k.into_owned()).or_insert_with(|| v.into_owned());
    }
    map
}

/// Minimal `multipart/form-data` field extractor: collects the text value
/// of each part that has no `filename` (spec.md §4.6 only requires a
/// parsed form view, not file upload handling).
fn parse_multipart(body: &[u8], boundary: &str) -> BTreeMap<String, String> {
    let delim = format!("--{}", boundary);
    let mut fields = BTreeMap::new();
    let text = String::from_utf8_lossy(body);
    for part in text.split(&delim) {
        let part = part.trim_start_matches("\r\n");
        if part.is_empty() || part.starts_with("--") {
            continue;
        }
        let Some((head, value)) = part.split_once("\r\n\r\n") else { continue };
        let Some(name) = extract_header_param(head, "name") else { continue };
        if extract_header_param(head, "filename").is_some() {
            continue;
        }
        let value = value.trim_end_matches("\r\n");
        fields.insert(name, value.to_string());
    }
    fields
}

fn extract_header_param(headers_block: &str, param: &str) -> Option<String> {
    let needle = format!("{}=\"", param);
    let idx = headers_block.find(&needle)? + needle.len();
    let rest = &headers_block[idx..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// The response under construction during a cycle (spec.md §3).
#[derive(Debug, Clone)]
pub struct Response {
    pub http_version: Version,
    pub status_code: u16,
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub use_content_length: bool,
    pub keep_alive: bool,
}

impl Default for Response {
    fn default() -> Response {
        Response {
            http_version: Version::Http11,
            status_code: 200,
            reason: None,
            headers: HeaderMap::new(),
            body: Some(Vec::new()),
            use_content_length: false,
            keep_alive: true,
        }
    }
}

impl Response {
    /// Fill in defaults that must hold once the response is about to be
    /// sent (spec.md §3's Response invariants b/c).
    pub fn finalize(&mut self) {
        if self.reason.is_none() {
            self.reason = Some(crate::enums::Status::new(self.status_code).default_reason().to_string());
        }
        if (200..=499).contains(&self.status_code) && !self.headers.contains("date") {
            #[cfg(feature = "date_header")]
            {
                self.headers.set("Date", httpdate::fmt_http_date(std::time::SystemTime::now()));
            }
        }
        // spec.md §3 Response invariant (a): exactly one of Content-Length
        // or Transfer-Encoding: chunked must appear on a response with a
        // body. `chunk()` sets Transfer-Encoding itself before flushing;
        // otherwise, unless the status/method forbids a body outright,
        // fall back to Content-Length so a plain `body(...)` call (with
        // `use_content_length` left at its default `false`) still yields a
        // correctly-framed response.
        let already_chunked = self
            .headers
            .get_all("transfer-encoding")
            .last()
            .map(|v| crate::headers::is_chunked(v.as_bytes()))
            .unwrap_or(false);
        if !already_chunked && !crate::enums::Status::new(self.status_code).forbids_body(false) {
            if self.use_content_length || !self.headers.contains("content-length") {
                let len = self.body.as_ref().map(|b| b.len()).unwrap_or(0);
                self.headers.set("Content-Length", len.to_string());
            }
        }
        if !self.keep_alive && !self.headers.connection_tokens().iter().any(|t| t == "close") {
            self.headers.add("Connection", "close");
        }
    }
}

/// Build the absolute URL an upstream `Host`/forwarded-for client would
/// see a request target resolve to, per RFC 7230 (bracket IPv6 literals,
/// omit default ports). Used by the forwarding client (spec.md §4.5).
pub fn host_header_value(host: &str, port: u16, tls: bool) -> String {
    let default_port = if tls { 443 } else { 80 };
    let host_part = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    if port == default_port {
        host_part
    } else {
        format!("{}:{}", host_part, port)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_path_and_first_value_query() {
        let (path, query) = split_target("/search?q=a&q=b&x=1");
        assert_eq!(path, "/search");
        assert_eq!(query.get("q"), Some(&"a".to_string()));
        assert_eq!(query.get("x"), Some(&"1".to_string()));
    }

    #[test]
    fn host_header_omits_default_port() {
        assert_eq!(host_header_value("example.com", 443, true), "example.com");
        assert_eq!(host_header_value("example.com", 8443, true), "example.com:8443");
        assert_eq!(host_header_value("::1", 80, false), "[::1]");
    }

    #[test]
    fn finalize_sets_date_and_connection_close() {
        let mut r = Response { keep_alive: false, ..Response::default() };
        r.finalize();
        assert!(r.headers.contains("date"));
        assert_eq!(r.headers.get("connection"), Some("close"));
    }

    #[test]
    fn multipart_extracts_text_fields_only() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\r\nFILE\r\n--B--\r\n";
        let fields = parse_multipart(body, "B");
        assert_eq!(fields.get("a"), Some(&"hello".to_string()));
        assert!(!fields.contains_key("f"));
    }
}
