//! The scripting surface itself (spec.md §4.3): every native function a
//! rules script may call, registered on a fresh `rhai::Engine` for each
//! cycle and closing over the cycle's shared state.
//!
//! Two bridging rules apply throughout this file:
//! - mutating the in-progress `Response`/`Request` only ever touches the
//!   `std::sync::Mutex` in `CycleState`, never while awaiting;
//! - anything that performs socket I/O (flush, chunk, interim, send_raw,
//!   forward, sleep, lazy body access) locks the codec's `tokio::sync::
//!   Mutex` inside `block_in_place` + `Handle::block_on`, the documented
//!   way to call async code from sync code on a multi-thread runtime.

use std::io::Write as _;
use std::sync::Arc;

use rhai::{Blob, Dynamic, Engine, EvalAltResult, FnPtr, Map, NativeCallContext};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::enums::{Status, Version};
use crate::event::{Event, InformationalHead, ResponseHead};
use crate::headers::HeaderMap;
use crate::rules::engine::{self, SharedCycle};
use crate::rules::html::HtmlBuilder;

type RhaiResult<T> = Result<T, Box<EvalAltResult>>;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}

fn rt_err(msg: impl std::fmt::Display) -> Box<EvalAltResult> {
    msg.to_string().into()
}

/// Drain the request body off the codec if it hasn't been already,
/// recording it on the shared `Request` so later accesses are free
/// (spec.md §9, "Lazy request body").
pub(crate) async fn drain_body<S>(shared: &Arc<SharedCycle<S>>) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    {
        let st = shared.state.lock().expect("cycle state lock poisoned");
        if st.request.body_drained {
            return st.request.body.clone();
        }
    }
    let mut collected = Vec::new();
    {
        let mut codec = shared.codec.lock().await;
        loop {
            match codec.receive_event().await {
                Ok(Event::Data(bytes)) => collected.extend_from_slice(&bytes),
                Ok(Event::EndOfMessage { .. }) | Ok(Event::ConnectionClosed) => break,
                Ok(_) => break,
                Err(err) => {
                    log::warn!("conn#{}: error draining request body: {}", shared.conn_id, err);
                    break;
                }
            }
        }
    }
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    st.request.set_body(collected.clone());
    collected
}

fn drain_body_sync<S>(shared: &Arc<SharedCycle<S>>) -> Vec<u8>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    block_on(drain_body(shared))
}

/// A lightweight handle bound to the script's `request` variable. Plain
/// fields (method, path, ...) are snapshotted; `body`/`json`/`form` pull
/// the body off the codec lazily, on first access.
#[derive(Clone)]
pub struct RequestHandle<S> {
    shared: Arc<SharedCycle<S>>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> RequestHandle<S> {
    pub(crate) fn for_cycle(shared: Arc<SharedCycle<S>>) -> RequestHandle<S> {
        RequestHandle { shared }
    }

    fn method(&mut self) -> String {
        self.shared.state.lock().expect("cycle state lock poisoned").request.method.clone()
    }
    fn target(&mut self) -> String {
        self.shared.state.lock().expect("cycle state lock poisoned").request.target.clone()
    }
    fn path(&mut self) -> String {
        self.shared.state.lock().expect("cycle state lock poisoned").request.path.clone()
    }
    fn http_version(&mut self) -> String {
        self.shared
            .state
            .lock()
            .expect("cycle state lock poisoned")
            .request
            .http_version
            .as_str()
            .to_string()
    }
    fn query(&mut self) -> Map {
        self.shared
            .state
            .lock()
            .expect("cycle state lock poisoned")
            .request
            .query
            .iter()
            .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
            .collect()
    }
    fn headers(&mut self) -> Map {
        let st = self.shared.state.lock().expect("cycle state lock poisoned");
        let mut map = Map::new();
        for (name, value) in st.request.headers.iter() {
            map.insert(name.into(), Dynamic::from(value.to_string()));
        }
        map
    }
    fn body(&mut self) -> Blob {
        drain_body_sync(&self.shared).into()
    }
    fn json(&mut self) -> Dynamic {
        drain_body_sync(&self.shared);
        let st = self.shared.state.lock().expect("cycle state lock poisoned");
        match st.request.json() {
            Some(v) => json_to_dynamic(v),
            None => Dynamic::UNIT,
        }
    }
    fn form(&mut self) -> Map {
        drain_body_sync(&self.shared);
        let st = self.shared.state.lock().expect("cycle state lock poisoned");
        st.request
            .form()
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.into(), Dynamic::from(v)))
            .collect()
    }
}

fn json_to_dynamic(v: serde_json::Value) -> Dynamic {
    rhai::serde::to_dynamic(&v).unwrap_or(Dynamic::UNIT)
}

/// Register every capability named in spec.md §4.3 onto `engine`, closing
/// over `shared`.
pub(crate) fn register<S>(engine: &mut Engine, shared: Arc<SharedCycle<S>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    engine.register_type_with_name::<RequestHandle<S>>("Request");

    engine.register_type_with_name::<HtmlBuilder>("HtmlBuilder");
    engine.register_fn("el", HtmlBuilder::el);
    engine.register_fn("child", HtmlBuilder::child);
    engine.register_fn("text", HtmlBuilder::text);
    engine.register_get("method", RequestHandle::<S>::method);
    engine.register_get("target", RequestHandle::<S>::target);
    engine.register_get("path", RequestHandle::<S>::path);
    engine.register_get("http_version", RequestHandle::<S>::http_version);
    engine.register_get("query", RequestHandle::<S>::query);
    engine.register_get("headers", RequestHandle::<S>::headers);
    engine.register_get("body", RequestHandle::<S>::body);
    engine.register_get("json", RequestHandle::<S>::json);
    engine.register_get("form", RequestHandle::<S>::form);

    {
        let shared = shared.clone();
        engine.register_fn("status", move |code: i64| status(&shared, code, None));
    }
    {
        let shared = shared.clone();
        engine.register_fn("status", move |code: i64, reason: &str| status(&shared, code, Some(reason.to_string())));
    }
    {
        let shared = shared.clone();
        engine.register_fn("header", move |name: &str, value: &str| {
            let mut st = shared.state.lock().expect("cycle state lock poisoned");
            if st.headers_flushed {
                st.trailers.set(name, value);
            } else {
                st.response.headers.set(name, value);
            }
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("add_header", move |name: &str, value: &str| {
            let mut st = shared.state.lock().expect("cycle state lock poisoned");
            if st.headers_flushed {
                st.trailers.add(name, value);
            } else {
                st.response.headers.add(name, value);
            }
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("delete_header", move |name: &str| {
            let mut st = shared.state.lock().expect("cycle state lock poisoned");
            if st.headers_flushed {
                st.trailers.delete(name);
            } else {
                st.response.headers.delete(name);
            }
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("body", move |data: &str| {
            shared.state.lock().expect("cycle state lock poisoned").response.body = Some(data.as_bytes().to_vec());
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("body", move |data: Blob| {
            shared.state.lock().expect("cycle state lock poisoned").response.body = Some(data);
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("framing", move |use_content_length: bool| {
            shared.state.lock().expect("cycle state lock poisoned").response.use_content_length = use_content_length;
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("framing", move |use_content_length: bool, keep_alive: bool| {
            let mut st = shared.state.lock().expect("cycle state lock poisoned");
            st.response.use_content_length = use_content_length;
            st.response.keep_alive = keep_alive;
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("text", move |s: &str| {
            let mut st = shared.state.lock().expect("cycle state lock poisoned");
            st.response.headers.set("Content-Type", "text/plain; charset=utf-8");
            st.response.body = Some(s.as_bytes().to_vec());
            st.response.use_content_length = true;
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("json", move |value: Dynamic| response_json(&shared, value, false));
    }
    {
        let shared = shared.clone();
        engine.register_fn("json", move |value: Dynamic, jsonp: bool| response_json(&shared, value, jsonp));
    }
    {
        let shared = shared.clone();
        engine.register_fn("html", move || html_builder(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("redirect", move |location: &str| redirect(&shared, location, 302));
    }
    {
        let shared = shared.clone();
        engine.register_fn("redirect", move |location: &str, code: i64| redirect(&shared, location, code as u16));
    }
    {
        let shared = shared.clone();
        engine.register_fn("error", move |code: i64| error_page(&shared, code as u16));
    }
    {
        let shared = shared.clone();
        engine.register_fn("gzip", move || gzip(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("flush", move || flush(&shared, true));
    }
    {
        let shared = shared.clone();
        engine.register_fn("flush", move |send_body: bool| flush(&shared, send_body));
    }
    {
        let shared = shared.clone();
        engine.register_fn("chunk", move |data: &str| chunk(&shared, data.as_bytes().to_vec()));
    }
    {
        let shared = shared.clone();
        engine.register_fn("chunk", move |data: Blob| chunk(&shared, data));
    }
    {
        let shared = shared.clone();
        engine.register_fn("send_raw", move |data: &str| send_raw(&shared, data.as_bytes().to_vec()));
    }
    {
        let shared = shared.clone();
        engine.register_fn(
            "interim",
            move |context: NativeCallContext, callback: FnPtr| interim(&shared, context, callback),
        );
    }
    {
        let shared = shared.clone();
        engine.register_fn("route", move |pattern: &str| route(&shared, pattern));
    }
    {
        let shared = shared.clone();
        engine.register_fn("param", move |name: &str| {
            shared
                .state
                .lock()
                .expect("cycle state lock poisoned")
                .route_captures
                .get(name)
                .cloned()
                .unwrap_or_default()
        });
    }
    engine.register_fn("maybe", |p: f64| engine::maybe(p));
    {
        let shared = shared.clone();
        engine.register_fn("basic_auth", move || basic_auth(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("digest_auth", move || digest_auth(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("bearer_auth", move || bearer_auth(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("cors", move || cors(&shared));
    }
    {
        let shared = shared.clone();
        engine.register_fn("forward", move |host: &str, port: i64, target: &str| {
            forward(&shared, host, port as u16, target, None)
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("forward", move |host: &str, port: i64, target: &str, tls: bool| {
            forward(&shared, host, port as u16, target, Some(tls))
        });
    }
    {
        let shared = shared.clone();
        engine.register_fn("debug", move || {
            let st = shared.state.lock().expect("cycle state lock poisoned");
            // spec.md §4.3: "raise the connection logger to DEBUG and
            // replay the request headers into the log" — there is no
            // per-connection logger to raise here, only the process-wide
            // `log` facade, so emit at `info` instead of `debug` to make
            // the replay actually visible without requiring the operator
            // to already have `RUST_LOG=debug` set.
            log::info!("conn#{}: debug(): request headers follow", shared.conn_id);
            for (name, value) in st.request.headers.iter() {
                log::info!("conn#{}: + {}: {}", shared.conn_id, name, value);
            }
        });
    }
    engine.register_fn("sleep", |seconds: f64| {
        block_on(async move {
            tokio::time::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0))).await;
        });
    });

    // KNOWN_METHODS boolean flags and bare re-exports live in the Scope
    // (rules::engine::build_scope), not here — they are values, not
    // capabilities.
}

fn status<S>(shared: &Arc<SharedCycle<S>>, code: i64, reason: Option<String>) {
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    st.response.status_code = code as u16;
    st.response.reason = reason;
}

fn response_json<S>(shared: &Arc<SharedCycle<S>>, value: Dynamic, jsonp: bool)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let json_value = rhai::serde::from_dynamic::<serde_json::Value>(&value).unwrap_or(serde_json::Value::Null);
    let text = serde_json::to_string(&json_value).unwrap_or_else(|_| "null".to_string());
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    if jsonp {
        let callback = st
            .request
            .query
            .get("callback")
            .cloned()
            .unwrap_or_else(|| "callback".to_string());
        st.response.headers.set("Content-Type", "application/javascript; charset=utf-8");
        st.response.body = Some(format!("{}({});", callback, text).into_bytes());
    } else {
        st.response.headers.set("Content-Type", "application/json; charset=utf-8");
        st.response.body = Some(text.into_bytes());
    }
    st.response.use_content_length = true;
}

fn html_builder<S>(shared: &Arc<SharedCycle<S>>) -> HtmlBuilder
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let shared = shared.clone();
    HtmlBuilder::new(Arc::new(move |rendered: String| {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        st.response.headers.set("Content-Type", "text/html; charset=utf-8");
        st.response.body = Some(rendered.into_bytes());
        st.response.use_content_length = true;
    }))
}

fn redirect<S>(shared: &Arc<SharedCycle<S>>, location: &str, code: u16) {
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    st.response.status_code = code;
    st.response.headers.set("Location", location);
    st.response.body = Some(Vec::new());
    st.response.use_content_length = true;
}

fn error_page<S>(shared: &Arc<SharedCycle<S>>, code: u16) {
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    st.response.status_code = code;
    st.response.headers.set("Content-Type", "text/plain; charset=utf-8");
    st.response.body = Some(format!("Error! {}\n", Status::new(code).default_reason()).into_bytes());
    st.response.use_content_length = true;
}

fn gzip<S>(shared: &Arc<SharedCycle<S>>) {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    let original = st.response.body.take().unwrap_or_default();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(&original).is_ok() {
        if let Ok(compressed) = encoder.finish() {
            st.response.body = Some(compressed);
            st.response.headers.set("Content-Encoding", "gzip");
            st.response.use_content_length = true;
        }
    }
}

/// Whether the response currently under construction may carry a body on
/// the wire (spec.md §4.1: 1xx/204/304 and HEAD never do).
fn body_allowed<S>(shared: &Arc<SharedCycle<S>>) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let st = shared.state.lock().expect("cycle state lock poisoned");
    let is_head = st.request.method.eq_ignore_ascii_case("HEAD");
    !Status::new(st.response.status_code).forbids_body(is_head)
}

/// Force the response headers (and optionally the body) to be written
/// immediately (spec.md §4.3 `flush`).
fn flush<S>(shared: &Arc<SharedCycle<S>>, send_body: bool) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let already_allowed = body_allowed(shared);
    let (head, body) = {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        if st.headers_flushed {
            return Ok(());
        }
        st.response.finalize();
        let head = ResponseHead {
            status_code: st.response.status_code,
            reason: st.response.reason.clone().unwrap_or_default(),
            version: st.response.http_version,
            headers: st.response.headers.take(),
        };
        st.headers_flushed = true;
        let body = if send_body && already_allowed { st.response.body.take() } else { None };
        (head, body)
    };
    block_on(async {
        let mut codec = shared.codec.lock().await;
        codec.send_event(Event::Response(head)).await.map_err(rt_err)?;
        if let Some(data) = body {
            if !data.is_empty() {
                codec.send_event(Event::Data(data)).await.map_err(rt_err)?;
            }
        }
        Ok(())
    })
}

/// Flush headers if needed, then emit one data chunk (spec.md §4.3
/// `chunk`): HEAD responses silently drop the bytes but still flush.
fn chunk<S>(shared: &Arc<SharedCycle<S>>, data: Vec<u8>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        // spec.md §4.1: "the codec chooses chunked encoding when the script
        // streams (calls chunk()) and no Content-Length is set". Only needs
        // doing once, before headers are flushed for the first time.
        if !st.headers_flushed && !st.response.headers.contains("content-length") {
            st.response.headers.set("Transfer-Encoding", "chunked");
        }
    }
    flush(shared, false)?;
    if !body_allowed(shared) {
        return Ok(());
    }
    block_on(async {
        let mut codec = shared.codec.lock().await;
        codec.send_event(Event::Data(data)).await.map_err(rt_err)
    })
}

fn send_raw<S>(shared: &Arc<SharedCycle<S>>, data: Vec<u8>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    st.headers_flushed = true;
    drop(st);
    block_on(async {
        let mut codec = shared.codec.lock().await;
        codec.send_raw(&data).await.map_err(rt_err)
    })
}

/// Scoped acquisition of a temporary response for a 1xx informational
/// reply (spec.md §4.3 `interim`, §9 "Scoped interim response"): the
/// current Response is swapped out, `callback` runs against the
/// temporary one, then whatever it built is emitted as an
/// InformationalResponse and the original Response is restored — even if
/// `callback` exits via error propagation.
fn interim<S>(shared: &Arc<SharedCycle<S>>, context: NativeCallContext, callback: FnPtr) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let saved = {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        std::mem::replace(&mut st.response, crate::model::Response::default())
    };
    let call_result = callback.call_within_context::<()>(&context, ());

    let informational = {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        let temp = std::mem::replace(&mut st.response, saved);
        let reason = temp
            .reason
            .clone()
            .unwrap_or_else(|| Status::new(temp.status_code).default_reason().to_string());
        InformationalHead {
            status_code: temp.status_code,
            reason,
            version: temp.http_version,
            headers: temp.headers,
        }
    };
    block_on(async {
        let mut codec = shared.codec.lock().await;
        codec.send_event(Event::InformationalResponse(informational)).await.map_err(rt_err)
    })?;
    call_result
}

/// `route(pattern)`: match the current path against `pattern`, where
/// `:name` segments bind into `param(name)` on success (spec.md §4.3).
fn route<S>(shared: &Arc<SharedCycle<S>>, pattern: &str) -> bool {
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    let path_segments: Vec<&str> = st.request.path.trim_matches('/').split('/').collect();
    let pattern_segments: Vec<&str> = pattern.trim_matches('/').split('/').collect();
    if path_segments.len() != pattern_segments.len() {
        return false;
    }
    let mut captures = std::collections::BTreeMap::new();
    for (seg, pat) in path_segments.iter().zip(pattern_segments.iter()) {
        if let Some(name) = pat.strip_prefix(':') {
            captures.insert(name.to_string(), seg.to_string());
        } else if seg != pat {
            return false;
        }
    }
    st.route_captures = captures;
    true
}

fn auth_challenge<S>(shared: &Arc<SharedCycle<S>>, scheme: &str, header: &str) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let matches = {
        let st = shared.state.lock().expect("cycle state lock poisoned");
        st.request
            .headers
            .get("authorization")
            .map(|v| v.trim_start().to_ascii_lowercase().starts_with(&scheme.to_ascii_lowercase()))
            .unwrap_or(false)
    };
    if matches {
        return Ok(());
    }
    {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        st.response.status_code = 401;
        st.response.headers.set("WWW-Authenticate", header);
        st.response.headers.set("Content-Type", "text/plain; charset=utf-8");
        st.response.body = Some(b"Unauthorized\n".to_vec());
        st.response.use_content_length = true;
    }
    Err(engine::abort_err())
}

fn basic_auth<S>(shared: &Arc<SharedCycle<S>>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    auth_challenge(shared, "basic", "Basic realm=\"turq\"")
}

fn digest_auth<S>(shared: &Arc<SharedCycle<S>>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    auth_challenge(shared, "digest", "Digest realm=\"turq\", qop=\"auth\", nonce=\"0\"")
}

fn bearer_auth<S>(shared: &Arc<SharedCycle<S>>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    auth_challenge(shared, "bearer", "Bearer realm=\"turq\"")
}

/// `cors()` (spec.md §4.3): full preflight answer on OPTIONS+Origin,
/// otherwise just the access-control headers.
fn cors<S>(shared: &Arc<SharedCycle<S>>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut st = shared.state.lock().expect("cycle state lock poisoned");
    let origin = st.request.headers.get("origin").map(|s| s.to_string());
    let is_preflight = st.request.method.eq_ignore_ascii_case("OPTIONS") && origin.is_some();
    let origin_value = origin.unwrap_or_else(|| "*".to_string());

    if is_preflight {
        st.response.status_code = 204;
        st.response.headers.set("Access-Control-Allow-Origin", origin_value);
        st.response.headers.set("Access-Control-Allow-Credentials", "true");
        st.response.headers.set("Access-Control-Allow-Methods", "GET, POST, PUT, PATCH, DELETE, OPTIONS");
        st.response.headers.set("Access-Control-Allow-Headers", "*");
        st.response.headers.add("Vary", "Origin");
        st.response.body = Some(Vec::new());
        st.response.use_content_length = true;
        drop(st);
        return Err(engine::abort_err());
    }

    st.response.headers.set("Access-Control-Allow-Origin", origin_value);
    st.response.headers.set("Access-Control-Allow-Credentials", "true");
    st.response.headers.add("Vary", "Origin");
    Ok(())
}

/// `forward(host, port, target, tls=None)` (spec.md §4.3, §4.5).
fn forward<S>(shared: &Arc<SharedCycle<S>>, host: &str, port: u16, target: &str, tls: Option<bool>) -> RhaiResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    drain_body_sync(shared);
    let tls = tls.unwrap_or(port == 443);
    let request = shared.state.lock().expect("cycle state lock poisoned").request.clone();
    let result = block_on(crate::forward::forward(&request, host, port, target, tls));
    match result {
        Ok(response) => {
            shared.state.lock().expect("cycle state lock poisoned").response = response;
            Ok(())
        }
        Err(err) => Err(rt_err(format!("forward to {}:{} failed: {}", host, port, err))),
    }
}
