//! Rules engine (spec.md §4.3): runs one compiled program against one
//! request/response cycle, bridging rhai's synchronous evaluation onto
//! the connection's async socket I/O with `block_in_place` +
//! `Handle::block_on`, the pattern tokio documents for calling async code
//! from sync code on a multi-thread runtime.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as TokioMutex;

use crate::codec::server::ServerCodec;
use crate::headers::HeaderMap;
use crate::model::{Request, Response};
use crate::rules::capabilities;
use crate::rules::store::Program;
use crate::rules::KNOWN_METHODS;

/// Internal marker for the "skip remaining rules" control signal used by
/// `basic_auth`/`digest_auth`/`bearer_auth`/`cors` (spec.md §4.3: "not an
/// error"). Carried as a rhai runtime error because rhai has no other
/// non-local exit, then filtered back out before it reaches the log.
pub(crate) fn abort_err() -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime("turq:skip-remaining-rules".into(), rhai::Position::NONE))
}

fn is_abort_signal(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorRuntime(v, _) => {
            v.clone().into_immutable_string().map(|s| s.as_str() == "turq:skip-remaining-rules").unwrap_or(false)
        }
        _ => false,
    }
}

/// Process-wide PRNG behind `maybe()` (spec.md §5).
fn process_rng() -> &'static StdMutex<StdRng> {
    static RNG: OnceLock<StdMutex<StdRng>> = OnceLock::new();
    RNG.get_or_init(|| StdMutex::new(StdRng::from_entropy()))
}

pub(crate) fn maybe(p: f64) -> bool {
    process_rng().lock().expect("rng lock poisoned").gen::<f64>() < p
}

/// Mutable state for one cycle. Plain `std::sync::Mutex` is enough: it is
/// never held across an `.await` (spec.md §5 forbids cross-cycle
/// suspension anyway, so this lock never contends).
pub(crate) struct CycleState {
    pub request: Request,
    pub response: Response,
    pub headers_flushed: bool,
    pub trailers: HeaderMap,
    pub route_captures: BTreeMap<String, String>,
}

/// Everything one running script needs, shared with the capability
/// closures registered on its engine.
pub(crate) struct SharedCycle<S> {
    pub state: StdMutex<CycleState>,
    pub codec: TokioMutex<ServerCodec<S>>,
    pub conn_id: u64,
}

/// What the connection driver does with the codec after a cycle
/// completes, plus enough of the response to log it (spec.md §6's
/// "one line per response").
pub struct CycleOutcome<S> {
    pub codec: ServerCodec<S>,
    pub keep_alive: bool,
    pub status_code: u16,
    pub reason: String,
}

fn build_scope<S>(shared: &Arc<SharedCycle<S>>, scope: &mut Scope)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let st = shared.state.lock().expect("cycle state lock poisoned");
    let method = st.request.method.clone();
    scope.push("method", method.clone());
    scope.push("path", st.request.path.clone());
    scope.push("target", st.request.target.clone());
    drop(st);

    scope.push("request", capabilities::RequestHandle::for_cycle(shared.clone()));

    for known in KNOWN_METHODS {
        scope.push(known.to_ascii_uppercase(), method.eq_ignore_ascii_case(known));
    }
}

/// Runs `program` against `request`, driving `codec` for every effect the
/// script performs, and returns the codec plus whether the connection
/// should continue to another cycle (spec.md §4.2, §4.3).
pub async fn run<S>(request: Request, codec: ServerCodec<S>, program: Arc<Program>, conn_id: u64) -> CycleOutcome<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let is_head = request.method.eq_ignore_ascii_case("HEAD");

    let shared = Arc::new(SharedCycle {
        state: StdMutex::new(CycleState {
            request,
            response: Response::default(),
            headers_flushed: false,
            trailers: HeaderMap::new(),
            route_captures: BTreeMap::new(),
        }),
        codec: TokioMutex::new(codec),
        conn_id,
    });

    let mut engine = Engine::new();
    let mut scope = Scope::new();
    build_scope(&shared, &mut scope);
    capabilities::register(&mut engine, shared.clone());

    let eval_result =
        tokio::task::block_in_place(|| engine.eval_ast_with_scope::<Dynamic>(&mut scope, &program.ast));
    drop(engine);
    drop(scope);

    match eval_result {
        Ok(_) => {}
        Err(err) if is_abort_signal(&err) => {}
        Err(err) => {
            let headers_flushed = shared.state.lock().expect("cycle state lock poisoned").headers_flushed;
            if !headers_flushed {
                log::error!("conn#{}: rules runtime error: {}", conn_id, err);
                let mut st = shared.state.lock().expect("cycle state lock poisoned");
                st.response = Response {
                    status_code: 500,
                    body: Some(format!("Error: {}\n", err).into_bytes()),
                    keep_alive: false,
                    use_content_length: true,
                    ..Response::default()
                };
            } else {
                log::error!("conn#{}: rules runtime error after headers sent, closing: {}", conn_id, err);
                let mut codec = shared.codec.lock().await;
                codec.close();
                drop(codec);
                let status_code = shared.state.lock().expect("cycle state lock poisoned").response.status_code;
                let shared = Arc::try_unwrap(shared).unwrap_or_else(|_| panic!("cycle outlived its script"));
                return CycleOutcome {
                    codec: shared.codec.into_inner(),
                    keep_alive: false,
                    status_code,
                    reason: String::new(),
                };
            }
        }
    }

    finalize(&shared, is_head).await;

    let (status_code, reason) = {
        let st = shared.state.lock().expect("cycle state lock poisoned");
        (st.response.status_code, st.response.reason.clone().unwrap_or_default())
    };

    let shared = Arc::try_unwrap(shared).unwrap_or_else(|_| panic!("cycle outlived its script"));
    let mut codec = shared.codec.into_inner();
    let keep_alive = codec.keep_alive_negotiated();
    if keep_alive {
        codec.start_next_cycle();
    } else {
        codec.close();
    }
    CycleOutcome { codec, keep_alive, status_code, reason }
}

/// Finalisation order after the script returns (spec.md §4.2 step e, §4.3
/// "Finalisation order"): drain any unread request body, flush headers if
/// not done, emit the pending body unless HEAD, emit EndOfMessage with
/// trailers.
async fn finalize<S>(shared: &Arc<SharedCycle<S>>, is_head: bool)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    capabilities::drain_body(shared).await;

    let head_and_body = {
        let mut st = shared.state.lock().expect("cycle state lock poisoned");
        if st.headers_flushed {
            None
        } else {
            st.response.finalize();
            let head = crate::event::ResponseHead {
                status_code: st.response.status_code,
                reason: st.response.reason.clone().unwrap_or_default(),
                version: st.response.http_version,
                headers: st.response.headers.take(),
            };
            st.headers_flushed = true;
            let body = if is_head { None } else { st.response.body.take() };
            Some((head, body))
        }
    };

    let mut codec = shared.codec.lock().await;

    if let Some((head, body)) = head_and_body {
        if let Err(err) = codec.send_event(crate::event::Event::Response(head)).await {
            log::warn!("conn#{}: error flushing response: {}", shared.conn_id, err);
            codec.close();
            return;
        }
        if let Some(data) = body {
            if !data.is_empty() {
                if let Err(err) = codec.send_event(crate::event::Event::Data(data)).await {
                    log::warn!("conn#{}: error writing response body: {}", shared.conn_id, err);
                    codec.close();
                    return;
                }
            }
        }
    }

    let trailers = std::mem::take(&mut shared.state.lock().expect("cycle state lock poisoned").trailers);
    if let Err(err) = codec.send_event(crate::event::Event::EndOfMessage { trailers }).await {
        log::warn!("conn#{}: error finishing response: {}", shared.conn_id, err);
        codec.close();
    }
}
