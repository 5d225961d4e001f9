//! Connection driver (spec.md §4.2): owns one accepted socket end to end —
//! codec, cycle loop, error recovery — independent of every other
//! connection. Grounded on the teacher's `src/server/proto.rs` cycle
//! shape and `original_source/turq/mock.py::MockHandler.handle` for the
//! exact exception-recovery sequence spec.md §7 describes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::server::ServerCodec;
use crate::codec::SideState;
use crate::enums::{Status, Version};
use crate::error::ProtocolError;
use crate::event::{Event, ResponseHead};
use crate::headers::HeaderMap;
use crate::model::Request;
use crate::rules::store::RulesStore;
use crate::rules;

/// Monotonic connection id generator used to tag every log line for one
/// connection (spec.md §5, §9: counter state is process-wide in a single
/// deployment but must be constructor-injected rather than a hidden
/// singleton, so a test can run several independent servers in-process
/// without their connection ids colliding).
#[derive(Default)]
pub struct ConnCounter(AtomicU64);

impl ConnCounter {
    pub fn new() -> ConnCounter {
        ConnCounter(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Drive one accepted socket until the peer closes or a non-persistent
/// cycle ends (spec.md §4.2).
pub async fn serve<S>(io: S, peer: SocketAddr, rules_store: Arc<RulesStore>, conn_id: u64)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    log::info!("conn#{}: new connection from {}", conn_id, peer);
    let mut codec = ServerCodec::new(io);

    loop {
        let head = match codec.receive_event().await {
            Ok(Event::Request(head)) => head,
            Ok(Event::ConnectionClosed) => break,
            Ok(_) => break,
            Err(err) => {
                log::warn!("conn#{}: error: {}", conn_id, err);
                send_protocol_error(&mut codec, &err).await;
                break;
            }
        };

        log::info!("conn#{}: > {} {} {}", conn_id, head.method, head.target, head.version);
        for (name, value) in head.headers.iter() {
            log::debug!("conn#{}: + {}: {}", conn_id, name, value);
        }

        let request = Request::new(head.method, head.target, head.version, head.headers);
        let program = rules_store.current();

        let outcome = rules::run(request, codec, program, conn_id).await;
        codec = outcome.codec;

        log::info!("conn#{}: < {} {} {}", conn_id, codec.request_version(), outcome.status_code, outcome.reason);

        if !outcome.keep_alive {
            break;
        }
    }

    log::info!("conn#{}: connection closed", conn_id);
}

/// Best-effort error response for a remote protocol error (spec.md §7):
/// send a minimal response using the codec's status hint, then close. If
/// the response side has already started, there is nothing safe left to
/// send — just close.
async fn send_protocol_error<S>(codec: &mut ServerCodec<S>, err: &ProtocolError)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if codec.our != SideState::Idle {
        codec.close();
        return;
    }

    let status_code = err.status_hint();
    let body = format!("Error: {}\n", err).into_bytes();
    let mut headers = HeaderMap::new();
    headers.set("Content-Type", "text/plain; charset=utf-8");
    headers.set("Connection", "close");
    headers.set("Content-Length", body.len().to_string());

    let head = ResponseHead {
        status_code,
        reason: Status::new(status_code).default_reason().to_string(),
        version: Version::Http11,
        headers,
    };

    if codec.send_event(Event::Response(head)).await.is_ok() {
        let _ = codec.send_event(Event::Data(body)).await;
        let _ = codec.send_event(Event::EndOfMessage { trailers: HeaderMap::new() }).await;
    }
    codec.close();
}
