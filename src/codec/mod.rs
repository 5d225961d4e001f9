//! The Framing codec of spec.md §4.1: parses an incoming byte stream into
//! HTTP/1.1 events and serialises outgoing events back to bytes, in two
//! symmetric roles (server, client).

pub mod client;
mod framing;
pub mod server;

/// Per-peer state, per spec.md §4.1: "IDLE → SEND_HEADERS → SEND_BODY →
/// DONE → (start next cycle or CLOSED)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideState {
    Idle,
    SendHeaders,
    SendBody,
    Done,
    Closed,
}

pub(crate) const MAX_HEAD_SIZE: usize = 64 * 1024;
pub(crate) const READ_CHUNK: usize = 8 * 1024;

/// Ceiling on the request-line alone (spec.md §4.1: overlong start-lines
/// are a distinct failure from overlong header blocks, hinting 414 rather
/// than 400).
pub(crate) const MAX_START_LINE_SIZE: usize = 8 * 1024;
