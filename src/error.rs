//! Typed errors for the framing codec (spec.md §4.1's failure model) and
//! a small set of higher-level errors for pieces that aren't codec
//! internals (the rules engine, the rules store, forwarding).

use std::io;

quick_error::quick_error! {
    /// An error produced while parsing bytes off the wire, with enough
    /// information for the connection driver to emit a best-effort error
    /// response (spec.md §4.1, §7: "Remote protocol error").
    #[derive(Debug)]
    pub enum ProtocolError {
        Io(err: io::Error) {
            display("I/O error: {}", err)
            from()
        }
        Parse(err: httparse::Error) {
            display("parse error: {}", err)
            from()
        }
        ChunkSize(err: httparse::InvalidChunkSize) {
            display("invalid chunk size")
            from()
        }
        UriTooLong {
            display("request-line too large")
        }
        HeadersTooLarge {
            display("header block too large")
        }
        MissingHost {
            display("HTTP/1.1 request without a Host header")
        }
        DuplicateHost {
            display("duplicate Host header")
        }
        BadContentLength {
            display("invalid Content-Length header")
        }
        DuplicateContentLength {
            display("duplicate Content-Length header")
        }
        UnsupportedVersion {
            display("unsupported HTTP version")
        }
    }
}

impl ProtocolError {
    /// The status code the connection driver should attempt to answer
    /// with, per spec.md §4.1's "error_status_hint": "overlong start-lines
    /// or headers fail with a RemoteProtocolError carrying status_hint =
    /// 414 (URI Too Long) or 400 respectively".
    pub fn status_hint(&self) -> u16 {
        match self {
            ProtocolError::UriTooLong => 414,
            ProtocolError::UnsupportedVersion => 505,
            _ => 400,
        }
    }
}

/// Error writing a response that would violate the framing rules, e.g.
/// writing a body for a 204/304/1xx/HEAD response (spec.md §4.1, "outgoing
/// framing rules").
#[derive(Debug, thiserror::Error)]
pub enum LocalProtocolError {
    #[error("attempted to write a body where none is allowed: {0}")]
    BodyNotAllowed(&'static str),
    #[error("headers already sent for this cycle")]
    HeadersAlreadySent,
    #[error("cannot write: connection is already closed")]
    ConnectionClosed,
}

/// Errors from the forwarding client (spec.md §4.5).
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("connecting to upstream: {0}")]
    Connect(#[source] io::Error),
    #[error("tls handshake with upstream failed: {0}")]
    Tls(#[source] io::Error),
    #[error("upstream protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("upstream connection closed before a response was received")]
    ClosedEarly,
}

/// Errors installing a new rules program (spec.md §4.4).
#[derive(Debug, thiserror::Error)]
#[error("rules compile error at line {line}, column {column}: {message}")]
pub struct CompileError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}
