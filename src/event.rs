//! The event vocabulary both codec roles speak, per spec.md §4.1.

use crate::enums::Version;
use crate::headers::HeaderMap;

/// A parsed HTTP/1.x request-line plus headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

/// A parsed HTTP/1.x status-line plus headers, for a final (non-1xx)
/// response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status_code: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMap,
}

/// A parsed 1xx informational response.
#[derive(Debug, Clone)]
pub struct InformationalHead {
    pub status_code: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMap,
}

/// One event in the framing stream. Both the server-role codec (reading
/// requests, writing responses) and the client-role codec (writing
/// requests, reading responses) produce/consume this same vocabulary,
/// just with `Request`/`Response` swapped between "incoming" and
/// "outgoing" roles.
#[derive(Debug, Clone)]
pub enum Event {
    Request(RequestHead),
    InformationalResponse(InformationalHead),
    Response(ResponseHead),
    Data(Vec<u8>),
    EndOfMessage { trailers: HeaderMap },
    ConnectionClosed,
}
