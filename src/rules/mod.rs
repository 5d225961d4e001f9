//! Rules engine (spec.md §4.3) and rules store (spec.md §4.4).

mod capabilities;
mod engine;
mod html;
pub mod store;

pub use engine::{run, CycleOutcome};

/// https://www.iana.org/assignments/http-methods/http-methods.xhtml
///
/// Each of these is injected as a boolean flag into the script's scope,
/// equal to `method == that` (spec.md §4.3).
pub const KNOWN_METHODS: &[&str] = &[
    "ACL", "BASELINE-CONTROL", "BIND", "CHECKIN", "CHECKOUT", "CONNECT", "COPY", "DELETE", "GET",
    "HEAD", "LABEL", "LINK", "LOCK", "MERGE", "MKACTIVITY", "MKCALENDAR", "MKCOL",
    "MKREDIRECTREF", "MKWORKSPACE", "MOVE", "OPTIONS", "ORDERPATCH", "PATCH", "POST", "PRI",
    "PROPFIND", "PROPPATCH", "PUT", "REBIND", "REPORT", "SEARCH", "TRACE", "UNBIND", "UNCHECKOUT",
    "UNLINK", "UNLOCK", "UPDATE", "UPDATEREDIRECTREF", "VERSION-CONTROL",
];
