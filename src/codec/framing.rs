//! Shared body-framing decision logic used by both codec roles (spec.md
//! §4.1, "Incoming framing rules").

use crate::error::ProtocolError;
use crate::headers::HeaderMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    Chunked,
    ContentLength(u64),
    Empty,
    /// Only valid for responses read by the client-role codec, per
    /// spec.md §4.1: "otherwise read-until-close (HTTP/1.0 responses
    /// only on the client-role codec)".
    ReadUntilClose,
}

/// Decide how a message body is framed, given its headers.
///
/// `allow_read_until_close` gates the read-until-close fallback: true only
/// for the client-role codec reading a response.
pub fn decide(
    headers: &HeaderMap,
    allow_read_until_close: bool,
) -> Result<BodyFraming, ProtocolError> {
    let te = headers.get_all("transfer-encoding");
    if let Some(last) = te.last() {
        if crate::headers::is_chunked(last.as_bytes()) {
            return Ok(BodyFraming::Chunked);
        }
    }

    let cl = headers.get_all("content-length");
    if !cl.is_empty() {
        let first = cl[0].trim();
        if cl.iter().any(|v| v.trim() != first) {
            return Err(ProtocolError::DuplicateContentLength);
        }
        let n: u64 = first.parse().map_err(|_| ProtocolError::BadContentLength)?;
        return Ok(BodyFraming::ContentLength(n));
    }

    if allow_read_until_close {
        Ok(BodyFraming::ReadUntilClose)
    } else {
        Ok(BodyFraming::Empty)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (n, v) in pairs {
            h.add(*n, *v);
        }
        h
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let h = headers(&[("Transfer-Encoding", "chunked"), ("Content-Length", "10")]);
        assert_eq!(decide(&h, false).unwrap(), BodyFraming::Chunked);
    }

    #[test]
    fn content_length_parsed() {
        let h = headers(&[("Content-Length", "42")]);
        assert_eq!(decide(&h, false).unwrap(), BodyFraming::ContentLength(42));
    }

    #[test]
    fn duplicate_conflicting_content_length_rejected() {
        let h = headers(&[("Content-Length", "1"), ("Content-Length", "2")]);
        assert!(decide(&h, false).is_err());
    }

    #[test]
    fn duplicate_identical_content_length_allowed() {
        let h = headers(&[("Content-Length", "1"), ("Content-Length", "1")]);
        assert_eq!(decide(&h, false).unwrap(), BodyFraming::ContentLength(1));
    }

    #[test]
    fn no_framing_header_is_empty_for_requests() {
        let h = headers(&[]);
        assert_eq!(decide(&h, false).unwrap(), BodyFraming::Empty);
    }

    #[test]
    fn no_framing_header_is_read_until_close_for_responses() {
        let h = headers(&[]);
        assert_eq!(decide(&h, true).unwrap(), BodyFraming::ReadUntilClose);
    }
}
