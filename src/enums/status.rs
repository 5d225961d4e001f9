/// A numeric HTTP status code together with its default reason phrase.
///
/// Mirrors the shape of `http::StatusCode` but stays local so the codec can
/// accept any code in 100..=599 (including ones scripts invent) and still
/// answer `reason()`/`has_body()` for it, per spec.md §3's Response
/// invariants and §4.1's "1xx/204/304/HEAD never carry a body" rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(u16);

impl Status {
    pub fn new(code: u16) -> Status {
        Status(code)
    }

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.0)
    }

    /// IANA default reason phrase, or "Unknown" for codes we don't know.
    pub fn default_reason(&self) -> &'static str {
        match self.0 {
            100 => "Continue",
            101 => "Switching Protocols",
            102 => "Processing",
            103 => "Early Hints",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            305 => "Use Proxy",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            402 => "Payment Required",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            407 => "Proxy Authentication Required",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            411 => "Length Required",
            412 => "Precondition Failed",
            413 => "Payload Too Large",
            414 => "URI Too Long",
            415 => "Unsupported Media Type",
            416 => "Range Not Satisfiable",
            417 => "Expectation Failed",
            421 => "Misdirected Request",
            422 => "Unprocessable Entity",
            426 => "Upgrade Required",
            429 => "Too Many Requests",
            431 => "Request Header Fields Too Large",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            505 => "HTTP Version Not Supported",
            _ => "Unknown",
        }
    }

    /// Status codes and methods for which a response MUST NOT carry a body
    /// (spec.md §4.1, outgoing framing rules).
    pub fn forbids_body(&self, is_head: bool) -> bool {
        is_head || self.is_informational() || self.0 == 204 || self.0 == 304
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn known_reasons() {
        assert_eq!(Status::new(200).default_reason(), "OK");
        assert_eq!(Status::new(404).default_reason(), "Not Found");
        assert_eq!(Status::new(999).default_reason(), "Unknown");
    }

    #[test]
    fn body_forbidden() {
        assert!(Status::new(204).forbids_body(false));
        assert!(Status::new(304).forbids_body(false));
        assert!(Status::new(100).forbids_body(false));
        assert!(!Status::new(200).forbids_body(false));
        assert!(Status::new(200).forbids_body(true));
    }
}
