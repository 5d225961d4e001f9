//! Header value predicates and the ordered, case-insensitive, multi-valued
//! header dictionary used by both Request and Response (spec.md §3, §4.6).

use std::fmt;

/// header value is a byte sequence; we need case-insensitive comparison
/// and to strip surrounding whitespace
pub fn is_close(val: &[u8]) -> bool {
    token_matches(val, b"close")
}

/// header value is a byte sequence; we need case-insensitive comparison
/// and to strip surrounding whitespace
pub fn is_chunked(val: &[u8]) -> bool {
    token_matches(val, b"chunked")
}

/// header value is a byte sequence; we need case-insensitive comparison
/// and to strip surrounding whitespace
pub fn is_continue(val: &[u8]) -> bool {
    token_matches(val, b"100-continue")
}

fn token_matches(val: &[u8], token: &[u8]) -> bool {
    let trimmed = trim_ows(val);
    trimmed.eq_ignore_ascii_case(token)
}

fn trim_ows(val: &[u8]) -> &[u8] {
    let is_ows = |b: &u8| matches!(*b, b'\r' | b'\n' | b' ' | b'\t');
    let start = val.iter().position(|b| !is_ows(b)).unwrap_or(val.len());
    let end = val.iter().rposition(|b| !is_ows(b)).map(|i| i + 1).unwrap_or(start);
    &val[start..end]
}

/// A single header field as it appeared on the wire: original-case name,
/// ISO-8859-1-decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Ordered, case-insensitive, multi-valued header dictionary.
///
/// Iteration preserves insertion order. `set` removes all existing entries
/// with the given name (case-insensitively) then appends one; `add` always
/// appends. Lookups are case-insensitive per spec.md §4.6.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<HeaderField>,
}

impl HeaderMap {
    pub fn new() -> HeaderMap {
        HeaderMap { fields: Vec::new() }
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> HeaderMap {
        let fields = pairs
            .into_iter()
            .map(|(name, value)| HeaderField { name, value })
            .collect();
        HeaderMap { fields }
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField { name: name.into(), value: value.into() });
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref();
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
        self.add(name.to_string(), value);
    }

    pub fn delete(&mut self, name: impl AsRef<str>) {
        let name = name.as_ref();
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: impl AsRef<str>) -> bool {
        self.get(name).is_some()
    }

    /// First value for `name`, case-insensitively.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name)).map(|f| f.value.as_str())
    }

    /// All values for `name`, case-insensitively, in insertion order.
    pub fn get_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        let name = name.as_ref();
        self.fields
            .iter()
            .filter(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn extend(&mut self, other: HeaderMap) {
        self.fields.extend(other.fields);
    }

    pub fn take(&mut self) -> HeaderMap {
        std::mem::take(self)
    }

    /// Connection-header tokens (case-insensitively), used to strip
    /// hop-by-hop headers before forwarding (spec.md §4.5).
    pub fn connection_tokens(&self) -> Vec<String> {
        self.get_all("connection")
            .iter()
            .flat_map(|v| v.split(','))
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{is_chunked, is_close, is_continue, HeaderMap};

    #[test]
    fn test_chunked() {
        assert!(is_chunked(b"chunked"));
        assert!(is_chunked(b"Chunked"));
        assert!(is_chunked(b"chuNKED"));
        assert!(is_chunked(b"CHUNKED"));
        assert!(is_chunked(b"   CHUNKED"));
        assert!(is_chunked(b"   CHUNKED  "));
        assert!(is_chunked(b"chunked  "));
        assert!(!is_chunked(b"   CHUNKED 1 "));
        assert!(!is_chunked(b"gzip"));
    }

    #[test]
    fn test_close() {
        assert!(is_close(b"close"));
        assert!(is_close(b"Close"));
        assert!(is_close(b"clOSE"));
        assert!(is_close(b"CLOSE"));
        assert!(is_close(b" CLOSE"));
        assert!(is_close(b"   close   "));
        assert!(!is_close(b"Close  1 "));
        assert!(!is_close(b" xclose   "));
    }

    #[test]
    fn test_continue() {
        assert!(is_continue(b"100-continue"));
        assert!(is_continue(b"100-Continue"));
        assert!(is_continue(b"  100-CONTINUE"));
        assert!(!is_continue(b"100-continue y  "));
    }

    #[test]
    fn set_replaces_all_case_insensitively() {
        let mut h = HeaderMap::new();
        h.add("X-Foo", "1");
        h.add("x-foo", "2");
        h.set("X-FOO", "3");
        assert_eq!(h.get_all("x-foo"), vec!["3"]);
    }

    #[test]
    fn add_preserves_order_and_multi_value() {
        let mut h = HeaderMap::new();
        h.add("Set-Cookie", "a=1");
        h.add("Set-Cookie", "b=2");
        assert_eq!(h.get_all("set-cookie"), vec!["a=1", "b=2"]);
    }

    #[test]
    fn connection_tokens_split_and_lowercase() {
        let mut h = HeaderMap::new();
        h.add("Connection", "Keep-Alive, X-Custom");
        assert_eq!(h.connection_tokens(), vec!["keep-alive", "x-custom"]);
    }
}
