/// HTTP protocol version as used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }

    /// Whether this version defaults to a persistent connection absent
    /// any `Connection` header.
    pub fn default_keep_alive(&self) -> bool {
        match *self {
            Version::Http10 => false,
            Version::Http11 => true,
        }
    }

    /// Build a `Version` from the minor version number `httparse` reports.
    pub fn from_minor(minor: u8) -> Version {
        if minor >= 1 {
            Version::Http11
        } else {
            Version::Http10
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
