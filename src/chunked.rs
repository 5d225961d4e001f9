//! Incoming chunked transfer-coding decode state, and outgoing encode
//! helpers. The decode side tracks how much of the front of a `BytesMut`
//! is parsed chunk framing vs. payload still pending, without copying.

use bytes::{BufMut, BytesMut};
use httparse::{parse_chunk_size, InvalidChunkSize, Status::*};

/// Decoder state for one chunked-encoded message body.
#[derive(Debug, Clone)]
pub struct Decoder {
    buffered: usize,
    pending: u64,
    done: bool,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder { buffered: 0, pending: 0, done: false }
    }

    /// Scan as much chunk framing as is available in `buf`, consuming
    /// size headers/trailing CRLFs in place and tracking how many bytes
    /// starting at the front of `buf` are now known-good payload.
    pub fn parse(&mut self, buf: &mut BytesMut) -> Result<(), InvalidChunkSize> {
        while self.buffered < buf.len() {
            if self.pending == 0 {
                match parse_chunk_size(&buf[self.buffered..])? {
                    Complete((consumed, 0)) => {
                        buf_remove_range(buf, self.buffered, self.buffered + consumed);
                        self.done = true;
                    }
                    Complete((consumed, size)) => {
                        buf_remove_range(buf, self.buffered, self.buffered + consumed);
                        self.pending = size;
                    }
                    Partial => return Ok(()),
                }
            } else {
                let available = (buf.len() - self.buffered) as u64;
                if self.pending <= available {
                    self.buffered += self.pending as usize;
                    self.pending = 0;
                } else {
                    self.pending -= available;
                    self.buffered = buf.len();
                }
            }
        }
        Ok(())
    }

    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn consume(&mut self, n: usize) {
        assert!(self.buffered >= n);
        self.buffered -= n;
    }
}

/// Remove `buf[start..end]` in place, shifting the tail down.
fn buf_remove_range(buf: &mut BytesMut, start: usize, end: usize) {
    let tail = buf.split_off(end);
    buf.truncate(start);
    buf.unsplit(tail);
}

/// Append one chunk of `data` in `chunk-size CRLF chunk-data CRLF` framing.
pub fn encode_chunk(out: &mut BytesMut, data: &[u8]) {
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

/// Append the terminating zero-size chunk, optional trailer headers, and
/// the final CRLF.
pub fn encode_last_chunk(out: &mut BytesMut, trailers: &[(String, String)]) {
    out.put_slice(b"0\r\n");
    for (name, value) in trailers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_single_chunk() {
        let mut buf = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
        let mut dec = Decoder::new();
        dec.parse(&mut buf).unwrap();
        assert_eq!(dec.buffered(), 5);
        assert_eq!(&buf[..dec.buffered()], b"hello");
        dec.consume(5);
        assert_eq!(dec.buffered(), 0);
    }

    #[test]
    fn reports_partial_on_incomplete_size_line() {
        let mut buf = BytesMut::from(&b"5\r\nhel"[..]);
        let mut dec = Decoder::new();
        dec.parse(&mut buf).unwrap();
        assert_eq!(dec.buffered(), 3);
        assert!(!dec.is_done());
    }

    #[test]
    fn encode_roundtrips_through_decoder() {
        let mut out = BytesMut::new();
        encode_chunk(&mut out, b"abc");
        encode_last_chunk(&mut out, &[("X-Trailer".into(), "v".into())]);
        let mut dec = Decoder::new();
        let mut input = out.clone();
        dec.parse(&mut input).unwrap();
        assert!(dec.is_done());
        assert_eq!(&input[..dec.buffered()], b"abc");
    }
}
