//! Client-role half of the framing codec: writes requests, reads
//! responses. Used by the forwarding client (spec.md §4.5). Grounded on
//! the teacher's `src/client/parser.rs`/`src/client/proto.rs`, rewritten
//! against async/await and `bytes::BytesMut`.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::framing::{self, BodyFraming};
use super::{SideState, MAX_HEAD_SIZE, READ_CHUNK};
use crate::chunked;
use crate::enums::Version;
use crate::error::ProtocolError;
use crate::event::{Event, ResponseHead};
use crate::headers::HeaderMap;

pub struct ClientCodec<S> {
    io: S,
    read_buf: BytesMut,
    request_method: String,
    in_framing: Option<BodyFraming>,
    in_chunked: chunked::Decoder,
    in_remaining: u64,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ClientCodec<S> {
    pub fn new(io: S) -> ClientCodec<S> {
        ClientCodec {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            request_method: String::new(),
            in_framing: None,
            in_chunked: chunked::Decoder::new(),
            in_remaining: 0,
        }
    }

    /// Write a full request (head + single body chunk + end) in one go —
    /// the forwarding client never streams the request body, it always
    /// has it fully buffered already (spec.md §4.5 step 3).
    pub async fn send_request(
        &mut self,
        method: &str,
        target: &str,
        version: Version,
        headers: &HeaderMap,
        body: &[u8],
    ) -> std::io::Result<()> {
        self.request_method = method.to_string();
        let mut out = BytesMut::new();
        out.extend_from_slice(method.as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(target.as_bytes());
        out.extend_from_slice(b" ");
        out.extend_from_slice(version.as_str().as_bytes());
        out.extend_from_slice(b"\r\n");
        for (name, value) in headers.iter() {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        self.io.write_all(&out).await?;
        self.io.flush().await
    }

    async fn fill(&mut self) -> Result<bool, ProtocolError> {
        if self.read_buf.len() >= MAX_HEAD_SIZE {
            return Err(ProtocolError::HeadersTooLarge);
        }
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.io.read(&mut tmp).await?;
        if n == 0 {
            return Ok(false);
        }
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(true)
    }

    pub async fn receive_event(&mut self) -> Result<Event, ProtocolError> {
        if self.in_framing.is_none() {
            self.receive_response_head().await
        } else {
            self.receive_body().await
        }
    }

    async fn receive_response_head(&mut self) -> Result<Event, ProtocolError> {
        loop {
            let mut raw_headers = [httparse::EMPTY_HEADER; 64];
            let mut resp = httparse::Response::new(&mut raw_headers);
            match resp.parse(&self.read_buf)? {
                httparse::Status::Complete(used) => {
                    let status_code = resp.code.unwrap_or(0);
                    let reason = resp.reason.unwrap_or("").to_string();
                    let version = Version::from_minor(resp.version.unwrap_or(1));
                    let mut headers = HeaderMap::new();
                    for h in resp.headers.iter() {
                        headers.add(h.name.to_string(), String::from_utf8_lossy(h.value).into_owned());
                    }
                    self.read_buf.advance(used);

                    let is_head = self.request_method.eq_ignore_ascii_case("HEAD");
                    let forbids_body =
                        is_head || (100..200).contains(&status_code) || status_code == 204 || status_code == 304;
                    let framing = if forbids_body {
                        BodyFraming::Empty
                    } else {
                        // client role always allows the read-until-close
                        // fallback for responses (spec.md §4.1)
                        framing::decide(&headers, true)?
                    };
                    self.in_framing = Some(framing);
                    self.in_chunked = chunked::Decoder::new();
                    self.in_remaining = match framing {
                        BodyFraming::ContentLength(n) => n,
                        _ => 0,
                    };

                    return Ok(Event::Response(ResponseHead { status_code, reason, version, headers }));
                }
                httparse::Status::Partial => {
                    if !self.fill().await? {
                        return Err(ProtocolError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "upstream closed before sending response headers",
                        )));
                    }
                }
            }
        }
    }

    async fn receive_body(&mut self) -> Result<Event, ProtocolError> {
        match self.in_framing.unwrap() {
            BodyFraming::Chunked => loop {
                self.in_chunked.parse(&mut self.read_buf)?;
                let buffered = self.in_chunked.buffered();
                if buffered > 0 {
                    let data = self.read_buf.split_to(buffered).to_vec();
                    self.in_chunked.consume(buffered);
                    return Ok(Event::Data(data));
                }
                if self.in_chunked.is_done() {
                    self.in_framing = None;
                    return Ok(Event::EndOfMessage { trailers: HeaderMap::new() });
                }
                if !self.fill().await? {
                    return Err(ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "upstream closed mid-body",
                    )));
                }
            },
            BodyFraming::ContentLength(_) => {
                if self.in_remaining == 0 {
                    self.in_framing = None;
                    return Ok(Event::EndOfMessage { trailers: HeaderMap::new() });
                }
                if self.read_buf.is_empty() && !self.fill().await? {
                    return Err(ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "upstream closed mid-body",
                    )));
                }
                let take = std::cmp::min(self.in_remaining, self.read_buf.len() as u64) as usize;
                let data = self.read_buf.split_to(take).to_vec();
                self.in_remaining -= take as u64;
                Ok(Event::Data(data))
            }
            BodyFraming::Empty => {
                self.in_framing = None;
                Ok(Event::EndOfMessage { trailers: HeaderMap::new() })
            }
            BodyFraming::ReadUntilClose => {
                if self.read_buf.is_empty() {
                    if self.fill().await? {
                        return Ok(Event::Data(self.read_buf.split().to_vec()));
                    }
                    self.in_framing = None;
                    return Ok(Event::EndOfMessage { trailers: HeaderMap::new() });
                }
                Ok(Event::Data(self.read_buf.split().to_vec()))
            }
        }
    }
}
