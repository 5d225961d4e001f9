//! Server-role half of the framing codec: reads requests, writes responses.
//! Grounded on the state machine shape of `src/server/codec.rs` and
//! `src/server/proto.rs` from the teacher, rewritten against async/await
//! and `bytes::BytesMut` instead of futures-0.1 polling and `netbuf`.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::framing::{self, BodyFraming};
use super::{SideState, MAX_HEAD_SIZE, MAX_START_LINE_SIZE, READ_CHUNK};
use crate::chunked;
use crate::enums::Version;
use crate::error::{LocalProtocolError, ProtocolError};
use crate::event::{Event, InformationalHead, RequestHead, ResponseHead};
use crate::headers::HeaderMap;

/// Error writing an outgoing event: either a local framing mistake or an
/// I/O failure.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Local(#[from] LocalProtocolError),
    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ServerCodec<S> {
    io: S,
    read_buf: BytesMut,
    pub their: SideState,
    pub our: SideState,
    request_version: Version,
    request_method: String,
    request_keep_alive: bool,
    response_keep_alive: bool,
    in_framing: Option<BodyFraming>,
    in_chunked: chunked::Decoder,
    in_remaining: u64,
    out_framing: BodyFraming,
    out_body_allowed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> ServerCodec<S> {
    pub fn new(io: S) -> ServerCodec<S> {
        ServerCodec {
            io,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            their: SideState::Idle,
            our: SideState::Idle,
            request_version: Version::Http11,
            request_method: String::new(),
            request_keep_alive: true,
            response_keep_alive: true,
            in_framing: None,
            in_chunked: chunked::Decoder::new(),
            in_remaining: 0,
            out_framing: BodyFraming::Empty,
            out_body_allowed: false,
        }
    }

    pub fn request_version(&self) -> Version {
        self.request_version
    }

    pub fn request_method(&self) -> &str {
        &self.request_method
    }

    /// Whether both sides negotiated a persistent connection for this
    /// cycle (spec.md §4.1: "After reading EndOfMessage, if both sides
    /// are DONE and both indicated keep-alive ... the codec is reset").
    pub fn keep_alive_negotiated(&self) -> bool {
        self.request_keep_alive && self.response_keep_alive
    }

    /// Reset both sides to IDLE to start the next pipelined cycle.
    pub fn start_next_cycle(&mut self) {
        self.their = SideState::Idle;
        self.our = SideState::Idle;
        self.in_framing = None;
        self.in_chunked = chunked::Decoder::new();
        self.in_remaining = 0;
        self.out_framing = BodyFraming::Empty;
        self.out_body_allowed = false;
    }

    pub fn close(&mut self) {
        self.their = SideState::Closed;
        self.our = SideState::Closed;
    }

    /// spec.md §4.1 distinguishes an overlong start-line (414) from an
    /// overlong header block (400): while still reading the request line
    /// (no `\r\n` seen yet), an overlong buffer means the start-line
    /// itself is too long; once the start-line has ended, an overlong
    /// buffer means the header block is too long.
    async fn fill(&mut self) -> Result<bool, ProtocolError> {
        if self.their == SideState::Idle
            && self.read_buf.windows(2).position(|w| w == b"\r\n").is_none()
            && self.read_buf.len() >= MAX_START_LINE_SIZE
        {
            return Err(ProtocolError::UriTooLong);
        }
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
        match self.their {
            SideState::Idle => self.receive_request().await,
            SideState::SendBody => self.receive_body().await,
            _ => Ok(Event::ConnectionClosed),
        }
    }

    async fn receive_request(&mut self) -> Result<Event, ProtocolError> {
        loop {
            let mut raw_headers = [httparse::EMPTY_HEADER; 64];
            let mut req = httparse::Request::new(&mut raw_headers);
            match req.parse(&self.read_buf)? {
                httparse::Status::Complete(used) => {
                    let method = req.method.unwrap_or("").to_string();
                    let target = req.path.unwrap_or("").to_string();
                    let version = Version::from_minor(req.version.unwrap_or(1));
                    let mut headers = HeaderMap::new();
                    for h in req.headers.iter() {
                        headers.add(h.name.to_string(), String::from_utf8_lossy(h.value).into_owned());
                    }
                    self.read_buf.advance(used);

                    let hosts = headers.get_all("host");
                    if version == Version::Http11 {
                        if hosts.is_empty() {
                            return Err(ProtocolError::MissingHost);
                        }
                        if hosts.len() > 1 {
                            return Err(ProtocolError::DuplicateHost);
                        }
                    }

                    self.request_version = version;
                    self.request_method = method.clone();
                    self.request_keep_alive = connection_keep_alive(&headers, version);

                    let framing = framing::decide(&headers, false)?;
                    self.in_framing = Some(framing);
                    self.in_chunked = chunked::Decoder::new();
                    self.in_remaining = match framing {
                        BodyFraming::ContentLength(n) => n,
                        _ => 0,
                    };
                    self.their = if matches!(framing, BodyFraming::Empty) {
                        SideState::Done
                    } else {
                        SideState::SendBody
                    };

                    return Ok(Event::Request(RequestHead { method, target, version, headers }));
                }
                httparse::Status::Partial => {
                    if !self.fill().await? {
                        if self.read_buf.is_empty() {
                            return Ok(Event::ConnectionClosed);
                        }
                        return Err(ProtocolError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed mid-request",
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
                    let mut raw_headers = [httparse::EMPTY_HEADER; 16];
                    match httparse::parse_headers(&self.read_buf, &mut raw_headers) {
                        Ok(httparse::Status::Complete((used, parsed))) => {
                            let mut trailers = HeaderMap::new();
                            for h in parsed {
                                trailers.add(
                                    h.name.to_string(),
                                    String::from_utf8_lossy(h.value).into_owned(),
                                );
                            }
                            self.read_buf.advance(used);
                            self.their = SideState::Done;
                            return Ok(Event::EndOfMessage { trailers });
                        }
                        Ok(httparse::Status::Partial) => {
                            if !self.fill().await? {
                                return Err(ProtocolError::Io(std::io::Error::new(
                                    std::io::ErrorKind::UnexpectedEof,
                                    "connection closed mid-trailer",
                                )));
                            }
                        }
                        Err(e) => return Err(ProtocolError::Parse(e)),
                    }
                } else if !self.fill().await? {
                    return Err(ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed mid-body",
                    )));
                }
            },
            BodyFraming::ContentLength(_) => {
                if self.in_remaining == 0 {
                    self.their = SideState::Done;
                    return Ok(Event::EndOfMessage { trailers: HeaderMap::new() });
                }
                if self.read_buf.is_empty() && !self.fill().await? {
                    return Err(ProtocolError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed mid-body",
                    )));
                }
                let take = std::cmp::min(self.in_remaining, self.read_buf.len() as u64) as usize;
                let data = self.read_buf.split_to(take).to_vec();
                self.in_remaining -= take as u64;
                Ok(Event::Data(data))
            }
            BodyFraming::Empty | BodyFraming::ReadUntilClose => {
                self.their = SideState::Done;
                Ok(Event::EndOfMessage { trailers: HeaderMap::new() })
            }
        }
    }

    pub async fn send_event(&mut self, event: Event) -> Result<(), SendError> {
        match event {
            Event::InformationalResponse(head) => self.send_informational(head).await,
            Event::Response(head) => self.send_response(head).await,
            Event::Data(data) => self.send_data(&data).await,
            Event::EndOfMessage { trailers } => self.send_end(trailers).await,
            Event::Request(_) | Event::ConnectionClosed => Ok(()),
        }
    }

    async fn send_informational(&mut self, head: InformationalHead) -> Result<(), SendError> {
        let mut out = BytesMut::new();
        write_status_line(&mut out, head.version, head.status_code, &head.reason);
        write_headers(&mut out, &head.headers);
        self.io.write_all(&out).await?;
        self.io.flush().await?;
        Ok(())
    }

    async fn send_response(&mut self, head: ResponseHead) -> Result<(), SendError> {
        if self.our != SideState::Idle {
            return Err(LocalProtocolError::HeadersAlreadySent.into());
        }
        let mut out = BytesMut::new();
        write_status_line(&mut out, head.version, head.status_code, &head.reason);
        write_headers(&mut out, &head.headers);

        self.response_keep_alive = connection_keep_alive(&head.headers, head.version);
        let status_forbids = (100..200).contains(&head.status_code)
            || head.status_code == 204
            || head.status_code == 304;
        let is_head = self.request_method.eq_ignore_ascii_case("HEAD");
        self.out_body_allowed = !status_forbids && !is_head;
        self.out_framing = framing::decide(&head.headers, false).unwrap_or(BodyFraming::Empty);

        self.io.write_all(&out).await?;
        self.our = SideState::SendBody;
        Ok(())
    }

    async fn send_data(&mut self, data: &[u8]) -> Result<(), SendError> {
        if self.our != SideState::SendBody {
            return Err(LocalProtocolError::ConnectionClosed.into());
        }
        if !self.out_body_allowed || matches!(self.out_framing, BodyFraming::Empty) {
            return Err(LocalProtocolError::BodyNotAllowed(
                "status/method combination forbids a response body",
            )
            .into());
        }
        let mut out = BytesMut::new();
        match self.out_framing {
            BodyFraming::Chunked => chunked::encode_chunk(&mut out, data),
            _ => out.extend_from_slice(data),
        }
        self.io.write_all(&out).await?;
        Ok(())
    }

    async fn send_end(&mut self, trailers: HeaderMap) -> Result<(), SendError> {
        if self.our == SideState::SendBody {
            if matches!(self.out_framing, BodyFraming::Chunked) {
                let mut out = BytesMut::new();
                let pairs: Vec<(String, String)> =
                    trailers.iter().map(|(n, v)| (n.to_string(), v.to_string())).collect();
                chunked::encode_last_chunk(&mut out, &pairs);
                self.io.write_all(&out).await?;
            }
        }
        self.io.flush().await?;
        self.our = SideState::Done;
        Ok(())
    }

    /// Write raw bytes directly to the socket, bypassing the codec (used
    /// after a 101 Switching Protocols handshake per spec.md §4.3
    /// `send_raw`).
    pub async fn send_raw(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.io.write_all(data).await?;
        self.io.flush().await
    }

    pub fn into_inner(self) -> S {
        self.io
    }

    pub fn io_mut(&mut self) -> &mut S {
        &mut self.io
    }
}

fn connection_keep_alive(headers: &HeaderMap, version: Version) -> bool {
    let tokens = headers.connection_tokens();
    if tokens.iter().any(|t| t == "close") {
        return false;
    }
    if tokens.iter().any(|t| t == "keep-alive") {
        return true;
    }
    version.default_keep_alive()
}

fn write_status_line(out: &mut BytesMut, version: Version, code: u16, reason: &str) {
    out.extend_from_slice(version.as_str().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(code.to_string().as_bytes());
    out.extend_from_slice(b" ");
    out.extend_from_slice(reason.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn write_headers(out: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
}
