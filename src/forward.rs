//! Forwarding client (spec.md §4.5): acts as an outbound HTTP/1.1 client
//! (with optional TLS, certificate verification disabled since the whole
//! point is debugging against whatever upstream the operator names) and
//! turns the upstream's answer into a `Response` the rules engine can
//! adopt as-is. Grounded on the teacher's `src/client/` for the framing
//! side and `other_examples` TLS usage for the rustls wiring.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::codec::client::ClientCodec;
use crate::enums::Version;
use crate::error::{ForwardError, ProtocolError};
use crate::event::Event;
use crate::headers::HeaderMap;
use crate::model::{self, Request, Response};

enum UpstreamStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl AsyncRead for UpstreamStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            UpstreamStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for UpstreamStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            UpstreamStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_flush(cx),
            UpstreamStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            UpstreamStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            UpstreamStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Accepts any server certificate. Forwarding is a debugging aid against
/// whatever upstream the script names, not a trust boundary.
#[derive(Debug)]
struct NoCertVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer,
        _intermediates: &[CertificateDer],
        _server_name: &ServerName,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        use rustls::SignatureScheme::*;
        vec![
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
            RSA_PKCS1_SHA512,
            ECDSA_NISTP256_SHA256,
            ECDSA_NISTP384_SHA384,
            RSA_PSS_SHA256,
            RSA_PSS_SHA384,
            RSA_PSS_SHA512,
            ED25519,
        ]
    }
}

fn insecure_tls_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoCertVerification))
        .with_no_client_auth()
}

/// Strip the headers named in `Connection`, plus `Connection` and `Host`
/// themselves (spec.md §4.5 step 2).
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let named = headers.connection_tokens();
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        let lower = name.to_ascii_lowercase();
        if lower == "connection" || lower == "host" || named.iter().any(|t| t == &lower) {
            continue;
        }
        out.add(name.to_string(), value.to_string());
    }
    out
}

/// Proxy `request` to `host:port` over `target`, returning a `Response`
/// built from the upstream's answer (spec.md §4.5).
pub async fn forward(
    request: &Request,
    host: &str,
    port: u16,
    target: &str,
    tls: bool,
) -> Result<Response, ForwardError> {
    let tcp = TcpStream::connect((host, port)).await.map_err(ForwardError::Connect)?;

    let stream = if tls {
        let connector = TlsConnector::from(Arc::new(insecure_tls_config()));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ForwardError::Tls(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let tls_stream = connector.connect(server_name, tcp).await.map_err(ForwardError::Tls)?;
        UpstreamStream::Tls(Box::new(tls_stream))
    } else {
        UpstreamStream::Plain(tcp)
    };

    let mut codec = ClientCodec::new(stream);

    let mut headers = strip_hop_by_hop(&request.headers);
    headers.set("Host", model::host_header_value(host, port, tls));
    headers.add("Connection", "close");
    headers.add("Via", format!("{} turq", request.http_version));

    codec
        .send_request(&request.method, target, request.http_version, &headers, &request.body)
        .await
        .map_err(|e| ForwardError::Protocol(ProtocolError::Io(e)))?;

    let mut response = Response {
        http_version: Version::Http11,
        status_code: 502,
        reason: None,
        headers: HeaderMap::new(),
        body: Some(Vec::new()),
        use_content_length: true,
        keep_alive: true,
    };
    let mut got_response = false;

    loop {
        match codec.receive_event().await? {
            Event::Response(head) => {
                got_response = true;
                response.http_version = head.version;
                response.status_code = head.status_code;
                response.reason = Some(head.reason);
                response.headers = strip_hop_by_hop(&head.headers);
                response.headers.add("Via", format!("{} turq", head.version));
            }
            Event::Data(bytes) => {
                response.body.get_or_insert_with(Vec::new).extend_from_slice(&bytes);
            }
            Event::EndOfMessage { .. } => break,
            Event::ConnectionClosed => return Err(ForwardError::ClosedEarly),
            Event::Request(_) | Event::InformationalResponse(_) => {}
        }
    }

    if !got_response {
        return Err(ForwardError::ClosedEarly);
    }
    Ok(response)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::enums::Version;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn plain_request(method: &str, target: &str, headers: &[(&str, &str)]) -> Request {
        let mut h = HeaderMap::new();
        for (name, value) in headers {
            h.add(*name, *value);
        }
        Request::new(method.to_string(), target.to_string(), Version::Http11, h)
    }

    #[tokio::test]
    async fn forwards_and_strips_hop_by_hop_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let upstream = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                let n = sock.read(&mut tmp).await.unwrap();
                buf.extend_from_slice(&tmp[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let request_text = String::from_utf8_lossy(&buf).into_owned();
            let body = b"hi there";
            let response = format!(
                "HTTP/1.1 201 Created\r\nContent-Length: {}\r\nConnection: keep-alive\r\nX-Upstream: yes\r\n\r\n",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.write_all(body).await.unwrap();
            request_text
        });

        let mut request = plain_request(
            "GET",
            "/widgets",
            &[("Host", "ignored.example"), ("Connection", "keep-alive, X-Drop-Me"), ("X-Drop-Me", "gone"), ("X-Keep", "kept")],
        );
        request.set_body(Vec::new());

        let response = forward(&request, "127.0.0.1", addr.port(), "/widgets", false).await.unwrap();

        assert_eq!(response.status_code, 201);
        assert_eq!(response.body.as_deref(), Some(&b"hi there"[..]));
        assert_eq!(response.headers.get("x-upstream"), Some("yes"));
        assert!(response.headers.get("connection").is_none());
        assert_eq!(response.headers.get_all("via"), vec!["HTTP/1.1 turq"]);

        let sent = upstream.await.unwrap();
        assert!(sent.starts_with("GET /widgets HTTP/1.1\r\n"));
        assert!(sent.contains(&format!("Host: 127.0.0.1:{}\r\n", addr.port())));
        assert!(!sent.contains("X-Drop-Me"));
        assert!(sent.contains("X-Keep: kept"));
        assert!(sent.contains("Connection: close"));
    }

    #[tokio::test]
    async fn connection_refused_surfaces_as_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = plain_request("GET", "/", &[("Host", "x")]);
        let err = forward(&request, "127.0.0.1", addr.port(), "/", false).await.unwrap_err();
        assert!(matches!(err, ForwardError::Connect(_)));
    }
}
