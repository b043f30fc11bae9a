//! WebSocket transport: RFB bytes tunneled as binary frames.
//!
//! Management stacks (hypervisor consoles in particular) expose VNC as a
//! secure WebSocket endpoint instead of a plain TCP port. The URL is built
//! from a caller-supplied template ([`UrlTemplate`]), authentication
//! material rides partly in the URL (a short-lived ticket) and partly in
//! extra HTTP headers on the upgrade request.
//!
//! [`WsSocket`] adapts a `WebSocketStream` to `AsyncRead`/`AsyncWrite` so
//! the rest of the protocol stack is transport-blind:
//!
//! - incoming binary frames land in an internal buffer; one RFB message may
//!   span several frames and one frame may carry several messages, the
//!   buffer makes both invisible
//! - text frames are treated as their UTF-8 bytes (some tunnels are sloppy
//!   about frame types)
//! - each write becomes one binary frame; the buffered out-stream flushes
//!   whole protocol messages, keeping frame and message boundaries aligned

use crate::socket::VncSocket;
use bytes::{Buf, BytesMut};
use futures::{Sink, Stream};
use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

/// The template placeholder vocabulary.
const PLACEHOLDERS: [&str; 4] = ["${host}", "${host_port}", "${vnc_port}", "${ticket}"];

/// A WebSocket URL template and the values to substitute into it.
///
/// Placeholders are `${host}`, `${host_port}`, `${vnc_port}` and
/// `${ticket}`. Every placeholder that appears in the template must have a
/// non-empty value; the ticket is percent-encoded. After substitution,
/// query parameters with empty values are dropped.
#[derive(Debug, Clone)]
pub struct UrlTemplate<'a> {
    pub template: &'a str,
    pub host: &'a str,
    pub host_port: u16,
    pub vnc_port: Option<u16>,
    pub ticket: Option<&'a str>,
}

impl UrlTemplate<'_> {
    /// Build the final URL.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a referenced placeholder has no (or an empty)
    /// value, or when the substituted string is not a valid URL. Nothing
    /// has touched the network at that point.
    pub fn substitute(&self) -> std::io::Result<url::Url> {
        let values: HashMap<&str, String> = HashMap::from([
            ("${host}", self.host.to_string()),
            ("${host_port}", self.host_port.to_string()),
            (
                "${vnc_port}",
                self.vnc_port.map(|p| p.to_string()).unwrap_or_default(),
            ),
            (
                "${ticket}",
                self.ticket
                    .map(|t| urlencoding::encode(t).into_owned())
                    .unwrap_or_default(),
            ),
        ]);

        let mut url = self.template.to_string();
        for placeholder in PLACEHOLDERS {
            if !url.contains(placeholder) {
                continue;
            }
            let value = &values[placeholder];
            if value.is_empty() {
                let name = placeholder
                    .trim_start_matches("${")
                    .trim_end_matches('}');
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("URL template requires '{}' but no value was provided", name),
                ));
            }
            url = url.replace(placeholder, value);
        }

        let mut parsed = url::Url::parse(&url).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("substituted URL is invalid: {}", e),
            )
        })?;

        // Drop query parameters left with empty values.
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed
                .query_pairs_mut()
                .clear()
                .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        Ok(parsed)
    }
}

/// Build the TLS connector for a `wss://` endpoint.
///
/// Self-signed infrastructure certificates are routine in the deployments
/// this client targets, so `verify_ssl = false` disables both certificate
/// and hostname verification. A supplied PEM certificate is installed as an
/// additional trust root.
fn build_tls_connector(
    certificate_pem: Option<&str>,
    verify_ssl: bool,
) -> std::io::Result<native_tls::TlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if !verify_ssl {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    }
    if let Some(pem) = certificate_pem {
        let certificate = native_tls::Certificate::from_pem(pem.as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        builder.add_root_certificate(certificate);
    }
    builder
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

fn ws_io_error(err: WsError) -> std::io::Error {
    match err {
        WsError::Io(e) => e,
        WsError::ConnectionClosed | WsError::AlreadyClosed => std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "WebSocket connection closed",
        ),
        other => std::io::Error::new(std::io::ErrorKind::ConnectionAborted, other),
    }
}

/// WebSocket transport socket.
///
/// Generic over the underlying stream so tests can run it over an
/// in-process duplex pipe; production code uses the default
/// `MaybeTlsStream<TcpStream>`.
pub struct WsSocket<S = MaybeTlsStream<TcpStream>> {
    inner: WebSocketStream<S>,
    read_buf: BytesMut,
    endpoint: String,
}

impl WsSocket {
    /// Open a WebSocket to `url` and complete the HTTP upgrade, bounded by
    /// `timeout`.
    ///
    /// `headers` are added verbatim to the upgrade request (e.g. an API
    /// token accompanying the ticket in the URL).
    pub async fn connect(
        url: &url::Url,
        headers: &HashMap<String, String>,
        certificate_pem: Option<&str>,
        verify_ssl: bool,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid header name '{}': {}", name, e),
                )
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid header value: {}", e),
                )
            })?;
            request.headers_mut().insert(name, value);
        }

        let connector = Connector::NativeTls(build_tls_connector(certificate_pem, verify_ssl)?);
        let (stream, response) = tokio::time::timeout(
            timeout,
            connect_async_tls_with_config(request, None, true, Some(connector)),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("WebSocket connect timed out after {:?}", timeout),
            )
        })?
        .map_err(ws_io_error)?;

        // Endpoint for logs: scheme, authority and path only - the query
        // carries the ticket.
        let endpoint = format!(
            "{}://{}:{}{}",
            url.scheme(),
            url.host_str().unwrap_or_default(),
            url.port_or_known_default().unwrap_or_default(),
            url.path()
        );
        tracing::debug!(
            "WebSocket transport connected to {} (HTTP {})",
            endpoint,
            response.status()
        );

        Ok(Self::from_stream(stream, endpoint))
    }
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> WsSocket<S> {
    /// Wrap an already-established WebSocket stream.
    pub fn from_stream(inner: WebSocketStream<S>, endpoint: String) -> Self {
        Self {
            inner,
            read_buf: BytesMut::new(),
            endpoint,
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> VncSocket for WsSocket<S> {
    fn peer_endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> AsyncRead for WsSocket<S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        loop {
            if !this.read_buf.is_empty() {
                let n = this.read_buf.len().min(buf.remaining());
                buf.put_slice(&this.read_buf[..n]);
                this.read_buf.advance(n);
                return Poll::Ready(Ok(()));
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(message))) => match message {
                    Message::Binary(data) => this.read_buf.extend_from_slice(&data),
                    // Treated as binary for robustness against sloppy tunnels.
                    Message::Text(text) => this.read_buf.extend_from_slice(text.as_bytes()),
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                    Message::Close(_) => return Poll::Ready(Ok(())),
                },
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(ws_io_error(e))),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<S: AsyncRead + AsyncWrite + Send + Unpin> AsyncWrite for WsSocket<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match Pin::new(&mut self.inner).poll_ready(cx) {
            Poll::Ready(Ok(())) => {}
            Poll::Ready(Err(e)) => return Poll::Ready(Err(ws_io_error(e))),
            Poll::Pending => return Poll::Pending,
        }
        Pin::new(&mut self.inner)
            .start_send(Message::Binary(buf.to_vec()))
            .map_err(ws_io_error)?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx).map_err(ws_io_error)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_close(cx).map_err(ws_io_error)
    }
}
