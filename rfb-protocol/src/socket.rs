//! Transport sockets for RFB connections.
//!
//! The protocol engine depends only on ordered, reliable bytes in both
//! directions; [`VncSocket`] captures that surface. Two implementations
//! exist: [`TcpSocket`] here and [`crate::ws::WsSocket`] for RFB tunneled
//! over a WebSocket. Both are used through [`BoxedSocket`] so the handshake
//! and message code is written once.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

/// Core trait for RFB transport sockets.
///
/// Extends `AsyncRead + AsyncWrite` with peer identification for logging.
/// `Send + Unpin` so a socket can be boxed, split, and moved into the
/// background recorder task.
pub trait VncSocket: AsyncRead + AsyncWrite + Send + Unpin {
    /// Human-readable peer endpoint, e.g. `192.168.1.20:5900` or a
    /// WebSocket URL with credentials elided.
    fn peer_endpoint(&self) -> String;
}

/// A transport socket of either variant, behind one object.
pub type BoxedSocket = Box<dyn VncSocket>;

/// TCP transport: a stream socket straight to an RFB server.
///
/// `TCP_NODELAY` is set - input events are tiny messages and must not sit
/// in Nagle's buffer.
pub struct TcpSocket {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpSocket {
    /// Connect to `host:port`, bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// `TimedOut` when the bound elapses; otherwise the underlying connect
    /// error (refused, unreachable, resolution failure).
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> std::io::Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connecting to {} timed out after {:?}", addr, timeout),
                )
            })??;
        let peer_addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        tracing::debug!("TCP transport connected to {}", peer_addr);
        Ok(Self { stream, peer_addr })
    }
}

impl VncSocket for TcpSocket {
    fn peer_endpoint(&self) -> String {
        self.peer_addr.to_string()
    }
}

impl AsyncRead for TcpSocket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpSocket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

impl VncSocket for Box<dyn VncSocket> {
    fn peer_endpoint(&self) -> String {
        (**self).peer_endpoint()
    }
}
