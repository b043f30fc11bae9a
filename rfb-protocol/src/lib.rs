//! RFB 3.8 wire protocol for the automation client.
//!
//! This crate implements the client side of the RFB (Remote Framebuffer)
//! protocol version 3.8 as far as the automation client consumes it:
//!
//! - [`io`] - buffered big-endian streams over any async byte transport
//! - [`socket`] - the transport abstraction ([`socket::VncSocket`]) with a
//!   TCP implementation
//! - [`ws`] - the WebSocket transport: URL template substitution, TLS
//!   material handling, and binary-frame reassembly
//! - [`handshake`] - version negotiation, security selection and
//!   authentication, ClientInit/ServerInit
//! - [`auth`] - the classic VNC DES challenge-response
//! - [`messages`] - client-to-server and server-to-client message codecs
//!
//! # Error conventions
//!
//! Functions in this crate return `std::io::Result` and encode the failure
//! class in the [`std::io::ErrorKind`]:
//!
//! - `UnexpectedEof`, `ConnectionRefused`, `ConnectionReset` - transport and
//!   connection failures
//! - `TimedOut` - a bounded wait elapsed
//! - `InvalidData`, `Unsupported` - the peer violated RFB 3.8 or sent
//!   content this client does not consume
//! - `PermissionDenied` - the server rejected our credentials
//!
//! The client crate maps these kinds onto its public error taxonomy.

pub mod auth;
pub mod handshake;
pub mod io;
pub mod messages;
pub mod socket;
pub mod ws;

pub use handshake::HandshakeOutcome;
pub use io::{RfbInStream, RfbOutStream};
pub use socket::{BoxedSocket, TcpSocket, VncSocket};
pub use ws::{UrlTemplate, WsSocket};

/// The only protocol version this client speaks.
pub const PROTOCOL_VERSION: &[u8; 12] = b"RFB 003.008\n";
