//! The live protocol session.
//!
//! [`Connection`] binds a transport socket to the RFB codec and owns every
//! piece of per-session state: the buffered streams, the negotiated
//! desktop description, the framebuffer raster, the cursor, and the
//! clipboard cache.
//!
//! Inbound traffic is consumed through a dispatch loop
//! ([`Connection::try_pump_message`]): each server message is read in
//! full and routed - framebuffer updates into the raster, cut text into
//! the clipboard cache, bells and colour-map updates into the void. No
//! message is ever left half-consumed, so interleaved traffic cannot
//! desynchronize the stream.
//!
//! Exactly one caller may drive the connection at a time; the facade wraps
//! it in `Arc<tokio::sync::Mutex<Session>>` and every controller operation
//! holds the lock for the duration of its transport I/O.

use crate::config::{Config, Transport};
use crate::errors::{Result, VncError};
use crate::framebuffer::Framebuffer;
use rfb_common::{Position, Region};
use rfb_protocol::messages::types::ENCODING_RAW;
use rfb_protocol::messages::{
    self, ClientCutText, FramebufferUpdateRequest, KeyEvent, PointerEvent, ServerInit,
    SetEncodings,
};
use rfb_protocol::{handshake, BoxedSocket, RfbInStream, RfbOutStream, TcpSocket, UrlTemplate, WsSocket};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::time::Instant;

/// Shared, serialized access to the optional live connection.
pub(crate) type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// One fully routed server-to-client message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ServerMessage {
    /// A framebuffer update, already applied to the raster.
    Update { rectangles: usize },
    /// Server clipboard text, already stored in the cache.
    CutText(String),
    /// An audible bell, consumed and ignored.
    Bell,
    /// A colour-map update, consumed and ignored.
    ColourMap,
}

/// The facade's connection slot: `None` while disconnected.
#[derive(Default)]
pub(crate) struct Session {
    connection: Option<Connection>,
}

impl Session {
    pub(crate) fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub(crate) fn set(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }

    pub(crate) fn take(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    /// The live connection, or a state error while disconnected.
    pub(crate) fn connection(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or_else(VncError::not_connected)
    }

    /// Tear the session down when `result` is fatal, then pass it through.
    ///
    /// Connection and protocol errors leave the stream unusable; the
    /// facade transitions to disconnected before surfacing them.
    pub(crate) fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                tracing::warn!("session torn down after fatal error: {}", err);
                self.connection = None;
            }
        }
        result
    }
}

/// A connected RFB 3.8 session.
pub(crate) struct Connection {
    input: RfbInStream<ReadHalf<BoxedSocket>>,
    output: RfbOutStream<WriteHalf<BoxedSocket>>,
    server_init: ServerInit,
    framebuffer: Framebuffer,
    cursor: Position,
    button_mask: u8,
    clipboard: Option<String>,
    timeout: Duration,
}

impl Connection {
    /// Open the configured transport, run the handshake, and allocate the
    /// framebuffer.
    pub(crate) async fn establish(config: &Config) -> Result<Self> {
        let timeout = config.timeout();

        let (socket, password): (BoxedSocket, Option<String>) = match &config.transport {
            Transport::Tcp => {
                let socket = TcpSocket::connect(&config.host, config.port, timeout)
                    .await
                    .map_err(|e| VncError::from_io(e, timeout))?;
                (Box::new(socket), config.password.clone())
            }
            Transport::WebSocket(ws) => {
                let template = UrlTemplate {
                    template: &ws.url_template,
                    host: &config.host,
                    host_port: ws.host_port,
                    vnc_port: Some(config.port),
                    ticket: ws.ticket.as_deref(),
                };
                let url = template
                    .substitute()
                    .map_err(|e| VncError::from_io(e, timeout))?;
                let socket = WsSocket::connect(
                    &url,
                    &ws.headers,
                    ws.certificate_pem.as_deref(),
                    ws.verify_ssl,
                    timeout,
                )
                .await
                .map_err(|e| VncError::from_io(e, timeout))?;
                // Dual auth: the ticket doubles as the VNC password.
                let password = ws.ticket.clone().or_else(|| config.password.clone());
                (Box::new(socket), password)
            }
        };

        let endpoint = rfb_protocol::VncSocket::peer_endpoint(&socket);
        let (reader, writer) = tokio::io::split(socket);
        let mut input = RfbInStream::new(reader);
        let mut output = RfbOutStream::new(writer);

        let outcome = tokio::time::timeout(
            timeout,
            handshake::perform(&mut input, &mut output, password.as_deref()),
        )
        .await
        .map_err(|_| VncError::Timeout(timeout))?
        .map_err(|e| VncError::from_io(e, timeout))?;

        // Raw is the only encoding this client decodes; say so up front.
        SetEncodings {
            encodings: vec![ENCODING_RAW],
        }
        .write_to(&mut output);
        output
            .flush()
            .await
            .map_err(|e| VncError::from_io(e, timeout))?;

        let server_init = outcome.server_init;
        tracing::info!(
            "connected to {} (\"{}\", {}x{})",
            endpoint,
            server_init.name,
            server_init.width,
            server_init.height
        );

        let framebuffer = Framebuffer::new(server_init.width, server_init.height);
        Ok(Self {
            input,
            output,
            server_init,
            framebuffer,
            cursor: Position::default(),
            button_mask: 0,
            clipboard: None,
            timeout,
        })
    }

    /// Negotiated desktop description.
    pub(crate) fn server_init(&self) -> &ServerInit {
        &self.server_init
    }

    /// The full framebuffer as a region.
    pub(crate) fn framebuffer_bounds(&self) -> Region {
        self.framebuffer.bounds()
    }

    pub(crate) fn framebuffer(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    /// Current cursor position (last transmitted coordinate).
    pub(crate) fn cursor(&self) -> Position {
        self.cursor
    }

    /// Button mask of the last transmitted pointer event.
    pub(crate) fn buttons(&self) -> u8 {
        self.button_mask
    }

    pub(crate) fn clipboard_cache(&self) -> Option<&str> {
        self.clipboard.as_deref()
    }

    pub(crate) fn set_clipboard_cache(&mut self, text: Option<String>) {
        self.clipboard = text;
    }

    async fn flush(&mut self) -> Result<()> {
        self.output
            .flush()
            .await
            .map_err(|e| VncError::from_io(e, self.timeout))
    }

    /// Send a pointer event and record it as the cursor state.
    pub(crate) async fn send_pointer_event(&mut self, x: u16, y: u16, mask: u8) -> Result<()> {
        PointerEvent {
            button_mask: mask,
            x,
            y,
        }
        .write_to(&mut self.output);
        self.flush().await?;
        self.cursor = Position::new(x, y);
        self.button_mask = mask;
        Ok(())
    }

    /// Send a key press or release.
    pub(crate) async fn send_key_event(&mut self, keysym: u32, down: bool) -> Result<()> {
        KeyEvent { down, keysym }.write_to(&mut self.output);
        self.flush().await
    }

    /// Send clipboard text (already validated as latin-1 by the caller).
    pub(crate) async fn send_cut_text(&mut self, text: &str) -> Result<()> {
        ClientCutText { text: text.into() }
            .write_to(&mut self.output)
            .map_err(|e| VncError::from_io(e, self.timeout))?;
        self.flush().await
    }

    /// Request a framebuffer update for `region`.
    pub(crate) async fn request_update(&mut self, incremental: bool, region: Region) -> Result<()> {
        FramebufferUpdateRequest {
            incremental,
            x: region.x,
            y: region.y,
            width: region.width,
            height: region.height,
        }
        .write_to(&mut self.output);
        self.flush().await
    }

    /// Read and route at most one server message, waiting up to `wait` for
    /// one to begin.
    ///
    /// Returns `Ok(None)` when nothing arrived within `wait`. Once the
    /// message-type byte has been read the rest of the message is consumed
    /// in full (bounded by the configured timeout), so an expiring wait
    /// never strands a partial message in the stream.
    pub(crate) async fn try_pump_message(&mut self, wait: Duration) -> Result<Option<ServerMessage>> {
        let msg_type = match tokio::time::timeout(wait, self.input.read_u8()).await {
            Ok(read) => read.map_err(|e| VncError::from_io(e, self.timeout))?,
            Err(_) => return Ok(None),
        };

        let timeout = self.timeout;
        let message = tokio::time::timeout(timeout, self.dispatch_message(msg_type))
            .await
            .map_err(|_| VncError::Timeout(timeout))??;
        Ok(Some(message))
    }

    async fn dispatch_message(&mut self, msg_type: u8) -> Result<ServerMessage> {
        use rfb_protocol::messages::types as t;
        match msg_type {
            t::MSG_FRAMEBUFFER_UPDATE => {
                let update = messages::FramebufferUpdate::read_from(&mut self.input)
                    .await
                    .map_err(|e| VncError::from_io(e, self.timeout))?;
                let count = update.rectangles.len();
                for r in update.rectangles {
                    let region = Region::new(r.rect.x, r.rect.y, r.rect.width, r.rect.height);
                    self.framebuffer.apply_rectangle(region, &r.data)?;
                }
                tracing::debug!("applied framebuffer update with {} rectangle(s)", count);
                Ok(ServerMessage::Update { rectangles: count })
            }
            t::MSG_SERVER_CUT_TEXT => {
                let cut = messages::ServerCutText::read_from(&mut self.input)
                    .await
                    .map_err(|e| VncError::from_io(e, self.timeout))?;
                self.clipboard = Some(cut.text.clone());
                Ok(ServerMessage::CutText(cut.text))
            }
            t::MSG_BELL => Ok(ServerMessage::Bell),
            t::MSG_SET_COLOUR_MAP_ENTRIES => {
                messages::server::skip_colour_map_entries(&mut self.input)
                    .await
                    .map_err(|e| VncError::from_io(e, self.timeout))?;
                Ok(ServerMessage::ColourMap)
            }
            other => Err(VncError::Protocol(format!(
                "unexpected server message type: {}",
                other
            ))),
        }
    }

    /// Pump messages until a framebuffer update has been applied.
    ///
    /// Interleaved cut text lands in the clipboard cache on the way.
    pub(crate) async fn wait_for_update(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.try_pump_message(remaining).await? {
                Some(ServerMessage::Update { rectangles }) => {
                    tracing::trace!("consumed update with {} rectangle(s)", rectangles);
                    return Ok(());
                }
                Some(_) => continue,
                None => return Err(VncError::Timeout(self.timeout)),
            }
        }
    }

    /// Pump messages until cut text arrives or `wait` elapses.
    ///
    /// Framebuffer updates seen on the way are applied to the raster.
    pub(crate) async fn read_cut_text(&mut self, wait: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.try_pump_message(remaining).await? {
                Some(ServerMessage::CutText(text)) => return Ok(Some(text)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    /// Shut the transport down. Errors are ignored - the peer may already
    /// be gone.
    pub(crate) async fn close(mut self) {
        let _ = self.output.shutdown().await;
    }
}
