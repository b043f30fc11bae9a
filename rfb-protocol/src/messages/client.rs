//! Client-to-server RFB messages.

use super::types::{self, encode_latin1};
use crate::io::{RfbInStream, RfbOutStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// ClientInit - sent after the security handshake.
///
/// # Wire Format
///
/// - 1 byte: shared flag (0 = exclusive, 1 = shared)
///
/// The automation client always requests a shared desktop so it can drive a
/// session a human is also watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInit {
    pub shared: bool,
}

impl ClientInit {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(u8::from(self.shared));
    }

    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            shared: stream.read_u8().await? != 0,
        })
    }
}

/// SetEncodings - declare the encodings the client consumes.
///
/// # Wire Format
///
/// - 1 byte: message type (2)
/// - 1 byte: padding
/// - 2 bytes: number of encodings
/// - N * 4 bytes: encoding numbers (signed)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEncodings {
    pub encodings: Vec<i32>,
}

impl SetEncodings {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(types::MSG_SET_ENCODINGS);
        stream.write_padding(1);
        stream.write_u16(self.encodings.len() as u16);
        for encoding in &self.encodings {
            stream.write_i32(*encoding);
        }
    }

    /// Read the message body (type byte already consumed by the caller).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        stream.skip(1).await?;
        let count = stream.read_u16().await? as usize;
        let mut encodings = Vec::with_capacity(count);
        for _ in 0..count {
            encodings.push(stream.read_i32().await?);
        }
        Ok(Self { encodings })
    }
}

/// FramebufferUpdateRequest - ask for pixels in a region.
///
/// # Wire Format
///
/// - 1 byte: message type (3)
/// - 1 byte: incremental (0 = full refresh, 1 = changes only)
/// - 2 bytes each: x, y, width, height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferUpdateRequest {
    pub incremental: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl FramebufferUpdateRequest {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(types::MSG_FRAMEBUFFER_UPDATE_REQUEST);
        stream.write_u8(u8::from(self.incremental));
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
    }

    /// Read the message body (type byte already consumed by the caller).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            incremental: stream.read_u8().await? != 0,
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
        })
    }
}

/// KeyEvent - a key press or release.
///
/// # Wire Format
///
/// - 1 byte: message type (4)
/// - 1 byte: down flag (1 = pressed)
/// - 2 bytes: padding
/// - 4 bytes: X11 keysym
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub down: bool,
    pub keysym: u32,
}

impl KeyEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(types::MSG_KEY_EVENT);
        stream.write_u8(u8::from(self.down));
        stream.write_padding(2);
        stream.write_u32(self.keysym);
    }

    /// Read the message body (type byte already consumed by the caller).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let down = stream.read_u8().await? != 0;
        stream.skip(2).await?;
        Ok(Self {
            down,
            keysym: stream.read_u32().await?,
        })
    }
}

/// PointerEvent - pointer position plus button state.
///
/// # Wire Format
///
/// - 1 byte: message type (5)
/// - 1 byte: button mask (bit 0 = left ... bit 3 = wheel up, bit 4 = wheel down)
/// - 2 bytes each: x, y
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub button_mask: u8,
    pub x: u16,
    pub y: u16,
}

impl PointerEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(types::MSG_POINTER_EVENT);
        stream.write_u8(self.button_mask);
        stream.write_u16(self.x);
        stream.write_u16(self.y);
    }

    /// Read the message body (type byte already consumed by the caller).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            button_mask: stream.read_u8().await?,
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
        })
    }
}

/// ClientCutText - clipboard text from client to server, latin-1.
///
/// # Wire Format
///
/// - 1 byte: message type (6)
/// - 3 bytes: padding
/// - 4 bytes: text length
/// - N bytes: latin-1 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCutText {
    pub text: String,
}

impl ClientCutText {
    /// Write the message.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the text contains characters above U+00FF - the
    /// caller is expected to have validated before reaching the wire.
    pub fn write_to<W: AsyncWrite + Unpin>(
        &self,
        stream: &mut RfbOutStream<W>,
    ) -> std::io::Result<()> {
        let bytes = encode_latin1(&self.text).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cut text is not latin-1 encodable",
            )
        })?;
        stream.write_u8(types::MSG_CLIENT_CUT_TEXT);
        stream.write_padding(3);
        stream.write_u32(bytes.len() as u32);
        stream.write_bytes(&bytes);
        Ok(())
    }

    /// Read the message body (type byte already consumed by the caller).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        stream.skip(3).await?;
        let length = stream.read_u32().await? as usize;
        let bytes = stream.read_exact_vec(length).await?;
        Ok(Self {
            text: types::decode_latin1(&bytes),
        })
    }
}
