//! Server-to-client RFB messages.

use super::types::{self, PixelFormat, Rectangle};
use crate::io::{RfbInStream, RfbOutStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// ServerInit - the server's desktop description, received once at the end
/// of the handshake.
///
/// # Wire Format
///
/// - 2 bytes: framebuffer width
/// - 2 bytes: framebuffer height
/// - 16 bytes: pixel format (preserved, not interpreted)
/// - 4 bytes: name length
/// - N bytes: desktop name (UTF-8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
    pub name: String,
}

impl ServerInit {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let width = stream.read_u16().await?;
        let height = stream.read_u16().await?;
        let pixel_format = PixelFormat::read_from(stream).await?;
        let name_len = stream.read_u32().await? as usize;
        let name_bytes = stream.read_exact_vec(name_len).await?;
        let name = String::from_utf8(name_bytes).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("desktop name is not UTF-8: {}", e),
            )
        })?;

        Ok(Self {
            width,
            height,
            pixel_format,
            name,
        })
    }

    /// Write a ServerInit - used by the in-process test servers.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        self.pixel_format.write_to(stream);
        stream.write_u32(self.name.len() as u32);
        stream.write_bytes(self.name.as_bytes());
    }
}

/// One rectangle of a framebuffer update with its decoded Raw payload.
///
/// `data` holds exactly `width * height * 4` RGBA bytes in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRectangle {
    pub rect: Rectangle,
    pub data: Vec<u8>,
}

/// FramebufferUpdate - pixel data for one or more rectangles.
///
/// # Wire Format
///
/// - 1 byte: message type (0), consumed by the caller's dispatch
/// - 1 byte: padding
/// - 2 bytes: rectangle count
/// - per rectangle: a 12-byte [`Rectangle`] header followed by its
///   encoding-specific payload
///
/// Only the Raw encoding is consumed; any other encoding number is a
/// protocol error (`Unsupported`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferUpdate {
    pub rectangles: Vec<UpdateRectangle>,
}

impl FramebufferUpdate {
    /// Read the message body (type byte already consumed by the caller),
    /// including every rectangle's Raw pixel payload.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        stream.skip(1).await?;
        let count = stream.read_u16().await? as usize;

        let mut rectangles = Vec::with_capacity(count);
        for _ in 0..count {
            let rect = Rectangle::read_from(stream).await?;
            if rect.encoding != types::ENCODING_RAW {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    format!("unsupported framebuffer encoding: {}", rect.encoding),
                ));
            }
            let data = stream.read_exact_vec(rect.raw_payload_len()).await?;
            rectangles.push(UpdateRectangle { rect, data });
        }

        Ok(Self { rectangles })
    }

    /// Write a FramebufferUpdate (header, rectangle headers, payloads) -
    /// used by the in-process test servers.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u8(types::MSG_FRAMEBUFFER_UPDATE);
        stream.write_padding(1);
        stream.write_u16(self.rectangles.len() as u16);
        for r in &self.rectangles {
            r.rect.write_to(stream);
            stream.write_bytes(&r.data);
        }
    }
}

/// ServerCutText - clipboard text from the server, latin-1.
///
/// # Wire Format
///
/// - 1 byte: message type (3), consumed by the caller's dispatch
/// - 3 bytes: padding
/// - 4 bytes: text length
/// - N bytes: latin-1 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCutText {
    pub text: String,
}

impl ServerCutText {
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

    /// Write a ServerCutText - used by the in-process test servers.
    pub fn write_to<W: AsyncWrite + Unpin>(
        &self,
        stream: &mut RfbOutStream<W>,
    ) -> std::io::Result<()> {
        let bytes = types::encode_latin1(&self.text).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "cut text is not latin-1 encodable",
            )
        })?;
        stream.write_u8(types::MSG_SERVER_CUT_TEXT);
        stream.write_padding(3);
        stream.write_u32(bytes.len() as u32);
        stream.write_bytes(&bytes);
        Ok(())
    }
}

/// Bell - an audible alert. No body; nothing for an automation client to do
/// with it beyond consuming the type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bell;

/// Consume a SetColourMapEntries body (type byte already read).
///
/// Palette updates are irrelevant to a true-color client but must be read
/// to keep the stream in sync.
pub async fn skip_colour_map_entries<R: AsyncRead + Unpin>(
    stream: &mut RfbInStream<R>,
) -> std::io::Result<()> {
    stream.skip(1).await?; // padding
    stream.skip(2).await?; // first colour
    let count = stream.read_u16().await? as usize;
    stream.skip(count * 6).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn server_init_round_trip() {
        let init = ServerInit {
            width: 800,
            height: 600,
            pixel_format: PixelFormat::default(),
            name: "demo".into(),
        };

        let mut wire = Vec::new();
        let mut out = RfbOutStream::new(&mut wire);
        init.write_to(&mut out);
        out.flush().await.unwrap();
        assert_eq!(wire.len(), 2 + 2 + 16 + 4 + 4);

        let mut inp = RfbInStream::new(Cursor::new(wire));
        let back = ServerInit::read_from(&mut inp).await.unwrap();
        assert_eq!(back, init);
    }

    #[tokio::test]
    async fn framebuffer_update_reads_raw_payload() {
        let pixels: Vec<u8> = vec![10, 20, 30, 255, 40, 50, 60, 255];
        let update = FramebufferUpdate {
            rectangles: vec![UpdateRectangle {
                rect: Rectangle {
                    x: 0,
                    y: 0,
                    width: 2,
                    height: 1,
                    encoding: types::ENCODING_RAW,
                },
                data: pixels.clone(),
            }],
        };

        let mut wire = Vec::new();
        let mut out = RfbOutStream::new(&mut wire);
        update.write_to(&mut out);
        out.flush().await.unwrap();

        // Body starts after the type byte.
        let mut inp = RfbInStream::new(Cursor::new(&wire[1..]));
        let back = FramebufferUpdate::read_from(&mut inp).await.unwrap();
        assert_eq!(back.rectangles.len(), 1);
        assert_eq!(back.rectangles[0].data, pixels);
    }

    #[tokio::test]
    async fn non_raw_encoding_is_unsupported() {
        let mut wire = Vec::new();
        let mut out = RfbOutStream::new(&mut wire);
        out.write_padding(1);
        out.write_u16(1);
        Rectangle {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            encoding: 16, // ZRLE
        }
        .write_to(&mut out);
        out.flush().await.unwrap();

        let mut inp = RfbInStream::new(Cursor::new(wire));
        let err = FramebufferUpdate::read_from(&mut inp).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn server_cut_text_round_trip() {
        let msg = ServerCutText {
            text: "copied".into(),
        };
        let mut wire = Vec::new();
        let mut out = RfbOutStream::new(&mut wire);
        msg.write_to(&mut out).unwrap();
        out.flush().await.unwrap();

        let mut inp = RfbInStream::new(Cursor::new(&wire[1..]));
        let back = ServerCutText::read_from(&mut inp).await.unwrap();
        assert_eq!(back.text, "copied");
    }

    #[tokio::test]
    async fn colour_map_entries_are_skipped_in_full() {
        let mut wire = Vec::new();
        let mut out = RfbOutStream::new(&mut wire);
        out.write_padding(1);
        out.write_u16(0); // first colour
        out.write_u16(2); // count
        out.write_bytes(&[0u8; 12]); // 2 entries * 6 bytes
        out.write_u8(0xAA); // trailing marker
        out.flush().await.unwrap();

        let mut inp = RfbInStream::new(Cursor::new(wire));
        skip_colour_map_entries(&mut inp).await.unwrap();
        assert_eq!(inp.read_u8().await.unwrap(), 0xAA);
    }
}
