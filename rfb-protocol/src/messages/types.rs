//! Shared wire types and protocol constants.

use crate::io::{RfbInStream, RfbOutStream};
use tokio::io::{AsyncRead, AsyncWrite};

// Client-to-server message types
pub const MSG_SET_ENCODINGS: u8 = 2;
pub const MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
pub const MSG_KEY_EVENT: u8 = 4;
pub const MSG_POINTER_EVENT: u8 = 5;
pub const MSG_CLIENT_CUT_TEXT: u8 = 6;

// Server-to-client message types
pub const MSG_FRAMEBUFFER_UPDATE: u8 = 0;
pub const MSG_SET_COLOUR_MAP_ENTRIES: u8 = 1;
pub const MSG_BELL: u8 = 2;
pub const MSG_SERVER_CUT_TEXT: u8 = 3;

/// Raw encoding: uncompressed pixel bytes in row-major order. The only
/// framebuffer encoding this client consumes.
pub const ENCODING_RAW: i32 = 0;

// Security types
pub const SECURITY_NONE: u8 = 1;
pub const SECURITY_VNC_AUTH: u8 = 2;

/// The 16 pixel-format bytes from ServerInit.
///
/// Preserved verbatim but not interpreted: raster math throughout the
/// client assumes 32-bit RGBA, which is what the supported servers send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat(pub [u8; 16]);

impl PixelFormat {
    /// Bits per pixel, the one field worth surfacing in logs.
    pub fn bits_per_pixel(&self) -> u8 {
        self.0[0]
    }

    /// Read the 16 raw bytes from an RFB input stream.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        let mut raw = [0u8; 16];
        stream.read_exact(&mut raw).await?;
        Ok(Self(raw))
    }

    /// Write the 16 raw bytes to an RFB output stream.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_bytes(&self.0);
    }
}

impl Default for PixelFormat {
    /// 32-bit true-color RGBA, little-endian shifts - what the automation
    /// client assumes everywhere.
    fn default() -> Self {
        let mut raw = [0u8; 16];
        raw[0] = 32; // bits per pixel
        raw[1] = 24; // depth
        raw[3] = 1; // true color
        raw[4..6].copy_from_slice(&255u16.to_be_bytes()); // red max
        raw[6..8].copy_from_slice(&255u16.to_be_bytes()); // green max
        raw[8..10].copy_from_slice(&255u16.to_be_bytes()); // blue max
        raw[10] = 0; // red shift
        raw[11] = 8; // green shift
        raw[12] = 16; // blue shift
        Self(raw)
    }
}

/// A framebuffer update rectangle header: position, size, encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl Rectangle {
    /// Read a 12-byte rectangle header.
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut RfbInStream<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
            encoding: stream.read_i32().await?,
        })
    }

    /// Write a 12-byte rectangle header.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut RfbOutStream<W>) {
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        stream.write_i32(self.encoding);
    }

    /// Byte length of a Raw-encoded payload for this rectangle (RGBA/32).
    pub fn raw_payload_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Encode a string as latin-1 for cut-text messages.
///
/// Returns `None` if any character is above U+00FF; the RFB cut-text wire
/// format cannot carry it.
pub fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if cp <= 0xFF {
                Some(cp as u8)
            } else {
                None
            }
        })
        .collect()
}

/// Decode latin-1 bytes into a string. Total: every byte maps to the
/// identically numbered code point.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
