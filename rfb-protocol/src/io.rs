//! Buffered I/O streams for RFB protocol communication.
//!
//! [`RfbInStream`] and [`RfbOutStream`] wrap any async byte transport and
//! provide type-safe reads and writes of the primitive types the RFB wire
//! format is made of. All multi-byte integers are network byte order.
//!
//! The input stream is also where the "receive exactly n bytes" contract of
//! the transport layer lives: [`RfbInStream::read_exact_vec`] keeps pulling
//! from the underlying transport until the requested count is buffered, so a
//! message split across several TCP segments or WebSocket frames is
//! reassembled transparently.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const DEFAULT_BUFFER_CAPACITY: usize = 8192;

/// Buffered input stream reading RFB primitives in network byte order.
pub struct RfbInStream<R> {
    reader: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> RfbInStream<R> {
    /// Create an input stream with the default buffer capacity (8 KiB).
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_CAPACITY),
        }
    }

    /// Buffer at least `n` bytes, reading from the transport as needed.
    ///
    /// A transport that reaches EOF before `n` bytes are available yields
    /// `UnexpectedEof` - for this protocol a peer close mid-message is
    /// always fatal.
    async fn ensure(&mut self, n: usize) -> std::io::Result<()> {
        while self.buffer.len() < n {
            let read = self.reader.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "connection closed mid-message: wanted {} bytes, have {}",
                        n,
                        self.buffer.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Read a single byte.
    pub async fn read_u8(&mut self) -> std::io::Result<u8> {
        self.ensure(1).await?;
        Ok(self.buffer.get_u8())
    }

    /// Read a big-endian u16.
    pub async fn read_u16(&mut self) -> std::io::Result<u16> {
        self.ensure(2).await?;
        Ok(self.buffer.get_u16())
    }

    /// Read a big-endian u32.
    pub async fn read_u32(&mut self) -> std::io::Result<u32> {
        self.ensure(4).await?;
        Ok(self.buffer.get_u32())
    }

    /// Read a big-endian i32 (encoding numbers are signed).
    pub async fn read_i32(&mut self) -> std::io::Result<i32> {
        self.ensure(4).await?;
        Ok(self.buffer.get_i32())
    }

    /// Fill `buf` with exactly `buf.len()` bytes.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.ensure(buf.len()).await?;
        self.buffer.copy_to_slice(buf);
        Ok(())
    }

    /// Read exactly `n` bytes into a fresh vector.
    ///
    /// Large counts (Raw pixel payloads) are read through the same buffer,
    /// so interleaved WebSocket frame boundaries are invisible to callers.
    pub async fn read_exact_vec(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        self.ensure(n).await?;
        let mut out = vec![0u8; n];
        self.buffer.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Discard `n` bytes of padding.
    pub async fn skip(&mut self, n: usize) -> std::io::Result<()> {
        self.ensure(n).await?;
        self.buffer.advance(n);
        Ok(())
    }

    /// Bytes currently buffered and readable without transport I/O.
    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the stream, returning the underlying reader.
    ///
    /// Any buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Buffered output stream writing RFB primitives in network byte order.
///
/// Writes accumulate in an internal buffer; nothing reaches the transport
/// until [`flush`](Self::flush) is called. Each protocol message is written
/// and flushed as a unit, which keeps message boundaries aligned with
/// WebSocket frames on that transport.
pub struct RfbOutStream<W> {
    writer: W,
    buffer: BytesMut,
}

impl<W: AsyncWrite + Unpin> RfbOutStream<W> {
    /// Create an output stream with the default buffer capacity (8 KiB).
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: BytesMut::with_capacity(DEFAULT_BUFFER_CAPACITY),
        }
    }

    /// Buffer a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Buffer a big-endian u16.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.put_u16(value);
    }

    /// Buffer a big-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32(value);
    }

    /// Buffer a big-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32(value);
    }

    /// Buffer a byte slice.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Buffer `n` zero bytes of padding.
    pub fn write_padding(&mut self, n: usize) {
        self.buffer.put_bytes(0, n);
    }

    /// Write all buffered data to the transport and flush it.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer).await?;
            self.buffer.clear();
        }
        self.writer.flush().await
    }

    /// Bytes buffered and not yet flushed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Shut down the underlying writer.
    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        self.flush().await?;
        self.writer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_primitives_big_endian() {
        let data = vec![0x07, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xFF, 0xFF, 0xFE];
        let mut stream = RfbInStream::new(Cursor::new(data));

        assert_eq!(stream.read_u8().await.unwrap(), 0x07);
        assert_eq!(stream.read_u16().await.unwrap(), 0x1234);
        assert_eq!(stream.read_u32().await.unwrap(), 0xDEAD_BEEF);
        assert_eq!(stream.read_i32().await.unwrap(), -2);
    }

    #[tokio::test]
    async fn read_exact_vec_spans_reads() {
        let data: Vec<u8> = (0..32).collect();
        let mut stream = RfbInStream::new(Cursor::new(data.clone()));

        let first = stream.read_exact_vec(10).await.unwrap();
        assert_eq!(first, &data[..10]);
        let rest = stream.read_exact_vec(22).await.unwrap();
        assert_eq!(rest, &data[10..]);
    }

    #[tokio::test]
    async fn skip_discards_padding() {
        let data = vec![1, 2, 3, 4, 5];
        let mut stream = RfbInStream::new(Cursor::new(data));

        stream.skip(3).await.unwrap();
        assert_eq!(stream.read_u8().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn short_stream_is_unexpected_eof() {
        let mut stream = RfbInStream::new(Cursor::new(vec![1u8, 2]));
        let err = stream.read_u32().await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn writes_are_buffered_until_flush() {
        let mut sink = Vec::new();
        let mut stream = RfbOutStream::new(&mut sink);

        stream.write_u8(5);
        stream.write_u16(0x0102);
        stream.write_padding(2);
        stream.write_u32(0x0A0B_0C0D);
        stream.write_bytes(b"ok");
        assert_eq!(stream.buffered(), 11);

        stream.flush().await.unwrap();
        assert_eq!(stream.buffered(), 0);
        assert_eq!(
            sink,
            vec![5, 0x01, 0x02, 0, 0, 0x0A, 0x0B, 0x0C, 0x0D, b'o', b'k']
        );
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let mut wire = Vec::new();
        {
            let mut out = RfbOutStream::new(&mut wire);
            out.write_u8(42);
            out.write_i32(-260);
            out.write_bytes(b"demo");
            out.flush().await.unwrap();
        }

        let mut inp = RfbInStream::new(Cursor::new(wire));
        assert_eq!(inp.read_u8().await.unwrap(), 42);
        assert_eq!(inp.read_i32().await.unwrap(), -260);
        assert_eq!(inp.read_exact_vec(4).await.unwrap(), b"demo");
        assert_eq!(inp.available(), 0);
    }
}
