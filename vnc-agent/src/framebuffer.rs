//! Client-side framebuffer state.
//!
//! The framebuffer owns the current RGBA image of the remote desktop,
//! sized once from ServerInit. Rectangle updates from the server are
//! written in place; readers always get owned copies, never references
//! into the raster.

use crate::errors::{Result, VncError};
use rfb_common::Region;

const BYTES_PER_PIXEL: usize = 4;

/// An owned RGBA image copied out of the framebuffer.
///
/// `data` is row-major, `width * height * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u16,
    pub height: u16,
    pub data: Vec<u8>,
}

impl Raster {
    /// Total byte length for the dimensions.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_PIXEL
    }
}

/// The remote desktop's pixel state.
pub struct Framebuffer {
    width: u16,
    height: u16,
    data: Vec<u8>,
    dirty: bool,
}

impl Framebuffer {
    /// Allocate a zeroed raster of the negotiated dimensions.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
            dirty: false,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// The full framebuffer as a region.
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    /// Write one rectangle of RGBA pixels received from the server.
    ///
    /// # Errors
    ///
    /// [`VncError::Protocol`] when the rectangle leaves the negotiated
    /// bounds or the payload length is not exactly `w * h * 4` - either
    /// way the server broke the protocol and the session is unusable.
    pub fn apply_rectangle(&mut self, region: Region, pixels: &[u8]) -> Result<()> {
        if !region.fits_within(self.width, self.height) {
            return Err(VncError::Protocol(format!(
                "update rectangle {}x{}+{}+{} exceeds framebuffer {}x{}",
                region.width, region.height, region.x, region.y, self.width, self.height
            )));
        }
        let expected = region.pixel_count() * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(VncError::Protocol(format!(
                "update rectangle payload is {} bytes, expected {}",
                pixels.len(),
                expected
            )));
        }

        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for row in 0..region.height as usize {
            let src = row * row_bytes;
            let dst = (region.y as usize + row) * stride + region.x as usize * BYTES_PER_PIXEL;
            self.data[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }

        self.dirty = true;
        Ok(())
    }

    /// Copy out the whole raster.
    pub fn full(&self) -> Raster {
        Raster {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }

    /// Copy out a region of the raster.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] when the region is empty or leaves the raster -
    /// this is the caller's mistake, not the server's.
    pub fn region(&self, region: Region) -> Result<Raster> {
        if region.is_empty() {
            return Err(VncError::Input(format!(
                "region must be non-empty, got {}x{}",
                region.width, region.height
            )));
        }
        if !region.fits_within(self.width, self.height) {
            return Err(VncError::Input(format!(
                "region {}x{}+{}+{} exceeds framebuffer {}x{}",
                region.width, region.height, region.x, region.y, self.width, self.height
            )));
        }

        let row_bytes = region.width as usize * BYTES_PER_PIXEL;
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(region.pixel_count() * BYTES_PER_PIXEL);
        for row in 0..region.height as usize {
            let src = (region.y as usize + row) * stride + region.x as usize * BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[src..src + row_bytes]);
        }

        Ok(Raster {
            width: region.width,
            height: region.height,
            data,
        })
    }

    /// Whether an update landed since the last call; reading clears the
    /// flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Drop the pixel contents, keeping the dimensions.
    pub fn reset(&mut self) {
        self.data.iter_mut().for_each(|b| *b = 0);
        self.dirty = false;
    }
}
