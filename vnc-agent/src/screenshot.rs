//! Screenshot capture and image encoding.
//!
//! Capturing asks the server for a framebuffer update, applies it, and
//! copies the requested pixels out of the raster. Encoding hands the RGBA
//! raster to the `image` crate; JPEG has no alpha channel, so the raster
//! is composited over opaque white first.

use crate::connection::SharedSession;
use crate::errors::{Result, VncError};
use crate::framebuffer::Raster;
use crate::pointer::pace;
use rfb_common::Region;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Output formats for saved screenshots and video frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
}

impl ImageFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
        }
    }
}

/// Captures still images of the remote desktop.
#[derive(Clone)]
pub struct Screenshot {
    session: SharedSession,
}

impl Screenshot {
    pub(crate) fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Capture the full desktop.
    ///
    /// `incremental` requests only changed pixels (the raster fills in the
    /// rest); a full refresh re-reads everything.
    pub async fn capture(&self, incremental: bool, delay: Duration) -> Result<Raster> {
        pace(delay).await;
        capture_raster(&self.session, incremental, None).await
    }

    /// Capture a region of the desktop.
    ///
    /// # Errors
    ///
    /// [`VncError::Input`] when the region is empty or exceeds the
    /// negotiated framebuffer bounds.
    pub async fn capture_region(
        &self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        delay: Duration,
    ) -> Result<Raster> {
        pace(delay).await;
        capture_raster(&self.session, false, Some(Region::new(x, y, width, height))).await
    }

    /// Capture the full desktop and write it to `path`.
    pub async fn save(
        &self,
        path: impl AsRef<Path>,
        format: ImageFormat,
        incremental: bool,
        delay: Duration,
    ) -> Result<()> {
        let raster = self.capture(incremental, delay).await?;
        let encoded = encode_raster(&raster, format)?;
        tokio::fs::write(path, encoded)
            .await
            .map_err(|e| VncError::Input(format!("failed to write screenshot: {}", e)))
    }

    /// Capture a region and write it to `path`.
    pub async fn save_region(
        &self,
        path: impl AsRef<Path>,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        format: ImageFormat,
        delay: Duration,
    ) -> Result<()> {
        let raster = self.capture_region(x, y, width, height, delay).await?;
        let encoded = encode_raster(&raster, format)?;
        tokio::fs::write(path, encoded)
            .await
            .map_err(|e| VncError::Input(format!("failed to write screenshot: {}", e)))
    }

    /// Capture the full desktop and return the encoded image bytes.
    pub async fn to_bytes(
        &self,
        format: ImageFormat,
        incremental: bool,
        delay: Duration,
    ) -> Result<Vec<u8>> {
        let raster = self.capture(incremental, delay).await?;
        encode_raster(&raster, format)
    }
}

/// The capture path shared with the video recorder: request an update,
/// pump until it has been applied, copy pixels out.
pub(crate) async fn capture_raster(
    session: &SharedSession,
    incremental: bool,
    region: Option<Region>,
) -> Result<Raster> {
    let mut session = session.lock().await;
    let result = async {
        let conn = session.connection()?;
        let bounds = conn.framebuffer_bounds();

        let target = match region {
            Some(r) => {
                if r.is_empty() || !r.fits_within(bounds.width, bounds.height) {
                    return Err(VncError::Input(format!(
                        "capture region {}x{}+{}+{} exceeds framebuffer {}x{}",
                        r.width, r.height, r.x, r.y, bounds.width, bounds.height
                    )));
                }
                r
            }
            None => bounds,
        };

        conn.request_update(incremental, target).await?;
        conn.wait_for_update().await?;

        match region {
            Some(r) => conn.framebuffer().region(r),
            None => Ok(conn.framebuffer().full()),
        }
    }
    .await;
    session.finish(result)
}

/// Encode an RGBA raster into the requested format.
pub(crate) fn encode_raster(raster: &Raster, format: ImageFormat) -> Result<Vec<u8>> {
    if raster.data.len() != raster.byte_len() {
        return Err(VncError::Input(format!(
            "raster is {} bytes, expected {} for {}x{}",
            raster.data.len(),
            raster.byte_len(),
            raster.width,
            raster.height
        )));
    }

    let image = image::RgbaImage::from_raw(
        u32::from(raster.width),
        u32::from(raster.height),
        raster.data.clone(),
    )
    .ok_or_else(|| VncError::Input("raster dimensions do not match data".into()))?;

    let mut out = Cursor::new(Vec::new());
    let encode_result = match format {
        ImageFormat::Png => image.write_to(&mut out, image::ImageOutputFormat::Png),
        ImageFormat::Bmp => image.write_to(&mut out, image::ImageOutputFormat::Bmp),
        ImageFormat::Jpeg => {
            flatten_over_white(&image).write_to(&mut out, image::ImageOutputFormat::Jpeg(90))
        }
    };
    encode_result.map_err(|e| VncError::Input(format!("image encoding failed: {}", e)))?;
    Ok(out.into_inner())
}

/// Composite RGBA over an opaque white background, yielding RGB.
fn flatten_over_white(image: &image::RgbaImage) -> image::RgbImage {
    image::RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let image::Rgba([r, g, b, a]) = *image.get_pixel(x, y);
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(width: u16, height: u16, fill: [u8; 4]) -> Raster {
        Raster {
            width,
            height,
            data: fill
                .iter()
                .copied()
                .cycle()
                .take(width as usize * height as usize * 4)
                .collect(),
        }
    }

    #[test]
    fn encodes_all_formats() {
        let r = raster(4, 2, [10, 200, 30, 255]);
        for format in [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Bmp] {
            let bytes = encode_raster(&r, format).unwrap();
            assert!(!bytes.is_empty(), "{:?} produced no bytes", format);
        }
    }

    #[test]
    fn png_round_trips_pixels() {
        let r = raster(3, 3, [1, 2, 3, 255]);
        let bytes = encode_raster(&r, ImageFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 3));
        assert_eq!(decoded.into_raw(), r.data);
    }

    #[test]
    fn jpeg_flattens_alpha_over_white() {
        // Fully transparent pixels must encode as white, not black.
        let r = raster(2, 2, [255, 0, 0, 0]);
        let bytes = encode_raster(&r, ImageFormat::Jpeg).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        let p = decoded.get_pixel(0, 0);
        assert!(p[0] > 240 && p[1] > 240 && p[2] > 240, "expected near-white, got {:?}", p);
    }

    #[test]
    fn mismatched_raster_is_rejected() {
        let bad = Raster {
            width: 2,
            height: 2,
            data: vec![0; 7],
        };
        assert!(matches!(
            encode_raster(&bad, ImageFormat::Png),
            Err(VncError::Input(_))
        ));
    }

    #[test]
    fn extensions() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
        assert_eq!(ImageFormat::Bmp.extension(), "bmp");
    }
}
