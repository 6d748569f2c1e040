//! codecam‑sample – draw the current camera frame into a viewport-sized
//! RGB raster and snapshot it for the decoder.

use codecam_camera::{CameraError, VideoFrame, VideoTrack};
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("Viewport {0}x{1} has no area")]
    EmptyViewport(u32, u32),
    #[error("Frame unavailable: {0}")]
    Frame(#[from] CameraError),
    #[error("NV12 frame must have even dimensions, got {0}x{1}")]
    OddDimensions(u32, u32),
    #[error("NV12 frame too short: {got} bytes, expected {expected}")]
    ShortFrame { got: usize, expected: usize },
    #[error("Viewport {0}x{1} is too large to allocate")]
    ViewportTooLarge(u32, u32),
    #[error("Resize failed: {0}")]
    Resize(#[from] resize::Error),
}

pub type Result<T> = std::result::Result<T, SampleError>;

/// Size of the display area frames are sampled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Immutable RGB8 snapshot of one sampled frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelPayload {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelPayload {
    /// Copy into an [`image::RgbImage`]; `None` if the byte count is off.
    pub fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

// Largest raster edge accepted from a viewport.
const MAX_VIEWPORT_SIDE: u32 = 16_384;

/// Reusable RGB surface, reshaped to the viewport every cycle.
#[derive(Debug, Default)]
struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    fn reshape(&mut self, viewport: Viewport) -> Result<()> {
        let len = Some(viewport)
            .filter(|v| v.width <= MAX_VIEWPORT_SIDE && v.height <= MAX_VIEWPORT_SIDE)
            .and_then(|v| (v.width as usize).checked_mul(v.height as usize))
            .and_then(|n| n.checked_mul(3))
            .ok_or(SampleError::ViewportTooLarge(viewport.width, viewport.height))?;
        if (self.width, self.height) != (viewport.width, viewport.height) {
            log::debug!("raster resized to {}x{}", viewport.width, viewport.height);
        }
        self.width = viewport.width;
        self.height = viewport.height;
        self.pixels.resize(len, 0);
        Ok(())
    }
}

/// Draws frames into a raster it keeps between calls.
///
/// Not meant to be shared; one sampler serves one scan loop.
#[derive(Debug, Default)]
pub struct FrameSampler {
    raster: RasterBuffer,
    // full-resolution RGB of the source frame
    scratch: Vec<u8>,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the track's current frame at viewport size and extract it.
    pub fn sample(&mut self, track: &dyn VideoTrack, viewport: Viewport) -> Result<PixelPayload> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(SampleError::EmptyViewport(viewport.width, viewport.height));
        }
        let frame = track.current_frame()?;
        self.draw(&frame, viewport)?;

        Ok(PixelPayload {
            width: self.raster.width,
            height: self.raster.height,
            data: self.raster.pixels.clone(),
        })
    }

    fn draw(&mut self, frame: &VideoFrame, viewport: Viewport) -> Result<()> {
        // 1. validate the NV12 geometry
        if frame.width % 2 != 0 || frame.height % 2 != 0 {
            return Err(SampleError::OddDimensions(frame.width, frame.height));
        }
        let expected = frame.expected_len();
        if frame.data.len() < expected || frame.stride < frame.width {
            return Err(SampleError::ShortFrame { got: frame.data.len(), expected });
        }

        // 2. Convert NV12 → RGB
        let w = frame.width as usize;
        let h = frame.height as usize;
        let stride = frame.stride as usize;
        let (y_plane, uv_plane) = frame.data.split_at(stride * h);
        self.scratch.resize(w * h * 3, 0);
        nv12_to_rgb(y_plane, uv_plane, w, h, stride, &mut self.scratch);

        // 3. Resize into the viewport-sized raster
        self.raster.reshape(viewport)?;
        let mut resizer = new(
            w,
            h,
            viewport.width as usize,
            viewport.height as usize,
            Pixel::RGB8,
            Type::Triangle,
        )?;
        resizer.resize(self.scratch.as_rgb(), self.raster.pixels.as_rgb_mut())?;
        Ok(())
    }
}

/// Naive NV12 4:2:0 → RGB24 conversion (BT.601, full range).
fn nv12_to_rgb(y: &[u8], uv: &[u8], w: usize, h: usize, stride: usize, out: &mut [u8]) {
    for j in 0..h {
        for i in 0..w {
            let y_val = y[j * stride + i] as f32;
            let uv_idx = (j / 2) * stride + (i & !1);
            let u = uv[uv_idx]     as f32 - 128.0;
            let v = uv[uv_idx + 1] as f32 - 128.0;

            let r = (y_val + 1.402 * v).clamp(0.0, 255.0);
            let g = (y_val - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
            let b = (y_val + 1.772 * u).clamp(0.0, 255.0);

            let base = (j * w + i) * 3;
            out[base]     = r as u8;
            out[base + 1] = g as u8;
            out[base + 2] = b as u8;
        }
    }
}
