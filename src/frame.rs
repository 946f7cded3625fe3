//! Camera frames and the shared "current frame" slot.
//!
//! - `Frame`: an RGB24 raster read from a camera. Pixels are owned and immutable.
//! - `FrameSlot`: single-slot cell holding the most recent frame. The live feed
//!   publishes into it; the capture action reads from it.
//!
//! Frames are handed around as `Arc<Frame>` so publishing never copies pixel data
//! and a reader keeps its frame alive even after the slot moves on.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::sync::{Arc, Mutex, PoisonError};

/// JPEG quality used for the live feed and the captured image.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// One RGB24 raster image (width x height x 3 channels).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGB24 pixels. The buffer length must be exactly `width * height * 3`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Uniformly colored frame.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            width,
            height,
            data: rgb.repeat(pixel_count),
        }
    }

    pub fn from_image(image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            width,
            height,
            data: rgb.into_raw(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Encode as baseline JPEG. Encoding is deterministic: the same frame at the
    /// same quality always yields the same bytes.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.data.len() / 8);
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .write_image(&self.data, self.width, self.height, ExtendedColorType::Rgb8)
            .with_context(|| format!("encode {}x{} frame as jpeg", self.width, self.height))?;
        Ok(out)
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Single-slot synchronized cell holding the latest camera frame.
///
/// Writers replace the whole `Arc` under the lock, so a reader gets either the
/// previous frame or the new one, never a partially written frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    current: Mutex<Option<Arc<Frame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame and return the shared handle that was stored.
    pub fn publish(&self, frame: Frame) -> Arc<Frame> {
        let frame = Arc::new(frame);
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(frame.clone());
        frame
    }

    /// Latest frame, or `None` if nothing was ever published.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    pub fn clear(&self) {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    pub fn is_empty(&self) -> bool {
        self.latest().is_none()
    }
}
