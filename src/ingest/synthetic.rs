//! Synthetic camera (`stub://`) used by tests and demos.

use anyhow::Result;

use super::{CameraConfig, CameraStats, Pacer};
use crate::frame::Frame;

pub(super) struct SyntheticSource {
    config: CameraConfig,
    frame_count: u64,
    connected: bool,
    pacer: Pacer,
}

impl SyntheticSource {
    pub(super) fn new(config: CameraConfig) -> Self {
        let pacer = Pacer::new(config.target_fps);
        Self {
            config,
            frame_count: 0,
            connected: false,
            pacer,
        }
    }

    /// Synthetic sources are always available.
    pub(super) fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "CameraSource: connected to {} (synthetic {}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Ok(None);
        }
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        self.pacer.wait();
        self.frame_count += 1;

        let pixels = self.generate_pixels();
        Frame::new(self.config.width, self.config.height, pixels).map(Some)
    }

    /// Diagonal gradient that drifts one step per frame.
    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as u64;
        let pixel_count = (self.config.width as usize) * (self.config.height as usize);
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        for i in 0..pixel_count as u64 {
            let x = i % width.max(1);
            let y = i / width.max(1);
            let base = x + y + self.frame_count;
            pixels.push((base % 256) as u8);
            pixels.push(((base * 2) % 256) as u8);
            pixels.push(((base * 3) % 256) as u8);
        }
        pixels
    }

    pub(super) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}
