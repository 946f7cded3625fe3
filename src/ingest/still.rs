//! Still image replayed as a camera (`file://<path>`).
//!
//! The image is decoded once on connect and every read returns the same frame.
//! Useful as a fixture camera and for demos without a device attached.

use anyhow::{anyhow, Context, Result};

use super::{CameraConfig, CameraStats, Pacer};
use crate::frame::Frame;

pub(super) struct StillImageSource {
    config: CameraConfig,
    path: String,
    frame: Option<Frame>,
    frame_count: u64,
    pacer: Pacer,
}

impl StillImageSource {
    pub(super) fn new(config: CameraConfig, path: String) -> Self {
        let pacer = Pacer::new(config.target_fps);
        Self {
            config,
            path,
            frame: None,
            frame_count: 0,
            pacer,
        }
    }

    pub(super) fn connect(&mut self) -> Result<()> {
        if self.path.is_empty() {
            return Err(anyhow!("file camera url is missing a path"));
        }
        let image = image::open(&self.path)
            .with_context(|| format!("decode still image {}", self.path))?;
        let frame = Frame::from_image(image);
        log::info!(
            "CameraSource: replaying {} ({}x{})",
            self.path,
            frame.width,
            frame.height
        );
        self.frame = Some(frame);
        Ok(())
    }

    pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(frame) = self.frame.as_ref() else {
            return Ok(None);
        };
        if let Some(max) = self.config.max_frames {
            if self.frame_count >= max {
                return Ok(None);
            }
        }
        self.pacer.wait();
        self.frame_count += 1;
        Ok(Some(frame.clone()))
    }

    pub(super) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}
