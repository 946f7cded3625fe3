//! Camera frame sources.
//!
//! This module provides the sources the live feed reads from:
//! - Synthetic frames (`stub://<name>`) for tests and demos
//! - A still image replayed as a camera (`file://<path>`)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! Every source yields RGB24 `Frame`s. `Ok(None)` from `next_frame` is the
//! end-of-stream signal; an `Err` is a read failure. Either one ends the
//! `FrameStream` that wraps the source and releases the device.

mod frames;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod still;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::frame::Frame;

pub use frames::FrameStream;
use still::StillImageSource;
use synthetic::SyntheticSource;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// `stub://<name>`, `file://<path>`, or a V4L2 device path (e.g., "/dev/video0").
    pub url: String,
    /// Target frame rate. Synthetic and still sources pace to it; 0 disables pacing.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// End the stream after this many frames (synthetic and still sources only).
    pub max_frames: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "/dev/video0".to_string(),
            target_fps: 15,
            width: 640,
            height: 480,
            max_frames: None,
        }
    }
}

/// Camera source with a backend picked from the configured URL.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    Still(StillImageSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::DeviceSource),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        let backend = if config.url.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSource::new(config))
        } else if let Some(path) = config.url.strip_prefix("file://") {
            let path = path.to_string();
            CameraBackend::Still(StillImageSource::new(config, path))
        } else {
            device_backend(config)?
        };
        Ok(Self { backend })
    }

    /// Create the source and connect it in one step.
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let mut source = Self::new(config.clone())?;
        source.connect()?;
        Ok(source)
    }

    /// Acquire the underlying device.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            CameraBackend::Still(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Blocking read of the next frame. `Ok(None)` means the stream has ended.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            CameraBackend::Still(source) => source.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            CameraBackend::Still(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}

#[cfg(feature = "ingest-v4l2")]
fn device_backend(config: CameraConfig) -> Result<CameraBackend> {
    Ok(CameraBackend::Device(v4l2::DeviceSource::new(config)))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn device_backend(config: CameraConfig) -> Result<CameraBackend> {
    Err(anyhow::anyhow!(
        "camera '{}' requires the ingest-v4l2 feature",
        config.url
    ))
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Sleeps between reads so software sources do not outrun `target_fps`.
#[derive(Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    last: Option<Instant>,
}

impl Pacer {
    pub(crate) fn new(target_fps: u32) -> Self {
        Self {
            interval: frame_interval(target_fps),
            last: None,
        }
    }

    pub(crate) fn wait(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_fails_to_open() {
        let config = CameraConfig {
            url: "/dev/video-does-not-exist".to_string(),
            ..CameraConfig::default()
        };
        let opened = CameraSource::open(&config);
        assert!(opened.is_err());
    }

    #[test]
    fn frame_interval_handles_zero_fps() {
        assert_eq!(frame_interval(0), Duration::from_millis(0));
        assert_eq!(frame_interval(10), Duration::from_millis(100));
        assert_eq!(frame_interval(5000), Duration::from_millis(1));
    }
}
