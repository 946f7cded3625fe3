//! V4L2 camera source.
//!
//! Opens a local device node (e.g., /dev/video0), negotiates RGB24 with a YUYV
//! fallback, and reads frames through a memory-mapped buffer stream. The device
//! handle lives as long as the source; dropping the source closes the device.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{CameraConfig, CameraStats};
use crate::frame::Frame;

pub struct DeviceSource {
    config: CameraConfig,
    state: Option<DeviceState>,
    pixel_format: PixelFormat,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceSource {
    pub(super) fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            pixel_format: PixelFormat::Rgb24,
            frame_count: 0,
        }
    }

    pub(super) fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.url)
            .with_context(|| format!("open v4l2 device {}", self.config.url))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.url,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.pixel_format = if format.fourcc == v4l::FourCC::new(b"RGB3") {
            PixelFormat::Rgb24
        } else {
            let mut yuyv = format;
            yuyv.fourcc = v4l::FourCC::new(b"YUYV");
            let negotiated = device.set_format(&yuyv).context("set v4l2 YUYV format")?;
            if negotiated.fourcc != v4l::FourCC::new(b"YUYV") {
                return Err(anyhow!(
                    "v4l2 device {} supports neither RGB3 nor YUYV (got {})",
                    self.config.url,
                    negotiated.fourcc
                ));
            }
            self.active_width = negotiated.width;
            self.active_height = negotiated.height;
            PixelFormat::Yuyv
        };
        if self.pixel_format == PixelFormat::Rgb24 {
            self.active_width = format.width;
            self.active_height = format.height;
        }

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.url,
                    err
                );
            }
        }

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{} {:?})",
            self.config.url,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;

        let pixels = normalize_to_rgb(
            buf,
            self.active_width,
            self.active_height,
            self.pixel_format,
        )?;
        self.frame_count += 1;

        Frame::new(self.active_width, self.active_height, pixels).map(Some)
    }

    pub(super) fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            source: self.config.url.clone(),
        }
    }
}
