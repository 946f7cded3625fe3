use std::iter::FusedIterator;
use std::sync::Arc;

use super::CameraSource;
use crate::frame::{Frame, FrameSlot};

/// Lazy, non-restartable sequence of camera frames.
///
/// Each frame is published into the shared `FrameSlot` before it is yielded, so
/// the slot always holds the frame most recently handed to a consumer. The
/// first end-of-stream or read failure finishes the sequence and drops the
/// source, which releases the device. Dropping the stream early (client went
/// away) releases it the same way.
pub struct FrameStream {
    source: Option<CameraSource>,
    slot: Arc<FrameSlot>,
    yielded: u64,
}

impl FrameStream {
    pub fn new(source: CameraSource, slot: Arc<FrameSlot>) -> Self {
        Self {
            source: Some(source),
            slot,
            yielded: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.source.is_none()
    }

    pub fn frames_yielded(&self) -> u64 {
        self.yielded
    }

    fn release(&mut self, reason: &str) {
        if let Some(source) = self.source.take() {
            let stats = source.stats();
            log::info!(
                "camera {} released ({}) after {} frames",
                stats.source,
                reason,
                stats.frames_captured
            );
        }
    }
}

impl Iterator for FrameStream {
    type Item = Arc<Frame>;

    fn next(&mut self) -> Option<Arc<Frame>> {
        let source = self.source.as_mut()?;
        match source.next_frame() {
            Ok(Some(frame)) => {
                self.yielded += 1;
                Some(self.slot.publish(frame))
            }
            Ok(None) => {
                self.release("end of stream");
                None
            }
            Err(err) => {
                log::warn!("camera read failure: {:#}", err);
                self.release("read failure");
                None
            }
        }
    }
}

impl FusedIterator for FrameStream {}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.release("stream closed");
    }
}
