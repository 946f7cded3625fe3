//! Multipart MJPEG framing for the live feed.
//!
//! Each frame becomes one self-delimiting part:
//!
//! ```text
//! --frame\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <jpeg bytes>\r\n
//! ```

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;

use crate::frame::{Frame, DEFAULT_JPEG_QUALITY};

/// Multipart boundary marker shared by every part of the stream.
pub const BOUNDARY: &str = "frame";

/// Response content type announcing the boundary.
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Clone, Copy, Debug)]
pub struct MjpegEncoder {
    quality: u8,
}

impl Default for MjpegEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl MjpegEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    pub fn content_type(&self) -> &'static str {
        STREAM_CONTENT_TYPE
    }

    /// JPEG-encode a frame and wrap it as one multipart chunk.
    pub fn encode_chunk(&self, frame: &Frame) -> Result<Vec<u8>> {
        let jpeg = frame.to_jpeg(self.quality)?;
        Ok(frame_chunk(&jpeg))
    }

    /// Push every frame to `out` until the frames run out or the peer stops
    /// reading. Returns the number of chunks delivered.
    ///
    /// A write failure means the client went away and ends the stream quietly;
    /// encode failures are returned.
    pub fn write_stream<W, I>(&self, out: &mut W, frames: I) -> Result<u64>
    where
        W: Write,
        I: IntoIterator<Item = Arc<Frame>>,
    {
        let mut sent = 0u64;
        for frame in frames {
            let chunk = self.encode_chunk(&frame)?;
            if let Err(err) = out.write_all(&chunk).and_then(|_| out.flush()) {
                log::debug!("live feed client disconnected: {}", err);
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

/// Wrap already-encoded JPEG bytes as one multipart chunk.
pub fn frame_chunk(jpeg: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(jpeg.len() + 64);
    payload.extend_from_slice(b"--");
    payload.extend_from_slice(BOUNDARY.as_bytes());
    payload.extend_from_slice(b"\r\n");
    payload.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    payload.extend_from_slice(jpeg);
    payload.extend_from_slice(b"\r\n");
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_boundary_header_body_crlf() {
        let chunk = frame_chunk(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
        assert!(chunk.starts_with(header));
        assert_eq!(&chunk[header.len()..header.len() + 4], &[0xFF, 0xD8, 0xFF, 0xD9]);
        assert!(chunk.ends_with(b"\r\n"));
        assert_eq!(chunk.len(), header.len() + 4 + 2);
    }

    #[test]
    fn content_type_names_the_boundary() {
        let encoder = MjpegEncoder::default();
        assert!(encoder
            .content_type()
            .ends_with(&format!("boundary={}", BOUNDARY)));
    }

    #[test]
    fn write_stream_emits_one_chunk_per_frame() -> Result<()> {
        let encoder = MjpegEncoder::default();
        let frames = vec![
            Arc::new(Frame::solid(8, 8, [0, 0, 255])),
            Arc::new(Frame::solid(8, 8, [0, 255, 0])),
        ];
        let mut out = Vec::new();
        let sent = encoder.write_stream(&mut out, frames)?;
        assert_eq!(sent, 2);

        let text = String::from_utf8_lossy(&out);
        assert_eq!(text.matches("--frame\r\n").count(), 2);
        Ok(())
    }

    struct ClosedPeer;

    impl Write for ClosedPeer {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_stream_stops_quietly_when_peer_leaves() -> Result<()> {
        let encoder = MjpegEncoder::default();
        let frames = std::iter::repeat_with(|| Arc::new(Frame::solid(4, 4, [1, 2, 3])));
        let sent = encoder.write_stream(&mut ClosedPeer, frames)?;
        assert_eq!(sent, 0);
        Ok(())
    }
}
