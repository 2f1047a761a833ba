//! Captured frames.
//!
//! `Frame` owns one tightly packed RGB24 image plus capture metadata. Frames
//! are produced by `ingest` sources, handed to a detector backend once, and
//! dropped at the end of the frame pass. Nothing retains pixels across
//! frames.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::detect::{Detection, DetectorBackend};

pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source capture counter, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Wrap RGB24 pixels. The buffer must be exactly `width * height * 3`
    /// bytes.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Uniform gray frame, for tests and scripted replays.
    pub fn blank(width: u32, height: u32, sequence: u64) -> Result<Self> {
        let len = (width as usize) * (height as usize) * 3;
        Self::new(vec![128u8; len], width, height, sequence)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Run a detector on this frame, timing the call.
    ///
    /// The call is blocking. Errors are returned untouched so the caller can
    /// skip the frame.
    pub fn run_detector(
        &self,
        backend: &mut dyn DetectorBackend,
    ) -> Result<(Vec<Detection>, Duration)> {
        let start = Instant::now();
        let detections = backend.detect(&self.data, self.width, self.height)?;
        Ok((detections, start.elapsed()))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::ScriptedBackend;

    #[test]
    fn rejects_wrong_buffer_length() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, 1).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, 1).is_ok());
    }

    #[test]
    fn run_detector_returns_backend_output() -> Result<()> {
        let frame = Frame::blank(4, 4, 1)?;
        let mut backend =
            ScriptedBackend::from_frames(vec![vec![Detection::person(0.0, 0.0, 2.0, 3.0)]]);

        let (detections, elapsed) = frame.run_detector(&mut backend)?;
        assert_eq!(detections.len(), 1);
        assert!(elapsed < Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn debug_output_omits_pixels() -> Result<()> {
        let frame = Frame::blank(2, 1, 7)?;
        let text = format!("{:?}", frame);
        assert!(text.contains("sequence: 7"));
        assert!(text.contains("bytes: 6"));
        Ok(())
    }
}
