//! Camera frame source.
//!
//! `CameraSource` reads frames from a local V4L2 device (feature
//! `ingest-v4l2`) or from a synthetic generator for `stub://` paths.
//!
//! A failed read is reported as "no frame available" (`Ok(None)`) rather
//! than an error. The frame loop simply tries again on its next tick.

use anyhow::{anyhow, Result};
#[cfg(feature = "ingest-v4l2")]
use anyhow::Context;
#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;
#[cfg(feature = "ingest-v4l2")]
use std::time::{Duration, Instant};

use crate::frame::Frame;
#[cfg(feature = "ingest-v4l2")]
use super::normalize::{normalize_to_rgb, PixelFormat};

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0") or "stub://<name>".
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        if config.device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            })
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                Ok(Self {
                    backend: CameraBackend::Device(DeviceCamera::new(config)),
                })
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                Err(anyhow!(
                    "camera device {} requires the ingest-v4l2 feature",
                    config.device
                ))
            }
        }
    }

    /// Make every `gap_every`-th synthetic read report no frame. Ignored by
    /// real devices.
    pub fn with_synthetic_gaps(mut self, gap_every: u64) -> Self {
        if let CameraBackend::Synthetic(source) = &mut self.backend {
            source.gap_every = gap_every;
        }
        self
    }

    /// Acquire the camera.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Release the camera. A later `connect` acquires it afresh.
    pub fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.release(),
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.connected,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.state.is_some(),
        }
    }

    /// Read the next frame, or `None` when no frame is available this tick.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.read_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.read_frame(),
        }
    }

    /// Check if the source is healthy.
    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.connected,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats.clone(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats.clone(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub frames_missed: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    connected: bool,
    reads: u64,
    gap_every: u64,
    stats: CameraStats,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        let stats = CameraStats {
            device: config.device.clone(),
            ..CameraStats::default()
        };
        Self {
            config,
            connected: false,
            reads: 0,
            gap_every: 0,
            stats,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("CameraSource: connected to {} (synthetic)", self.config.device);
        Ok(())
    }

    fn release(&mut self) {
        if self.connected {
            log::info!("CameraSource: released {}", self.config.device);
        }
        self.connected = false;
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            self.stats.frames_missed += 1;
            return Ok(None);
        }
        self.reads += 1;
        if self.gap_every > 0 && self.reads % self.gap_every == 0 {
            self.stats.frames_missed += 1;
            return Ok(None);
        }

        self.stats.frames_captured += 1;
        let pixels = self.generate_pixels();
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.stats.frames_captured,
        )
        .map(Some)
    }

    /// Horizontal gradient that drifts a little every frame.
    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let pixel_count = width * self.config.height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        for i in 0..pixel_count {
            let x = (i % width) as u64;
            let value = ((x + self.stats.frames_captured) % 256) as u8;
            pixels.extend_from_slice(&[value, value, value]);
        }
        pixels
    }
}

// ----------------------------------------------------------------------------
// V4L2 device source
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    stats: CameraStats,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        let stats = CameraStats {
            device: config.device.clone(),
            ..CameraStats::default()
        };
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Yuyv,
            last_frame_at: None,
            last_error: None,
            stats,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "v4l2 device {} negotiated unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;
        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "CameraSource: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("CameraSource: released {}", self.config.device);
        }
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            self.stats.frames_missed += 1;
            return Ok(None);
        };
        let captured = state.with_mut(|fields| fields.stream.next().map(|(buf, _)| buf.to_vec()));
        let raw = match captured {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("CameraSource: read failed on {}: {}", self.config.device, err);
                self.last_error = Some(err.to_string());
                self.stats.frames_missed += 1;
                return Ok(None);
            }
        };

        let rgb = match normalize_to_rgb(&raw, self.active_width, self.active_height, self.format)
        {
            Ok(rgb) => rgb,
            Err(err) => {
                log::warn!("CameraSource: dropped malformed frame: {}", err);
                self.stats.frames_missed += 1;
                return Ok(None);
            }
        };

        self.last_error = None;
        self.last_frame_at = Some(Instant::now());
        self.stats.frames_captured += 1;
        Frame::new(
            rgb,
            self.active_width,
            self.active_height,
            self.stats.frames_captured,
        )
        .map(Some)
    }

    fn is_healthy(&self) -> bool {
        if self.state.is_none() || self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= Duration::from_secs(2)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://desk".to_string(),
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        source.connect()?;

        let frame = source.read_frame()?.expect("frame");
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
        Ok(())
    }

    #[test]
    fn released_source_reports_no_frame() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?;
        assert!(source.read_frame()?.is_none());

        source.connect()?;
        assert!(source.read_frame()?.is_some());
        source.release();
        assert!(!source.is_connected());
        assert!(source.read_frame()?.is_none());

        let stats = source.stats();
        assert_eq!(stats.frames_captured, 1);
        assert_eq!(stats.frames_missed, 2);
        Ok(())
    }

    #[test]
    fn synthetic_gaps_skip_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config())?.with_synthetic_gaps(3);
        source.connect()?;

        let got: Vec<bool> = (0..6)
            .map(|_| source.read_frame().map(|f| f.is_some()))
            .collect::<Result<_>>()?;
        assert_eq!(got, vec![true, true, false, true, true, false]);
        Ok(())
    }

    #[test]
    fn rejects_zero_sized_frames() {
        let config = CameraConfig {
            width: 0,
            ..stub_config()
        };
        assert!(CameraSource::new(config).is_err());
    }
}
