//! Detection session lifecycle and the frame loop.
//!
//! A `DetectionSession` ties one camera, one detector registry and one
//! `DeskMonitor` together. `stop` releases the camera and `start` acquires a
//! fresh one. Restarting also clears tracked slots unless
//! `reset_on_restart` is off.
//!
//! `FrameLoop` drives `tick` at a fixed nominal interval on the calling
//! thread. A tick that runs long simply delays the next one. Nothing is
//! queued, skipped or run in parallel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::config::{DeskwatchConfig, DetectorKind};
use crate::detect::{BackendRegistry, ScriptedBackend};
use crate::ingest::{CameraSource, CameraStats};
use crate::monitor::{DeskMonitor, FrameOutcome};

pub struct DetectionSession {
    source: CameraSource,
    registry: BackendRegistry,
    monitor: DeskMonitor,
    reset_on_restart: bool,
    running: bool,
    starts: u64,
}

impl DetectionSession {
    pub fn new(
        source: CameraSource,
        registry: BackendRegistry,
        monitor: DeskMonitor,
        reset_on_restart: bool,
    ) -> Self {
        Self {
            source,
            registry,
            monitor,
            reset_on_restart,
            running: false,
            starts: 0,
        }
    }

    /// Build the camera, the configured detector and the monitor.
    pub fn from_config(cfg: &DeskwatchConfig) -> Result<Self> {
        let source = CameraSource::new(cfg.source.clone())?;
        let registry = build_registry(cfg)?;
        let monitor = DeskMonitor::from_config(cfg);
        Ok(Self::new(
            source,
            registry,
            monitor,
            cfg.tracking.reset_on_restart,
        ))
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn monitor(&self) -> &DeskMonitor {
        &self.monitor
    }

    pub fn registry_mut(&mut self) -> &mut BackendRegistry {
        &mut self.registry
    }

    pub fn source_stats(&self) -> CameraStats {
        self.source.stats()
    }

    pub fn source_healthy(&self) -> bool {
        self.source.is_healthy()
    }

    /// Acquire the camera and begin accepting ticks.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.source.connect()?;
        if self.starts > 0 && self.reset_on_restart {
            log::info!("detection restarted; clearing tracked slots");
            self.monitor.reset();
        }
        self.starts += 1;
        self.running = true;
        Ok(())
    }

    /// Release the camera. Tracked slots are kept until the next start.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.source.release();
        self.running = false;
        log::info!("detection stopped");
    }

    /// Start when stopped, stop when running. Returns the new running state.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.running {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.running)
    }

    /// One frame pass.
    ///
    /// Camera misses and a stopped session yield `NoFrame`. Detector
    /// failures yield `Skipped`. Only a missing detector backend is an error.
    pub fn tick(&mut self) -> Result<FrameOutcome> {
        if !self.running {
            return Ok(FrameOutcome::NoFrame);
        }
        let Some(frame) = self.source.read_frame()? else {
            log::debug!("no frame available");
            return Ok(FrameOutcome::NoFrame);
        };
        let backend = self.registry.default_backend()?;
        Ok(self.monitor.process_frame(&frame, backend))
    }
}

fn build_registry(cfg: &DeskwatchConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match cfg.detector.backend {
        DetectorKind::Scripted => {
            let path = cfg
                .detector
                .script_path
                .as_ref()
                .ok_or_else(|| anyhow!("scripted backend needs detector.script_path"))?;
            registry.register(ScriptedBackend::from_json_file(path)?);
        }
        DetectorKind::Tract => {
            #[cfg(feature = "backend-tract")]
            {
                let backend = crate::detect::TractBackend::new(
                    &cfg.detector.model_path,
                    cfg.detector.input_width,
                    cfg.detector.input_height,
                )?
                .with_thresholds(
                    cfg.detector.confidence_threshold,
                    cfg.detector.iou_threshold,
                );
                registry.register(backend);
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                return Err(anyhow!(
                    "detector backend 'tract' requires the backend-tract feature"
                ));
            }
        }
    }
    Ok(registry)
}

/// Counters accumulated by `FrameLoop::run`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub processed: u64,
    pub no_frame: u64,
    pub skipped: u64,
    pub transitions: u64,
    pub leaving_frames: u64,
}

impl LoopStats {
    fn record(&mut self, outcome: &FrameOutcome) {
        self.ticks += 1;
        match outcome {
            FrameOutcome::Processed(report) => {
                self.processed += 1;
                self.transitions += report.transitions().len() as u64;
                if report.leaving {
                    self.leaving_frames += 1;
                }
            }
            FrameOutcome::NoFrame => self.no_frame += 1,
            FrameOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Fixed-interval, single-threaded frame loop.
pub struct FrameLoop {
    interval: Duration,
    max_ticks: Option<u64>,
    stop: Arc<AtomicBool>,
    health_every: Duration,
}

impl FrameLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
            stop: Arc::new(AtomicBool::new(false)),
            health_every: Duration::from_secs(5),
        }
    }

    /// Stop after this many ticks.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Flag that ends the loop before its next tick once set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Tick the session until stopped, calling `on_outcome` after every
    /// tick. Returns the accumulated counters.
    pub fn run<F>(&self, session: &mut DetectionSession, mut on_outcome: F) -> Result<LoopStats>
    where
        F: FnMut(&FrameOutcome),
    {
        let mut stats = LoopStats::default();
        let mut last_health_log = Instant::now();

        while !self.stop.load(Ordering::SeqCst) {
            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }
            let tick_start = Instant::now();

            let outcome = session.tick()?;
            stats.record(&outcome);
            on_outcome(&outcome);

            if last_health_log.elapsed() >= self.health_every {
                let source = session.source_stats();
                log::info!(
                    "camera health={} captured={} missed={} device={}",
                    session.source_healthy(),
                    source.frames_captured,
                    source.frames_missed,
                    source.device
                );
                last_health_log = Instant::now();
            }

            let remaining = self.interval.saturating_sub(tick_start.elapsed());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }

        Ok(stats)
    }
}
