//! deskwatch - live desk monitor
//!
//! This binary:
//! 1. Loads configuration (file named by --config or DESKWATCH_CONFIG, env overrides, flags)
//! 2. Opens the camera and the configured detector backend
//! 3. Runs the fixed-interval frame loop until Ctrl-C or the frame budget runs out
//! 4. Prints posture transitions and leaving alerts as they happen

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use deskwatch::ui::StatusDisplay;
use deskwatch::{DeskwatchConfig, DetectionSession, DetectorKind, FrameLoop, PosturePolicy};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DESKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Camera device path, or stub://<name> for a synthetic feed.
    #[arg(long)]
    source: Option<String>,
    /// Detector backend: tract or scripted.
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Detection script for the scripted backend.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Desk row in pixels.
    #[arg(long)]
    desk_level: Option<i64>,
    /// Posture policy: height or desk_level.
    #[arg(long)]
    posture_policy: Option<String>,
    /// Slot assignment: index or iou.
    #[arg(long)]
    assignment: Option<String>,
    /// Stop after this many ticks.
    #[arg(long)]
    frames: Option<u64>,
    /// Status output: auto, plain or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = build_config(&args)?;

    log::info!(
        "deskwatch {} starting: source={} backend={:?} desk_level={} threshold={}px interval={}ms",
        env!("CARGO_PKG_VERSION"),
        cfg.source.device,
        cfg.detector.backend,
        cfg.desk_level,
        cfg.posture_height_threshold,
        cfg.frame_interval.as_millis()
    );
    if cfg.posture_policy != PosturePolicy::HeightThreshold {
        log::warn!("using non-default posture policy {:?}", cfg.posture_policy);
    }

    let mut session = DetectionSession::from_config(&cfg)?;
    session.registry_mut().warm_up_all()?;
    session.start()?;

    let mut frame_loop = FrameLoop::new(cfg.frame_interval);
    if let Some(frames) = args.frames {
        frame_loop = frame_loop.with_max_ticks(frames);
    }
    let stop = frame_loop.stop_handle();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;

    let display = StatusDisplay::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());
    let stats = frame_loop.run(&mut session, |outcome| display.show(outcome))?;
    session.stop();

    display.finish(&format!(
        "{} ticks: {} processed, {} without frame, {} skipped, {} transitions, {} leaving",
        stats.ticks,
        stats.processed,
        stats.no_frame,
        stats.skipped,
        stats.transitions,
        stats.leaving_frames
    ));
    Ok(())
}

fn build_config(args: &Args) -> Result<DeskwatchConfig> {
    let mut cfg = DeskwatchConfig::load_from(args.config.as_deref())?;

    if let Some(source) = &args.source {
        cfg.source.device = source.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.parse()?;
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = model.clone();
    }
    if let Some(script) = &args.script {
        cfg.detector.script_path = Some(script.clone());
        if args.backend.is_none() {
            cfg.detector.backend = DetectorKind::Scripted;
        }
    }
    if let Some(level) = args.desk_level {
        cfg.desk_level = level;
    }
    if let Some(policy) = &args.posture_policy {
        cfg.posture_policy = policy.parse()?;
    }
    if let Some(assignment) = &args.assignment {
        cfg.set_assignment(assignment)?;
    }
    cfg.validate()?;
    Ok(cfg)
}
