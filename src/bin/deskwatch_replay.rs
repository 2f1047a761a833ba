//! deskwatch_replay - run a recorded detection script through the monitor
//!
//! Replays a JSON detection script (the scripted backend's format) against
//! blank frames and prints one JSON line per frame with the tracked persons,
//! transitions, the leaving flag and the overlay a renderer would draw.
//! No camera or model is needed.

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use deskwatch::{DeskMonitor, DeskwatchConfig, Frame, FrameOutcome, Overlay, ScriptedBackend};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection script to replay.
    script: PathBuf,
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "DESKWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Number of frames to run. Defaults to the script length.
    #[arg(long)]
    frames: Option<u64>,
    /// Slot assignment: index or iou.
    #[arg(long)]
    assignment: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let mut cfg = DeskwatchConfig::load_from(args.config.as_deref())?;
    if let Some(assignment) = &args.assignment {
        cfg.set_assignment(assignment)?;
        cfg.validate()?;
    }

    let mut backend = ScriptedBackend::from_json_file(&args.script)?;
    let frames = args.frames.unwrap_or(backend.remaining() as u64);
    let mut monitor = DeskMonitor::from_config(&cfg);
    log::info!(
        "replaying {} frame(s) from {}",
        frames,
        args.script.display()
    );

    for sequence in 1..=frames {
        let frame = Frame::blank(cfg.source.width, cfg.source.height, sequence)?;
        let line = match monitor.process_frame(&frame, &mut backend) {
            FrameOutcome::Processed(report) => {
                let overlay = Overlay::from_report(&report);
                json!({
                    "outcome": "processed",
                    "report": report,
                    "overlay": overlay,
                })
            }
            FrameOutcome::Skipped { sequence, reason } => json!({
                "outcome": "skipped",
                "sequence": sequence,
                "reason": reason,
            }),
            FrameOutcome::NoFrame => json!({ "outcome": "no_frame", "sequence": sequence }),
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(())
}
