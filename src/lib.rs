//! deskwatch
//!
//! Watches a desk through a camera and reports when the person at it stands
//! up, sits down, or leaves.
//!
//! # Pipeline
//!
//! Each frame passes through a fixed, single-threaded pipeline:
//!
//! 1. **Detect**: a `DetectorBackend` returns every object it sees.
//! 2. **Filter**: keep only the person class, in detector order.
//! 3. **Classify**: a bounding box shorter than the height threshold is a
//!    seated person, anything else is standing.
//! 4. **Track**: each person is matched to a slot (by list position unless
//!    IoU assignment is configured). A label change on a known slot emits a
//!    `StandingUp` or `SittingDown` transition. This check is edge-triggered.
//! 5. **Leaving**: anyone whose vertical midpoint is above the desk row
//!    raises the leaving flag. This check is level-triggered and is
//!    re-evaluated every frame.
//!
//! A detector failure or malformed detection skips the frame without touching
//! tracker state. A camera miss is reported as "no frame" and retried on the
//! next tick.
//!
//! # Module Structure
//!
//! - `detect`: detection types, person filter, backends (scripted, tract)
//! - `ingest`: camera sources (V4L2, synthetic)
//! - `posture`, `tracker`, `leaving`: the per-frame state machine
//! - `monitor`: one frame pass and its report
//! - `session`: start/stop lifecycle and the fixed-interval frame loop
//! - `overlay`, `ui`: presentation data and terminal status

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod leaving;
pub mod monitor;
pub mod overlay;
pub mod posture;
pub mod session;
pub mod tracker;
pub mod ui;

pub use config::{DeskwatchConfig, DetectorKind};
pub use detect::{
    filter_persons, BackendRegistry, BoundingBox, Detection, DetectorBackend, ScriptStep,
    ScriptedBackend, PERSON_CLASS_ID,
};
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, CameraStats};
pub use leaving::{is_leaving, DEFAULT_DESK_LEVEL};
pub use monitor::{format_inference_time, DeskMonitor, FrameOutcome, FrameReport};
pub use overlay::{Overlay, OverlayItem};
pub use posture::{PostureClassifier, PostureLabel, PosturePolicy};
pub use session::{DetectionSession, FrameLoop, LoopStats};
pub use tracker::{PostureTracker, SlotAssignment, TrackedPerson, TransitionEvent};
