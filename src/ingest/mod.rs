//! Frame ingestion sources.
//!
//! - Local V4L2 cameras (feature: ingest-v4l2)
//! - Synthetic `stub://` source (testing, replays)
//!
//! Sources produce RGB24 `Frame`s. The ingestion layer converts device pixel
//! formats and reports a missed read as "no frame available" instead of
//! failing, leaving retry to the next tick of the frame loop.

pub mod camera;
mod normalize;

pub use camera::{CameraConfig, CameraSource, CameraStats};
