//! Per-frame desk monitoring pass.
//!
//! `DeskMonitor` owns the posture tracker and runs the fixed pipeline for
//! one frame: detect, validate, filter persons, classify and track, then
//! evaluate the leaving check. A failed or malformed detection skips the
//! whole frame and leaves tracker state exactly as it was.

use std::time::Duration;

use anyhow::Result;
use serde::{Serialize, Serializer};

use crate::config::DeskwatchConfig;
use crate::detect::{filter_persons, Detection, DetectorBackend};
use crate::frame::Frame;
use crate::leaving::is_leaving;
use crate::posture::PostureClassifier;
use crate::tracker::{PostureTracker, SlotAssignment, TrackedPerson, TransitionEvent};

/// Everything the presentation layer needs for one processed frame.
#[derive(Clone, Debug, Serialize)]
pub struct FrameReport {
    pub sequence: u64,
    /// One entry per visible person, in detector order.
    pub persons: Vec<TrackedPerson>,
    pub leaving: bool,
    #[serde(rename = "inference_secs", serialize_with = "serialize_secs")]
    pub inference: Duration,
}

impl FrameReport {
    /// Transitions fired this frame, as `(slot, event)` in detector order.
    pub fn transitions(&self) -> Vec<(usize, TransitionEvent)> {
        self.persons
            .iter()
            .filter(|p| p.transition.is_some())
            .map(|p| (p.slot, p.transition))
            .collect()
    }

    /// Human-readable inference duration, e.g. `Inference time 0.12 seconds`.
    pub fn inference_text(&self) -> String {
        format_inference_time(self.inference)
    }
}

/// Result of one tick of the frame loop.
#[derive(Clone, Debug)]
pub enum FrameOutcome {
    Processed(FrameReport),
    /// The camera had nothing for this tick.
    NoFrame,
    /// Detector failure or malformed output. Tracker state is unchanged.
    Skipped { sequence: u64, reason: String },
}

pub fn format_inference_time(elapsed: Duration) -> String {
    format!("Inference time {:.2} seconds", elapsed.as_secs_f64())
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

pub struct DeskMonitor {
    classifier: PostureClassifier,
    tracker: PostureTracker,
    desk_level: i64,
    person_class_id: i64,
}

impl DeskMonitor {
    pub fn new(
        classifier: PostureClassifier,
        assignment: SlotAssignment,
        desk_level: i64,
        person_class_id: i64,
    ) -> Self {
        Self {
            classifier,
            tracker: PostureTracker::new(assignment),
            desk_level,
            person_class_id,
        }
    }

    pub fn from_config(cfg: &DeskwatchConfig) -> Self {
        let classifier = PostureClassifier::new(
            cfg.posture_policy,
            cfg.posture_height_threshold,
            cfg.desk_level,
        );
        Self::new(
            classifier,
            cfg.tracking.assignment,
            cfg.desk_level,
            cfg.person_class_id,
        )
    }

    pub fn tracker(&self) -> &PostureTracker {
        &self.tracker
    }

    /// Forget all tracked slots.
    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    /// Run one frame through the detector and the tracking pipeline.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        backend: &mut dyn DetectorBackend,
    ) -> FrameOutcome {
        let (detections, inference) = match frame.run_detector(backend) {
            Ok(result) => result,
            Err(e) => {
                log::warn!(
                    "frame {} skipped: {} detector failed: {:#}",
                    frame.sequence,
                    backend.name(),
                    e
                );
                return FrameOutcome::Skipped {
                    sequence: frame.sequence,
                    reason: format!("{:#}", e),
                };
            }
        };

        match self.process_detections(frame.sequence, &detections, inference) {
            Ok(report) => {
                log_report(&report);
                FrameOutcome::Processed(report)
            }
            Err(e) => {
                log::warn!("frame {} skipped: {:#}", frame.sequence, e);
                FrameOutcome::Skipped {
                    sequence: frame.sequence,
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// Tracking pipeline over detections that are already in hand.
    ///
    /// Every detection is validated before any state changes, so an error
    /// here leaves the tracker untouched.
    pub fn process_detections(
        &mut self,
        sequence: u64,
        detections: &[Detection],
        inference: Duration,
    ) -> Result<FrameReport> {
        for detection in detections {
            detection.validate()?;
        }

        let persons = filter_persons(detections, self.person_class_id);
        let tracked = self.tracker.update(&persons, &self.classifier);
        let leaving = is_leaving(&persons, self.desk_level);

        Ok(FrameReport {
            sequence,
            persons: tracked,
            leaving,
            inference,
        })
    }
}

fn log_report(report: &FrameReport) {
    for (slot, event) in report.transitions() {
        log::info!("frame {}: slot {} {:?}", report.sequence, slot, event);
    }
    if report.leaving {
        log::info!("frame {}: leaving desk", report.sequence);
    }
    log::debug!(
        "frame {}: {} person(s), {}",
        report.sequence,
        report.persons.len(),
        report.inference_text()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ScriptStep, ScriptedBackend};
    use crate::posture::PostureLabel;

    fn monitor() -> DeskMonitor {
        DeskMonitor::from_config(&DeskwatchConfig::default())
    }

    #[test]
    fn non_person_detections_are_ignored() -> Result<()> {
        let mut monitor = monitor();
        let chair = Detection::new(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 0.9, 56);
        let person = Detection::person(100.0, 320.0, 200.0, 520.0);

        let report = monitor.process_detections(1, &[chair, person], Duration::ZERO)?;
        assert_eq!(report.persons.len(), 1);
        assert_eq!(report.persons[0].slot, 0);
        assert_eq!(report.persons[0].label, PostureLabel::Sitting);
        // Only the chair is above the desk line, and it is not a person.
        assert!(!report.leaving);
        Ok(())
    }

    #[test]
    fn malformed_detection_leaves_tracker_untouched() -> Result<()> {
        let mut monitor = monitor();
        monitor.process_detections(1, &[Detection::person(0.0, 0.0, 10.0, 100.0)], Duration::ZERO)?;

        let bad = Detection::person(0.0, f32::NAN, 10.0, 600.0);
        let good = Detection::person(0.0, 0.0, 10.0, 600.0);
        assert!(monitor
            .process_detections(2, &[good, bad], Duration::ZERO)
            .is_err());
        assert_eq!(monitor.tracker().label(0), Some(PostureLabel::Sitting));
        Ok(())
    }

    #[test]
    fn detector_failure_skips_frame() -> Result<()> {
        let mut monitor = monitor();
        let mut backend = ScriptedBackend::new(vec![
            ScriptStep::Detections(vec![Detection::person(0.0, 0.0, 10.0, 100.0)]),
            ScriptStep::Fail {
                error: "inference timeout".to_string(),
            },
            ScriptStep::Detections(vec![Detection::person(0.0, 0.0, 10.0, 500.0)]),
        ]);
        let frame = Frame::blank(8, 8, 1)?;

        assert!(matches!(
            monitor.process_frame(&frame, &mut backend),
            FrameOutcome::Processed(_)
        ));
        match monitor.process_frame(&frame, &mut backend) {
            FrameOutcome::Skipped { reason, .. } => assert!(reason.contains("inference timeout")),
            other => panic!("expected skip, got {:?}", other),
        }
        match monitor.process_frame(&frame, &mut backend) {
            FrameOutcome::Processed(report) => {
                assert_eq!(report.transitions(), vec![(0, TransitionEvent::StandingUp)]);
            }
            other => panic!("expected report, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn inference_text_uses_two_decimals() {
        assert_eq!(
            format_inference_time(Duration::from_millis(1234)),
            "Inference time 1.23 seconds"
        );
        assert_eq!(format_inference_time(Duration::ZERO), "Inference time 0.00 seconds");
    }
}
