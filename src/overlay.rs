//! Annotation items for the presentation layer.
//!
//! Nothing here touches pixels. `Overlay::from_report` turns a processed
//! frame into boxes and text with fixed positions, colors and sizes, which a
//! renderer draws however it likes. Transition and leaving banners sit at a
//! fixed anchor per event type, not next to the person who triggered them.

use serde::Serialize;

use crate::detect::BoundingBox;
use crate::monitor::FrameReport;
use crate::tracker::TransitionEvent;

pub type Rgb = [u8; 3];

pub const BOX_COLOR: Rgb = [0, 255, 0];
pub const LABEL_COLOR: Rgb = [0, 0, 255];
pub const ALERT_COLOR: Rgb = [255, 0, 0];

/// Offset of the posture label from the box's top-left corner.
const LABEL_OFFSET: (i32, i32) = (30, 30);
const TRANSITION_ANCHOR: (i32, i32) = (150, 350);
const LEAVING_ANCHOR: (i32, i32) = (50, 50);

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayItem {
    Rect {
        bbox: BoundingBox,
        color: Rgb,
        thickness: u32,
    },
    Text {
        text: String,
        origin: (i32, i32),
        scale: f32,
        color: Rgb,
        thickness: u32,
    },
}

/// Banner text and anchor for a transition, or `None` for no transition.
pub fn transition_banner(event: TransitionEvent) -> Option<(&'static str, (i32, i32))> {
    match event {
        TransitionEvent::StandingUp => Some(("Standing Up Detected", TRANSITION_ANCHOR)),
        TransitionEvent::SittingDown => Some(("Sitting Down Detected", TRANSITION_ANCHOR)),
        TransitionEvent::None => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Overlay {
    pub items: Vec<OverlayItem>,
    /// Free text for the status panel beside the video.
    pub status: String,
}

impl Overlay {
    pub fn from_report(report: &FrameReport) -> Self {
        let mut items = Vec::with_capacity(report.persons.len() * 2 + 1);

        for person in &report.persons {
            items.push(OverlayItem::Rect {
                bbox: person.bbox,
                color: BOX_COLOR,
                thickness: 2,
            });
            items.push(OverlayItem::Text {
                text: person.label.to_string(),
                origin: (
                    person.bbox.x1 as i32 + LABEL_OFFSET.0,
                    person.bbox.y1 as i32 + LABEL_OFFSET.1,
                ),
                scale: 0.6,
                color: LABEL_COLOR,
                thickness: 2,
            });
            if let Some((text, origin)) = transition_banner(person.transition) {
                items.push(OverlayItem::Text {
                    text: text.to_string(),
                    origin,
                    scale: 0.6,
                    color: ALERT_COLOR,
                    thickness: 2,
                });
            }
        }

        if report.leaving {
            items.push(OverlayItem::Text {
                text: "Leaving Desk Detected".to_string(),
                origin: LEAVING_ANCHOR,
                scale: 1.0,
                color: ALERT_COLOR,
                thickness: 3,
            });
        }

        Self {
            items,
            status: report.inference_text(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = (&str, (i32, i32))> {
        self.items.iter().filter_map(|item| match item {
            OverlayItem::Text { text, origin, .. } => Some((text.as_str(), *origin)),
            OverlayItem::Rect { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::PostureLabel;
    use crate::tracker::TrackedPerson;
    use std::time::Duration;

    fn report(persons: Vec<TrackedPerson>, leaving: bool) -> FrameReport {
        FrameReport {
            sequence: 1,
            persons,
            leaving,
            inference: Duration::from_millis(50),
        }
    }

    fn tracked(x1: f32, transition: TransitionEvent) -> TrackedPerson {
        TrackedPerson {
            slot: 0,
            bbox: BoundingBox::new(x1, 100.0, x1 + 50.0, 500.0),
            label: PostureLabel::Standing,
            transition,
        }
    }

    #[test]
    fn labels_follow_boxes() {
        let overlay = Overlay::from_report(&report(vec![tracked(10.0, TransitionEvent::None)], false));
        let texts: Vec<_> = overlay.texts().collect();
        assert_eq!(texts, vec![("standing", (40, 130))]);
        assert_eq!(overlay.status, "Inference time 0.05 seconds");
    }

    #[test]
    fn banners_use_fixed_anchors() {
        let overlay = Overlay::from_report(&report(
            vec![
                tracked(10.0, TransitionEvent::StandingUp),
                tracked(400.0, TransitionEvent::SittingDown),
            ],
            true,
        ));
        let banners: Vec<_> = overlay
            .texts()
            .filter(|(text, _)| text.ends_with("Detected"))
            .collect();
        assert_eq!(
            banners,
            vec![
                ("Standing Up Detected", (150, 350)),
                ("Sitting Down Detected", (150, 350)),
                ("Leaving Desk Detected", (50, 50)),
            ]
        );
    }

    #[test]
    fn empty_frame_has_only_status() {
        let overlay = Overlay::from_report(&report(Vec::new(), false));
        assert!(overlay.items.is_empty());
        assert!(!overlay.status.is_empty());
    }
}
