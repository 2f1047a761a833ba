//! Posture classification from a single bounding box.
//!
//! Two policies share the `classify` contract:
//!
//! - `HeightThreshold` (default): a box shorter than the threshold is a
//!   seated person, anything at or above it is standing.
//! - `DeskLevel`: compares the box bottom with the desk row. Kept as an
//!   alternate and unused unless selected in configuration.

use serde::{Deserialize, Serialize};

use crate::detect::BoundingBox;

pub const DEFAULT_HEIGHT_THRESHOLD_PX: u32 = 400;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureLabel {
    Sitting,
    Standing,
}

impl PostureLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureLabel::Sitting => "sitting",
            PostureLabel::Standing => "standing",
        }
    }
}

impl std::fmt::Display for PostureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which geometry rule `PostureClassifier` applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosturePolicy {
    #[default]
    HeightThreshold,
    DeskLevel,
}

impl std::str::FromStr for PosturePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "height" | "height_threshold" => Ok(PosturePolicy::HeightThreshold),
            "desk" | "desk_level" => Ok(PosturePolicy::DeskLevel),
            other => Err(anyhow::anyhow!("unknown posture policy '{}'", other)),
        }
    }
}

/// Stateless posture classifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostureClassifier {
    policy: PosturePolicy,
    height_threshold: u32,
    desk_level: i64,
}

impl PostureClassifier {
    pub fn new(policy: PosturePolicy, height_threshold: u32, desk_level: i64) -> Self {
        Self {
            policy,
            height_threshold,
            desk_level,
        }
    }

    pub fn height_threshold(height_threshold: u32) -> Self {
        Self::new(PosturePolicy::HeightThreshold, height_threshold, 0)
    }

    /// Label a box. Assumes `y2 >= y1`; the result is unspecified otherwise.
    pub fn classify(&self, bbox: &BoundingBox) -> PostureLabel {
        match self.policy {
            PosturePolicy::HeightThreshold => {
                classify_by_height(bbox, self.height_threshold)
            }
            PosturePolicy::DeskLevel => classify_by_desk_level(bbox, self.desk_level),
        }
    }
}

impl Default for PostureClassifier {
    fn default() -> Self {
        Self::height_threshold(DEFAULT_HEIGHT_THRESHOLD_PX)
    }
}

fn classify_by_height(bbox: &BoundingBox, threshold: u32) -> PostureLabel {
    if bbox.height() < threshold as f32 {
        PostureLabel::Sitting
    } else {
        PostureLabel::Standing
    }
}

// A box reaching below the desk row is someone seated behind it. The
// degenerate box lying exactly on the row counts as standing.
fn classify_by_desk_level(bbox: &BoundingBox, desk_level: i64) -> PostureLabel {
    if bbox.y2 > desk_level as f32 {
        PostureLabel::Sitting
    } else {
        PostureLabel::Standing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tall(height: f32) -> BoundingBox {
        BoundingBox::new(10.0, 50.0, 200.0, 50.0 + height)
    }

    #[test]
    fn height_threshold_boundary() {
        let classifier = PostureClassifier::default();
        assert_eq!(classifier.classify(&tall(0.0)), PostureLabel::Sitting);
        assert_eq!(classifier.classify(&tall(399.9)), PostureLabel::Sitting);
        assert_eq!(classifier.classify(&tall(400.0)), PostureLabel::Standing);
        assert_eq!(classifier.classify(&tall(650.0)), PostureLabel::Standing);
    }

    #[test]
    fn height_policy_ignores_desk_level() {
        let a = PostureClassifier::new(PosturePolicy::HeightThreshold, 400, 0);
        let b = PostureClassifier::new(PosturePolicy::HeightThreshold, 400, 10_000);
        for h in [10.0, 399.0, 400.0, 800.0] {
            assert_eq!(a.classify(&tall(h)), b.classify(&tall(h)));
        }
    }

    #[test]
    fn desk_level_policy_compares_box_bottom() {
        let classifier = PostureClassifier::new(PosturePolicy::DeskLevel, 400, 300);
        let seated = BoundingBox::new(0.0, 150.0, 100.0, 420.0);
        let standing = BoundingBox::new(0.0, 20.0, 100.0, 280.0);
        let on_line = BoundingBox::new(0.0, 300.0, 100.0, 300.0);

        assert_eq!(classifier.classify(&seated), PostureLabel::Sitting);
        assert_eq!(classifier.classify(&standing), PostureLabel::Standing);
        assert_eq!(classifier.classify(&on_line), PostureLabel::Standing);
    }

    #[test]
    fn policy_parses_aliases() {
        assert_eq!(
            "height".parse::<PosturePolicy>().unwrap(),
            PosturePolicy::HeightThreshold
        );
        assert_eq!(
            "Desk_Level".parse::<PosturePolicy>().unwrap(),
            PosturePolicy::DeskLevel
        );
        assert!("vibes".parse::<PosturePolicy>().is_err());
    }
}
