use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Class id the COCO-trained detectors reserve for "person".
pub const PERSON_CLASS_ID: i64 = 0;

/// Axis-aligned bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Integer midpoint of the vertical extent, `floor((y1 + y2) / 2)`.
    pub fn vertical_midpoint(&self) -> i64 {
        ((self.y1 as f64 + self.y2 as f64) / 2.0).floor() as i64
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Intersection over union; zero when the boxes do not overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    fn is_finite(&self) -> bool {
        self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
    }
}

/// One object reported by a detector backend for a single frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(flatten)]
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: i64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: i64) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }

    /// Shorthand for a person detection with full confidence.
    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(BoundingBox::new(x1, y1, x2, y2), 1.0, PERSON_CLASS_ID)
    }

    /// Reject detections with missing or non-finite coordinates.
    ///
    /// `y2 >= y1` is a caller precondition and is not checked here.
    pub fn validate(&self) -> Result<()> {
        if !self.bbox.is_finite() {
            return Err(anyhow!("malformed detection: non-finite coordinates {:?}", self.bbox));
        }
        if !self.confidence.is_finite() {
            return Err(anyhow!("malformed detection: non-finite confidence"));
        }
        Ok(())
    }
}
