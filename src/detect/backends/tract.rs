#![cfg(feature = "backend-tract")]

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// Tract-based backend for YOLO-family ONNX detectors.
///
/// Frames of any size are resampled (nearest neighbour, no letterbox) to the
/// model input, and boxes are scaled back to frame pixels. Both the
/// YOLOv5/v7 `[1, N, 5 + C]` and YOLOv8 `[1, 4 + C, N]` output layouts are
/// decoded, followed by per-class NMS.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    /// Override the default confidence and NMS IoU thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = rgb_len(width, height)?;

        if expected_len == 0 || pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let src_w = width as usize;
        let src_h = height as usize;
        let dst_w = self.input_width as usize;
        let dst_h = self.input_height as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, c, y, x)| {
            let sy = (y * src_h / dst_h).min(src_h - 1);
            let sx = (x * src_w / dst_w).min(src_w - 1);
            pixels[(sy * src_w + sx) * 3 + c] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, width: u32, height: u32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("unsupported YOLO output shape {:?}", shape));
        }
        let view = view
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| anyhow!("unsupported YOLO output shape {:?}: {}", shape, e))?;

        let sx = width as f32 / self.input_width as f32;
        let sy = height as f32 / self.input_height as f32;
        let mut candidates = Vec::new();

        if shape[1] < shape[2] {
            // YOLOv8: [1, 4 + classes, anchors], no objectness.
            let classes = shape[1].saturating_sub(4);
            for i in 0..shape[2] {
                let (class_id, score) = best_class((0..classes).map(|c| view[[0, 4 + c, i]]));
                if score < self.confidence_threshold {
                    continue;
                }
                let cxcywh = [view[[0, 0, i]], view[[0, 1, i]], view[[0, 2, i]], view[[0, 3, i]]];
                candidates.push(to_detection(cxcywh, score, class_id, sx, sy));
            }
        } else {
            // YOLOv5/v7: [1, anchors, 5 + classes], objectness at index 4.
            let classes = shape[2].saturating_sub(5);
            for i in 0..shape[1] {
                let objectness = view[[0, i, 4]];
                if objectness < self.confidence_threshold {
                    continue;
                }
                let (class_id, class_score) =
                    best_class((0..classes).map(|c| view[[0, i, 5 + c]]));
                let score = objectness * class_score;
                if score < self.confidence_threshold {
                    continue;
                }
                let cxcywh = [view[[0, i, 0]], view[[0, i, 1]], view[[0, i, 2]], view[[0, i, 3]]];
                candidates.push(to_detection(cxcywh, score, class_id, sx, sy));
            }
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        let len = rgb_len(self.input_width, self.input_height)?;
        let blank = vec![0u8; len];
        self.detect(&blank, self.input_width, self.input_height)
            .map(|_| ())
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn best_class(scores: impl Iterator<Item = f32>) -> (i64, f32) {
    scores
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_id, best), (id, score)| {
            if score > best {
                (id as i64, score)
            } else {
                (best_id, best)
            }
        })
}

fn to_detection(cxcywh: [f32; 4], score: f32, class_id: i64, sx: f32, sy: f32) -> Detection {
    let [cx, cy, w, h] = cxcywh;
    Detection::new(
        BoundingBox::new(
            (cx - w / 2.0) * sx,
            (cy - h / 2.0) * sy,
            (cx + w / 2.0) * sx,
            (cy + h / 2.0) * sy,
        ),
        score,
        class_id,
    )
}

/// Greedy per-class NMS. Output is ordered by descending confidence.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_drops_overlapping_same_class_boxes() {
        let a = Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let b = Detection::new(BoundingBox::new(1.0, 1.0, 10.0, 10.0), 0.8, 0);
        let c = Detection::new(BoundingBox::new(1.0, 1.0, 10.0, 10.0), 0.7, 3);

        let kept = non_max_suppression(vec![b, c, a], 0.45);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn rgb_len_rejects_oversized_inputs() {
        assert_eq!(rgb_len(640, 640).unwrap(), 640 * 640 * 3);
        assert!(rgb_len(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn boxes_scale_back_to_frame_pixels() {
        let det = to_detection([320.0, 320.0, 64.0, 128.0], 0.9, 0, 1.0, 0.75);
        assert_eq!(det.bbox, BoundingBox::new(288.0, 192.0, 352.0, 288.0));
    }
}
