//! SCRFD face detector via ONNX Runtime.
//!
//! Runs the anchor-free SCRFD model on a letterboxed RGB image, decodes the
//! three stride levels, and applies NMS. Boxes and landmarks are mapped back
//! to source-image pixels.

use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_SCORE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}; download det_10g.onnx from insightface and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("empty image")]
    EmptyImage,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Scale and padding applied when fitting the source image into the square input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn fit(src_w: u32, src_h: u32, target: u32) -> (Self, u32, u32) {
        let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
        let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, target);
        let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, target);
        let letterbox = Self {
            scale,
            pad_x: ((target - new_w) / 2) as f32,
            pad_y: ((target - new_h) / 2) as f32,
        };
        (letterbox, new_w, new_h)
    }

    /// Map a point in model-input space back to source pixels.
    fn to_source(self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Output positions of (score, bbox, kps) tensors for one stride.
type StrideSlots = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    stride_slots: [StrideSlots; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD needs 9 outputs (score/bbox/kps per stride), model has {}",
                output_names.len()
            )));
        }

        let stride_slots = stride_slots(&output_names);
        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            ?stride_slots,
            "loaded SCRFD model"
        );

        Ok(Self { session, stride_slots })
    }

    /// Detect every face in the image, highest confidence first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::EmptyImage);
        }

        let (input, letterbox) = preprocess(image);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (level, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_at, bbox_at, kps_at) = self.stride_slots[level];
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} at stride {stride}: {e}"))
                    })
            };

            let level_outputs = StrideOutputs {
                scores: extract(score_at, "scores")?,
                bboxes: extract(bbox_at, "bboxes")?,
                kps: extract(kps_at, "landmarks")?,
            };
            candidates.extend(level_outputs.decode(stride, letterbox, SCRFD_SCORE_THRESHOLD));
        }

        Ok(nms(candidates, SCRFD_NMS_THRESHOLD))
    }
}

/// Letterbox the image into the square SCRFD input and normalize to NCHW.
///
/// Padding uses the mean value so it normalizes to 0.0.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let size = SCRFD_INPUT_SIZE;
    let (letterbox, new_w, new_h) = Letterbox::fit(image.width(), image.height(), size);

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let pad = SCRFD_MEAN.round() as u8;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([pad, pad, pad]));
    imageops::replace(
        &mut canvas,
        &resized,
        i64::from(letterbox.pad_x as u32),
        i64::from(letterbox.pad_y as u32),
    );

    let n = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, n, n));
    for (x, y, Rgb(px)) in canvas.enumerate_pixels() {
        for (c, &value) in px.iter().enumerate() {
            tensor[[0, c, y as usize, x as usize]] = (value as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Map output tensors to stride levels.
///
/// Exports that name tensors `score_8`, `bbox_16`, `kps_32`, ... are matched by
/// name in any order; anything else falls back to the standard positional
/// layout `[scores 8/16/32, bboxes 8/16/32, kps 8/16/32]`.
fn stride_slots(names: &[String]) -> [StrideSlots; 3] {
    let position = |prefix: &str, stride: usize| {
        let wanted = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == wanted)
    };

    let named: Option<Vec<StrideSlots>> = SCRFD_STRIDES
        .iter()
        .map(|&s| Some((position("score", s)?, position("bbox", s)?, position("kps", s)?)))
        .collect();

    match named {
        Some(slots) => [slots[0], slots[1], slots[2]],
        None => {
            tracing::debug!(?names, "SCRFD output names not recognized, using positional layout");
            [(0, 3, 6), (1, 4, 7), (2, 5, 8)]
        }
    }
}

/// Raw outputs of one stride level.
struct StrideOutputs<'a> {
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

impl StrideOutputs<'_> {
    fn decode(&self, stride: usize, letterbox: Letterbox, threshold: f32) -> Vec<BoundingBox> {
        let grid = SCRFD_INPUT_SIZE as usize / stride;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let step = stride as f32;

        (0..anchors.min(self.scores.len()))
            .filter(|&idx| self.scores[idx] > threshold)
            .filter_map(|idx| {
                let cell = idx / SCRFD_ANCHORS_PER_CELL;
                let ax = (cell % grid) as f32 * step;
                let ay = (cell / grid) as f32 * step;

                let d = self.bboxes.get(idx * 4..idx * 4 + 4)?;
                let (x1, y1) = letterbox.to_source(ax - d[0] * step, ay - d[1] * step);
                let (x2, y2) = letterbox.to_source(ax + d[2] * step, ay + d[3] * step);

                let landmarks = self.kps.get(idx * 10..idx * 10 + 10).map(|k| {
                    std::array::from_fn(|i| {
                        letterbox.to_source(ax + k[i * 2] * step, ay + k[i * 2 + 1] * step)
                    })
                });

                Some(BoundingBox {
                    x1,
                    y1,
                    x2,
                    y2,
                    confidence: self.scores[idx],
                    landmarks,
                })
            })
            .collect()
    }
}

/// Greedy non-maximum suppression. Output is sorted by confidence, descending.
fn nms(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection-over-Union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter = BoundingBox {
        x1: a.x1.max(b.x1),
        y1: a.y1.max(b.y1),
        x2: a.x2.min(b.x2),
        y2: a.y2.min(b.y2),
        confidence: 0.0,
        landmarks: None,
    }
    .area();

    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox {
            x1: x, y1: y, x2: x + w, y2: y + h, confidence: conf, landmarks: None,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = make_box(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(20.0, 20.0, 10.0, 10.0, 1.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = make_box(5.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let result = nms(
            vec![
                make_box(5.0, 5.0, 100.0, 100.0, 0.8),
                make_box(200.0, 200.0, 50.0, 50.0, 0.7),
                make_box(0.0, 0.0, 100.0, 100.0, 0.9),
            ],
            0.4,
        );
        let confidences: Vec<f32> = result.iter().map(|b| b.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7]);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_maps_back_to_source() {
        let (lb, new_w, new_h) = Letterbox::fit(320, 240, 640);
        assert_eq!((new_w, new_h), (640, 480));
        assert_eq!(lb.pad_y, 80.0);

        let (x, y) = lb.to_source(100.0 * lb.scale + lb.pad_x, 50.0 * lb.scale + lb.pad_y);
        assert!((x - 100.0).abs() < 1e-3 && (y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 0, 128]));
        let (tensor, lb) = preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_eq!(lb.pad_y, 160.0);
        // Padding row normalizes to ~0, image rows carry the pixel values.
        assert!(tensor[[0, 0, 0, 0]].abs() < 0.01);
        assert!((tensor[[0, 0, 320, 320]] - (255.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-3);
        assert!((tensor[[0, 1, 320, 320]] - (0.0 - SCRFD_MEAN) / SCRFD_STD).abs() < 1e-3);
    }

    #[test]
    fn test_stride_slots_by_name() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8",
            "bbox_16", "kps_16", "score_16",
            "bbox_32", "kps_32", "score_32",
        ].iter().map(|s| s.to_string()).collect();

        assert_eq!(stride_slots(&names), [(2, 0, 1), (5, 3, 4), (8, 6, 7)]);
    }

    #[test]
    fn test_stride_slots_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| (428 + i).to_string()).collect();
        assert_eq!(stride_slots(&names), [(0, 3, 6), (1, 4, 7), (2, 5, 8)]);
    }

    #[test]
    fn test_decode_single_anchor() {
        // One anchor above threshold at cell (1, 0) of stride 32.
        let grid = 640 / 32;
        let anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let idx = SCRFD_ANCHORS_PER_CELL; // cell 1, first anchor
        scores[idx] = 0.95;
        let mut bboxes = vec![0.0f32; anchors * 4];
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[0.5, 0.5, 1.0, 1.0]);
        let kps = vec![0.0f32; anchors * 10];

        let lb = Letterbox { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let outputs = StrideOutputs { scores: &scores, bboxes: &bboxes, kps: &kps };
        let dets = outputs.decode(32, lb, 0.5);

        assert_eq!(dets.len(), 1);
        let d = &dets[0];
        assert_eq!((d.x1, d.y1, d.x2, d.y2), (16.0, -16.0, 64.0, 32.0));
        assert_eq!(d.landmarks.unwrap()[0], (32.0, 0.0));
    }
}
