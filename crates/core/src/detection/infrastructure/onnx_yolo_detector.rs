/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and NMS post-processing. The
/// pose variant of the model also emits facial keypoints; those columns are
/// ignored.
use std::path::Path;
use std::sync::Mutex;

use super::onnx_session::load_session;
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::face_detector::{sort_left_to_right, FaceDetector};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox padding grey (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// YOLO face detector backed by an ONNX Runtime session.
///
/// The session sits behind a mutex so one detector can serve several jobs.
pub struct OnnxYoloDetector {
    session: Mutex<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, DetectionError> {
        let session = load_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session: Mutex::new(session),
            confidence,
            input_size,
        })
    }

    fn infer(&self, frame: &Frame) -> Result<Vec<RawDetection>, DetectionError> {
        let (tensor, placement) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(tensor)
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectionError::inference(format!("Lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        if outputs.len() == 0 {
            return Err(DetectionError::UnexpectedOutput(
                "YOLO model produced no outputs".into(),
            ));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectionError::UnexpectedOutput("non-contiguous tensor".into()))?;

        parse_output(data, &shape, self.confidence, &placement)
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<Region>, DetectionError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let mut raw = self.infer(frame)?;
        let kept = nms(&mut raw, NMS_IOU_THRESH);

        let mut regions: Vec<Region> = kept
            .iter()
            .map(|d| Region::from_corners(d.x1, d.y1, d.x2, d.y2))
            .filter(|r| !r.is_empty())
            .collect();
        sort_left_to_right(&mut regions);
        Ok(regions)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Where the frame landed inside the letterboxed model input.
struct Placement {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float32 tensor in `0.0..=1.0`.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Placement) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbour resize into the padded area
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Placement {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Postprocessing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn corners(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// Decodes `[1, features, detections]` (or the transposed layout) into
/// frame-space boxes above `confidence`. Each row starts `cx, cy, w, h, conf`.
fn parse_output(
    data: &[f32],
    shape: &[usize],
    confidence: f64,
    lb: &Placement,
) -> Result<Vec<RawDetection>, DetectionError> {
    if shape.len() != 3 {
        return Err(DetectionError::UnexpectedOutput(format!(
            "YOLO output shape {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(DetectionError::UnexpectedOutput(format!(
            "YOLO output shape {shape:?} with {} values",
            data.len()
        )));
    }

    let feature = |det: usize, f: usize| -> f64 {
        if transposed {
            data[f * num_dets + det] as f64
        } else {
            data[det * num_feats + f] as f64
        }
    };

    let pad_x = lb.pad_x as f64;
    let pad_y = lb.pad_y as f64;
    let dets = (0..num_dets)
        .filter(|&i| feature(i, 4) >= confidence)
        .map(|i| {
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            RawDetection {
                x1: (cx - w / 2.0 - pad_x) / lb.scale,
                y1: (cy - h / 2.0 - pad_y) / lb.scale,
                x2: (cx + w / 2.0 - pad_x) / lb.scale,
                y2: (cy + h / 2.0 - pad_y) / lb.scale,
                confidence: feature(i, 4),
            }
        })
        .collect();
    Ok(dets)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for det in dets.iter() {
        let overlaps_kept = keep
            .iter()
            .any(|k| corner_iou(&k.corners(), &det.corners()) > iou_thresh);
        if !overlaps_kept {
            keep.push(det.clone());
        }
    }
    keep
}

fn corner_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
