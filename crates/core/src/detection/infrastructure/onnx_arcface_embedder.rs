/// ArcFace face embedder using ONNX Runtime.
///
/// Crops the face box, resizes it to the model's 112x112 input and returns
/// the L2-normalised output vector, so Euclidean distances between
/// embeddings fall in `0.0..=2.0`.
use std::path::Path;
use std::sync::Mutex;

use super::onnx_session::load_session;
use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::embedding::{l2_normalize, Embedding};
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl OnnxArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, DetectionError> {
        Ok(Self {
            session: Mutex::new(load_session(model_path)?),
        })
    }
}

impl FaceEmbedder for OnnxArcFaceEmbedder {
    fn embed(&self, frame: &Frame, region: &Region) -> Result<Embedding, DetectionError> {
        let crop = frame.crop(region).ok_or(DetectionError::EmptyRegion)?;
        let tensor = preprocess(&crop);

        let input_value = ort::value::Tensor::from_array(tensor)
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| DetectionError::inference(format!("Lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let embedding_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::inference(e.to_string()))?;
        let mut values = embedding_array
            .as_slice()
            .ok_or_else(|| DetectionError::UnexpectedOutput("non-contiguous embedding".into()))?
            .to_vec();

        l2_normalize(&mut values);
        Ok(Embedding::new(values))
    }
}

/// Nearest-neighbour resize of the crop to 112x112, normalised to
/// `-1.0..=1.0`, NCHW layout.
fn preprocess(crop: &Frame) -> ndarray::Array4<f32> {
    let src = crop.as_ndarray();
    let src_w = crop.width() as usize;
    let src_h = crop.height() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}
