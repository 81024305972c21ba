pub mod onnx_arcface_embedder;
mod onnx_session;
pub mod onnx_yolo_detector;
