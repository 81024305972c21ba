use std::path::Path;

use crate::detection::domain::detection_error::DetectionError;

/// Preferred ONNX execution providers for the current platform. ONNX
/// Runtime falls back to CPU when a provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Loads an ONNX model with full graph optimisation and one intra-op
/// thread per core.
pub fn load_session(model_path: &Path) -> Result<ort::session::Session, DetectionError> {
    build_session(model_path).map_err(|e| DetectionError::ModelLoad {
        path: model_path.to_path_buf(),
        source: e.to_string().into(),
    })
}

fn build_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}
