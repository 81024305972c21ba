pub mod constants;
pub mod face_id;
pub mod frame;
pub mod model_resolver;
pub mod region;
pub mod video_metadata;
