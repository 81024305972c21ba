use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes a still image file into an RGB [`Frame`] with index 0.
///
/// Used by face enrolment, where a reference photo is either a path or an
/// in-memory buffer.
pub fn load_frame(path: &Path) -> Result<Frame, image::ImageError> {
    let img = image::open(path)?.to_rgb8();
    Ok(into_frame(img))
}

/// Decodes an encoded image buffer (PNG, JPEG, ...) into an RGB [`Frame`].
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, image::ImageError> {
    let img = image::load_from_memory(bytes)?.to_rgb8();
    Ok(into_frame(img))
}

fn into_frame(img: image::RgbImage) -> Frame {
    let (width, height) = img.dimensions();
    Frame::new(img.into_raw(), width, height, 3, 0)
}
