use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;

use crate::filtering::domain::filter_action::FilterAction;
use crate::filtering::domain::filter_config::FilterConfig;
use crate::filtering::domain::sticker_asset::StickerAsset;
use crate::shared::face_id::FaceId;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::gaussian::{self, GaussianBlur};
use super::{pixelate, sticker};

/// Scaled stickers kept between frames; faces rarely change size per frame.
const STICKER_CACHE_LIMIT: usize = 32;

/// Cache key: person, box size, and the visible window relative to the box.
type StickerKey = (FaceId, i32, i32, Region);

/// Draws filter actions onto frames.
///
/// Output depends only on the frame, the box, the action and the run's
/// [`FilterConfig`]; the scratch buffers and sticker cache never change
/// results. Every operation clamps the box to the frame first, so boxes
/// partly or wholly outside the frame are safe.
pub struct FilterEngine {
    blur_strength: f64,
    stickers: HashMap<FaceId, Arc<StickerAsset>>,
    gaussian: GaussianBlur,
    roi: Vec<u8>,
    scaled_stickers: HashMap<StickerKey, RgbaImage>,
}

impl FilterEngine {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            blur_strength: config.blur_strength(),
            stickers: config.stickers().clone(),
            gaussian: GaussianBlur::new(),
            roi: Vec::new(),
            scaled_stickers: HashMap::new(),
        }
    }

    pub fn apply(&mut self, frame: &mut Frame, region: &Region, action: FilterAction) {
        match action.effective() {
            FilterAction::Pixelate => self.apply_pixelate(frame, region),
            FilterAction::Sticker(face_id) => self.apply_sticker(frame, region, face_id),
            FilterAction::Blur | FilterAction::Unresolved => self.apply_blur(frame, region),
        }
    }

    /// Gaussian blur with a kernel sized from the box and the blur strength.
    pub fn apply_blur(&mut self, frame: &mut Frame, region: &Region) {
        let Some(visible) = region.clamp_to(frame.width(), frame.height()) else {
            return;
        };
        let (w, h) = (visible.width as usize, visible.height as usize);
        let channels = frame.channels() as usize;
        let kernel_size = gaussian::kernel_size_for(w, h, self.blur_strength);

        copy_out(frame, &visible, &mut self.roi);
        self.gaussian.blur(&mut self.roi, w, h, channels, kernel_size);
        copy_in(frame, &visible, &self.roi);
    }

    pub fn apply_pixelate(&mut self, frame: &mut Frame, region: &Region) {
        let Some(visible) = region.clamp_to(frame.width(), frame.height()) else {
            return;
        };
        let (w, h) = (visible.width as usize, visible.height as usize);
        let block = pixelate::block_size_for(w, h);

        copy_out(frame, &visible, &mut self.roi);
        pixelate::pixelate(&mut self.roi, w, h, frame.channels() as usize, block);
        copy_in(frame, &visible, &self.roi);
    }

    /// Draws `face_id`'s sticker over the box, or blurs it when the run has
    /// no sticker for that person.
    pub fn apply_sticker(&mut self, frame: &mut Frame, region: &Region, face_id: FaceId) {
        let Some(visible) = region.clamp_to(frame.width(), frame.height()) else {
            return;
        };
        let Some(asset) = self.stickers.get(&face_id).cloned() else {
            log::debug!("No sticker configured for face {face_id}, blurring instead");
            self.apply_blur(frame, region);
            return;
        };

        let window = Region::new(
            visible.x - region.x,
            visible.y - region.y,
            visible.width,
            visible.height,
        );
        let key = (face_id, region.width, region.height, window);
        if !self.scaled_stickers.contains_key(&key) {
            let Some(scaled) = sticker::scale_sticker_part(&asset, region, &visible) else {
                self.apply_blur(frame, region);
                return;
            };
            if self.scaled_stickers.len() >= STICKER_CACHE_LIMIT {
                self.scaled_stickers.clear();
            }
            self.scaled_stickers.insert(key, scaled);
        }
        if let Some(scaled) = self.scaled_stickers.get(&key) {
            sticker::composite(frame, &visible, scaled);
        }
    }
}

fn copy_out(frame: &Frame, visible: &Region, roi: &mut Vec<u8>) {
    let channels = frame.channels() as usize;
    let fw = frame.width() as usize;
    let (x, y) = (visible.x as usize, visible.y as usize);
    let row_bytes = visible.width as usize * channels;
    let data = frame.data();

    roi.clear();
    for row in y..y + visible.height as usize {
        let start = (row * fw + x) * channels;
        roi.extend_from_slice(&data[start..start + row_bytes]);
    }
}

fn copy_in(frame: &mut Frame, visible: &Region, roi: &[u8]) {
    let channels = frame.channels() as usize;
    let fw = frame.width() as usize;
    let (x, y) = (visible.x as usize, visible.y as usize);
    let row_bytes = visible.width as usize * channels;
    let data = frame.data_mut();

    for (i, src) in roi.chunks_exact(row_bytes).enumerate() {
        let start = ((y + i) * fw + x) * channels;
        data[start..start + row_bytes].copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::domain::filter_config::FilterMode;
    use rstest::rstest;

    /// Vertical black/white step edge through the middle of the frame.
    fn step_frame(w: u32, h: u32) -> Frame {
        let mut data = vec![0u8; (w * h * 3) as usize];
        for y in 0..h as usize {
            for x in (w as usize / 2)..w as usize {
                let i = (y * w as usize + x) * 3;
                data[i..i + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        Frame::new(data, w, h, 3, 0)
    }

    fn engine() -> FilterEngine {
        FilterEngine::new(&FilterConfig::new(FilterMode::BlurAll))
    }

    fn pixels_outside_changed(before: &Frame, after: &Frame, region: &Region) -> bool {
        let w = before.width() as i32;
        for y in 0..before.height() as i32 {
            for x in 0..w {
                let inside =
                    x >= region.x && x < region.right() && y >= region.y && y < region.bottom();
                if inside {
                    continue;
                }
                let i = ((y * w + x) * 3) as usize;
                if before.data()[i..i + 3] != after.data()[i..i + 3] {
                    return true;
                }
            }
        }
        false
    }

    #[rstest]
    #[case::blur(FilterAction::Blur)]
    #[case::pixelate(FilterAction::Pixelate)]
    #[case::unresolved(FilterAction::Unresolved)]
    #[case::sticker_without_asset(FilterAction::Sticker(FaceId(1)))]
    fn test_filters_stay_inside_box(#[case] action: FilterAction) {
        let before = step_frame(64, 48);
        let mut after = before.clone();
        let region = Region::new(20, 10, 24, 24);
        engine().apply(&mut after, &region, action);
        assert_ne!(before, after);
        assert!(!pixels_outside_changed(&before, &after, &region));
    }

    #[rstest]
    #[case::blur(FilterAction::Blur)]
    #[case::pixelate(FilterAction::Pixelate)]
    fn test_second_pass_changes_pixels_further(#[case] action: FilterAction) {
        let mut frame = step_frame(64, 64);
        let region = Region::new(16, 16, 32, 32);
        let mut engine = engine();
        engine.apply(&mut frame, &region, action);
        let once = frame.clone();
        engine.apply(&mut frame, &region, action);
        assert_ne!(frame, once);
    }

    #[rstest]
    #[case::off_right(Region::new(100, 10, 20, 20))]
    #[case::off_top_left(Region::new(-50, -50, 20, 20))]
    #[case::degenerate(Region::new(5, 5, 0, 10))]
    fn test_box_outside_frame_is_noop(#[case] region: Region) {
        let before = step_frame(64, 48);
        for action in [FilterAction::Blur, FilterAction::Pixelate, FilterAction::Sticker(FaceId(1))] {
            let mut after = before.clone();
            engine().apply(&mut after, &region, action);
            assert_eq!(before, after);
        }
    }

    #[test]
    fn test_box_crossing_edge_is_clamped() {
        let before = step_frame(64, 48);
        let mut after = before.clone();
        let region = Region::new(50, 30, 40, 40);
        engine().apply_blur(&mut after, &region);
        assert!(!pixels_outside_changed(&before, &after, &region));
    }

    #[test]
    fn test_same_input_same_output() {
        let region = Region::new(10, 10, 30, 30);
        let mut a = step_frame(64, 64);
        let mut b = a.clone();
        let mut engine = engine();
        engine.apply_blur(&mut a, &region);
        // A different engine with its own buffers gives the same pixels.
        FilterEngine::new(&FilterConfig::default()).apply_blur(&mut b, &region);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sticker_drawn_when_configured() {
        let asset = StickerAsset::from_rgba([9, 8, 7, 255].repeat(16), 4, 4).unwrap();
        let config =
            FilterConfig::new(FilterMode::IdentityAware).with_sticker(FaceId(5), Arc::new(asset));
        let mut engine = FilterEngine::new(&config);
        let mut frame = step_frame(32, 32);
        engine.apply(&mut frame, &Region::new(4, 4, 8, 8), FilterAction::Sticker(FaceId(5)));
        let i = (6 * 32 + 6) * 3;
        assert_eq!(&frame.data()[i..i + 3], &[9, 8, 7]);
    }

    #[test]
    fn test_sticker_on_box_far_past_frame_edge() {
        let asset = StickerAsset::from_rgba([9, 8, 7, 255].repeat(16), 4, 4).unwrap();
        let config =
            FilterConfig::new(FilterMode::IdentityAware).with_sticker(FaceId(5), Arc::new(asset));
        let mut engine = FilterEngine::new(&config);
        let mut frame = step_frame(32, 32);
        let region = Region::new(-50_000, -50_000, 100_000, 100_000);

        engine.apply(&mut frame, &region, FilterAction::Sticker(FaceId(5)));

        assert!(frame.data().chunks_exact(3).all(|px| px == [9, 8, 7]));
        let scaled: Vec<_> = engine.scaled_stickers.values().map(|s| s.dimensions()).collect();
        assert_eq!(scaled, vec![(32, 32)]);
    }
}
