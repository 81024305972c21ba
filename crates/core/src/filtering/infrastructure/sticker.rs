use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::filtering::domain::sticker_asset::{StickerAsset, StickerError};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Loads a sticker image, keeping its alpha channel (PNG transparency).
pub fn load_sticker(path: &Path) -> Result<StickerAsset, StickerError> {
    let img = image::open(path)?.into_rgba8();
    let (width, height) = img.dimensions();
    StickerAsset::from_rgba(img.into_raw(), width, height)
}

/// Resizes `asset` to exactly `width` × `height`.
pub fn scale_sticker(asset: &StickerAsset, width: u32, height: u32) -> Option<RgbaImage> {
    let src = RgbaImage::from_raw(asset.width(), asset.height(), asset.rgba().to_vec())?;
    if (asset.width(), asset.height()) == (width, height) {
        return Some(src);
    }
    Some(imageops::resize(&src, width, height, FilterType::Triangle))
}

/// The part of `asset`, stretched over `region`, that falls inside
/// `visible`, scaled to `visible`'s size.
///
/// Only the visible part is resampled, so a box reaching far past the frame
/// costs no more than one the size of the frame.
pub fn scale_sticker_part(
    asset: &StickerAsset,
    region: &Region,
    visible: &Region,
) -> Option<RgbaImage> {
    if region.is_empty() || visible.is_empty() {
        return None;
    }
    if visible == region {
        return scale_sticker(asset, region.width as u32, region.height as u32);
    }

    let (aw, ah) = (asset.width(), asset.height());
    let span = |offset: i32, len: i32, region_len: i32, asset_len: u32| {
        let scale = asset_len as f64 / region_len as f64;
        let start = ((offset as f64 * scale).floor() as u32).min(asset_len - 1);
        let end = (((offset + len) as f64 * scale).ceil() as u32).clamp(start + 1, asset_len);
        (start, end - start)
    };
    let (sx, sw) = span(visible.x - region.x, visible.width, region.width, aw);
    let (sy, sh) = span(visible.y - region.y, visible.height, region.height, ah);

    let src = RgbaImage::from_raw(aw, ah, asset.rgba().to_vec())?;
    let part = imageops::crop_imm(&src, sx, sy, sw, sh).to_image();
    Some(imageops::resize(
        &part,
        visible.width as u32,
        visible.height as u32,
        FilterType::Triangle,
    ))
}

/// Alpha-blends `scaled` onto `frame` with its top-left corner at `at`.
/// Pixels falling outside the frame are skipped.
pub fn composite(frame: &mut Frame, at: &Region, scaled: &RgbaImage) {
    let region = Region::new(at.x, at.y, scaled.width() as i32, scaled.height() as i32);
    let Some(visible) = region.clamp_to(frame.width(), frame.height()) else {
        return;
    };
    let fw = frame.width() as usize;
    let channels = frame.channels() as usize;
    let data = frame.data_mut();

    for fy in visible.y..visible.bottom() {
        let sy = (fy - region.y) as u32;
        for fx in visible.x..visible.right() {
            let sx = (fx - region.x) as u32;
            let [r, g, b, a] = scaled.get_pixel(sx, sy).0;
            if a == 0 {
                continue;
            }
            let alpha = a as u32;
            let i = (fy as usize * fw + fx as usize) * channels;
            for (c, s) in [r, g, b].into_iter().enumerate() {
                let d = data[i + c] as u32;
                data[i + c] = ((s as u32 * alpha + d * (255 - alpha) + 127) / 255) as u8;
            }
        }
    }
}
