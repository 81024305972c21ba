use thiserror::Error;

#[derive(Error, Debug)]
pub enum StickerError {
    #[error("failed to load sticker image: {0}")]
    Load(#[from] image::ImageError),
    #[error("sticker has zero size")]
    Empty,
    #[error("sticker buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BadLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// An RGBA overlay image drawn over a recognised person's face.
#[derive(Clone, Debug, PartialEq)]
pub struct StickerAsset {
    rgba: Vec<u8>,
    width: u32,
    height: u32,
}

impl StickerAsset {
    pub fn from_rgba(rgba: Vec<u8>, width: u32, height: u32) -> Result<Self, StickerError> {
        if width == 0 || height == 0 {
            return Err(StickerError::Empty);
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(StickerError::BadLength {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            rgba,
            width,
            height,
        })
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}
