pub mod filter_engine;
mod gaussian;
mod pixelate;
pub mod sticker;
