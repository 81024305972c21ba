pub mod filter_action;
pub mod filter_config;
pub mod sticker_asset;
