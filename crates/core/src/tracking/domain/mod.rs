pub mod identity_lookup;
pub mod track;
pub mod tracker_config;
