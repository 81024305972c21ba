pub mod detection;
pub mod filtering;
pub mod pipeline;
pub mod registry;
pub mod shared;
pub mod tracking;
pub mod video;

#[cfg(test)]
mod test_support;
