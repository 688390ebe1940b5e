pub mod constants;
pub mod error;
pub mod frame;
pub mod rect;
pub mod swap_config;
pub mod video_metadata;

#[cfg(test)]
pub(crate) mod test_fixtures;
