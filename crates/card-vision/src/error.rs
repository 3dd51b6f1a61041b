use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// Rebuilding the atlas produced no usable icon at all
    #[error("atlas rebuild failed: no icon image could be loaded for {0} card(s)")]
    EmptyAtlas(usize),

    #[error("atlas is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    AtlasShape {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("invalid vision config: {0}")]
    InvalidConfig(String),
}
