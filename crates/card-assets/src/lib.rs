pub mod atlas_cache;
pub mod error;
pub mod icons;

use image::RgbImage;
use serde::{Deserialize, Serialize};

pub use atlas_cache::{AtlasCache, FileAtlasCache};
pub use error::AssetError;
pub use icons::{IconSource, IconStore, ImageFetcher};

/// Bounding box as fractions of the screenshot's width and height
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRegion {
    /// Pixel rectangle `(x, y, width, height)` inside a `frame_w` x `frame_h` image.
    ///
    /// The origin is truncated and the extent rounded, then both are clamped so
    /// the rectangle never leaves the image.
    pub fn to_pixels(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let axis = |origin: f64, extent: f64, size: u32| {
            let start = ((origin * size as f64).max(0.0) as u32).min(size.saturating_sub(1));
            let len = ((extent * size as f64).round().max(0.0) as u32).min(size - start);
            (start, len)
        };
        let (x, width) = axis(self.x, self.width, frame_w);
        let (y, height) = axis(self.y, self.height, frame_h);
        (x, y, width, height)
    }
}

/// Cut a region out of a screenshot, e.g. to dump a match for inspection.
pub fn crop_region(frame: &RgbImage, region: &ScreenRegion) -> RgbImage {
    let (x, y, width, height) = region.to_pixels(frame.width(), frame.height());
    image::imageops::crop_imm(frame, x, y, width, height).to_image()
}
