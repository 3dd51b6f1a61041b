use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Half-open pixel interval `[start, end)` along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRange {
    pub start: u32,
    pub end: u32,
}

impl PixelRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Both ends within `tolerance` pixels of `other`'s.
    pub fn near(&self, other: &PixelRange, tolerance: u32) -> bool {
        self.start.abs_diff(other.start) <= tolerance && self.end.abs_diff(other.end) <= tolerance
    }
}

/// Pixel-space rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Same rectangle moved by `(dx, dy)`
    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Intersection with a `width x height` image, `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self::new(self.x, self.y, w, h))
    }

    /// Crop this rectangle out of `image`, clipped to its bounds.
    pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
        let r = self.clamp_to(image.width(), image.height())?;
        Some(image::imageops::crop_imm(image, r.x, r.y, r.width, r.height).to_image())
    }
}

/// Pixel position of a correlation peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn manhattan(&self, other: &Point) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Resize by a uniform factor, rounding each dimension (minimum 1px).
/// Returns a plain copy when the size would not change.
pub fn scale_image(image: &RgbImage, factor: f64) -> RgbImage {
    let w = ((image.width() as f64 * factor).round() as u32).max(1);
    let h = ((image.height() as f64 * factor).round() as u32).max(1);
    resize_to(image, w, h)
}

pub fn resize_to(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image::imageops::resize(image, width, height, image::imageops::FilterType::Triangle)
}
