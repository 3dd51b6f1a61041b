use crate::error::VisionError;
use crate::geometry::PixelRect;
use serde::{Deserialize, Serialize};

/// What card matching does when a pattern is larger than the candidate crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePolicy {
    /// Skip that pattern and keep trying the rest of the group
    #[default]
    SkipOversized,
    /// Stop at the first oversized pattern (bit-for-bit with older outputs)
    StopAtOversized,
}

/// Every threshold and geometry constant of the pipeline.
///
/// Crop boxes are expressed on an icon at reference scale (`icon_size` square).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Edge of a round card icon at reference scale
    pub icon_size: u32,
    /// Rarity/attribute glyph in the icon's top-left corner
    pub badge_crop: PixelRect,
    /// Extra pixels searched right of and below the badge
    pub badge_search_margin: u32,
    /// Centered icon area stored in the atlas (outer ring excluded)
    pub pattern_crop: PixelRect,
    /// Downscale from reference scale to pattern resolution
    pub pattern_scale: f64,
    /// Icon area cropped from a cell, relative to the badge peak
    pub match_crop: PixelRect,
    /// Luma strictly above this is "bright"
    pub binarize_threshold: u8,
    /// Minimum height of an icon row between separator bands (screenshot pixels)
    pub min_row_gap: u32,
    /// Column candidates within this many pixels of an accepted one are duplicates
    pub dedup_tolerance: u32,
    pub badge_threshold: f64,
    pub card_threshold: f64,
    /// Manhattan radius used to collapse duplicate badge peaks in one cell
    pub suppression_radius: u32,
    pub size_policy: SizePolicy,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            icon_size: 128,
            badge_crop: PixelRect::new(2, 2, 22, 22),
            badge_search_margin: 2,
            pattern_crop: PixelRect::new(16, 16, 80, 80),
            pattern_scale: 0.5,
            match_crop: PixelRect::new(12, 12, 88, 88),
            binarize_threshold: 223,
            min_row_gap: 100,
            dedup_tolerance: 2,
            badge_threshold: 0.7,
            card_threshold: 0.8,
            suppression_radius: 100,
            size_policy: SizePolicy::SkipOversized,
        }
    }
}

impl VisionConfig {
    /// Size of one atlas pattern (width, height)
    pub fn pattern_size(&self) -> (u32, u32) {
        let w = (self.pattern_crop.width as f64 * self.pattern_scale).round() as u32;
        let h = (self.pattern_crop.height as f64 * self.pattern_scale).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Top-left region of a cell searched for badges
    pub fn badge_search_region(&self) -> PixelRect {
        PixelRect::new(
            0,
            0,
            self.badge_crop.right() + self.badge_search_margin,
            self.badge_crop.bottom() + self.badge_search_margin,
        )
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        let invalid = |msg: &str| Err(VisionError::InvalidConfig(msg.to_string()));

        if self.icon_size == 0 {
            return invalid("icon_size must be positive");
        }
        if !(self.pattern_scale > 0.0 && self.pattern_scale <= 1.0) {
            return invalid("pattern_scale must be in (0, 1]");
        }
        for (name, rect) in [
            ("badge_crop", &self.badge_crop),
            ("pattern_crop", &self.pattern_crop),
            ("match_crop", &self.match_crop),
        ] {
            if rect.width == 0 || rect.height == 0 {
                return invalid(&format!("{} is empty", name));
            }
            if rect.right() > self.icon_size || rect.bottom() > self.icon_size {
                return invalid(&format!("{} exceeds icon_size", name));
            }
        }
        for (name, t) in [
            ("badge_threshold", self.badge_threshold),
            ("card_threshold", self.card_threshold),
        ] {
            if !(-1.0..=1.0).contains(&t) {
                return invalid(&format!("{} must be within [-1, 1]", name));
            }
        }
        Ok(())
    }
}
