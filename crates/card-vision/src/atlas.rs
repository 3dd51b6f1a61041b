//! Pattern atlas: one composite image holding the normalized center crop of
//! every catalog icon, two stacked slots per card (base, then upgraded).

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::geometry::{resize_to, PixelRange};
use anyhow::{Context, Result};
use card_assets::{AtlasCache, ImageFetcher};
use card_catalog::{fingerprint, Card};
use image::RgbImage;
use tracing::{debug, info, warn};

/// Fill value of slots whose icon could not be loaded. Constant, so it never correlates.
const PLACEHOLDER: image::Rgb<u8> = image::Rgb([1, 1, 1]);

/// Rows of the atlas holding the pattern for `(index, upgraded)`.
///
/// Slots are laid out as `index * 2 + upgraded`, each `pattern_height` rows tall,
/// so distinct pairs never overlap.
pub fn slot(index: usize, upgraded: bool, pattern_height: u32) -> PixelRange {
    let real_index = index as u32 * 2 + upgraded as u32;
    PixelRange::new(real_index * pattern_height, (real_index + 1) * pattern_height)
}

/// The composite pattern image, addressed by [`slot`].
#[derive(Debug, Clone)]
pub struct Atlas {
    image: RgbImage,
    card_count: usize,
    pattern_width: u32,
    pattern_height: u32,
}

impl Atlas {
    /// Expected dimensions for `card_count` cards
    pub fn dimensions_for(card_count: usize, config: &VisionConfig) -> (u32, u32) {
        let (pw, ph) = config.pattern_size();
        (pw, ph * 2 * card_count as u32)
    }

    /// Wrap an existing image, checking it has the layout `card_count` requires.
    pub fn from_image(
        image: RgbImage,
        card_count: usize,
        config: &VisionConfig,
    ) -> Result<Self, VisionError> {
        let (ew, eh) = Self::dimensions_for(card_count, config);
        if image.dimensions() != (ew, eh) {
            return Err(VisionError::AtlasShape {
                expected_width: ew,
                expected_height: eh,
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }
        let (pattern_width, pattern_height) = config.pattern_size();
        Ok(Self {
            image,
            card_count,
            pattern_width,
            pattern_height,
        })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Copy out the pattern stored for `(index, upgraded)`
    pub fn pattern(&self, index: usize, upgraded: bool) -> Option<RgbImage> {
        if index >= self.card_count {
            return None;
        }
        let rows = slot(index, upgraded, self.pattern_height);
        Some(
            image::imageops::crop_imm(&self.image, 0, rows.start, self.pattern_width, rows.len())
                .to_image(),
        )
    }
}

/// Scale an icon to the reference size if it was published at another resolution.
pub fn normalize_icon(icon: RgbImage, config: &VisionConfig) -> RgbImage {
    if icon.dimensions() == (config.icon_size, config.icon_size) {
        icon
    } else {
        resize_to(&icon, config.icon_size, config.icon_size)
    }
}

/// Builds the atlas from catalog icons, reusing a cached one when it is still valid.
pub struct AtlasBuilder<'a> {
    config: &'a VisionConfig,
}

impl<'a> AtlasBuilder<'a> {
    pub fn new(config: &'a VisionConfig) -> Self {
        Self { config }
    }

    /// Return the cached atlas for this catalog, rebuilding and storing it when
    /// it is missing, stale or malformed.
    pub fn load_or_build(
        &self,
        cards: &[Card],
        fetcher: &dyn ImageFetcher,
        cache: &dyn AtlasCache,
    ) -> Result<Atlas> {
        let fp = fingerprint(cards);

        if let Some(image) = cache.load(&fp)? {
            match Atlas::from_image(image, cards.len(), self.config) {
                Ok(atlas) => {
                    info!("Reusing cached atlas for {} cards", cards.len());
                    return Ok(atlas);
                }
                Err(e) => {
                    warn!("Discarding cached atlas: {}", e);
                    cache.invalidate()?;
                }
            }
        }

        let atlas = self.build(cards, fetcher)?;
        cache.store(atlas.image(), &fp)?;
        Ok(atlas)
    }

    /// Build the atlas from scratch.
    ///
    /// Icons that are missing or undecodable leave their slot as a placeholder;
    /// fetch failures propagate.
    pub fn build(&self, cards: &[Card], fetcher: &dyn ImageFetcher) -> Result<Atlas> {
        if cards.is_empty() {
            return Err(VisionError::EmptyAtlas(0).into());
        }

        let (width, height) = Atlas::dimensions_for(cards.len(), self.config);
        let (pw, ph) = self.config.pattern_size();
        let mut image = RgbImage::from_pixel(width, height, PLACEHOLDER);
        let crop = self.config.pattern_crop;
        let mut filled = 0usize;

        for card in cards {
            for (icon_ref, upgraded) in card.icons() {
                let icon = match fetcher.resolve(icon_ref) {
                    Ok(icon) => normalize_icon(icon, self.config),
                    Err(e) if e.is_recoverable() => {
                        warn!("No pattern for card {} ({}): {}", card.id, icon_ref.url, e);
                        continue;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Failed to load icon for card {}", card.id)
                        });
                    }
                };

                let cropped =
                    image::imageops::crop_imm(&icon, crop.x, crop.y, crop.width, crop.height)
                        .to_image();
                let pattern = resize_to(&cropped, pw, ph);
                let rows = slot(card.index, upgraded, ph);
                image::imageops::replace(&mut image, &pattern, 0, rows.start as i64);
                filled += 1;
            }
        }

        if filled == 0 {
            return Err(VisionError::EmptyAtlas(cards.len()).into());
        }

        debug!("Atlas {}x{}: {} slot(s) filled", width, height, filled);
        info!("Built atlas for {} cards", cards.len());
        Ok(Atlas::from_image(image, cards.len(), self.config)?)
    }
}
