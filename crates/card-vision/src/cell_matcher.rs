use crate::config::{SizePolicy, VisionConfig};
use crate::geometry::{scale_image, PixelRect, Point};
use crate::patterns::{BadgePattern, CardPattern, CardPatternTable};
use crate::template::match_template;
use image::RgbImage;
use tracing::debug;

/// Card identified inside one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMatch {
    pub card_index: usize,
    pub upgraded: bool,
    /// Icon top-left relative to the cell, derived from the badge peak.
    /// Can be slightly negative when the icon overhangs the cell edge.
    pub icon_x: i64,
    pub icon_y: i64,
}

/// Classifies a cell by badge, then identifies the card among that group's patterns.
pub struct CellMatcher<'a> {
    config: &'a VisionConfig,
    badges: &'a [BadgePattern],
    table: &'a CardPatternTable,
}

impl<'a> CellMatcher<'a> {
    pub fn new(
        config: &'a VisionConfig,
        badges: &'a [BadgePattern],
        table: &'a CardPatternTable,
    ) -> Self {
        Self {
            config,
            badges,
            table,
        }
    }

    /// Identify at most one card in a cell at reference scale.
    ///
    /// Badges are tried in their stable order. Within one badge, peaks closer
    /// than `suppression_radius` to an earlier accepted peak are dropped. The
    /// first peak whose icon crop matches a card pattern ends the search.
    pub fn match_cell(&self, cell: &RgbImage) -> Option<CellMatch> {
        let search = self.config.badge_search_region().crop(cell)?;
        let badge_box = self.config.badge_crop;
        let match_box = self.config.match_crop;

        for badge in self.badges {
            let Some(scores) = match_template(&search, &badge.template) else {
                continue;
            };

            let mut accepted: Vec<Point> = Vec::new();
            for (peak, score) in scores.peaks_above(self.config.badge_threshold) {
                if accepted
                    .iter()
                    .any(|a| a.manhattan(&peak) < self.config.suppression_radius)
                {
                    continue;
                }
                accepted.push(peak);

                let region = PixelRect::new(peak.x, peak.y, match_box.width, match_box.height)
                    .offset(match_box.x, match_box.y);
                let Some(icon_crop) = region.crop(cell) else {
                    continue;
                };

                let matches = self.match_card(&icon_crop, self.table.group(&badge.group));
                if let Some(&(card_index, upgraded)) = matches.first() {
                    debug!(
                        "Cell match: card #{} (upgraded={}) via badge {} at ({}, {}) score {:.3}",
                        card_index, upgraded, badge.group, peak.x, peak.y, score
                    );
                    return Some(CellMatch {
                        card_index,
                        upgraded,
                        icon_x: peak.x as i64 - badge_box.x as i64,
                        icon_y: peak.y as i64 - badge_box.y as i64,
                    });
                }
            }
        }

        None
    }

    /// Every pattern of the group whose correlation with the crop reaches
    /// `card_threshold` anywhere, in pattern order.
    ///
    /// The crop is brought to pattern resolution first. Patterns larger than the
    /// crop are skipped, or end the scan under [`SizePolicy::StopAtOversized`].
    pub fn match_card(
        &self,
        icon_crop: &RgbImage,
        patterns: &[CardPattern],
    ) -> Vec<(usize, bool)> {
        let resized = scale_image(icon_crop, self.config.pattern_scale);
        let (w, h) = resized.dimensions();

        let mut matches = Vec::new();
        for pattern in patterns {
            if !pattern.template.fits(w, h) {
                match self.config.size_policy {
                    SizePolicy::StopAtOversized => break,
                    SizePolicy::SkipOversized => continue,
                }
            }
            let Some(scores) = match_template(&resized, &pattern.template) else {
                continue;
            };
            if scores.max() >= self.config.card_threshold {
                matches.push((pattern.card_index, pattern.upgraded));
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::GroupKey;
    use crate::template::PreparedTemplate;

    fn noise(w: u32, h: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let mut v = x.wrapping_mul(374_761_393)
                ^ y.wrapping_mul(668_265_263)
                ^ seed.wrapping_mul(2_246_822_519);
            v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
            let v = ((v ^ (v >> 16)) % 200) as u8;
            image::Rgb([v, 200 - v, v / 2])
        })
    }

    fn card_pattern(card_index: usize, upgraded: bool, image: RgbImage) -> CardPattern {
        CardPattern {
            card_index,
            upgraded,
            template: PreparedTemplate::new(image),
        }
    }

    #[test]
    fn test_match_card_returns_all_hits_in_order() {
        let config = VisionConfig::default();
        let table = CardPatternTable::default();
        let matcher = CellMatcher::new(&config, &[], &table);

        // A 40x40 pattern sits inside a 44x44 crop at pattern resolution
        let crop_small = noise(44, 44, 1);
        let crop =
            image::imageops::resize(&crop_small, 88, 88, image::imageops::FilterType::Nearest);
        let inner =
            image::imageops::crop_imm(&scale_image(&crop, 0.5), 2, 2, 40, 40).to_image();

        let patterns = vec![
            card_pattern(0, false, noise(40, 40, 2)),
            card_pattern(1, true, inner.clone()),
            card_pattern(2, false, inner),
        ];
        assert_eq!(matcher.match_card(&crop, &patterns), vec![(1, true), (2, false)]);
    }

    #[test]
    fn test_size_policy() {
        let table = CardPatternTable::default();
        let crop = noise(88, 88, 3);
        let fitting =
            image::imageops::crop_imm(&scale_image(&crop, 0.5), 0, 0, 40, 40).to_image();
        let patterns = vec![
            card_pattern(0, false, noise(50, 50, 4)),
            card_pattern(1, false, fitting),
        ];

        let lenient = VisionConfig::default();
        assert_eq!(
            CellMatcher::new(&lenient, &[], &table).match_card(&crop, &patterns),
            vec![(1, false)]
        );

        let strict = VisionConfig {
            size_policy: SizePolicy::StopAtOversized,
            ..VisionConfig::default()
        };
        assert!(CellMatcher::new(&strict, &[], &table)
            .match_card(&crop, &patterns)
            .is_empty());
    }

    #[test]
    fn test_uniform_cell_is_unmatched() {
        let config = VisionConfig::default();
        let badges = vec![BadgePattern {
            group: GroupKey::new("R", "Pure", false),
            upgraded: false,
            template: PreparedTemplate::new(noise(22, 22, 5)),
        }];
        let table = CardPatternTable::default();
        let matcher = CellMatcher::new(&config, &badges, &table);
        let cell = RgbImage::from_pixel(128, 129, image::Rgb([90, 90, 90]));
        assert!(matcher.match_cell(&cell).is_none());
    }

    #[test]
    fn test_badge_without_card_match_is_unmatched() {
        let config = VisionConfig::default();
        let badge = noise(22, 22, 6);
        let mut cell = RgbImage::from_pixel(128, 129, image::Rgb([90, 90, 90]));
        image::imageops::replace(&mut cell, &noise(128, 128, 7), 1, 1);
        image::imageops::replace(&mut cell, &badge, 3, 3);

        let badges = vec![BadgePattern {
            group: GroupKey::new("R", "Pure", false),
            upgraded: false,
            template: PreparedTemplate::new(badge),
        }];
        let mut table = CardPatternTable::default();
        table.insert(
            GroupKey::new("R", "Pure", false),
            card_pattern(0, false, noise(40, 40, 8)),
        );
        let matcher = CellMatcher::new(&config, &badges, &table);
        assert!(matcher.match_cell(&cell).is_none());
    }

    /// Pattern that matches the icon crop taken for a badge found at `peak`
    fn pattern_at_peak(cell: &RgbImage, peak: (u32, u32), config: &VisionConfig) -> RgbImage {
        let m = config.match_crop;
        let crop = PixelRect::new(peak.0 + m.x, peak.1 + m.y, m.width, m.height)
            .crop(cell)
            .unwrap();
        let scaled = scale_image(&crop, config.pattern_scale);
        image::imageops::crop_imm(&scaled, 2, 2, 40, 40).to_image()
    }

    fn badge(group: GroupKey, glyph: &RgbImage) -> BadgePattern {
        BadgePattern {
            upgraded: group.upgraded,
            group,
            template: PreparedTemplate::new(glyph.clone()),
        }
    }

    #[test]
    fn test_later_badge_group_can_supply_the_card() {
        let config = VisionConfig::default();
        let glyph = noise(22, 22, 11);
        let mut cell = noise(128, 129, 12);
        image::imageops::replace(&mut cell, &glyph, 3, 3);
        let pattern = pattern_at_peak(&cell, (3, 3), &config);

        let pure = GroupKey::new("R", "Pure", false);
        let cool = GroupKey::new("SR", "Cool", false);
        let badges = vec![badge(pure.clone(), &glyph), badge(cool.clone(), &glyph)];

        // Only the second badge's group knows the card
        let mut table = CardPatternTable::default();
        table.insert(cool.clone(), card_pattern(7, false, pattern.clone()));
        let found = CellMatcher::new(&config, &badges, &table)
            .match_cell(&cell)
            .unwrap();
        assert_eq!((found.card_index, found.upgraded), (7, false));
        assert_eq!((found.icon_x, found.icon_y), (1, 1));

        // Both groups know a card: the first badge ends the search
        table.insert(pure, card_pattern(3, false, pattern));
        let found = CellMatcher::new(&config, &badges, &table)
            .match_cell(&cell)
            .unwrap();
        assert_eq!(found.card_index, 3);
    }

    #[test]
    fn test_nearby_second_peak_is_suppressed() {
        let config = VisionConfig {
            badge_search_margin: 40,
            ..VisionConfig::default()
        };
        let glyph = noise(22, 22, 21);
        let mut cell = noise(160, 129, 22);
        image::imageops::replace(&mut cell, &glyph, 3, 3);
        image::imageops::replace(&mut cell, &glyph, 30, 3);

        // The card sits behind the second glyph only
        let group = GroupKey::new("R", "Pure", false);
        let badges = vec![badge(group.clone(), &glyph)];
        let mut table = CardPatternTable::default();
        table.insert(
            group,
            card_pattern(5, false, pattern_at_peak(&cell, (30, 3), &config)),
        );

        // Peaks 27px apart: the first fails and the second is dropped
        assert!(CellMatcher::new(&config, &badges, &table)
            .match_cell(&cell)
            .is_none());

        let narrow = VisionConfig {
            suppression_radius: 20,
            ..config
        };
        let found = CellMatcher::new(&narrow, &badges, &table)
            .match_cell(&cell)
            .unwrap();
        assert_eq!(found.card_index, 5);
        assert_eq!((found.icon_x, found.icon_y), (28, 1));
    }
}
