use crate::atlas::{normalize_icon, Atlas};
use crate::config::VisionConfig;
use crate::template::PreparedTemplate;
use anyhow::{Context, Result};
use card_assets::ImageFetcher;
use card_catalog::Card;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Bucket shared by badge and card patterns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub rarity: String,
    pub attribute: String,
    pub upgraded: bool,
}

impl GroupKey {
    pub fn new(rarity: &str, attribute: &str, upgraded: bool) -> Self {
        Self {
            rarity: rarity.to_string(),
            attribute: attribute.to_string(),
            upgraded,
        }
    }

    pub fn of(card: &Card, upgraded: bool) -> Self {
        Self::new(&card.rarity, &card.attribute, upgraded)
    }

    /// The upgraded group of the same rarity and attribute
    pub fn as_upgraded(&self) -> Self {
        Self {
            upgraded: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}{}", self.rarity, self.attribute, self.upgraded as u8)
    }
}

/// Rarity/attribute glyph cropped from the first icon seen for its group
#[derive(Debug, Clone)]
pub struct BadgePattern {
    pub group: GroupKey,
    pub upgraded: bool,
    pub template: PreparedTemplate,
}

/// Normalized icon crop for one card variant
#[derive(Debug, Clone)]
pub struct CardPattern {
    pub card_index: usize,
    pub upgraded: bool,
    pub template: PreparedTemplate,
}

/// Extracts one badge pattern per distinct group, in catalog order.
pub struct RarityPatternBuilder<'a> {
    config: &'a VisionConfig,
}

impl<'a> RarityPatternBuilder<'a> {
    pub fn new(config: &'a VisionConfig) -> Self {
        Self { config }
    }

    /// The first card providing an icon for a group supplies its badge; later
    /// cards of that group are skipped. A group whose icon cannot be loaded stays
    /// open for the next card.
    pub fn build(&self, cards: &[Card], fetcher: &dyn ImageFetcher) -> Result<Vec<BadgePattern>> {
        let mut seen: HashSet<GroupKey> = HashSet::new();
        let mut patterns = Vec::new();
        let crop = self.config.badge_crop;

        for card in cards {
            for (icon_ref, upgraded) in card.icons() {
                let group = GroupKey::of(card, upgraded);
                if seen.contains(&group) {
                    continue;
                }

                let icon = match fetcher.resolve(icon_ref) {
                    Ok(icon) => normalize_icon(icon, self.config),
                    Err(e) if e.is_recoverable() => {
                        warn!("No badge from card {} ({}): {}", card.id, icon_ref.url, e);
                        continue;
                    }
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("Failed to load icon for card {}", card.id)
                        });
                    }
                };

                let badge =
                    image::imageops::crop_imm(&icon, crop.x, crop.y, crop.width, crop.height)
                        .to_image();
                debug!("Badge for group {} from card {}", group, card.id);
                seen.insert(group.clone());
                patterns.push(BadgePattern {
                    group,
                    upgraded,
                    template: PreparedTemplate::new(badge),
                });
            }
        }

        info!("Built {} badge pattern(s)", patterns.len());
        Ok(patterns)
    }
}

/// Card patterns bucketed by group.
///
/// A base pattern is filed under its own group and under the upgraded group of
/// the same rarity/attribute, since an upgraded card can show its base artwork.
#[derive(Debug, Clone, Default)]
pub struct CardPatternTable {
    groups: HashMap<GroupKey, Vec<CardPattern>>,
}

impl CardPatternTable {
    /// Slice the atlas into per-variant patterns, in catalog order.
    pub fn from_atlas(cards: &[Card], atlas: &Atlas) -> Self {
        let mut table = Self::default();
        for card in cards {
            for (_, upgraded) in card.icons() {
                let Some(image) = atlas.pattern(card.index, upgraded) else {
                    continue;
                };
                let pattern = CardPattern {
                    card_index: card.index,
                    upgraded,
                    template: PreparedTemplate::new(image),
                };
                table.insert(GroupKey::of(card, upgraded), pattern);
            }
        }
        info!(
            "Built card patterns for {} group(s), {} pattern(s)",
            table.groups.len(),
            table.pattern_count()
        );
        table
    }

    pub fn insert(&mut self, group: GroupKey, pattern: CardPattern) {
        if !group.upgraded {
            self.groups
                .entry(group.as_upgraded())
                .or_default()
                .push(pattern.clone());
        }
        self.groups.entry(group).or_default().push(pattern);
    }

    /// Patterns filed under `group`, empty if none
    pub fn group(&self, group: &GroupKey) -> &[CardPattern] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct card variants (a base pattern filed twice counts once)
    pub fn pattern_count(&self) -> usize {
        self.groups
            .iter()
            .map(|(key, patterns)| {
                if key.upgraded {
                    patterns.iter().filter(|p| p.upgraded).count()
                } else {
                    patterns.len()
                }
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasBuilder;
    use card_assets::AssetError;
    use card_catalog::IconRef;
    use image::RgbImage;

    struct FlatFetcher;

    impl ImageFetcher for FlatFetcher {
        fn resolve(&self, icon: &IconRef) -> Result<RgbImage, AssetError> {
            if icon.url.starts_with("missing") {
                return Err(AssetError::Missing(icon.url.clone()));
            }
            let v = icon.url.len() as u8 * 10;
            Ok(RgbImage::from_fn(128, 128, |x, y| image::Rgb([v, x as u8, y as u8])))
        }
    }

    fn card(index: usize, rarity: &str, base: Option<&str>, upgraded: Option<&str>) -> Card {
        Card {
            index,
            id: index as u32,
            name: None,
            rarity: rarity.to_string(),
            attribute: "Smile".to_string(),
            icon: base.map(IconRef::new),
            icon_upgraded: upgraded.map(IconRef::new),
        }
    }

    #[test]
    fn test_group_key_is_deterministic() {
        let c = card(0, "UR", None, None);
        assert_eq!(GroupKey::of(&c, true), GroupKey::new("UR", "Smile", true));
        assert_eq!(GroupKey::of(&c, false).as_upgraded(), GroupKey::of(&c, true));
        assert_eq!(GroupKey::of(&c, false).to_string(), "UR-Smile0");
    }

    #[test]
    fn test_one_badge_per_group_first_wins() {
        let config = VisionConfig::default();
        let cards = vec![
            card(0, "R", Some("a"), Some("aa")),
            card(1, "R", Some("bbb"), Some("bbbb")),
            card(2, "SR", Some("c"), None),
        ];
        let badges = RarityPatternBuilder::new(&config)
            .build(&cards, &FlatFetcher)
            .unwrap();
        let groups: Vec<String> = badges.iter().map(|b| b.group.to_string()).collect();
        assert_eq!(groups, vec!["R-Smile0", "R-Smile1", "SR-Smile0"]);
        // Card 0's base icon (url length 1) supplied the R-Smile0 badge
        assert_eq!(badges[0].template.image().get_pixel(0, 0)[0], 10);
        assert_eq!(badges[0].template.width(), 22);
    }

    #[test]
    fn test_missing_icon_leaves_group_open() {
        let config = VisionConfig::default();
        let cards = vec![
            card(0, "R", Some("missing-a"), None),
            card(1, "R", Some("bb"), None),
        ];
        let badges = RarityPatternBuilder::new(&config)
            .build(&cards, &FlatFetcher)
            .unwrap();
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].template.image().get_pixel(0, 0)[0], 20);
    }

    #[test]
    fn test_base_patterns_filed_under_upgraded_group() {
        let config = VisionConfig::default();
        let cards = vec![
            card(0, "R", Some("a"), Some("aa")),
            card(1, "R", Some("bbb"), None),
        ];
        let atlas = AtlasBuilder::new(&config).build(&cards, &FlatFetcher).unwrap();
        let table = CardPatternTable::from_atlas(&cards, &atlas);

        let base: Vec<(usize, bool)> = table
            .group(&GroupKey::new("R", "Smile", false))
            .iter()
            .map(|p| (p.card_index, p.upgraded))
            .collect();
        let upgraded: Vec<(usize, bool)> = table
            .group(&GroupKey::new("R", "Smile", true))
            .iter()
            .map(|p| (p.card_index, p.upgraded))
            .collect();

        assert_eq!(base, vec![(0, false), (1, false)]);
        assert_eq!(upgraded, vec![(0, false), (0, true), (1, false)]);
        assert_eq!(table.pattern_count(), 3);
        assert!(table.group(&GroupKey::new("UR", "Smile", false)).is_empty());
    }
}
