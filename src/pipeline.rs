use crate::config::ScannerConfig;
use anyhow::{Context, Result};
use card_assets::{AtlasCache, FileAtlasCache, IconStore, ImageFetcher};
use card_catalog::{Catalog, CatalogProvider};
use card_vision::{MatchRecord, PatternSet, Scanner, VisionConfig};
use image::RgbImage;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Catalog → patterns, built once; then any number of screenshots.
///
/// Holds only read-only tables after construction, so a single instance can
/// serve analyses from several threads.
pub struct Recognizer {
    vision: VisionConfig,
    parallel: bool,
    patterns: PatternSet,
}

impl Recognizer {
    /// Build from the paths in `config`, using the directory icon store and
    /// the file atlas cache.
    ///
    /// The store has no download source here, so `icon_dir` must already hold
    /// the icons; cards whose icons are absent are never reported. Use
    /// [`Recognizer::build`] with an [`IconStore::with_source`] store to fetch
    /// on miss.
    pub fn from_config(config: &ScannerConfig) -> Result<Self> {
        let catalog = Catalog::load(&config.catalog_path)?;
        let icons = IconStore::new(&config.icon_dir);
        let missing = icons.missing_icons(&catalog.cards);
        if !missing.is_empty() {
            info!(
                "{} icon(s) not found in {}, those card variants will not be recognized",
                missing.len(),
                config.icon_dir.display()
            );
        }
        let cache = FileAtlasCache::new(&config.atlas_path);
        Self::build(&catalog, &icons, &cache, config)
    }

    /// Build with explicit collaborators.
    pub fn build(
        catalog: &dyn CatalogProvider,
        fetcher: &dyn ImageFetcher,
        cache: &dyn AtlasCache,
        config: &ScannerConfig,
    ) -> Result<Self> {
        let start = Instant::now();
        config.vision.validate()?;

        let cards = catalog.get_catalog()?;
        debug!("{:.3}s elapsed after catalog", start.elapsed().as_secs_f64());

        let patterns = PatternSet::build(cards, fetcher, cache, &config.vision)?;
        debug!("{:.3}s elapsed after patterns", start.elapsed().as_secs_f64());

        info!(
            "Recognizer ready: {} cards, {} badge pattern(s), {} card pattern(s)",
            patterns.cards.len(),
            patterns.badges.len(),
            patterns.table.pattern_count()
        );

        Ok(Self {
            vision: config.vision.clone(),
            parallel: config.parallel,
            patterns,
        })
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Identify every catalog icon in a decoded screenshot, in scan order.
    pub fn analyze(&self, screenshot: &RgbImage) -> Vec<MatchRecord> {
        let start = Instant::now();
        let scanner = Scanner::new(&self.vision, &self.patterns);

        if !self.parallel {
            return scanner.scan(screenshot);
        }

        let split = scanner.split_rows(screenshot);
        debug!("{:.3}s elapsed after row split", start.elapsed().as_secs_f64());
        let assembler = scanner.assembler(screenshot, &split);

        // Indexed collect keeps row order, so output matches the sequential scan
        let per_row: Vec<Vec<MatchRecord>> = split
            .rows
            .par_iter()
            .map(|&row| scanner.scan_row(screenshot, row, split.scale_ratio, &assembler))
            .collect();
        let records: Vec<MatchRecord> = per_row.into_iter().flatten().collect();

        info!(
            "Found {} card(s) in {} row(s) in {:.3}s",
            records.len(),
            split.rows.len(),
            start.elapsed().as_secs_f64()
        );
        records
    }

    /// Decode a screenshot file and analyze it.
    pub fn analyze_path(&self, path: &Path) -> Result<Vec<MatchRecord>> {
        let screenshot = image::open(path)
            .with_context(|| format!("Failed to open screenshot {}", path.display()))?
            .to_rgb8();
        debug!(
            "Screenshot {}: {}x{}",
            path.display(),
            screenshot.width(),
            screenshot.height()
        );
        Ok(self.analyze(&screenshot))
    }
}

/// Render records as the pretty-printed JSON array written to stdout.
pub fn records_to_json(records: &[MatchRecord]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize match records")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn noise_icon(seed: u32, badge_seed: u32) -> RgbImage {
        RgbImage::from_fn(128, 128, |x, y| {
            let s = if x < 26 && y < 26 { badge_seed } else { seed };
            let mut v = x.wrapping_mul(374_761_393)
                ^ y.wrapping_mul(668_265_263)
                ^ s.wrapping_mul(2_246_822_519);
            v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
            v ^= v >> 16;
            Rgb([(v % 200) as u8, ((v >> 8) % 200) as u8, ((v >> 16) % 200) as u8])
        })
    }

    /// Two icon rows (y 10..138 and 148..276) framed by white bands,
    /// white separators at x 0..4 and 132..136.
    fn two_row_screen(icons: &[RgbImage; 4]) -> RgbImage {
        let mut img = RgbImage::from_fn(420, 286, |x, y| {
            let band = y < 10 || (138..148).contains(&y) || y >= 276;
            let separator = x < 4 || (132..136).contains(&x) || (264..268).contains(&x);
            if band || separator {
                WHITE
            } else {
                Rgb([60, 60, 60])
            }
        });
        image::imageops::replace(&mut img, &icons[0], 4, 10);
        image::imageops::replace(&mut img, &icons[1], 136, 10);
        image::imageops::replace(&mut img, &icons[2], 4, 148);
        image::imageops::replace(&mut img, &icons[3], 136, 148);
        img
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: ScannerConfig,
        icons: [RgbImage; 4],
        screenshot_path: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let icon_dir = dir.path().join("icons");
        std::fs::create_dir_all(&icon_dir).unwrap();

        let icons = [
            noise_icon(101, 8),
            noise_icon(102, 8),
            noise_icon(103, 8),
            noise_icon(104, 8),
        ];
        let mut records = Vec::new();
        for (i, icon) in icons.iter().enumerate() {
            let file = format!("{}.png", 2000 + i);
            icon.save(icon_dir.join(&file)).unwrap();
            records.push(serde_json::json!({
                "id": 2000 + i,
                "name": format!("Card {}", i),
                "rarity": "UR",
                "attribute": "Cool",
                "round_card_image": format!("//assets.example.net/cards/{}", file),
                "round_card_idolized_image": null,
            }));
        }
        let catalog_path = dir.path().join("cards.json");
        std::fs::write(&catalog_path, serde_json::to_string(&records).unwrap()).unwrap();

        let screenshot_path = dir.path().join("screen.png");
        two_row_screen(&icons).save(&screenshot_path).unwrap();

        let config = ScannerConfig {
            catalog_path,
            icon_dir,
            atlas_path: dir.path().join("cache").join("all_patterns.png"),
            parallel: true,
            vision: VisionConfig::default(),
        };
        Fixture {
            _dir: dir,
            config,
            icons,
            screenshot_path,
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let f = fixture();
        let parallel = Recognizer::from_config(&f.config).unwrap();
        let sequential = Recognizer::from_config(&ScannerConfig {
            parallel: false,
            ..f.config.clone()
        })
        .unwrap();

        let screen = two_row_screen(&f.icons);
        let a = parallel.analyze(&screen);
        let b = sequential.analyze(&screen);

        let ids: Vec<u32> = a.iter().map(|r| r.card.id).collect();
        assert_eq!(ids, vec![2000, 2001, 2002, 2003]);
        assert_eq!(a, b);
        assert!(a[2].relative_y > a[0].relative_y);
    }

    #[test]
    fn test_atlas_written_to_cache() {
        let f = fixture();
        Recognizer::from_config(&f.config).unwrap();
        assert!(f.config.atlas_path.exists());
        assert!(f.config.atlas_path.with_extension("json").exists());

        // Second instance reuses the cached atlas
        let again = Recognizer::from_config(&f.config).unwrap();
        assert_eq!(again.patterns().table.pattern_count(), 4);
    }

    #[test]
    fn test_analyze_path_and_json() {
        let f = fixture();
        let recognizer = Recognizer::from_config(&f.config).unwrap();
        let records = recognizer.analyze_path(&f.screenshot_path).unwrap();
        assert_eq!(records.len(), 4);

        let json = records_to_json(&records).unwrap();
        let parsed: Vec<MatchRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);
        assert!(json.contains("http://assets.example.net/cards/2000.png"));
    }

    #[test]
    fn test_missing_icon_only_loses_that_card() {
        let f = fixture();
        std::fs::remove_file(f.config.icon_dir.join("2001.png")).unwrap();
        let catalog = Catalog::load(&f.config.catalog_path).unwrap();
        let missing = IconStore::new(&f.config.icon_dir)
            .missing_icons(&catalog.cards);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].file_name(), "2001.png");

        let recognizer = Recognizer::from_config(&f.config).unwrap();
        let records = recognizer.analyze(&two_row_screen(&f.icons));
        let ids: Vec<u32> = records.iter().map(|r| r.card.id).collect();
        assert_eq!(ids, vec![2000, 2002, 2003]);
    }

    #[test]
    fn test_blank_screenshot_is_empty() {
        let f = fixture();
        let recognizer = Recognizer::from_config(&f.config).unwrap();
        let blank = RgbImage::from_pixel(420, 286, Rgb([30, 30, 30]));
        assert!(recognizer.analyze(&blank).is_empty());
    }

    #[test]
    fn test_missing_screenshot_errors() {
        let f = fixture();
        let recognizer = Recognizer::from_config(&f.config).unwrap();
        assert!(recognizer.analyze_path(Path::new("/nonexistent/screen.png")).is_err());
    }

    #[test]
    fn test_recognizer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Recognizer>();
    }
}
