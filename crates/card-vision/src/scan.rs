use crate::assemble::{MatchRecord, ResultAssembler, RowMatch};
use crate::atlas::AtlasBuilder;
use crate::cell_matcher::CellMatcher;
use crate::config::VisionConfig;
use crate::geometry::{scale_image, PixelRange};
use crate::patterns::{BadgePattern, CardPatternTable, RarityPatternBuilder};
use crate::segment::{RowSplit, ScreenGeometrySegmenter};
use anyhow::Result;
use card_assets::{AtlasCache, ImageFetcher};
use card_catalog::Card;
use image::RgbImage;
use tracing::{debug, info};

/// Everything built once per catalog. Read-only afterwards, so it can be
/// shared across concurrent screenshot analyses.
pub struct PatternSet {
    pub cards: Vec<Card>,
    pub badges: Vec<BadgePattern>,
    pub table: CardPatternTable,
}

impl PatternSet {
    /// Load or build the atlas, then slice card patterns and extract badges.
    pub fn build(
        cards: Vec<Card>,
        fetcher: &dyn ImageFetcher,
        cache: &dyn AtlasCache,
        config: &VisionConfig,
    ) -> Result<Self> {
        let atlas = AtlasBuilder::new(config).load_or_build(&cards, fetcher, cache)?;
        let table = CardPatternTable::from_atlas(&cards, &atlas);
        let badges = RarityPatternBuilder::new(config).build(&cards, fetcher)?;
        Ok(Self {
            cards,
            badges,
            table,
        })
    }
}

/// Runs segmentation, cell matching and assembly for screenshots.
pub struct Scanner<'a> {
    config: &'a VisionConfig,
    patterns: &'a PatternSet,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a VisionConfig, patterns: &'a PatternSet) -> Self {
        Self { config, patterns }
    }

    pub fn split_rows(&self, screenshot: &RgbImage) -> RowSplit {
        ScreenGeometrySegmenter::new(self.config).split_rows(screenshot)
    }

    pub fn assembler(&self, screenshot: &RgbImage, split: &RowSplit) -> ResultAssembler<'a> {
        ResultAssembler::new(
            &self.patterns.cards,
            screenshot.width(),
            screenshot.height(),
            split.scale_ratio,
            self.config.icon_size,
        )
    }

    /// Scan one row window. Rows are independent of each other.
    pub fn scan_row(
        &self,
        screenshot: &RgbImage,
        row: PixelRange,
        scale_ratio: f64,
        assembler: &ResultAssembler<'_>,
    ) -> Vec<MatchRecord> {
        if row.is_empty() || row.end > screenshot.height() {
            return Vec::new();
        }
        let strip =
            image::imageops::crop_imm(screenshot, 0, row.start, screenshot.width(), row.len())
                .to_image();
        let scaled = scale_image(&strip, scale_ratio);
        let (rw, rh) = scaled.dimensions();

        let segmenter = ScreenGeometrySegmenter::new(self.config);
        let matcher = CellMatcher::new(self.config, &self.patterns.badges, &self.patterns.table);

        let mut matches = Vec::new();
        for cell in segmenter.split_columns(&scaled) {
            let cell_image =
                image::imageops::crop_imm(&scaled, cell.start, 0, cell.len(), rh).to_image();
            if let Some(m) = matcher.match_cell(&cell_image) {
                matches.push(RowMatch::from_cell(&m, cell, rw, rh));
            }
        }

        debug!("Row {}..{}: {} match(es)", row.start, row.end, matches.len());
        assembler.assemble_row(row, &matches)
    }

    /// Identify every catalog icon in a screenshot, in scan order.
    pub fn scan(&self, screenshot: &RgbImage) -> Vec<MatchRecord> {
        let split = self.split_rows(screenshot);
        let assembler = self.assembler(screenshot, &split);

        let records: Vec<MatchRecord> = split
            .rows
            .iter()
            .flat_map(|&row| self.scan_row(screenshot, row, split.scale_ratio, &assembler))
            .collect();

        info!("Found {} card(s) in {} row(s)", records.len(), split.rows.len());
        records
    }
}
