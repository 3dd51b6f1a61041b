use crate::cell_matcher::CellMatch;
use crate::geometry::PixelRange;
use card_assets::ScreenRegion;
use card_catalog::Card;
use serde::{Deserialize, Serialize};

/// One identified icon, positioned relative to the whole screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub card: Card,
    pub upgraded: bool,
    pub relative_x: f64,
    pub relative_y: f64,
    pub relative_w: f64,
    pub relative_h: f64,
}

impl MatchRecord {
    /// Bounding box as a normalized region
    pub fn region(&self) -> ScreenRegion {
        ScreenRegion {
            x: self.relative_x,
            y: self.relative_y,
            width: self.relative_w,
            height: self.relative_h,
        }
    }
}

/// A cell match placed within its (scaled) row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMatch {
    pub card_index: usize,
    pub upgraded: bool,
    /// Fraction of the row width
    pub relative_x: f64,
    /// Fraction of the row height
    pub relative_y: f64,
}

impl RowMatch {
    /// Translate a cell match by the cell's position and normalize by the row size.
    pub fn from_cell(m: &CellMatch, cell: PixelRange, row_width: u32, row_height: u32) -> Self {
        Self {
            card_index: m.card_index,
            upgraded: m.upgraded,
            relative_x: (m.icon_x + cell.start as i64) as f64 / row_width as f64,
            relative_y: m.icon_y as f64 / row_height as f64,
        }
    }
}

/// Converts row-relative matches into screenshot-relative records.
pub struct ResultAssembler<'a> {
    cards: &'a [Card],
    screen_height: u32,
    relative_w: f64,
    relative_h: f64,
}

impl<'a> ResultAssembler<'a> {
    /// Record sizes are the reference icon over the ratio-scaled screenshot,
    /// the same for every record of one screenshot.
    pub fn new(
        cards: &'a [Card],
        screen_width: u32,
        screen_height: u32,
        scale_ratio: f64,
        icon_size: u32,
    ) -> Self {
        let icon = icon_size as f64;
        Self {
            cards,
            screen_height,
            relative_w: icon / (screen_width as f64 * scale_ratio),
            relative_h: icon / (screen_height as f64 * scale_ratio),
        }
    }

    /// Records for one row window. Rows span the full width, so `relative_x`
    /// carries over unchanged; `relative_y` is mapped through the row's extent.
    pub fn assemble_row(&self, row: PixelRange, matches: &[RowMatch]) -> Vec<MatchRecord> {
        let h = self.screen_height as f64;
        let row_y = row.start as f64 / h;
        let row_h = row.len() as f64 / h;

        matches
            .iter()
            .filter_map(|m| {
                let card = self.cards.get(m.card_index)?;
                Some(MatchRecord {
                    card: card.clone(),
                    upgraded: m.upgraded,
                    relative_x: m.relative_x,
                    relative_y: row_y + row_h * m.relative_y,
                    relative_w: self.relative_w,
                    relative_h: self.relative_h,
                })
            })
            .collect()
    }
}
