use crate::config::VisionConfig;
use crate::geometry::PixelRange;
use image::{GrayImage, RgbImage};
use tracing::debug;

/// Result of splitting a screenshot into icon rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSplit {
    /// Factor bringing this screenshot's icons to reference size
    pub scale_ratio: f64,
    /// Row windows in screenshot pixels, top to bottom
    pub rows: Vec<PixelRange>,
}

/// Splits screenshots into rows and rows into icon-sized cells, without any
/// prior knowledge of the layout.
pub struct ScreenGeometrySegmenter<'a> {
    config: &'a VisionConfig,
}

impl<'a> ScreenGeometrySegmenter<'a> {
    pub fn new(config: &'a VisionConfig) -> Self {
        Self { config }
    }

    /// Find icon rows between bright separator bands.
    ///
    /// A separator row holds a bright run longer than half the width. Gaps
    /// between consecutive bands taller than `min_row_gap` become row windows,
    /// which span from the last row of the upper band to the first row of the
    /// lower one (exclusive). The scale ratio is `icon_size / median(gap)`.
    pub fn split_rows(&self, image: &RgbImage) -> RowSplit {
        let bw = binarize(image, self.config.binarize_threshold);
        let (w, h) = bw.dimensions();
        let half = w / 2;

        let separators: Vec<bool> = (0..h).map(|y| longest_bright_run(&bw, y) > half).collect();
        let bands = find_runs(&separators);

        let mut rows = Vec::new();
        let mut gaps = Vec::new();
        for pair in bands.windows(2) {
            let (upper, lower) = (pair[0], pair[1]);
            let gap = lower.start - upper.end;
            if gap > self.config.min_row_gap {
                rows.push(PixelRange::new(upper.end - 1, lower.start));
                gaps.push(gap);
            }
        }

        let scale_ratio = match median(&gaps) {
            Some(m) => self.config.icon_size as f64 / m,
            None => 1.0,
        };

        debug!(
            "Row split: {} separator band(s), {} row(s), scale ratio {:.3}",
            bands.len(),
            rows.len(),
            scale_ratio
        );

        RowSplit { scale_ratio, rows }
    }

    /// Propose icon-wide cell windows next to full-height separator columns.
    ///
    /// Each separator group yields a window right after it and one right before
    /// it. Windows leaving the row are dropped, and windows whose ends are both
    /// within `dedup_tolerance` of an accepted one are duplicates.
    pub fn split_columns(&self, row: &RgbImage) -> Vec<PixelRange> {
        let bw = binarize(row, self.config.binarize_threshold);
        let (w, h) = bw.dimensions();
        if h == 0 {
            return Vec::new();
        }

        let separators: Vec<bool> = (0..w)
            .map(|x| (0..h).all(|y| bw.get_pixel(x, y)[0] == 255))
            .collect();
        let groups = find_runs(&separators);

        let icon = self.config.icon_size;
        let after = groups
            .iter()
            .map(|g| (Some(g.end - 1), (g.end - 1).checked_add(icon)));
        let before = groups
            .iter()
            .map(|g| (g.start.checked_sub(icon), Some(g.start)));

        let mut cells: Vec<PixelRange> = Vec::new();
        for candidate in after.chain(before) {
            let (Some(start), Some(end)) = candidate else {
                continue;
            };
            if end > w {
                continue;
            }
            let cell = PixelRange::new(start, end);
            if cells.iter().any(|c| c.near(&cell, self.config.dedup_tolerance)) {
                continue;
            }
            cells.push(cell);
        }

        debug!(
            "Column split: {} separator group(s), {} cell(s)",
            groups.len(),
            cells.len()
        );
        cells
    }
}

/// Luma above `threshold` becomes 255, everything else 0.
fn binarize(image: &RgbImage, threshold: u8) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            image::Luma([255u8])
        } else {
            image::Luma([0u8])
        }
    })
}

fn longest_bright_run(bw: &GrayImage, y: u32) -> u32 {
    let mut best = 0;
    let mut current = 0;
    for x in 0..bw.width() {
        if bw.get_pixel(x, y)[0] == 255 {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

/// Maximal runs of `true`, as half-open ranges.
fn find_runs(flags: &[bool]) -> Vec<PixelRange> {
    let mut runs = Vec::new();
    let mut start = None;

    for (i, &flag) in flags.iter().enumerate() {
        match (flag, start) {
            (true, None) => start = Some(i as u32),
            (false, Some(s)) => {
                runs.push(PixelRange::new(s, i as u32));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(PixelRange::new(s, flags.len() as u32));
    }

    runs
}

fn median(values: &[u32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}
