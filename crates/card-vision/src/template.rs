use crate::geometry::Point;
use image::RgbImage;

/// Template with its zero-mean values pre-computed for NCC.
#[derive(Debug, Clone)]
pub struct PreparedTemplate {
    image: RgbImage,
    /// Per-pixel, per-channel deviation from the channel mean
    centered: Vec<[f64; 3]>,
    /// Sum of squared deviations over all channels
    energy: f64,
}

impl PreparedTemplate {
    pub fn new(image: RgbImage) -> Self {
        let means = channel_means(&image);
        let centered: Vec<[f64; 3]> = image
            .pixels()
            .map(|p| {
                [
                    p[0] as f64 - means[0],
                    p[1] as f64 - means[1],
                    p[2] as f64 - means[2],
                ]
            })
            .collect();
        let energy = centered
            .iter()
            .map(|c| c[0] * c[0] + c[1] * c[1] + c[2] * c[2])
            .sum();
        Self {
            image,
            centered,
            energy,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Whether the template fits inside a `width x height` image
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width() <= width && self.height() <= height
    }
}

/// Correlation score for every placement of a template inside an image.
#[derive(Debug, Clone)]
pub struct ScoreMap {
    width: u32,
    height: u32,
    scores: Vec<f64>,
}

impl ScoreMap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.scores[(y * self.width + x) as usize]
    }

    pub fn max(&self) -> f64 {
        self.scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Placements scoring at or above `threshold`, in row-major scan order.
    pub fn peaks_above(&self, threshold: f64) -> Vec<(Point, f64)> {
        self.scores
            .iter()
            .enumerate()
            .filter(|(_, &s)| s >= threshold)
            .map(|(i, &s)| {
                let i = i as u32;
                (
                    Point {
                        x: i % self.width,
                        y: i / self.width,
                    },
                    s,
                )
            })
            .collect()
    }
}

/// Slide `template` over `image` computing zero-mean normalized cross-correlation
/// (channel means removed separately, sums taken over all three channels).
///
/// Returns `None` when the template does not fit inside the image.
pub fn match_template(image: &RgbImage, template: &PreparedTemplate) -> Option<ScoreMap> {
    if !template.fits(image.width(), image.height()) {
        return None;
    }

    let (tw, th) = (template.width(), template.height());
    let width = image.width() - tw + 1;
    let height = image.height() - th + 1;
    let n = (tw * th) as f64;

    let mut scores = Vec::with_capacity((width * height) as usize);
    for oy in 0..height {
        for ox in 0..width {
            let mut sum = [0.0f64; 3];
            let mut sum_sq = [0.0f64; 3];
            let mut cross = 0.0f64;

            for ty in 0..th {
                for tx in 0..tw {
                    let p = image.get_pixel(ox + tx, oy + ty);
                    let t = &template.centered[(ty * tw + tx) as usize];
                    for c in 0..3 {
                        let v = p[c] as f64;
                        sum[c] += v;
                        sum_sq[c] += v * v;
                        // Template deviations sum to zero, so the window mean drops out here
                        cross += v * t[c];
                    }
                }
            }

            let window_energy: f64 = (0..3).map(|c| sum_sq[c] - sum[c] * sum[c] / n).sum();
            let denom = (window_energy.max(0.0) * template.energy).sqrt();
            let score = if denom < 1e-10 { 0.0 } else { cross / denom };
            scores.push(score);
        }
    }

    Some(ScoreMap {
        width,
        height,
        scores,
    })
}

/// Per-channel mean
fn channel_means(img: &RgbImage) -> [f64; 3] {
    let n = (img.width() * img.height()) as f64;
    if n == 0.0 {
        return [0.0; 3];
    }
    let mut sum = [0.0f64; 3];
    for p in img.pixels() {
        for (acc, &v) in sum.iter_mut().zip(p.0.iter()) {
            *acc += v as f64;
        }
    }
    sum.map(|s| s / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(w: u32, h: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let mut v = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ seed;
            v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
            let v = (v ^ (v >> 16)) as u8;
            image::Rgb([v, v / 2, 255 - v])
        })
    }

    #[test]
    fn test_ncc_identical() {
        let img = textured(48, 48, 0);
        let tmpl = PreparedTemplate::new(img.clone());
        let scores = match_template(&img, &tmpl).unwrap();
        assert_eq!((scores.width(), scores.height()), (1, 1));
        assert!(
            (scores.get(0, 0) - 1.0).abs() < 0.001,
            "Identical images should have NCC ≈ 1.0, got {}",
            scores.get(0, 0)
        );
    }

    #[test]
    fn test_ncc_different() {
        let img1 = RgbImage::from_fn(48, 48, |x, _| image::Rgb([(x * 5) as u8; 3]));
        let img2 = RgbImage::from_fn(48, 48, |_, y| image::Rgb([(y * 5) as u8; 3]));
        let scores = match_template(&img1, &PreparedTemplate::new(img2)).unwrap();
        assert!(
            scores.max() < 0.5,
            "Different images should have low NCC, got {}",
            scores.max()
        );
    }

    #[test]
    fn test_finds_embedded_template() {
        let big = textured(60, 40, 1);
        let tmpl = image::imageops::crop_imm(&big, 17, 9, 20, 12).to_image();
        let scores = match_template(&big, &PreparedTemplate::new(tmpl)).unwrap();
        let peaks = scores.peaks_above(0.999);
        assert_eq!(peaks.first().map(|(p, _)| *p), Some(Point { x: 17, y: 9 }));
    }

    #[test]
    fn test_brightness_invariant() {
        let img = textured(30, 30, 2);
        let brighter = RgbImage::from_fn(30, 30, |x, y| {
            let p = img.get_pixel(x, y);
            image::Rgb([p[0] / 2 + 40, p[1] / 2 + 40, p[2] / 2 + 40])
        });
        let scores = match_template(&brighter, &PreparedTemplate::new(img)).unwrap();
        assert!(scores.get(0, 0) > 0.95);
    }

    #[test]
    fn test_uniform_scores_zero() {
        let flat = RgbImage::from_pixel(30, 30, image::Rgb([128, 128, 128]));
        let tmpl = PreparedTemplate::new(textured(10, 10, 3));
        let scores = match_template(&flat, &tmpl).unwrap();
        assert_eq!(scores.max(), 0.0);
    }

    #[test]
    fn test_oversized_template_is_none() {
        let small = textured(10, 10, 4);
        let tmpl = PreparedTemplate::new(textured(12, 8, 4));
        assert!(match_template(&small, &tmpl).is_none());
    }
}
