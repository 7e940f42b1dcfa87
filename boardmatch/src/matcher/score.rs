//! Coarse-stride overlap scoring and peak extraction.

use image::GrayImage;

use crate::core::{CancelFlag, MatchOptions};
use crate::geometry::raster::FOREGROUND;

/// Grid step for a template searched over a raster.
pub fn stride(template: (u32, u32), search: (u32, u32), options: &MatchOptions) -> u32 {
    let (tw, th) = template;
    let (sw, sh) = search;
    let by_template = tw.min(th) / options.stride_template_divisor.max(1);
    let by_search = sw.min(sh) / options.stride_search_divisor.max(1);
    by_template.max(by_search).max(1)
}

/// Overlap scores on the stride grid. Cell `(col, row)` holds the score of
/// the template with its top-left corner at `(col * stride, row * stride)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMap {
    pub stride: u32,
    pub cols: u32,
    pub rows: u32,
    values: Vec<f64>,
}

impl ScoreMap {
    /// Fraction of the template's foreground that lands on search foreground.
    ///
    /// Only placements with `x + tw < sw` and `y + th < sh` are scored; the
    /// rest of the grid stays 0.
    pub fn compute(template: &GrayImage, search: &GrayImage, stride: u32) -> Self {
        let (tw, th) = template.dimensions();
        let (sw, sh) = search.dimensions();
        let stride = stride.max(1);
        let fg: Vec<(u32, u32)> = template
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == FOREGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();

        let cols = if sw > tw { (sw - tw - 1) / stride + 1 } else { 0 };
        let rows = if sh > th { (sh - th - 1) / stride + 1 } else { 0 };
        let mut values = vec![0.0; (cols * rows) as usize];
        if fg.is_empty() {
            return Self { stride, cols, rows, values };
        }
        let total = fg.len() as f64;
        for row in 0..rows {
            for col in 0..cols {
                let (ox, oy) = (col * stride, row * stride);
                let hits = fg
                    .iter()
                    .filter(|(x, y)| search.get_pixel(ox + x, oy + y).0[0] == FOREGROUND)
                    .count();
                values[(row * cols + col) as usize] = hits as f64 / total;
            }
        }
        Self { stride, cols, rows, values }
    }

    pub fn get(&self, col: u32, row: u32) -> f64 {
        if col >= self.cols || row >= self.rows {
            return 0.0;
        }
        self.values[(row * self.cols + col) as usize]
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Consumes the map into its peaks above `threshold`, best first.
    pub fn peaks(self, threshold: f64, cancel: Option<CancelFlag>) -> Peaks {
        Peaks {
            map: self,
            threshold,
            cancel,
        }
    }

    /// Zeroes every cell within `radius` pixels of `(x, y)`.
    fn suppress(&mut self, x: u32, y: u32, radius: u32) {
        let s = self.stride as i64;
        let r = radius as i64;
        let (cx, cy) = (x as i64, y as i64);
        let reach = r / s + 1;
        let (col0, row0) = (cx / s, cy / s);
        for row in (row0 - reach).max(0)..=(row0 + reach).min(self.rows as i64 - 1) {
            for col in (col0 - reach).max(0)..=(col0 + reach).min(self.cols as i64 - 1) {
                let (dx, dy) = (col * s - cx, row * s - cy);
                if dx * dx + dy * dy <= r * r {
                    self.values[(row * self.cols as i64 + col) as usize] = 0.0;
                }
            }
        }
    }
}

/// A candidate placement in search-raster pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub x: u32,
    pub y: u32,
    pub score: f64,
}

/// Lazy non-maximum suppression: each step takes the global maximum and
/// blanks a disk of radius `stride` around it.
#[derive(Debug)]
pub struct Peaks {
    map: ScoreMap,
    threshold: f64,
    cancel: Option<CancelFlag>,
}

impl Iterator for Peaks {
    type Item = Peak;

    fn next(&mut self) -> Option<Peak> {
        if self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false) {
            return None;
        }
        let (index, score) = self
            .map
            .values
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (i, v)| if v > best.1 { (i, v) } else { best });
        if score <= self.threshold {
            return None;
        }
        let cols = self.map.cols as usize;
        let stride = self.map.stride;
        let x = (index % cols) as u32 * stride;
        let y = (index / cols) as u32 * stride;
        self.map.suppress(x, y, stride);
        Some(Peak { x, y, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn block(w: u32, h: u32, x0: u32, y0: u32, bw: u32, bh: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            if x >= x0 && x < x0 + bw && y >= y0 && y < y0 + bh {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        })
    }

    #[test]
    fn test_stride() {
        let options = MatchOptions::default();
        assert_eq!(stride((96, 144), (1400, 2800), &options), 10);
        assert_eq!(stride((10, 10), (100, 100), &options), 1);
    }

    #[test]
    fn test_exact_overlap_scores_one() {
        let template = block(6, 6, 1, 1, 4, 4);
        let search = block(30, 30, 11, 7, 4, 4);
        let map = ScoreMap::compute(&template, &search, 1);
        assert_eq!(map.cols, 24);
        assert_eq!(map.get(10, 6), 1.0);
        assert_eq!(map.get(11, 6), 0.75);
        assert_eq!(map.get(0, 0), 0.0);
    }

    #[test]
    fn test_peaks_are_ordered_and_suppressed() {
        let template = block(6, 6, 1, 1, 4, 4);
        let mut search = block(40, 20, 3, 3, 4, 4);
        for y in 3..5 {
            for x in 25..29 {
                search.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
        let map = ScoreMap::compute(&template, &search, 1);
        let peaks: Vec<Peak> = map.peaks(0.4, None).collect();
        assert_eq!((peaks[0].x, peaks[0].y, peaks[0].score), (2, 2, 1.0));
        assert!(peaks.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(peaks.iter().all(|p| p.score > 0.4));
        // the direct neighbours of the best peak were suppressed
        assert!(!peaks.iter().any(|p| (p.x, p.y) == (3, 2) || (p.x, p.y) == (2, 3)));
    }

    #[test]
    fn test_cancelled_peaks_stop() {
        let template = block(6, 6, 1, 1, 4, 4);
        let search = block(30, 30, 11, 7, 4, 4);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let map = ScoreMap::compute(&template, &search, 1);
        assert_eq!(map.peaks(0.1, Some(cancel)).count(), 0);
    }
}
