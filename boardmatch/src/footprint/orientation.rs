//! The eight placement orientations and the per-orientation footprint data.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::geometry::raster::{
    binarize, contour_mask, external_contours, raster_moments, rotate_expand, BACKGROUND, DARK_THRESHOLD,
    FOREGROUND,
};
use crate::geometry::Contour;

/// Counter-clockwise rotation in 45 degree steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    R0,
    R45,
    R90,
    R135,
    R180,
    R225,
    R270,
    R315,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::R0,
        Orientation::R45,
        Orientation::R90,
        Orientation::R135,
        Orientation::R180,
        Orientation::R225,
        Orientation::R270,
        Orientation::R315,
    ];

    pub fn degrees(self) -> u16 {
        self as u16 * 45
    }

    pub fn from_degrees(degrees: u16) -> Option<Self> {
        if degrees % 45 != 0 {
            return None;
        }
        Self::ALL.get((degrees / 45) as usize).copied()
    }
}

impl From<Orientation> for u16 {
    fn from(o: Orientation) -> u16 {
        o.degrees()
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Orientation::from_degrees(degrees).ok_or_else(|| format!("invalid orientation: {}", degrees))
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// The footprint as it looks at one orientation.
#[derive(Debug, Clone)]
pub struct OrientedFootprint {
    pub orientation: Orientation,
    /// Binary template, pads as foreground.
    pub alpha: GrayImage,
    /// Pad contours of `alpha` in template coordinates.
    pub contours: Vec<Contour>,
    /// Rotated contour index to original contour index.
    pub to_original: Vec<Option<usize>>,
    /// Rotated contour index to pin label.
    pub labels: Vec<Option<String>>,
    /// Filled area of each rotated contour.
    pub areas: Vec<u64>,
    /// `contour index + 1` per template pixel, 0 outside every pad.
    label_grid: Vec<u32>,
}

impl OrientedFootprint {
    /// Rotates `alpha` and maps each rotated pad back to its original.
    ///
    /// Each original pad is rotated in isolation; the rotated pad containing
    /// the image of its centroid is its counterpart.
    pub fn build(
        orientation: Orientation,
        alpha: &GrayImage,
        original: &[Contour],
        original_labels: &[Option<String>],
    ) -> Self {
        let rotated = if orientation == Orientation::R0 {
            alpha.clone()
        } else {
            binarize(&rotate_expand(alpha, orientation.degrees() as f64), DARK_THRESHOLD)
        };
        let contours: Vec<Contour> = external_contours(&rotated)
            .into_iter()
            .filter(|c| !c.is_degenerate())
            .collect();

        let (w, h) = rotated.dimensions();
        let mut label_grid = vec![0u32; (w * h) as usize];
        let mut areas = vec![0u64; contours.len()];
        for (i, contour) in contours.iter().enumerate() {
            let mask = contour_mask(contour, w, h);
            for (x, y, p) in mask.enumerate_pixels() {
                let slot = &mut label_grid[(y * w + x) as usize];
                if p.0[0] == FOREGROUND && *slot == 0 {
                    *slot = i as u32 + 1;
                    areas[i] += 1;
                }
            }
        }

        let mut oriented = Self {
            orientation,
            alpha: rotated,
            to_original: vec![None; contours.len()],
            labels: vec![None; contours.len()],
            contours,
            areas,
            label_grid,
        };

        if orientation == Orientation::R0 {
            for i in 0..oriented.contours.len().min(original.len()) {
                oriented.to_original[i] = Some(i);
            }
        } else {
            let (ow, oh) = alpha.dimensions();
            for (j, contour) in original.iter().enumerate() {
                let pad = binarize(
                    &rotate_expand(&contour_mask(contour, ow, oh), orientation.degrees() as f64),
                    DARK_THRESHOLD,
                );
                match oriented.counterpart(&pad) {
                    Some(i) if oriented.to_original[i].is_none() => oriented.to_original[i] = Some(j),
                    Some(i) => tracing::warn!(
                        "Pads {} and {:?} both rotate onto contour {} at {}",
                        j,
                        oriented.to_original[i],
                        i,
                        orientation
                    ),
                    None => tracing::warn!("Pad {} vanished when rotated to {}", j, orientation),
                }
            }
        }

        for i in 0..oriented.contours.len() {
            oriented.labels[i] = oriented.to_original[i]
                .and_then(|j| original_labels.get(j).cloned().flatten());
        }
        oriented
    }

    fn counterpart(&self, rotated_pad: &GrayImage) -> Option<usize> {
        if let Some(c) = raster_moments(rotated_pad).centroid() {
            if let Some(i) = self.contour_at(c.x, c.y) {
                return Some(i);
            }
        }
        let mut votes: BTreeMap<usize, u64> = BTreeMap::new();
        for (x, y, p) in rotated_pad.enumerate_pixels() {
            if p.0[0] != BACKGROUND {
                if let Some(i) = self.contour_at(x as i32, y as i32) {
                    *votes.entry(i).or_default() += 1;
                }
            }
        }
        votes.into_iter().max_by_key(|&(_, n)| n).map(|(i, _)| i)
    }

    pub fn width(&self) -> u32 {
        self.alpha.width()
    }

    pub fn height(&self) -> u32 {
        self.alpha.height()
    }

    /// The rotated pad covering template pixel `(x, y)`.
    pub fn contour_at(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return None;
        }
        match self.label_grid[(y as u32 * self.width() + x as u32) as usize] {
            0 => None,
            l => Some(l as usize - 1),
        }
    }

    pub fn rotated_index_of(&self, original: usize) -> Option<usize> {
        self.to_original.iter().position(|&o| o == Some(original))
    }

    pub fn rotated_index_of_pin(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.as_deref() == Some(label))
    }

    /// Filled mask of one rotated pad at template size.
    pub fn pad_mask(&self, index: usize) -> GrayImage {
        let target = index as u32 + 1;
        let w = self.width();
        GrayImage::from_fn(w, self.height(), |x, y| {
            if self.label_grid[(y * w + x) as usize] == target {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }

    /// The template with the given rotated pads blanked out.
    pub fn template_without(&self, erased: &[usize]) -> GrayImage {
        let mut out = self.alpha.clone();
        if erased.is_empty() {
            return out;
        }
        let w = self.width();
        for (x, y, p) in out.enumerate_pixels_mut() {
            let l = self.label_grid[(y * w + x) as usize];
            if l != 0 && erased.contains(&(l as usize - 1)) {
                p.0[0] = BACKGROUND;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::raster::external_contours;

    fn two_pads() -> GrayImage {
        // 30 x 12, a small pad on the left and a wide one on the right
        GrayImage::from_fn(30, 12, |x, y| {
            let left = (2..6).contains(&x) && (3..9).contains(&y);
            let right = (14..28).contains(&x) && (3..9).contains(&y);
            if left || right {
                Luma([FOREGROUND])
            } else {
                Luma([BACKGROUND])
            }
        })
    }

    #[test]
    fn test_degrees_round_trip() {
        for o in Orientation::ALL {
            assert_eq!(Orientation::from_degrees(o.degrees()), Some(o));
        }
        assert_eq!(Orientation::from_degrees(30), None);
        assert_eq!(Orientation::from_degrees(360), None);
    }

    #[test]
    fn test_rotated_pads_map_back() {
        let alpha = two_pads();
        let original = external_contours(&alpha);
        let labels = vec![Some("A".to_string()), Some("B".to_string())];
        for o in Orientation::ALL {
            let oriented = OrientedFootprint::build(o, &alpha, &original, &labels);
            assert_eq!(oriented.contours.len(), 2, "at {}", o);
            let small = oriented.rotated_index_of_pin("A").expect("A present");
            let large = oriented.rotated_index_of_pin("B").expect("B present");
            assert!(oriented.areas[small] < oriented.areas[large], "at {}", o);
        }
    }

    #[test]
    fn test_template_without() {
        let alpha = two_pads();
        let original = external_contours(&alpha);
        let oriented = OrientedFootprint::build(Orientation::R90, &alpha, &original, &[None, None]);
        let erased = oriented.template_without(&[0]);
        let remaining: u64 = erased.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64;
        assert_eq!(remaining, oriented.areas[1]);
    }
}
