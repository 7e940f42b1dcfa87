//! Pad extraction from a solder-mask raster.

use image::GrayImage;

use crate::geometry::raster::{dark_to_foreground, external_contours, local_contour_mask, raster_moments};
use crate::geometry::{Contour, PixelPoint, Rect};

pub type PadId = usize;

/// A solderable landing on one side of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub id: PadId,
    pub centre: PixelPoint,
    pub contour: Contour,
    pub bounds: Rect,
    /// Filled pixel area.
    pub area: u64,
}

/// The ordered pads of one side, indexed by [`PadId`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PadMap {
    pads: Vec<Pad>,
}

impl PadMap {
    /// Extracts pads from a mask where pads are dark on a light field.
    ///
    /// Ids follow the contour finder's raster-scan order. Zero-area contours
    /// are dropped without leaving a gap in the ids.
    pub fn extract(mask: &GrayImage) -> Self {
        let foreground = dark_to_foreground(mask);
        Self::from_contours(external_contours(&foreground))
    }

    pub fn from_contours(contours: Vec<Contour>) -> Self {
        let mut pads = Vec::with_capacity(contours.len());
        for contour in contours {
            if contour.is_degenerate() {
                tracing::debug!("Skipping zero-area pad contour with {} points", contour.len());
                continue;
            }
            let (mask, bounds) = local_contour_mask(&contour);
            let moments = raster_moments(&mask);
            let Some(local) = moments.centroid() else {
                continue;
            };
            pads.push(Pad {
                id: pads.len(),
                centre: local.offset(bounds.x, bounds.y),
                contour,
                bounds,
                area: moments.m00 as u64,
            });
        }
        Self { pads }
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    pub fn get(&self, id: PadId) -> Option<&Pad> {
        self.pads.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pad> {
        self.pads.iter()
    }

    pub fn centre(&self, id: PadId) -> Option<PixelPoint> {
        self.pads.get(id).map(|p| p.centre)
    }

    /// The pad whose contour contains `p`, edges included.
    pub fn pad_at(&self, p: PixelPoint) -> Option<PadId> {
        self.pads
            .iter()
            .find(|pad| pad.contour.contains(p, true))
            .map(|pad| pad.id)
    }

    /// The pad whose centre is exactly `centre`.
    pub fn pad_with_centre(&self, centre: PixelPoint) -> Option<PadId> {
        self.pads.iter().find(|p| p.centre == centre).map(|p| p.id)
    }

    /// Bounding box of the union of the given pads' rectangles.
    pub fn bounds_of(&self, ids: &[PadId]) -> Option<Rect> {
        ids.iter()
            .filter_map(|&id| self.get(id))
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn mask_with(rects: &[Rect]) -> GrayImage {
        let mut img = GrayImage::from_pixel(40, 30, Luma([255]));
        for r in rects {
            for y in r.y..r.y + r.height {
                for x in r.x..r.x + r.width {
                    img.put_pixel(x as u32, y as u32, Luma([0]));
                }
            }
        }
        img
    }

    #[test]
    fn test_extract_pads_in_scan_order() {
        let mask = mask_with(&[Rect::new(20, 2, 6, 4), Rect::new(2, 10, 4, 4)]);
        let pads = PadMap::extract(&mask);
        assert_eq!(pads.len(), 2);
        // the pad higher up is found first
        assert_eq!(pads.get(0).map(|p| p.bounds), Some(Rect::new(20, 2, 6, 4)));
        assert_eq!(pads.get(1).map(|p| p.area), Some(16));
        assert_eq!(pads.pad_at(PixelPoint::new(3, 11)), Some(1));
        assert_eq!(pads.pad_at(PixelPoint::new(12, 12)), None);
    }

    #[test]
    fn test_degenerate_contours_do_not_leave_gaps() {
        // a one-pixel speck between two real pads
        let mask = mask_with(&[
            Rect::new(2, 2, 4, 4),
            Rect::new(15, 8, 1, 1),
            Rect::new(2, 20, 4, 4),
        ]);
        let pads = PadMap::extract(&mask);
        assert_eq!(pads.len(), 2);
        assert_eq!(pads.get(1).map(|p| p.bounds.y), Some(20));
    }

    #[test]
    fn test_bounds_of() {
        let mask = mask_with(&[Rect::new(2, 2, 4, 4), Rect::new(10, 20, 4, 4)]);
        let pads = PadMap::extract(&mask);
        assert_eq!(pads.bounds_of(&[0, 1]), Some(Rect::new(2, 2, 12, 22)));
        assert_eq!(pads.bounds_of(&[]), None);
    }
}
