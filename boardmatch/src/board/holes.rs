//! Drill holes: conversion to pixels and classification.

use std::collections::BTreeSet;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::geometry::raster::DARK_THRESHOLD;
use crate::geometry::PixelPoint;

use super::pads::{PadId, PadMap};
use super::traces::{CutoutKind, TraceHierarchy, TraceId};

/// One drill-file entry, in board millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrillRecord {
    pub x_mm: f64,
    pub y_mm: f64,
    pub diameter_mm: f64,
    #[serde(default)]
    pub plated: bool,
}

/// Board-edge rectangle in millimetres, used to map drill coordinates onto
/// the rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoardBounds {
    /// Board y grows upward, so y magnitudes are used on both sides.
    pub fn to_pixel(&self, x_mm: f64, y_mm: f64, image_width: u32, image_height: u32) -> PixelPoint {
        let x = (x_mm - self.min_x) / self.width * image_width as f64;
        let y = (y_mm.abs() - self.min_y.abs()) / self.height * image_height as f64;
        PixelPoint::new(x.round() as i32, y.round() as i32)
    }

    pub fn px_per_mm(&self, image_width: u32) -> f64 {
        if self.width > 0.0 {
            image_width as f64 / self.width
        } else {
            0.0
        }
    }
}

/// What a hole does electrically. Fixed once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HoleKind {
    /// Mechanical hole, no copper linkage.
    Drill,
    /// Accepts a component lead; links the copper regions on both sides.
    ThroughHole {
        front: Option<TraceId>,
        back: Option<TraceId>,
    },
    /// Plated hole outside any pad, linking front and back copper.
    Via {
        front: Option<TraceId>,
        back: Option<TraceId>,
    },
}

impl HoleKind {
    pub fn is_drill(&self) -> bool {
        matches!(self, HoleKind::Drill)
    }

    /// Copper regions joined by this hole on (front, back).
    pub fn links(&self) -> (Option<TraceId>, Option<TraceId>) {
        match *self {
            HoleKind::Drill => (None, None),
            HoleKind::ThroughHole { front, back } | HoleKind::Via { front, back } => (front, back),
        }
    }

    pub fn cutout_kind(&self) -> Option<CutoutKind> {
        match self {
            HoleKind::Drill => None,
            HoleKind::ThroughHole { .. } => Some(CutoutKind::ThroughHole),
            HoleKind::Via { .. } => Some(CutoutKind::Via),
        }
    }

    /// Same kind, pointing at new region ids.
    pub fn relinked(self, front: Option<TraceId>, back: Option<TraceId>) -> Self {
        match self {
            HoleKind::Drill => HoleKind::Drill,
            HoleKind::ThroughHole { .. } => HoleKind::ThroughHole { front, back },
            HoleKind::Via { .. } => HoleKind::Via { front, back },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hole {
    pub position: PixelPoint,
    pub diameter_px: f64,
    pub record: DrillRecord,
    pub kind: HoleKind,
}

fn region_at(hierarchy: Option<&TraceHierarchy>, p: PixelPoint) -> Option<TraceId> {
    hierarchy.and_then(|h| h.locate(p, false)).map(|hit| hit.region)
}

/// Converts drill records to pixel holes and classifies each one.
///
/// Unplated holes are always drill-only. A plated hole over a light mask
/// pixel is a via; one under a pad that sits inside a copper cutout on either
/// side is a through-hole; anything else is drill-only.
pub fn classify_holes(
    records: &[DrillRecord],
    bounds: &BoardBounds,
    front_mask: &GrayImage,
    front: &TraceHierarchy,
    back: Option<&TraceHierarchy>,
) -> Vec<Hole> {
    let (w, h) = front_mask.dimensions();
    let px_per_mm = bounds.px_per_mm(w);
    records
        .iter()
        .map(|record| {
            let position = bounds.to_pixel(record.x_mm, record.y_mm, w, h);
            let kind = classify_one(record, position, front_mask, front, back);
            Hole {
                position,
                diameter_px: record.diameter_mm * px_per_mm,
                record: *record,
                kind,
            }
        })
        .collect()
}

fn classify_one(
    record: &DrillRecord,
    position: PixelPoint,
    front_mask: &GrayImage,
    front: &TraceHierarchy,
    back: Option<&TraceHierarchy>,
) -> HoleKind {
    let (w, h) = front_mask.dimensions();
    let on_board = position.x >= 0 && position.y >= 0 && (position.x as u32) < w && (position.y as u32) < h;
    if !record.plated || !on_board {
        return HoleKind::Drill;
    }

    let front_region = region_at(Some(front), position);
    let back_region = region_at(back, position);
    let light = front_mask.get_pixel(position.x as u32, position.y as u32).0[0] >= DARK_THRESHOLD;
    if light {
        if front_region.is_none() {
            tracing::debug!("Via at {:?} is not inside front copper", position);
        }
        HoleKind::Via {
            front: front_region,
            back: back_region,
        }
    } else if in_cutout(Some(front), position) || in_cutout(back, position) {
        HoleKind::ThroughHole {
            front: front_region,
            back: back_region,
        }
    } else {
        HoleKind::Drill
    }
}

fn in_cutout(hierarchy: Option<&TraceHierarchy>, p: PixelPoint) -> bool {
    hierarchy
        .and_then(|h| h.locate(p, true))
        .is_some_and(|hit| hit.cutout.is_some())
}

/// Refreshes the region links after the copper changed; kinds stay fixed.
pub fn relink_holes(holes: &mut [Hole], front: &TraceHierarchy, back: Option<&TraceHierarchy>) {
    for hole in holes.iter_mut() {
        if hole.kind.is_drill() {
            continue;
        }
        hole.kind = hole
            .kind
            .relinked(region_at(Some(front), hole.position), region_at(back, hole.position));
    }
}

/// Plated hole positions with the cutout kind they imply.
pub fn plated_points(holes: &[Hole]) -> Vec<(PixelPoint, CutoutKind)> {
    holes
        .iter()
        .filter_map(|h| h.kind.cutout_kind().map(|k| (h.position, k)))
        .collect()
}

/// Pads drilled by a drill-only hole; they are left out of every net.
pub fn ignored_pads(holes: &[Hole], pads: &PadMap) -> BTreeSet<PadId> {
    holes
        .iter()
        .filter(|h| h.kind.is_drill())
        .filter_map(|h| pads.pad_at(h.position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use image::Luma;

    fn paint(img: &mut GrayImage, r: Rect, v: u8) {
        for y in r.y..r.y + r.height {
            for x in r.x..r.x + r.width {
                img.put_pixel(x as u32, y as u32, Luma([v]));
            }
        }
    }

    #[test]
    fn test_to_pixel() {
        let bounds = BoardBounds {
            min_x: 10.0,
            min_y: 20.0,
            width: 10.0,
            height: 5.0,
        };
        assert_eq!(bounds.to_pixel(15.0, -22.5, 100, 50), PixelPoint::new(50, 25));
        assert_eq!(bounds.to_pixel(10.0, 20.0, 100, 50), PixelPoint::new(0, 0));
    }

    #[test]
    fn test_classification_partition() {
        let mut mask = GrayImage::from_pixel(40, 20, Luma([255]));
        paint(&mut mask, Rect::new(2, 2, 6, 6), 0);
        paint(&mut mask, Rect::new(12, 2, 6, 6), 0);
        let mut traces = GrayImage::from_pixel(40, 20, Luma([255]));
        paint(&mut traces, Rect::new(2, 2, 30, 6), 0);
        // drilled copper under the first pad only
        paint(&mut traces, Rect::new(4, 4, 3, 3), 255);
        let front = TraceHierarchy::build(&traces);
        let bounds = BoardBounds {
            min_x: 0.0,
            min_y: 0.0,
            width: 4.0,
            height: 2.0,
        };
        let records = [
            // under the pad, in copper
            DrillRecord { x_mm: 0.5, y_mm: 0.5, diameter_mm: 0.3, plated: true },
            // on the trace, outside the pad
            DrillRecord { x_mm: 2.0, y_mm: 0.5, diameter_mm: 0.3, plated: true },
            // unplated under the pad
            DrillRecord { x_mm: 0.5, y_mm: 0.5, diameter_mm: 0.3, plated: false },
            // plated under the second pad, but the copper there is solid
            DrillRecord { x_mm: 1.5, y_mm: 0.5, diameter_mm: 0.3, plated: true },
        ];
        let holes = classify_holes(&records, &bounds, &mask, &front, None);
        assert!(matches!(holes[0].kind, HoleKind::ThroughHole { front: Some(0), back: None }));
        assert!(matches!(holes[1].kind, HoleKind::Via { front: Some(0), .. }));
        assert!(holes[2].kind.is_drill());
        assert!(holes[3].kind.is_drill());
        assert!((holes[0].diameter_px - 3.0).abs() < 1e-9);

        let pads = PadMap::extract(&mask);
        assert_eq!(ignored_pads(&holes, &pads), BTreeSet::from([0, 1]));
    }
}
