//! Copper region hierarchy of a trace raster.
//!
//! Every outer border of the copper becomes a [`CopperRegion`]; the hole
//! borders directly inside it become its [`Cutout`]s. Copper islands that sit
//! inside a cutout are regions of their own with `parent` pointing at the
//! enclosing region.

use std::collections::{BTreeMap, BTreeSet};

use image::{GrayImage, Luma};
use serde::Serialize;

use crate::geometry::raster::{contour_tree, dark_to_foreground, fill_contour, BACKGROUND, FOREGROUND};
use crate::geometry::{Contour, PixelPoint, Rect};

use super::pads::{PadId, PadMap};

pub type TraceId = usize;

/// What a hole in the copper turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutKind {
    Empty,
    ThroughHole,
    Via,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    pub contour: Contour,
    pub bounds: Rect,
    pub kind: CutoutKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopperRegion {
    pub id: TraceId,
    pub contour: Contour,
    pub bounds: Rect,
    pub parent: Option<TraceId>,
    pub depth: usize,
    pub cutouts: Vec<Cutout>,
}

/// Result of locating a point in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionHit {
    pub region: TraceId,
    /// Index into the region's cutouts when the point lies in one.
    pub cutout: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceHierarchy {
    regions: Vec<CopperRegion>,
}

impl TraceHierarchy {
    /// Builds the hierarchy from a raster where copper is dark on a light field.
    pub fn build(traces: &GrayImage) -> Self {
        let tree = contour_tree(&dark_to_foreground(traces));

        let mut region_of: Vec<Option<TraceId>> = vec![None; tree.len()];
        let mut regions: Vec<CopperRegion> = Vec::new();
        for (i, traced) in tree.iter().enumerate() {
            if traced.is_hole || traced.contour.is_degenerate() {
                continue;
            }
            region_of[i] = Some(regions.len());
            regions.push(CopperRegion {
                id: regions.len(),
                bounds: traced.contour.bounding_rect(),
                contour: traced.contour.clone(),
                parent: None,
                depth: 0,
                cutouts: Vec::new(),
            });
        }

        for traced in &tree {
            let Some(owner) = traced.parent.and_then(|p| region_of[p]) else {
                continue;
            };
            if traced.is_hole {
                regions[owner].cutouts.push(Cutout {
                    bounds: traced.contour.bounding_rect(),
                    contour: traced.contour.clone(),
                    kind: CutoutKind::Empty,
                });
            }
        }

        // an island's border has a hole border as parent, whose parent is the enclosing copper
        for (i, traced) in tree.iter().enumerate() {
            let Some(id) = region_of[i] else { continue };
            regions[id].parent = traced
                .parent
                .and_then(|h| tree.get(h))
                .and_then(|hole| hole.parent)
                .and_then(|o| region_of[o]);
        }
        for id in 0..regions.len() {
            let mut depth = 0;
            let mut cursor = regions[id].parent;
            while let Some(p) = cursor {
                depth += 1;
                if depth > regions.len() {
                    break;
                }
                cursor = regions[p].parent;
            }
            regions[id].depth = depth;
        }

        tracing::debug!("Trace hierarchy: {} copper regions", regions.len());
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn region(&self, id: TraceId) -> Option<&CopperRegion> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> &[CopperRegion] {
        &self.regions
    }

    /// Innermost region whose outer border contains `p`.
    ///
    /// With `strict` set, edge coincidence counts as outside for the region
    /// border and as inside for the cutout borders.
    pub fn locate(&self, p: PixelPoint, strict: bool) -> Option<RegionHit> {
        let region = self
            .regions
            .iter()
            .filter(|r| r.contour.contains(p, !strict))
            .max_by_key(|r| r.depth)?;
        let cutout = region
            .cutouts
            .iter()
            .position(|c| c.contour.contains(p, true));
        Some(RegionHit {
            region: region.id,
            cutout,
        })
    }

    /// Marks each cutout with the kind of the first plated hole found inside it.
    pub fn classify_cutouts(&mut self, plated: &[(PixelPoint, CutoutKind)]) {
        for region in &mut self.regions {
            for cutout in &mut region.cutouts {
                cutout.kind = plated
                    .iter()
                    .find(|(p, _)| cutout.contour.contains(*p, true))
                    .map(|(_, kind)| *kind)
                    .unwrap_or(CutoutKind::Empty);
            }
        }
    }

    /// Assigns every pad to at most one region by its centre.
    ///
    /// A pad strictly inside a region belongs to it unless its centre falls in
    /// an empty cutout; cutouts around a through-hole or via keep the pad
    /// connected through the plating. Pads that land nowhere are returned as
    /// orphans.
    pub fn pads_by_region(
        &self,
        pads: &PadMap,
        ignored: &BTreeSet<PadId>,
    ) -> (BTreeMap<TraceId, BTreeSet<PadId>>, Vec<PadId>) {
        let mut by_region: BTreeMap<TraceId, BTreeSet<PadId>> = BTreeMap::new();
        let mut orphans = Vec::new();
        for pad in pads.iter() {
            if ignored.contains(&pad.id) {
                continue;
            }
            let owner = self.locate(pad.centre, true).and_then(|hit| match hit.cutout {
                Some(c) if self.regions[hit.region].cutouts[c].kind == CutoutKind::Empty => None,
                _ => Some(hit.region),
            });
            match owner {
                Some(region) => {
                    by_region.entry(region).or_default().insert(pad.id);
                }
                None => orphans.push(pad.id),
            }
        }
        (by_region, orphans)
    }

    /// Paints the given regions into `canvas`, offset by `-origin`.
    ///
    /// Regions are drawn outermost first so islands survive their parent's
    /// cutouts. Cutout borders are copper pixels and are repainted after the
    /// cutout interior is cleared.
    pub fn rasterize(&self, ids: &[TraceId], canvas: &mut GrayImage, origin: PixelPoint) {
        let mut ordered: Vec<&CopperRegion> = ids.iter().filter_map(|&id| self.region(id)).collect();
        ordered.sort_by_key(|r| r.depth);
        for region in ordered {
            fill_contour(canvas, &region.contour.translated(-origin.x, -origin.y), FOREGROUND);
            for cutout in &region.cutouts {
                let local = cutout.contour.translated(-origin.x, -origin.y);
                fill_contour(canvas, &local, BACKGROUND);
                for p in &local.points {
                    if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height() {
                        canvas.put_pixel(p.x as u32, p.y as u32, Luma([FOREGROUND]));
                    }
                }
            }
        }
    }
}
