//! Template search over the board masks and per-candidate validation.

use std::collections::{BTreeMap, BTreeSet};

use image::GrayImage;

use crate::board::{BoardState, PadId, Side, SideLayers};
use crate::core::{CancelFlag, MatchOptions};
use crate::footprint::{Footprint, OrientedFootprint};
use crate::geometry::raster::{and, contour_mask, crop, external_contours, islands, Island};
use crate::geometry::{PixelPoint, Rect};

use super::score::{stride, ScoreMap};
use super::types::ComponentMatch;

/// What the template must cover.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Every footprint pad must land on a board pad.
    #[default]
    Full,
    /// The named pins are erased from the template before searching.
    Incomplete { erased: Vec<String> },
}

impl MatchMode {
    fn erased(&self) -> &[String] {
        match self {
            MatchMode::Full => &[],
            MatchMode::Incomplete { erased } => erased,
        }
    }
}

/// Runs the footprint over one board snapshot.
#[derive(Debug, Clone)]
pub struct MatchEngine<'a> {
    board: &'a BoardState,
    footprint: &'a Footprint,
    options: &'a MatchOptions,
    cancel: Option<CancelFlag>,
}

struct Validated {
    pads_of: BTreeMap<usize, Vec<PadId>>,
    coverage: BTreeMap<usize, u64>,
    /// Board pads under the erased template pads.
    touched: BTreeSet<PadId>,
}

impl Validated {
    /// Every board pad under the placement, erased pads included. Accepted
    /// candidates are remembered under this set, whatever the orientation.
    fn physical_pads(&self) -> BTreeSet<PadId> {
        self.pads_of
            .values()
            .flatten()
            .chain(self.touched.iter())
            .copied()
            .collect()
    }
}

impl<'a> MatchEngine<'a> {
    pub fn new(board: &'a BoardState, footprint: &'a Footprint, options: &'a MatchOptions) -> Self {
        Self {
            board,
            footprint,
            options,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn board(&self) -> &'a BoardState {
        self.board
    }

    pub fn footprint(&self) -> &'a Footprint {
        self.footprint
    }

    pub fn options(&self) -> &'a MatchOptions {
        self.options
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }

    /// Searches every side and orientation, optionally inside `window`
    /// (board pixels). Candidates come back in discovery order.
    pub fn run(&self, mode: &MatchMode, window: Option<Rect>) -> Vec<ComponentMatch> {
        let mut out = Vec::new();
        for layers in self.board.sides() {
            self.search_side(layers, mode, window, &mut out);
        }
        tracing::debug!("{:?} search produced {} candidates", mode, out.len());
        out
    }

    /// Same as [`run`](Self::run) restricted to one side.
    pub fn run_side(&self, side: Side, mode: &MatchMode, window: Option<Rect>) -> Vec<ComponentMatch> {
        let mut out = Vec::new();
        if let Some(layers) = self.board.side(side) {
            self.search_side(layers, mode, window, &mut out);
        }
        out
    }

    fn search_side(&self, layers: &SideLayers, mode: &MatchMode, window: Option<Rect>, out: &mut Vec<ComponentMatch>) {
        let cropped;
        let (search, origin): (&GrayImage, PixelPoint) = match window {
            Some(w) => {
                let visible = w.clip(layers.width(), layers.height());
                if visible.is_empty() {
                    return;
                }
                cropped = crop(&layers.mask_fg, visible);
                (&cropped, PixelPoint::new(visible.x, visible.y))
            }
            None => (&layers.mask_fg, PixelPoint::new(0, 0)),
        };

        let threshold = match mode {
            MatchMode::Full => self.options.full_threshold,
            MatchMode::Incomplete { .. } => self.options.incomplete_threshold,
        };
        let mut seen: BTreeSet<BTreeSet<PadId>> = BTreeSet::new();

        for oriented in self.footprint.oriented() {
            if self.cancelled() {
                tracing::info!("Match search cancelled");
                return;
            }
            let mut erased = Vec::new();
            for label in mode.erased() {
                match oriented.rotated_index_of_pin(label) {
                    Some(i) => erased.push(i),
                    None => tracing::debug!("Pin {} has no pad at {}", label, oriented.orientation),
                }
            }
            if erased.len() < mode.erased().len() {
                continue;
            }
            let template = oriented.template_without(&erased);
            let step = stride(template.dimensions(), search.dimensions(), self.options);
            let map = ScoreMap::compute(&template, search, step);
            tracing::debug!(
                "{} side, orientation {}: stride {}, best score {:.3}",
                layers.side,
                oriented.orientation,
                step,
                map.max()
            );

            for peak in map.peaks(threshold, self.cancel.clone()) {
                let at = PixelPoint::new(origin.x + peak.x as i32, origin.y + peak.y as i32);
                let Some(found) = self.validate(layers, oriented, &template, &erased, at) else {
                    continue;
                };
                if !seen.insert(found.physical_pads()) {
                    tracing::trace!("Rejected duplicate candidate at {:?}", at);
                    continue;
                }
                out.push(self.emit(layers, oriented, found, at, peak.score, mode));
            }
        }
    }

    /// Resolves which board pads lie under which template pads.
    fn validate(
        &self,
        layers: &SideLayers,
        oriented: &OrientedFootprint,
        template: &GrayImage,
        erased: &[usize],
        at: PixelPoint,
    ) -> Option<Validated> {
        let (tw, th) = template.dimensions();
        let board = crop(&layers.mask_fg, Rect::new(at.x, at.y, tw as i32, th as i32));

        let mut pads_of: BTreeMap<usize, Vec<PadId>> = BTreeMap::new();
        let mut coverage: BTreeMap<usize, u64> = BTreeMap::new();
        let mut owner: BTreeMap<PadId, usize> = BTreeMap::new();

        for contour in external_contours(&board) {
            if contour.is_degenerate() {
                continue;
            }
            let overlap = and(&contour_mask(&contour, tw, th), template);
            let found = islands(&overlap);
            let island = match found.len() {
                0 => continue,
                1 => &found[0],
                n => {
                    tracing::trace!("Rejected {:?}: one board pad spans {} footprint pads", at, n);
                    return None;
                }
            };
            let Some(fp_contour) = footprint_contour_of(oriented, island) else {
                continue;
            };
            let on_board = island.centroid.offset(at.x, at.y);
            let Some(pad) = layers.pads.pad_at(on_board) else {
                tracing::debug!("Overlap centroid {:?} lies in no pad; discarded", on_board);
                continue;
            };
            match owner.get(&pad) {
                Some(&other) if other != fp_contour => {
                    tracing::trace!("Rejected {:?}: pad {} under two footprint pads", at, pad);
                    return None;
                }
                Some(_) => {}
                None => {
                    owner.insert(pad, fp_contour);
                    pads_of.entry(fp_contour).or_default().push(pad);
                }
            }
            *coverage.entry(fp_contour).or_default() += island.area;
        }

        if pads_of.is_empty() {
            return None;
        }
        for (i, &area) in oriented.areas.iter().enumerate() {
            if erased.contains(&i) {
                continue;
            }
            if !pads_of.contains_key(&i) {
                tracing::trace!("Rejected {:?}: footprint pad {} has no board pad", at, i);
                return None;
            }
            let covered = coverage.get(&i).copied().unwrap_or(0) as f64;
            if covered < self.options.coverage_ratio * area as f64 {
                tracing::trace!("Rejected {:?}: footprint pad {} covered {} of {}", at, i, covered, area);
                return None;
            }
        }
        let mut touched = BTreeSet::new();
        for &e in erased {
            touched.extend(touched_pads(layers, &and(&oriented.pad_mask(e), &board), at));
        }
        Some(Validated {
            pads_of,
            coverage,
            touched,
        })
    }

    fn emit(
        &self,
        layers: &SideLayers,
        oriented: &OrientedFootprint,
        found: Validated,
        at: PixelPoint,
        score: f64,
        mode: &MatchMode,
    ) -> ComponentMatch {
        let mut pin_to_pads = BTreeMap::new();
        let mut pin_to_pad_centres = BTreeMap::new();
        let mut pin_coverage = BTreeMap::new();
        for (i, mut pads) in found.pads_of {
            let Some(label) = oriented.labels.get(i).cloned().flatten() else {
                continue;
            };
            pads.sort_unstable();
            let mut centres: Vec<PixelPoint> = pads.iter().filter_map(|&p| layers.pads.centre(p)).collect();
            centres.sort_unstable();
            pin_coverage.insert(label.clone(), found.coverage.get(&i).copied().unwrap_or(0));
            pin_to_pad_centres.insert(label.clone(), centres);
            pin_to_pads.insert(label, pads);
        }
        ComponentMatch {
            score,
            coordinates: at,
            orientation: oriented.orientation,
            side: layers.side,
            pin_to_pad_centres,
            pin_to_pads,
            pin_coverage,
            fp_contours: oriented.contours.clone(),
            pin_to_nets: None,
            touched_traces_list: None,
            incomplete: matches!(mode, MatchMode::Incomplete { .. }),
            erased_pins: mode.erased().to_vec(),
            pins_missing: BTreeMap::new(),
            interventions: Vec::new(),
        }
    }
}

/// Board pads under the foreground of `under`, a template-sized raster
/// placed at `at`.
pub(super) fn touched_pads(layers: &SideLayers, under: &GrayImage, at: PixelPoint) -> BTreeSet<PadId> {
    let mut pads = BTreeSet::new();
    for island in islands(under) {
        let hit = layers.pads.pad_at(island.centroid.offset(at.x, at.y)).or_else(|| {
            island
                .pixels
                .iter()
                .find_map(|&(x, y)| layers.pads.pad_at(PixelPoint::new(x as i32 + at.x, y as i32 + at.y)))
        });
        pads.extend(hit);
    }
    pads
}

/// The template pad an overlap island belongs to: the pad under its
/// centroid, else the pad most of its pixels fall in.
fn footprint_contour_of(oriented: &OrientedFootprint, island: &Island) -> Option<usize> {
    if let Some(i) = oriented.contour_at(island.centroid.x, island.centroid.y) {
        return Some(i);
    }
    let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
    for &(x, y) in &island.pixels {
        if let Some(i) = oriented.contour_at(x as i32, y as i32) {
            *votes.entry(i).or_default() += 1;
        }
    }
    votes.into_iter().max_by_key(|&(_, n)| n).map(|(i, _)| i)
}
