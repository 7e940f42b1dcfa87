//! The board connectivity model and its trace-cut history.

use std::collections::{BTreeMap, BTreeSet};

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::core::BoardMatchError;
use crate::geometry::raster::{dark_to_foreground, draw_thick_segment};
use crate::geometry::PixelPoint;

use super::holes::{classify_holes, ignored_pads, plated_points, relink_holes, BoardBounds, DrillRecord, Hole};
use super::nets::{NetId, NetTable, SideConnectivity};
use super::pads::{PadId, PadMap};
use super::traces::{TraceHierarchy, TraceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Front, Side::Back];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Front => write!(f, "front"),
            Side::Back => write!(f, "back"),
        }
    }
}

/// Everything derived from one side's mask and trace rasters.
#[derive(Debug, Clone, PartialEq)]
pub struct SideLayers {
    pub side: Side,
    /// Solder mask as supplied: pads dark.
    pub mask: GrayImage,
    /// Binary mask with pads as foreground.
    pub mask_fg: GrayImage,
    /// Copper raster as supplied: copper dark.
    pub traces: GrayImage,
    pub pads: PadMap,
    pub hierarchy: TraceHierarchy,
    pub ignored_pads: BTreeSet<PadId>,
    pub pads_by_region: BTreeMap<TraceId, BTreeSet<PadId>>,
    pub orphan_pads: Vec<PadId>,
}

impl SideLayers {
    fn new(side: Side, mask: GrayImage, traces: GrayImage) -> Result<Self, BoardMatchError> {
        if mask.width() == 0 || mask.height() == 0 {
            return Err(BoardMatchError::InvalidInput(format!("{} mask is empty", side)));
        }
        if mask.dimensions() != traces.dimensions() {
            return Err(BoardMatchError::InvalidInput(format!(
                "{} mask is {:?} but traces are {:?}",
                side,
                mask.dimensions(),
                traces.dimensions()
            )));
        }
        let mask_fg = dark_to_foreground(&mask);
        let pads = PadMap::extract(&mask);
        let hierarchy = TraceHierarchy::build(&traces);
        Ok(Self {
            side,
            mask,
            mask_fg,
            traces,
            pads,
            hierarchy,
            ignored_pads: BTreeSet::new(),
            pads_by_region: BTreeMap::new(),
            orphan_pads: Vec::new(),
        })
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    fn connectivity(&self) -> SideConnectivity {
        SideConnectivity {
            region_count: self.hierarchy.len(),
            pads_by_region: self.pads_by_region.clone(),
            orphan_pads: self.orphan_pads.clone(),
        }
    }
}

/// Raw rasters and drill data for one board.
#[derive(Debug, Clone)]
pub struct BoardInput {
    pub front_mask: GrayImage,
    pub front_traces: GrayImage,
    pub back_mask: Option<GrayImage>,
    pub back_traces: Option<GrayImage>,
    pub drills: Vec<DrillRecord>,
    pub bounds: Option<BoardBounds>,
}

impl BoardInput {
    pub fn single_sided(mask: GrayImage, traces: GrayImage) -> Self {
        Self {
            front_mask: mask,
            front_traces: traces,
            back_mask: None,
            back_traces: None,
            drills: Vec::new(),
            bounds: None,
        }
    }
}

/// A cut through the copper on one side, drawn as background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceCut {
    pub side: Side,
    pub start: PixelPoint,
    pub end: PixelPoint,
}

/// One consistent snapshot of the board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub front: SideLayers,
    pub back: Option<SideLayers>,
    pub holes: Vec<Hole>,
    pub nets: NetTable,
    pub drills: Vec<DrillRecord>,
    pub bounds: Option<BoardBounds>,
}

impl BoardState {
    pub fn ingest(input: BoardInput) -> Result<Self, BoardMatchError> {
        let front = SideLayers::new(Side::Front, input.front_mask, input.front_traces)?;
        let back = match (input.back_mask, input.back_traces) {
            (Some(mask), Some(traces)) => Some(SideLayers::new(Side::Back, mask, traces)?),
            (None, None) => None,
            _ => {
                tracing::warn!("Back side needs both a mask and a trace raster; ignoring it");
                None
            }
        };
        if let Some(back) = &back {
            if back.mask.dimensions() != front.mask.dimensions() {
                return Err(BoardMatchError::InvalidInput(
                    "front and back rasters differ in size".to_string(),
                ));
            }
        }

        let holes = match &input.bounds {
            Some(bounds) => classify_holes(
                &input.drills,
                bounds,
                &front.mask,
                &front.hierarchy,
                back.as_ref().map(|b| &b.hierarchy),
            ),
            None => {
                if !input.drills.is_empty() {
                    tracing::warn!("{} drill holes ignored: no board bounds given", input.drills.len());
                }
                Vec::new()
            }
        };

        let mut state = Self {
            front,
            back,
            holes,
            nets: NetTable::default(),
            drills: input.drills,
            bounds: input.bounds,
        };
        state.connect();
        tracing::info!(
            "Board ingested: {} front pads, {} back pads, {} holes, {} nets",
            state.front.pads.len(),
            state.back.as_ref().map(|b| b.pads.len()).unwrap_or(0),
            state.holes.len(),
            state.nets.len()
        );
        Ok(state)
    }

    /// Derives cutout kinds, per-region pad sets and the net table from the
    /// current hierarchies and holes.
    fn connect(&mut self) {
        let plated = plated_points(&self.holes);
        for layers in std::iter::once(&mut self.front).chain(self.back.iter_mut()) {
            layers.hierarchy.classify_cutouts(&plated);
            layers.ignored_pads = ignored_pads(&self.holes, &layers.pads);
            let (by_region, orphans) = layers.hierarchy.pads_by_region(&layers.pads, &layers.ignored_pads);
            layers.pads_by_region = by_region;
            layers.orphan_pads = orphans;
        }
        let front = self.front.connectivity();
        let back = self.back.as_ref().map(|b| b.connectivity()).unwrap_or_default();
        self.nets = NetTable::build(&front, &back, &self.holes);
    }

    pub fn side(&self, side: Side) -> Option<&SideLayers> {
        match side {
            Side::Front => Some(&self.front),
            Side::Back => self.back.as_ref(),
        }
    }

    pub fn sides(&self) -> impl Iterator<Item = &SideLayers> {
        std::iter::once(&self.front).chain(self.back.iter())
    }

    pub fn net_of_pad(&self, side: Side, pad: PadId) -> Option<NetId> {
        self.nets.net_of_pad(side, pad)
    }

    pub fn is_ignored(&self, side: Side, pad: PadId) -> bool {
        self.side(side).map(|l| l.ignored_pads.contains(&pad)).unwrap_or(false)
    }

    /// Holes that link copper belonging to `net`.
    pub fn holes_of_net(&self, net: NetId) -> Vec<&Hole> {
        self.nets
            .get(net)
            .map(|n| n.holes.iter().filter_map(|&i| self.holes.get(i)).collect())
            .unwrap_or_default()
    }

    fn apply_cuts(&mut self, cuts: &[TraceCut], thickness: u32) {
        for cut in cuts {
            let layers = match cut.side {
                Side::Front => Some(&mut self.front),
                Side::Back => self.back.as_mut(),
            };
            let Some(layers) = layers else {
                tracing::warn!("Ignoring cut on missing {} side", cut.side);
                continue;
            };
            draw_thick_segment(&mut layers.traces, cut.start, cut.end, thickness, Luma([255]));
        }
        self.front.hierarchy = TraceHierarchy::build(&self.front.traces);
        if let Some(back) = self.back.as_mut() {
            back.hierarchy = TraceHierarchy::build(&back.traces);
        }
        relink_holes(
            &mut self.holes,
            &self.front.hierarchy,
            self.back.as_ref().map(|b| &b.hierarchy),
        );
        self.connect();
    }
}

/// Versioned board: the current state plus the snapshots taken before the
/// most recent and the very first trace-cut integration.
#[derive(Debug, Clone)]
pub struct BoardModel {
    current: BoardState,
    previous: Option<BoardState>,
    original: Option<BoardState>,
}

impl BoardModel {
    pub fn new(state: BoardState) -> Self {
        Self {
            current: state,
            previous: None,
            original: None,
        }
    }

    pub fn current(&self) -> &BoardState {
        &self.current
    }

    pub fn has_history(&self) -> bool {
        self.previous.is_some()
    }

    pub fn nets(&self) -> &NetTable {
        &self.current.nets
    }

    pub fn pads(&self, side: Side) -> Option<&PadMap> {
        self.current.side(side).map(|l| &l.pads)
    }

    pub fn net_of_pad(&self, side: Side, pad: PadId) -> Option<NetId> {
        self.current.net_of_pad(side, pad)
    }

    /// Draws the cuts into the copper rasters and rebuilds connectivity.
    pub fn integrate_trace_cuts(&mut self, cuts: &[TraceCut], thickness: u32) {
        if self.original.is_none() {
            self.original = Some(self.current.clone());
        }
        self.previous = Some(self.current.clone());
        self.current.apply_cuts(cuts, thickness);
        tracing::info!(
            "Integrated {} trace cuts; board now has {} nets",
            cuts.len(),
            self.current.nets.len()
        );
    }

    /// Restores the state before the last integration. No-op without one.
    pub fn revert(&mut self) -> bool {
        match self.previous.take() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    /// Restores the state before the first integration. No-op without one.
    pub fn revert_original(&mut self) -> bool {
        match self.original.take() {
            Some(original) => {
                self.current = original;
                self.previous = None;
                true
            }
            None => false,
        }
    }
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

    fn bridged_pair() -> BoardInput {
        let mut mask = GrayImage::from_pixel(40, 20, Luma([255]));
        paint(&mut mask, Rect::new(2, 5, 6, 6), 0);
        paint(&mut mask, Rect::new(30, 5, 6, 6), 0);
        let mut traces = mask.clone();
        paint(&mut traces, Rect::new(8, 7, 22, 2), 0);
        BoardInput::single_sided(mask, traces)
    }

    #[test]
    fn test_ingest_bridged_pair() {
        let state = BoardState::ingest(bridged_pair()).expect("ingest");
        assert_eq!(state.front.pads.len(), 2);
        assert_eq!(state.nets.len(), 1);
        assert_eq!(state.net_of_pad(Side::Front, 0), state.net_of_pad(Side::Front, 1));
    }

    #[test]
    fn test_cut_and_revert() {
        let state = BoardState::ingest(bridged_pair()).expect("ingest");
        let mut model = BoardModel::new(state.clone());
        assert!(!model.revert());

        model.integrate_trace_cuts(
            &[TraceCut {
                side: Side::Front,
                start: PixelPoint::new(18, 4),
                end: PixelPoint::new(18, 14),
            }],
            2,
        );
        assert_eq!(model.current().nets.len(), 2);
        assert_ne!(
            model.current().net_of_pad(Side::Front, 0),
            model.current().net_of_pad(Side::Front, 1)
        );

        assert!(model.revert());
        assert_eq!(model.current(), &state);
        assert!(!model.revert());
    }

    #[test]
    fn test_revert_original_after_two_cuts() {
        let state = BoardState::ingest(bridged_pair()).expect("ingest");
        let mut model = BoardModel::new(state.clone());
        let cut = |x| TraceCut {
            side: Side::Front,
            start: PixelPoint::new(x, 4),
            end: PixelPoint::new(x, 14),
        };
        model.integrate_trace_cuts(&[cut(12)], 2);
        model.integrate_trace_cuts(&[cut(24)], 2);
        assert_eq!(model.current().nets.len(), 3);
        assert!(model.revert_original());
        assert_eq!(model.current(), &state);
    }

    #[test]
    fn test_mismatched_rasters_are_rejected() {
        let input = BoardInput::single_sided(GrayImage::new(10, 10), GrayImage::new(12, 10));
        assert!(BoardState::ingest(input).is_err());
    }
}
