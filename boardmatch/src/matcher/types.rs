//! Match records produced by the engine and enriched by post-processing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::{NetId, PadId, Side, TraceCut};
use crate::footprint::Orientation;
use crate::geometry::{Contour, PixelPoint};
use crate::io::codec;

/// How a near-miss pin lands on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MissingPin {
    /// The erased pin overlaps board pads that are shorted to other pins.
    Touched {
        touched_pads: Vec<PadId>,
        touched_traces: Vec<NetId>,
    },
    /// Nothing solderable under the erased pin.
    SolderPoint { add_solder_points: bool },
}

/// A manual fix that turns a near-miss into a valid placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Intervention {
    #[serde(rename = "add solder point")]
    AddSolderPoint {
        pin: String,
        /// Board coordinates.
        #[serde(with = "codec::contour")]
        contour: Contour,
    },
    #[serde(rename = "cut trace")]
    CutTrace {
        pin: String,
        side: Side,
        start: PixelPoint,
        end: PixelPoint,
        /// Pads of the missing pin on the cut net.
        near_pads: Vec<PadId>,
        /// Pads of the connected pins on the cut net.
        far_pads: Vec<PadId>,
    },
}

impl Intervention {
    pub fn pin(&self) -> &str {
        match self {
            Intervention::AddSolderPoint { pin, .. } | Intervention::CutTrace { pin, .. } => pin,
        }
    }

    pub fn trace_cut(&self) -> Option<TraceCut> {
        match self {
            Intervention::CutTrace { side, start, end, .. } => Some(TraceCut {
                side: *side,
                start: *start,
                end: *end,
            }),
            Intervention::AddSolderPoint { .. } => None,
        }
    }
}

/// One placement of the footprint on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMatch {
    pub score: f64,
    /// Top-left corner of the oriented template on the board.
    pub coordinates: PixelPoint,
    pub orientation: Orientation,
    pub side: Side,
    pub pin_to_pad_centres: BTreeMap<String, Vec<PixelPoint>>,
    pub pin_to_pads: BTreeMap<String, Vec<PadId>>,
    pub pin_coverage: BTreeMap<String, u64>,
    /// Oriented footprint contours relative to `coordinates`.
    #[serde(with = "codec::contour_list")]
    pub fp_contours: Vec<Contour>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_to_nets: Option<BTreeMap<String, Vec<NetId>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touched_traces_list: Option<Vec<NetId>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub erased_pins: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pins_missing: BTreeMap<String, MissingPin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interventions: Vec<Intervention>,
}

impl ComponentMatch {
    /// Covered area of the worst-seated pin; 0 for a match without pins.
    pub fn min_pin_coverage(&self) -> u64 {
        self.pin_coverage.values().copied().min().unwrap_or(0)
    }

    pub fn nets_of_pin(&self, pin: &str) -> &[NetId] {
        self.pin_to_nets
            .as_ref()
            .and_then(|m| m.get(pin))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Footprint contours in board coordinates.
    pub fn board_contours(&self) -> Vec<Contour> {
        self.fp_contours
            .iter()
            .map(|c| c.translated(self.coordinates.x, self.coordinates.y))
            .collect()
    }

    pub fn trace_cuts(&self) -> Vec<TraceCut> {
        self.interventions.iter().filter_map(Intervention::trace_cut).collect()
    }
}
