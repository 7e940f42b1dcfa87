//! The board connectivity model: pads, copper regions, holes and nets.

pub mod holes;
pub mod model;
pub mod nets;
pub mod pads;
pub mod traces;

pub use holes::{BoardBounds, DrillRecord, Hole, HoleKind};
pub use model::{BoardInput, BoardModel, BoardState, Side, SideLayers, TraceCut};
pub use nets::{Net, NetId, NetTable};
pub use pads::{Pad, PadId, PadMap};
pub use traces::{CopperRegion, Cutout, CutoutKind, TraceHierarchy, TraceId};
