//! boardmatch - locate component footprints on rasterised PCB layers
//!
//! Given solder-mask and copper rasters of a board, a footprint raster with
//! its pin table, and optionally the drill holes, this library finds every
//! placement where the footprint can be soldered with each pin on its own
//! net, and proposes single interventions (a solder point or a trace cut)
//! for placements that are one pin short.
//!
//! # Quick Start
//!
//! ```no_run
//! use boardmatch::{io, BoardInput, MatchOptions, MatchSession};
//! use std::path::Path;
//!
//! let options = MatchOptions::default();
//! let input = BoardInput::single_sided(
//!     io::load_mask(Path::new("front_mask.png"), None).unwrap(),
//!     io::load_mask(Path::new("front_traces.png"), None).unwrap(),
//! );
//! let raster = io::load_footprint_raster(Path::new("soic8.png"), None).unwrap();
//! let pins = io::load_pin_table(Path::new("soic8.json")).unwrap();
//!
//! let session = MatchSession::from_input(input, &raster, pins, options).unwrap();
//! for m in session.get_matches() {
//!     println!("{} at {:?}, {} degrees", m.side, m.coordinates, m.orientation);
//! }
//! ```
//!
//! # Features
//!
//! - **Board model**: pads, copper region hierarchy, via and through-hole net fusion
//! - **Matching**: eight orientations, pad/pin assignment, isolation filtering
//! - **Near-misses**: solder-point and trace-cut proposals with feasibility checks
//! - **Net-scoped search**: matches around a pad or along a net
//! - **Trace-cut simulation**: apply cuts to the board and revert them

pub mod board;
pub mod core;
pub mod footprint;
pub mod geometry;
pub mod io;
pub mod matcher;

// Re-export main types
pub use board::{BoardBounds, BoardInput, BoardModel, BoardState, DrillRecord, HoleKind, NetTable, Side, TraceCut};
pub use core::{BoardMatchError, CancelFlag, MatchOptions, MatchSession};
pub use footprint::{Footprint, Orientation, PinLocation};
pub use matcher::{ComponentMatch, Intervention, MissingPin};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardInput, BoardMatchError, ComponentMatch, Intervention, MatchOptions, MatchSession, Orientation,
        PinLocation, Side, TraceCut,
    };
}
