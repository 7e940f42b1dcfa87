//! Geometry primitives shared by the board model, footprints and the matcher.

pub mod contour;
pub mod raster;

pub use contour::{Containment, Contour, PixelPoint, Rect};
pub use raster::{Island, Moments, TracedContour};
