//! Synthetic boards and footprints shared by the integration tests.
#![allow(dead_code)]

use boardmatch::geometry::raster::{add_border, binarize, dark_to_foreground, rotate_expand, DARK_THRESHOLD, FOREGROUND};
use boardmatch::{BoardInput, MatchOptions, PinLocation};
use image::{GrayImage, Luma};

pub const WHITE: u8 = 255;
pub const BLACK: u8 = 0;

/// Fills `[x, x + w) x [y, y + h)`.
pub fn paint(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, v: u8) {
    for yy in y..y + h {
        for xx in x..x + w {
            img.put_pixel(xx, yy, Luma([v]));
        }
    }
}

pub fn blank(w: u32, h: u32) -> GrayImage {
    GrayImage::from_pixel(w, h, Luma([WHITE]))
}

pub fn options() -> MatchOptions {
    MatchOptions {
        px_per_mm: 10.0,
        ..Default::default()
    }
}

/// Two 8x8 pads, 8 px apart: 24 x 8, 28 x 12 once bordered.
pub fn resistor() -> (GrayImage, Vec<PinLocation>) {
    let mut img = blank(24, 8);
    paint(&mut img, 0, 0, 8, 8, BLACK);
    paint(&mut img, 16, 0, 8, 8, BLACK);
    let pins = vec![
        PinLocation { label: "1".into(), x: -0.8, y: 0.0 },
        PinLocation { label: "2".into(), x: 0.8, y: 0.0 },
    ];
    (img, pins)
}

/// Eight 8x4 pads in two columns of four, pins 1-4 down the left and 5-8 up
/// the right: 40 x 44, 44 x 48 once bordered.
pub fn soic() -> (GrayImage, Vec<PinLocation>) {
    let mut img = blank(40, 44);
    for row in 0..4 {
        paint(&mut img, 0, 2 + 12 * row, 8, 4, BLACK);
        paint(&mut img, 32, 2 + 12 * row, 8, 4, BLACK);
    }
    let ys = [-1.8, -0.6, 0.6, 1.8];
    let mut pins = Vec::new();
    for (i, y) in ys.iter().enumerate() {
        pins.push(PinLocation { label: (i + 1).to_string(), x: -1.6, y: *y });
    }
    for (i, y) in ys.iter().rev().enumerate() {
        pins.push(PinLocation { label: (i + 5).to_string(), x: 1.6, y: *y });
    }
    (img, pins)
}

/// The footprint's pads as foreground after the standard 2 px border,
/// rotated counter-clockwise by `degrees`.
pub fn oriented_alpha(raster: &GrayImage, degrees: f64) -> GrayImage {
    let alpha = dark_to_foreground(&add_border(raster, 2, WHITE));
    if degrees == 0.0 {
        alpha
    } else {
        binarize(&rotate_expand(&alpha, degrees), DARK_THRESHOLD)
    }
}

/// Paints the foreground of `alpha` dark onto `board` at `(x, y)`.
pub fn stamp(board: &mut GrayImage, alpha: &GrayImage, x: u32, y: u32) {
    for (ax, ay, p) in alpha.enumerate_pixels() {
        if p.0[0] == FOREGROUND {
            board.put_pixel(x + ax, y + ay, Luma([BLACK]));
        }
    }
}

/// A board whose copper is exactly its pads.
pub fn pads_only(mask: GrayImage) -> BoardInput {
    let traces = mask.clone();
    BoardInput::single_sided(mask, traces)
}

/// Resistor pads placed at (40, 30) on a 120 x 80 board, optionally joined
/// by a copper bridge between them.
pub fn resistor_board(bridged: bool) -> BoardInput {
    let mut mask = blank(120, 80);
    paint(&mut mask, 42, 32, 8, 8, BLACK);
    paint(&mut mask, 58, 32, 8, 8, BLACK);
    let mut traces = mask.clone();
    if bridged {
        paint(&mut traces, 50, 35, 8, 2, BLACK);
    }
    BoardInput::single_sided(mask, traces)
}

/// Resistor pads stacked vertically at x 42, joined by a narrow bridge.
pub fn stacked_resistor_board() -> BoardInput {
    let mut mask = blank(120, 80);
    paint(&mut mask, 42, 32, 8, 8, BLACK);
    paint(&mut mask, 42, 48, 8, 8, BLACK);
    let mut traces = mask.clone();
    paint(&mut traces, 45, 40, 2, 8, BLACK);
    BoardInput::single_sided(mask, traces)
}
