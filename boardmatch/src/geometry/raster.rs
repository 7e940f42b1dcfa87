//! Binary raster helpers built on `image` and `imageproc`.
//!
//! Rasters are 8-bit grayscale. After binarisation every pixel is either
//! [`BACKGROUND`] or [`FOREGROUND`]; contour tracing treats any non-zero
//! pixel as foreground.

use std::collections::BTreeMap;

use image::{GrayImage, ImageBuffer, Luma, Pixel};
use imageproc::contours::{find_contours, BorderType};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::contour::{Contour, PixelPoint, Rect};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Pixel intensity below which a board or footprint pixel counts as dark.
pub const DARK_THRESHOLD: u8 = 128;

pub fn invert(img: &GrayImage) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = 255 - p.0[0];
    }
    out
}

/// Maps every pixel to [`FOREGROUND`] when `>= threshold`, else [`BACKGROUND`].
pub fn binarize(img: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = if p.0[0] >= threshold { FOREGROUND } else { BACKGROUND };
    }
    out
}

/// Inverts a dark-on-light drawing into a binary light-on-dark one.
pub fn dark_to_foreground(img: &GrayImage) -> GrayImage {
    binarize(&invert(img), 255 - DARK_THRESHOLD + 1)
}

pub fn count_foreground(img: &GrayImage) -> u64 {
    img.pixels().filter(|p| p.0[0] == FOREGROUND).count() as u64
}

pub fn is_blank(img: &GrayImage) -> bool {
    img.pixels().all(|p| p.0[0] == BACKGROUND)
}

/// Copies `rect` out of `img`. Parts of `rect` outside the image read as background.
pub fn crop(img: &GrayImage, rect: Rect) -> GrayImage {
    let mut out = GrayImage::new(rect.width.max(0) as u32, rect.height.max(0) as u32);
    let (w, h) = img.dimensions();
    let visible = rect.clip(w, h);
    for y in visible.y..visible.y + visible.height {
        for x in visible.x..visible.x + visible.width {
            let v = img.get_pixel(x as u32, y as u32).0[0];
            out.put_pixel((x - rect.x) as u32, (y - rect.y) as u32, Luma([v]));
        }
    }
    out
}

/// Pixelwise AND of two equally sized rasters.
pub fn and(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = a.clone();
    for (o, p) in out.pixels_mut().zip(b.pixels()) {
        o.0[0] &= p.0[0];
    }
    out
}

pub fn add_border(img: &GrayImage, border: u32, value: u8) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::from_pixel(w + 2 * border, h + 2 * border, Luma([value]));
    for (x, y, p) in img.enumerate_pixels() {
        out.put_pixel(x + border, y + border, *p);
    }
    out
}

fn snap(v: f64) -> f64 {
    if v.abs() < 1e-12 {
        0.0
    } else if (v.abs() - 1.0).abs() < 1e-12 {
        v.signum()
    } else {
        v
    }
}

/// Rotates counter-clockwise (as displayed) about the centre onto a canvas
/// large enough to hold the whole source.
///
/// The output is `floor(h|sin| + w|cos|)` wide and `floor(h|cos| + w|sin|)`
/// tall, the source centre lands on the output centre and pixels sampled
/// from outside the source read as zero. Off-axis angles are resampled
/// bilinearly; quarter turns are exact pixel permutations.
pub fn rotate_expand(img: &GrayImage, degrees: f64) -> GrayImage {
    let (w, h) = img.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = (snap(theta.sin()), snap(theta.cos()));
    let nw = (h as f64 * sin.abs() + w as f64 * cos.abs()).floor() as u32;
    let nh = (h as f64 * cos.abs() + w as f64 * sin.abs()).floor() as u32;

    // source pixel centre to output pixel centre, y pointing down
    let (scx, scy) = ((w as f64 - 1.0) / 2.0, (h as f64 - 1.0) / 2.0);
    let (dcx, dcy) = ((nw as f64 - 1.0) / 2.0, (nh as f64 - 1.0) / 2.0);
    let tx = dcx - (cos * scx + sin * scy);
    let ty = dcy - (-sin * scx + cos * scy);
    #[rustfmt::skip]
    let matrix = [
        cos as f32, sin as f32, tx as f32,
        -sin as f32, cos as f32, ty as f32,
        0.0, 0.0, 1.0,
    ];
    let mut out = GrayImage::new(nw, nh);
    let Some(projection) = Projection::from_matrix(matrix) else {
        return out;
    };
    let interpolation = if sin == 0.0 || cos == 0.0 {
        Interpolation::Nearest
    } else {
        Interpolation::Bilinear
    };
    warp_into(img, &projection, interpolation, Luma([BACKGROUND]), &mut out);
    out
}

/// One border found by Suzuki-Abe border following.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedContour {
    pub contour: Contour,
    pub is_hole: bool,
    /// Index of the enclosing border in the same trace, if any.
    pub parent: Option<usize>,
}

/// Full border hierarchy of the foreground, in raster-scan discovery order.
pub fn contour_tree(img: &GrayImage) -> Vec<TracedContour> {
    find_contours::<i32>(img)
        .into_iter()
        .map(|c| TracedContour {
            contour: Contour::new(c.points.into_iter().map(PixelPoint::from).collect()),
            is_hole: c.border_type == BorderType::Hole,
            parent: c.parent,
        })
        .collect()
}

/// Outermost borders only, in deterministic raster-scan order.
pub fn external_contours(img: &GrayImage) -> Vec<Contour> {
    contour_tree(img)
        .into_iter()
        .filter(|c| !c.is_hole && c.parent.is_none())
        .map(|c| c.contour)
        .collect()
}

/// Fills the polygon through the contour points, boundary included.
pub fn fill_contour(canvas: &mut GrayImage, contour: &Contour, value: u8) {
    let mut poly = contour.to_imageproc();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    match poly.len() {
        0 => {}
        1 => {
            let p = poly[0];
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height() {
                canvas.put_pixel(p.x as u32, p.y as u32, Luma([value]));
            }
        }
        _ => draw_polygon_mut(canvas, &poly, Luma([value])),
    }
}

/// Filled mask of a contour on a canvas of the given size.
pub fn contour_mask(contour: &Contour, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    fill_contour(&mut mask, contour, FOREGROUND);
    mask
}

/// Filled mask covering only the contour's bounding rectangle.
pub fn local_contour_mask(contour: &Contour) -> (GrayImage, Rect) {
    let rect = contour.bounding_rect();
    let mask = contour_mask(
        &contour.translated(-rect.x, -rect.y),
        rect.width.max(0) as u32,
        rect.height.max(0) as u32,
    );
    (mask, rect)
}

/// Draws a straight segment `thickness` pixels wide, thickened downwards
/// for mostly horizontal segments and rightwards otherwise.
pub fn draw_thick_segment<P: Pixel>(
    canvas: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    start: PixelPoint,
    end: PixelPoint,
    thickness: u32,
    colour: P,
) {
    let horizontal = (end.x - start.x).abs() >= (end.y - start.y).abs();
    for t in 0..thickness.max(1) as i32 {
        let (dx, dy) = if horizontal { (0, t) } else { (t, 0) };
        draw_line_segment_mut(
            canvas,
            ((start.x + dx) as f32, (start.y + dy) as f32),
            ((end.x + dx) as f32, (end.y + dy) as f32),
            colour,
        );
    }
}

/// Binary raster moments up to first order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    pub fn add(&mut self, x: f64, y: f64) {
        self.m00 += 1.0;
        self.m10 += x;
        self.m01 += y;
    }

    /// `(m10/m00, m01/m00)` rounded; `None` for an empty region.
    pub fn centroid(&self) -> Option<PixelPoint> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(PixelPoint::new(
            (self.m10 / self.m00).round() as i32,
            (self.m01 / self.m00).round() as i32,
        ))
    }
}

pub fn raster_moments(img: &GrayImage) -> Moments {
    let mut m = Moments::default();
    for (x, y, p) in img.enumerate_pixels() {
        if p.0[0] != BACKGROUND {
            m.add(x as f64, y as f64);
        }
    }
    m
}

/// An 8-connected foreground component.
#[derive(Debug, Clone, PartialEq)]
pub struct Island {
    pub area: u64,
    pub centroid: PixelPoint,
    pub pixels: Vec<(u32, u32)>,
}

/// Connected foreground components ordered by first appearance in scan order.
pub fn islands(img: &GrayImage) -> Vec<Island> {
    let labels = connected_components(img, Connectivity::Eight, Luma([BACKGROUND]));
    let mut slot_of: BTreeMap<u32, usize> = BTreeMap::new();
    let mut found: Vec<(Moments, Vec<(u32, u32)>)> = Vec::new();
    for (x, y, l) in labels.enumerate_pixels() {
        if l.0[0] == 0 {
            continue;
        }
        let slot = *slot_of.entry(l.0[0]).or_insert_with(|| {
            found.push(Default::default());
            found.len() - 1
        });
        found[slot].0.add(x as f64, y as f64);
        found[slot].1.push((x, y));
    }
    found
        .into_iter()
        .filter_map(|(m, pixels)| {
            m.centroid().map(|centroid| Island {
                area: m.m00 as u64,
                centroid,
                pixels,
            })
        })
        .collect()
}
