//! Match overlays drawn on top of a board raster.

use std::path::Path;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};

use crate::core::BoardMatchError;
use crate::geometry::raster::draw_thick_segment;
use crate::geometry::Contour;
use crate::matcher::{ComponentMatch, Intervention};

const OUTLINE: Rgb<u8> = Rgb([0, 200, 0]);
const INTERVENTION: Rgb<u8> = Rgb([255, 220, 0]);
const CUT_WIDTH: u32 = 2;

fn outline(canvas: &mut RgbImage, contour: &Contour, colour: Rgb<u8>) {
    let points = &contour.points;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        draw_line_segment_mut(canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), colour);
    }
}

fn fill(canvas: &mut RgbImage, contour: &Contour, colour: Rgb<u8>) {
    let mut poly = contour.to_imageproc();
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() < 3 {
        outline(canvas, contour, colour);
    } else {
        draw_polygon_mut(canvas, &poly, colour);
    }
}

/// The board raster in colour with every match and intervention drawn on it.
pub fn render_matches(base: &GrayImage, matches: &[ComponentMatch]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(base.clone()).to_rgb8();
    for m in matches {
        for contour in m.board_contours() {
            outline(&mut canvas, &contour, OUTLINE);
        }
        for intervention in &m.interventions {
            match intervention {
                Intervention::AddSolderPoint { contour, .. } => fill(&mut canvas, contour, INTERVENTION),
                Intervention::CutTrace { start, end, .. } => {
                    draw_thick_segment(&mut canvas, *start, *end, CUT_WIDTH, INTERVENTION)
                }
            }
        }
    }
    canvas
}

pub fn save_render(path: &Path, base: &GrayImage, matches: &[ComponentMatch]) -> Result<(), BoardMatchError> {
    render_matches(base, matches).save(path)?;
    tracing::info!("Rendered {} matches to {}", matches.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Side;
    use crate::footprint::Orientation;
    use crate::geometry::PixelPoint;
    use image::Luma;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_draws_outline_and_cut() {
        let base = GrayImage::from_pixel(30, 30, Luma([255]));
        let square = Contour::new(vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(0, 5),
            PixelPoint::new(5, 5),
            PixelPoint::new(5, 0),
        ]);
        let m = ComponentMatch {
            score: 1.0,
            coordinates: PixelPoint::new(10, 10),
            orientation: Orientation::R0,
            side: Side::Front,
            pin_to_pad_centres: BTreeMap::new(),
            pin_to_pads: BTreeMap::new(),
            pin_coverage: BTreeMap::new(),
            fp_contours: vec![square],
            pin_to_nets: None,
            touched_traces_list: None,
            incomplete: true,
            erased_pins: vec!["1".into()],
            pins_missing: BTreeMap::new(),
            interventions: vec![Intervention::CutTrace {
                pin: "1".into(),
                side: Side::Front,
                start: PixelPoint::new(2, 25),
                end: PixelPoint::new(20, 25),
                near_pads: vec![],
                far_pads: vec![],
            }],
        };
        let out = render_matches(&base, &[m]);
        assert_eq!(out.dimensions(), (30, 30));
        assert_eq!(*out.get_pixel(10, 12), OUTLINE);
        assert_eq!(*out.get_pixel(12, 12), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(8, 25), INTERVENTION);
        assert_eq!(*out.get_pixel(8, 26), INTERVENTION);
    }
}
