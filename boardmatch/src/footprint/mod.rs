//! Footprint templates: pad contours, pin binding and the eight orientations.

pub mod orientation;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::core::{BoardMatchError, MatchOptions};
use crate::geometry::raster::{add_border, dark_to_foreground, external_contours};
use crate::geometry::{Contour, PixelPoint};

pub use orientation::{Orientation, OrientedFootprint};

/// One row of a footprint pin table, in footprint-local millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinLocation {
    pub label: String,
    pub x: f64,
    pub y: f64,
}

/// A pin label bound to an original footprint contour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinBinding {
    pub label: String,
    pub contour: usize,
}

/// A component footprint ready for matching.
#[derive(Debug, Clone)]
pub struct Footprint {
    /// Bordered raster, pads dark on light.
    pub raster: GrayImage,
    /// Binary inverse of `raster`, pads as foreground.
    pub alpha: GrayImage,
    pub contours: Vec<Contour>,
    pub pins: Vec<PinLocation>,
    pub bindings: Vec<PinBinding>,
    labels: Vec<Option<String>>,
    oriented: Vec<OrientedFootprint>,
}

impl Footprint {
    pub fn new(raster: &GrayImage, pins: Vec<PinLocation>, options: &MatchOptions) -> Result<Self, BoardMatchError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(BoardMatchError::InvalidInput("footprint raster is empty".to_string()));
        }
        let bordered = add_border(raster, options.footprint_border, 255);
        let alpha = dark_to_foreground(&bordered);
        let contours: Vec<Contour> = external_contours(&alpha)
            .into_iter()
            .filter(|c| {
                if c.is_degenerate() {
                    tracing::debug!("Skipping zero-area footprint contour");
                }
                !c.is_degenerate()
            })
            .collect();
        if contours.is_empty() {
            return Err(BoardMatchError::InvalidInput("footprint has no pads".to_string()));
        }

        let (w, h) = bordered.dimensions();
        let pin_pixels: Vec<(String, PixelPoint)> = pins
            .iter()
            .map(|p| (p.label.clone(), pin_to_pixel(p, options.px_per_mm, w, h)))
            .collect();
        let bindings = bind_pins(&contours, &pin_pixels);

        let mut labels: Vec<Option<String>> = vec![None; contours.len()];
        if bindings.is_empty() {
            if !pins.is_empty() {
                tracing::warn!("No pin of the pin table lands on a footprint pad; numbering pads instead");
            }
            for (i, label) in labels.iter_mut().enumerate() {
                *label = Some((i + 1).to_string());
            }
        } else {
            for binding in &bindings {
                match &labels[binding.contour] {
                    None => labels[binding.contour] = Some(binding.label.clone()),
                    Some(existing) => tracing::debug!(
                        "Pin {} shares pad {} with pin {}",
                        binding.label,
                        binding.contour,
                        existing
                    ),
                }
            }
            for (label, _) in &pin_pixels {
                if !bindings.iter().any(|b| &b.label == label) {
                    tracing::warn!("Pin {} does not land on any footprint pad", label);
                }
            }
        }

        let mut orientations = options.orientations.clone();
        orientations.sort();
        orientations.dedup();
        let oriented = orientations
            .into_iter()
            .map(|o| OrientedFootprint::build(o, &alpha, &contours, &labels))
            .collect();

        tracing::debug!(
            "Footprint {}x{}: {} pads, {} pins bound",
            w,
            h,
            contours.len(),
            bindings.len()
        );
        Ok(Self {
            raster: bordered,
            alpha,
            contours,
            pins,
            bindings,
            labels,
            oriented,
        })
    }

    pub fn width(&self) -> u32 {
        self.alpha.width()
    }

    pub fn height(&self) -> u32 {
        self.alpha.height()
    }

    pub fn pad_count(&self) -> usize {
        self.contours.len()
    }

    pub fn oriented(&self) -> &[OrientedFootprint] {
        &self.oriented
    }

    pub fn at(&self, orientation: Orientation) -> Option<&OrientedFootprint> {
        self.oriented.iter().find(|o| o.orientation == orientation)
    }

    /// Label of an original contour, if a pin is bound to it.
    pub fn label_of(&self, contour: usize) -> Option<&str> {
        self.labels.get(contour).and_then(|l| l.as_deref())
    }

    /// Labels of all bound contours in contour order.
    pub fn pin_labels(&self) -> Vec<String> {
        self.labels.iter().flatten().cloned().collect()
    }

    /// Original contour bound to `label`.
    pub fn contour_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.as_deref() == Some(label))
    }
}

fn pin_to_pixel(pin: &PinLocation, px_per_mm: f64, width: u32, height: u32) -> PixelPoint {
    PixelPoint::new(
        (pin.x * px_per_mm + width as f64 / 2.0).round() as i32,
        (pin.y * px_per_mm + height as f64 / 2.0).round() as i32,
    )
}

/// Binds each pin to the first contour strictly containing it, retrying with
/// edge coincidence accepted when some pins stay unbound.
pub fn bind_pins(contours: &[Contour], pins: &[(String, PixelPoint)]) -> Vec<PinBinding> {
    let pass = |edge_inside: bool| -> Vec<PinBinding> {
        pins.iter()
            .filter_map(|(label, p)| {
                contours
                    .iter()
                    .position(|c| c.contains(*p, edge_inside))
                    .map(|contour| PinBinding {
                        label: label.clone(),
                        contour,
                    })
            })
            .collect()
    };
    let strict = pass(false);
    if strict.len() < pins.len() {
        let relaxed = pass(true);
        if relaxed.len() > strict.len() {
            return relaxed;
        }
    }
    strict
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Three 6x4 pads in an L, with the pin table centred on each.
    fn l_shape() -> (GrayImage, Vec<PinLocation>) {
        let mut img = GrayImage::from_pixel(20, 20, Luma([255]));
        let pads = [(1, 1), (13, 1), (1, 15)];
        for (px, py) in pads {
            for y in py..py + 4 {
                for x in px..px + 6 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        // bordered 24 x 24, centre (12, 12); pad centres at +2 border
        let pins = vec![
            PinLocation { label: "A".into(), x: -0.7, y: -0.7 },
            PinLocation { label: "B".into(), x: 0.5, y: -0.7 },
            PinLocation { label: "C".into(), x: -0.7, y: 0.7 },
        ];
        (img, pins)
    }

    fn options() -> MatchOptions {
        MatchOptions {
            px_per_mm: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_binds_every_pin() {
        let (img, pins) = l_shape();
        let fp = Footprint::new(&img, pins, &options()).expect("footprint");
        assert_eq!(fp.pad_count(), 3);
        assert_eq!(fp.bindings.len(), 3);
        assert_eq!(fp.oriented().len(), 8);
        let a = fp.contour_of("A").expect("A bound");
        assert!(fp.contours[a].bounding_rect().contains(PixelPoint::new(5, 5)));
    }

    #[test]
    fn test_quarter_turns_are_bijective() {
        let (img, pins) = l_shape();
        let fp = Footprint::new(&img, pins, &options()).expect("footprint");
        for o in [Orientation::R90, Orientation::R180, Orientation::R270] {
            let oriented = fp.at(o).expect("orientation");
            let mut originals: Vec<usize> = oriented.to_original.iter().flatten().copied().collect();
            originals.sort_unstable();
            assert_eq!(originals, vec![0, 1, 2], "at {}", o);
            for label in ["A", "B", "C"] {
                let rotated = oriented.rotated_index_of_pin(label).expect("label present");
                assert_eq!(oriented.to_original[rotated], fp.contour_of(label));
            }
        }
    }

    #[test]
    fn test_unbound_table_numbers_pads() {
        let (img, _) = l_shape();
        let fp = Footprint::new(&img, Vec::new(), &options()).expect("footprint");
        assert_eq!(fp.pin_labels(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_edge_pins_bind_on_relaxed_pass() {
        let square = Contour::new(vec![
            PixelPoint::new(0, 0),
            PixelPoint::new(0, 4),
            PixelPoint::new(4, 4),
            PixelPoint::new(4, 0),
        ]);
        let pins = vec![
            ("1".to_string(), PixelPoint::new(2, 2)),
            ("2".to_string(), PixelPoint::new(4, 2)),
        ];
        let bound = bind_pins(&[square], &pins);
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_blank_raster_is_rejected() {
        let img = GrayImage::from_pixel(10, 10, Luma([255]));
        assert!(Footprint::new(&img, Vec::new(), &options()).is_err());
    }
}
