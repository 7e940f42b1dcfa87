//! Near-miss analysis: placements that need one manual intervention.
//!
//! Each pin is erased in turn and the template searched again. Where the
//! erased pin lands on nothing a solder point is proposed; where it lands on
//! pads shorted to another pin, a straight cut between the two pad groups is
//! tried on the copper of the shared net.

use std::collections::{BTreeMap, BTreeSet};

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use petgraph::unionfind::UnionFind;

use crate::board::{BoardState, NetId, PadId, Side, SideLayers};
use crate::geometry::raster::{and, crop, draw_thick_segment, is_blank, BACKGROUND};
use crate::geometry::{PixelPoint, Rect};

use super::engine::{touched_pads, MatchEngine, MatchMode};
use super::post::{attach_nets, check_isolated_pins};
use super::types::{ComponentMatch, Intervention, MissingPin};

/// Near-miss placements for every pin, excluding those equivalent to one of
/// the `full` matches.
pub fn find_near_misses(engine: &MatchEngine<'_>, full: &[ComponentMatch]) -> Vec<ComponentMatch> {
    let mut found = Vec::new();
    for pin in engine.footprint().pin_labels() {
        let mode = MatchMode::Incomplete {
            erased: vec![pin.clone()],
        };
        let candidates = attach_nets(engine.run(&mode, None), engine.board());
        found.extend(candidates.into_iter().filter_map(|m| analyse(engine, m, &pin)));
    }
    let kept = dedupe_near_misses(found, engine.board(), full);
    tracing::info!("{} near-miss placements", kept.len());
    kept
}

fn analyse(engine: &MatchEngine<'_>, mut m: ComponentMatch, pin: &str) -> Option<ComponentMatch> {
    let board = engine.board();
    let options = engine.options();
    let layers = board.side(m.side)?;
    let oriented = engine.footprint().at(m.orientation)?;
    let erased = oriented.rotated_index_of_pin(pin)?;
    let place = Rect::new(
        m.coordinates.x,
        m.coordinates.y,
        oriented.width() as i32,
        oriented.height() as i32,
    );
    let under = and(&oriented.pad_mask(erased), &crop(&layers.mask_fg, place));

    if !check_isolated_pins(&m, &options.exempt_pin_pairs) {
        return None;
    }

    if is_blank(&under) {
        if !options.allow_solder_points {
            return None;
        }
        m.pins_missing.insert(
            pin.to_string(),
            MissingPin::SolderPoint {
                add_solder_points: true,
            },
        );
        m.interventions.push(Intervention::AddSolderPoint {
            pin: pin.to_string(),
            contour: oriented.contours[erased].translated(m.coordinates.x, m.coordinates.y),
        });
        return Some(m);
    }

    let touched = touched_pads(layers, &under, m.coordinates);
    if touched.is_empty() {
        return None;
    }
    let touched_nets: BTreeSet<NetId> = touched.iter().filter_map(|&p| board.net_of_pad(m.side, p)).collect();
    m.pins_missing.insert(
        pin.to_string(),
        MissingPin::Touched {
            touched_pads: touched.iter().copied().collect(),
            touched_traces: touched_nets.iter().copied().collect(),
        },
    );

    let mut interventions = Vec::new();
    for &net in &touched_nets {
        let mut far: BTreeSet<PadId> = BTreeSet::new();
        for (other, pads) in &m.pin_to_pads {
            let exempt = options
                .exempt_pin_pairs
                .iter()
                .any(|(a, b)| (a == pin && b == other) || (a == other && b == pin));
            if exempt || !m.nets_of_pin(other).contains(&net) {
                continue;
            }
            far.extend(pads.iter().filter(|&&p| board.net_of_pad(m.side, p) == Some(net)));
        }
        if far.is_empty() {
            continue;
        }
        let near: Vec<PadId> = touched
            .iter()
            .copied()
            .filter(|&p| board.net_of_pad(m.side, p) == Some(net))
            .collect();
        let far: Vec<PadId> = far.into_iter().collect();
        let Some((start, end)) = plan_cut(board, layers, net, &near, &far, options.cut_thickness) else {
            tracing::debug!("No feasible cut on net {} for pin {} at {:?}", net, pin, m.coordinates);
            return None;
        };
        interventions.push(Intervention::CutTrace {
            pin: pin.to_string(),
            side: m.side,
            start,
            end,
            near_pads: near,
            far_pads: far,
        });
    }
    if interventions.is_empty() {
        return None;
    }
    m.interventions = interventions;
    Some(m)
}

/// A straight cut separating `near` from `far` pads within `net`, if one
/// exists between their bounding boxes.
///
/// Vertically separated groups get a horizontal cut through the middle of
/// the gap, spanning both boxes; horizontally separated groups get the
/// vertical equivalent. Overlapping boxes get nothing.
pub fn plan_cut(
    board: &BoardState,
    layers: &SideLayers,
    net: NetId,
    near: &[PadId],
    far: &[PadId],
    thickness: u32,
) -> Option<(PixelPoint, PixelPoint)> {
    let a = layers.pads.bounds_of(near)?;
    let b = layers.pads.bounds_of(far)?;
    let (start, end) = if a.bottom() < b.y || b.bottom() < a.y {
        let (upper, lower) = if a.bottom() < b.y { (a, b) } else { (b, a) };
        let y = (upper.bottom() + lower.y) / 2;
        (
            PixelPoint::new(a.x.min(b.x), y),
            PixelPoint::new(a.right().max(b.right()), y),
        )
    } else if a.right() < b.x || b.right() < a.x {
        let (left, right) = if a.right() < b.x { (a, b) } else { (b, a) };
        let x = (left.right() + right.x) / 2;
        (
            PixelPoint::new(x, a.y.min(b.y)),
            PixelPoint::new(x, a.bottom().max(b.bottom())),
        )
    } else {
        return None;
    };
    if cut_separates(board, layers, net, near, far, (start, end), thickness) {
        Some((start, end))
    } else {
        None
    }
}

/// Rasterises the net's copper on `layers.side`, applies the cut and checks
/// that no remaining copper component holds pads of both groups. Components
/// touching a plated hole of the net stay joined through the other side.
pub fn cut_separates(
    board: &BoardState,
    layers: &SideLayers,
    net: NetId,
    near: &[PadId],
    far: &[PadId],
    cut: (PixelPoint, PixelPoint),
    thickness: u32,
) -> bool {
    let Some(regions) = board.nets.get(net).map(|n| n.traces(layers.side)) else {
        return false;
    };
    let Some(bounds) = regions
        .iter()
        .filter_map(|&t| layers.hierarchy.region(t))
        .map(|r| r.bounds)
        .reduce(|a, b| a.union(&b))
    else {
        return false;
    };
    let origin = PixelPoint::new(bounds.x - 1, bounds.y - 1);
    let mut canvas = GrayImage::new(bounds.width as u32 + 2, bounds.height as u32 + 2);
    layers.hierarchy.rasterize(regions, &mut canvas, origin);
    draw_thick_segment(
        &mut canvas,
        cut.0.offset(-origin.x, -origin.y),
        cut.1.offset(-origin.x, -origin.y),
        thickness,
        Luma([BACKGROUND]),
    );

    let labels = connected_components(&canvas, Connectivity::Eight, Luma([BACKGROUND]));
    let label_at = |p: PixelPoint| -> u32 {
        let (x, y) = (p.x - origin.x, p.y - origin.y);
        if x < 0 || y < 0 || x as u32 >= labels.width() || y as u32 >= labels.height() {
            return 0;
        }
        labels.get_pixel(x as u32, y as u32).0[0]
    };
    let count = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize + 1;
    let mut joined: UnionFind<usize> = UnionFind::new(count);

    for hole in board.holes_of_net(net) {
        if hole.kind.is_drill() {
            continue;
        }
        let reach = (hole.diameter_px / 2.0).ceil() as i32 + 1;
        let mut touching = BTreeSet::new();
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let l = label_at(hole.position.offset(dx, dy));
                if l != 0 {
                    touching.insert(l as usize);
                }
            }
        }
        let mut touching = touching.into_iter();
        if let Some(first) = touching.next() {
            for other in touching {
                joined.union(first, other);
            }
        }
    }

    let components_of = |pads: &[PadId]| -> BTreeSet<usize> {
        let mut found = BTreeSet::new();
        for pad in pads.iter().filter_map(|&p| layers.pads.get(p)) {
            let centre = label_at(pad.centre);
            if centre != 0 {
                found.insert(joined.find(centre as usize));
                continue;
            }
            for &p in &pad.contour.points {
                let l = label_at(p);
                if l != 0 {
                    found.insert(joined.find(l as usize));
                }
            }
        }
        found
    };
    let near_components = components_of(near);
    let far_components = components_of(far);
    near_components.is_disjoint(&far_components)
}

/// Drops repeated near-misses and those matching a full placement.
///
/// Two near-misses are the same when they cover the same board pads on the
/// same side, counting the erased pin's touched pads, and propose the same
/// interventions on the board, whichever pin was erased. Pads claimed by a
/// placement that only needs a cut get no solder-point proposals.
fn dedupe_near_misses(found: Vec<ComponentMatch>, board: &BoardState, full: &[ComponentMatch]) -> Vec<ComponentMatch> {
    let assignment = |m: &ComponentMatch| -> BTreeMap<String, Vec<PixelPoint>> {
        let mut a = m.pin_to_pad_centres.clone();
        for (pin, missing) in &m.pins_missing {
            if let MissingPin::Touched { touched_pads, .. } = missing {
                let mut centres: Vec<PixelPoint> = touched_pads
                    .iter()
                    .filter_map(|&p| board.side(m.side).and_then(|l| l.pads.centre(p)))
                    .collect();
                centres.sort_unstable();
                a.insert(pin.clone(), centres);
            }
        }
        a
    };

    let mut kept: Vec<(NearMissKey, ComponentMatch)> = Vec::new();
    for m in found {
        if full.iter().any(|f| f.side == m.side && f.pin_to_pad_centres == assignment(&m)) {
            continue;
        }
        let key = NearMissKey::of(&m);
        match kept.iter_mut().find(|(k, _)| *k == key) {
            Some((_, other)) => {
                if m.min_pin_coverage() > other.min_pin_coverage() {
                    *other = m;
                }
            }
            None => kept.push((key, m)),
        }
    }

    let claimed: BTreeSet<(Side, PadId)> = kept
        .iter()
        .filter(|(_, m)| m.interventions.iter().any(|i| i.trace_cut().is_some()))
        .flat_map(|(k, _)| k.pads.iter().map(move |&p| (k.side, p)))
        .collect();
    let mut out: Vec<ComponentMatch> = kept
        .into_iter()
        .filter(|(k, m)| {
            let solder_only = m.interventions.iter().all(|i| i.trace_cut().is_none());
            !solder_only || k.pads.iter().all(|&p| !claimed.contains(&(k.side, p)))
        })
        .map(|(_, m)| m)
        .collect();
    out.sort_by(|a, b| {
        a.side
            .cmp(&b.side)
            .then_with(|| b.min_pin_coverage().cmp(&a.min_pin_coverage()))
    });
    out
}

/// What a near-miss does to the board, independent of pin labels.
#[derive(Debug, PartialEq, Eq)]
struct NearMissKey {
    side: Side,
    pads: BTreeSet<PadId>,
    cuts: BTreeSet<(PixelPoint, PixelPoint)>,
    solder: BTreeSet<Vec<PixelPoint>>,
}

impl NearMissKey {
    fn of(m: &ComponentMatch) -> Self {
        let mut pads: BTreeSet<PadId> = m.pin_to_pads.values().flatten().copied().collect();
        for missing in m.pins_missing.values() {
            if let MissingPin::Touched { touched_pads, .. } = missing {
                pads.extend(touched_pads.iter().copied());
            }
        }
        let mut cuts = BTreeSet::new();
        let mut solder = BTreeSet::new();
        for intervention in &m.interventions {
            match intervention {
                Intervention::CutTrace { start, end, .. } => {
                    let (a, b) = (*start, *end);
                    cuts.insert((a.min(b), a.max(b)));
                }
                Intervention::AddSolderPoint { contour, .. } => {
                    let mut points = contour.points.clone();
                    points.sort_unstable();
                    solder.insert(points);
                }
            }
        }
        Self {
            side: m.side,
            pads,
            cuts,
            solder,
        }
    }
}
