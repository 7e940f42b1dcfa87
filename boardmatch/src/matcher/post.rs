//! Match post-processing: nets, deduplication, ranking and isolation.

use std::collections::{BTreeMap, BTreeSet};

use crate::board::{BoardState, NetId, Side};

use super::types::ComponentMatch;

/// Fills `pin_to_nets` and `touched_traces_list` from the board's net table.
///
/// A match where some pin has pads but none of them belongs to a net is
/// dropped.
pub fn attach_nets(matches: Vec<ComponentMatch>, board: &BoardState) -> Vec<ComponentMatch> {
    matches
        .into_iter()
        .filter_map(|mut m| {
            let mut pin_to_nets: BTreeMap<String, Vec<NetId>> = BTreeMap::new();
            let mut touched: BTreeSet<NetId> = BTreeSet::new();
            for (pin, pads) in &m.pin_to_pads {
                let nets: BTreeSet<NetId> = pads.iter().filter_map(|&p| board.net_of_pad(m.side, p)).collect();
                if nets.is_empty() {
                    continue;
                }
                touched.extend(nets.iter().copied());
                pin_to_nets.insert(pin.clone(), nets.into_iter().collect());
            }
            let pins_with_pads = m.pin_to_pads.values().filter(|p| !p.is_empty()).count();
            if pin_to_nets.len() < pins_with_pads {
                tracing::debug!("Dropping match at {:?}: a pin has no net", m.coordinates);
                return None;
            }
            m.pin_to_nets = Some(pin_to_nets);
            m.touched_traces_list = Some(touched.into_iter().collect());
            Some(m)
        })
        .collect()
}

/// Keeps one match per (side, pin to pad-centre map), preferring the best
/// seated one, and orders each side by decreasing minimum pin coverage.
/// Front matches come first.
pub fn dedupe_and_rank(matches: Vec<ComponentMatch>) -> Vec<ComponentMatch> {
    let mut out = Vec::new();
    for side in Side::BOTH {
        let mut kept: Vec<ComponentMatch> = Vec::new();
        for m in matches.iter().filter(|m| m.side == side) {
            match kept.iter_mut().find(|k| k.pin_to_pad_centres == m.pin_to_pad_centres) {
                Some(existing) => {
                    if m.min_pin_coverage() > existing.min_pin_coverage() {
                        *existing = m.clone();
                    }
                }
                None => kept.push(m.clone()),
            }
        }
        kept.sort_by(|a, b| b.min_pin_coverage().cmp(&a.min_pin_coverage()));
        out.extend(kept);
    }
    out
}

fn is_exempt(a: &str, b: &str, exempt: &[(String, String)]) -> bool {
    exempt
        .iter()
        .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
}

/// Every (pin, pin, net) triple where two pins share a net.
pub fn conflicting_nets(m: &ComponentMatch, exempt: &[(String, String)]) -> Vec<(String, String, NetId)> {
    let Some(pin_to_nets) = &m.pin_to_nets else {
        return Vec::new();
    };
    let pins: Vec<(&String, &Vec<NetId>)> = pin_to_nets.iter().collect();
    let mut conflicts = Vec::new();
    for (i, (a, nets_a)) in pins.iter().enumerate() {
        for (b, nets_b) in &pins[i + 1..] {
            if is_exempt(a, b, exempt) {
                continue;
            }
            for net in nets_a.iter().filter(|n| nets_b.contains(n)) {
                conflicts.push(((*a).clone(), (*b).clone(), *net));
            }
        }
    }
    conflicts
}

/// True when no two non-exempt pins touch a common net.
pub fn check_isolated_pins(m: &ComponentMatch, exempt: &[(String, String)]) -> bool {
    conflicting_nets(m, exempt).is_empty()
}

/// Drops matches that short two pins together.
pub fn isolated_only(matches: Vec<ComponentMatch>, exempt: &[(String, String)]) -> Vec<ComponentMatch> {
    let before = matches.len();
    let kept: Vec<ComponentMatch> = matches
        .into_iter()
        .filter(|m| check_isolated_pins(m, exempt))
        .collect();
    if kept.len() < before {
        tracing::debug!("{} matches failed the isolation check", before - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::Orientation;
    use crate::geometry::PixelPoint;

    fn with_pins(side: Side, pins: &[(&str, i32, u64, NetId)]) -> ComponentMatch {
        let mut m = ComponentMatch {
            score: 1.0,
            coordinates: PixelPoint::new(0, 0),
            orientation: Orientation::R0,
            side,
            pin_to_pad_centres: BTreeMap::new(),
            pin_to_pads: BTreeMap::new(),
            pin_coverage: BTreeMap::new(),
            fp_contours: Vec::new(),
            pin_to_nets: Some(BTreeMap::new()),
            touched_traces_list: None,
            incomplete: false,
            erased_pins: Vec::new(),
            pins_missing: BTreeMap::new(),
            interventions: Vec::new(),
        };
        for &(pin, x, coverage, net) in pins {
            m.pin_to_pad_centres.insert(pin.into(), vec![PixelPoint::new(x, 0)]);
            m.pin_to_pads.insert(pin.into(), vec![x as usize]);
            m.pin_coverage.insert(pin.into(), coverage);
            if let Some(map) = m.pin_to_nets.as_mut() {
                map.insert(pin.into(), vec![net]);
            }
        }
        m
    }

    #[test]
    fn test_dedupe_keeps_best_seated() {
        let weak = with_pins(Side::Front, &[("1", 0, 10, 0), ("2", 5, 40, 1)]);
        let strong = with_pins(Side::Front, &[("1", 0, 30, 0), ("2", 5, 35, 1)]);
        let other = with_pins(Side::Front, &[("1", 9, 50, 2), ("2", 12, 50, 3)]);
        let back = with_pins(Side::Back, &[("1", 0, 99, 0), ("2", 5, 99, 1)]);

        let ranked = dedupe_and_rank(vec![back.clone(), weak, strong.clone(), other.clone()]);
        assert_eq!(ranked, vec![other, strong, back]);
    }

    #[test]
    fn test_isolation_and_exemptions() {
        let shorted = with_pins(Side::Front, &[("1", 0, 1, 4), ("2", 5, 1, 4), ("3", 8, 1, 5)]);
        assert!(!check_isolated_pins(&shorted, &[]));
        assert_eq!(conflicting_nets(&shorted, &[]), vec![("1".into(), "2".into(), 4)]);
        assert!(check_isolated_pins(&shorted, &[("2".into(), "1".into())]));
    }
}
