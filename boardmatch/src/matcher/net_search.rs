//! Searches restricted to the neighbourhood of a pad or the pads of a net.

use crate::board::{NetId, PadId, Side, SideLayers};
use crate::footprint::Footprint;
use crate::geometry::Rect;

use super::engine::{MatchEngine, MatchMode};
use super::post::{attach_nets, dedupe_and_rank, isolated_only};
use super::types::ComponentMatch;

/// Square window `crop_factor` times the largest oriented footprint side,
/// centred on the pad and clipped to the board.
pub fn pad_window(footprint: &Footprint, layers: &SideLayers, pad: PadId, crop_factor: u32) -> Option<Rect> {
    let centre = layers.pads.centre(pad)?;
    let extent = footprint
        .oriented()
        .iter()
        .map(|o| o.width().max(o.height()))
        .max()
        .unwrap_or_else(|| footprint.width().max(footprint.height()));
    let size = (extent * crop_factor.max(1)) as i32;
    let window = Rect::new(centre.x - size / 2, centre.y - size / 2, size, size).clip(layers.width(), layers.height());
    if window.is_empty() {
        None
    } else {
        Some(window)
    }
}

fn pin_uses_pad(m: &ComponentMatch, pad: PadId, pins: &[String]) -> bool {
    if pins.is_empty() {
        return m.pin_to_pads.values().any(|pads| pads.contains(&pad));
    }
    pins.iter()
        .any(|pin| m.pin_to_pads.get(pin).map(|pads| pads.contains(&pad)).unwrap_or(false))
}

fn pin_touches_net(m: &ComponentMatch, net: NetId, pins: &[String]) -> bool {
    if pins.is_empty() {
        return m
            .touched_traces_list
            .as_ref()
            .map(|nets| nets.contains(&net))
            .unwrap_or(false);
    }
    pins.iter().any(|pin| m.nets_of_pin(pin).contains(&net))
}

fn around_pad(engine: &MatchEngine<'_>, side: Side, pad: PadId) -> Vec<ComponentMatch> {
    let Some(layers) = engine.board().side(side) else {
        return Vec::new();
    };
    let Some(window) = pad_window(engine.footprint(), layers, pad, engine.options().crop_factor) else {
        return Vec::new();
    };
    tracing::debug!("Searching {} pad {} inside {:?}", side, pad, window);
    engine.run_side(side, &MatchMode::Full, Some(window))
}

/// Valid matches where one of `pins` (any pin when empty) sits on `pad`.
pub fn matches_on_pad(engine: &MatchEngine<'_>, side: Side, pad: PadId, pins: &[String]) -> Vec<ComponentMatch> {
    let candidates: Vec<ComponentMatch> = attach_nets(around_pad(engine, side, pad), engine.board())
        .into_iter()
        .filter(|m| pin_uses_pad(m, pad, pins))
        .collect();
    isolated_only(dedupe_and_rank(candidates), &engine.options().exempt_pin_pairs)
}

/// Valid matches where one of `pins` (any pin when empty) touches `net`.
///
/// Small nets are searched pad by pad; larger ones fall back to a full
/// board search.
pub fn matches_on_net(engine: &MatchEngine<'_>, net: NetId, pins: &[String]) -> Vec<ComponentMatch> {
    let board = engine.board();
    let Some(target) = board.nets.get(net) else {
        tracing::warn!("Unknown net {}", net);
        return Vec::new();
    };
    let raw = if target.pad_count() <= engine.options().net_crop_max_pads {
        let mut raw = Vec::new();
        for side in Side::BOTH {
            for &pad in target.pads(side) {
                if board.is_ignored(side, pad) {
                    continue;
                }
                raw.extend(around_pad(engine, side, pad));
            }
        }
        raw
    } else {
        tracing::debug!("Net {} has {} pads; searching the whole board", net, target.pad_count());
        engine.run(&MatchMode::Full, None)
    };
    let candidates: Vec<ComponentMatch> = attach_nets(raw, board)
        .into_iter()
        .filter(|m| pin_touches_net(m, net, pins))
        .collect();
    isolated_only(dedupe_and_rank(candidates), &engine.options().exempt_pin_pairs)
}
