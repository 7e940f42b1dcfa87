//! Session-level API shared by the CLI and any other front end.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::board::{BoardInput, BoardModel, BoardState, NetId, PadId, Side, TraceCut};
use crate::footprint::{Footprint, Orientation, PinLocation};
use crate::matcher::{
    attach_nets, check_isolated_pins, dedupe_and_rank, find_near_misses, isolated_only, matches_on_net,
    matches_on_pad, ComponentMatch, MatchEngine, MatchMode,
};

#[derive(Debug, thiserror::Error)]
pub enum BoardMatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Input not found: {}", .0.display())]
    InputMissing(PathBuf),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Contour codec error: {0}")]
    ContourCodec(String),
}

/// Tunables for a matching session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchOptions {
    /// Footprint pin-table scale.
    pub px_per_mm: f64,
    pub full_threshold: f64,
    pub incomplete_threshold: f64,
    /// Fraction of each footprint pad that must land on copper.
    pub coverage_ratio: f64,
    pub stride_template_divisor: u32,
    pub stride_search_divisor: u32,
    /// White margin added around the footprint raster.
    pub footprint_border: u32,
    /// Pad-scoped search window, in multiples of the footprint size.
    pub crop_factor: u32,
    /// Largest net searched pad by pad.
    pub net_crop_max_pads: usize,
    pub cut_thickness: u32,
    /// Pin pairs allowed to share a net.
    pub exempt_pin_pairs: Vec<(String, String)>,
    pub allow_solder_points: bool,
    pub orientations: Vec<Orientation>,
    /// Directory searched when an input path does not exist.
    pub footprint_library: Option<PathBuf>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            px_per_mm: 48.0,
            full_threshold: 0.15,
            incomplete_threshold: 0.30,
            coverage_ratio: 0.5,
            stride_template_divisor: 20,
            stride_search_divisor: 140,
            footprint_border: 2,
            crop_factor: 4,
            net_crop_max_pads: 10,
            cut_thickness: 2,
            exempt_pin_pairs: vec![],
            allow_solder_points: true,
            orientations: Orientation::ALL.to_vec(),
            footprint_library: None,
        }
    }
}

impl MatchOptions {
    pub fn from_json_file(path: &Path) -> Result<Self, BoardMatchError> {
        if !path.exists() {
            return Err(BoardMatchError::InputMissing(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let options: MatchOptions = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), BoardMatchError> {
        if self.px_per_mm.is_nan() || self.px_per_mm <= 0.0 {
            return Err(BoardMatchError::InvalidInput("px_per_mm must be positive".to_string()));
        }
        if self.orientations.is_empty() {
            return Err(BoardMatchError::InvalidInput("no orientations selected".to_string()));
        }
        Ok(())
    }
}

/// Cooperative cancellation, checked between score peaks and orientations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A board, a footprint and the options to match one against the other.
#[derive(Debug, Clone)]
pub struct MatchSession {
    board: BoardModel,
    footprint: Footprint,
    options: MatchOptions,
    cancel: CancelFlag,
}

impl MatchSession {
    pub fn new(board: BoardState, footprint: Footprint, options: MatchOptions) -> Self {
        Self {
            board: BoardModel::new(board),
            footprint,
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Ingests the board and builds the footprint in one step.
    pub fn from_input(
        input: BoardInput,
        footprint_raster: &GrayImage,
        pins: Vec<PinLocation>,
        options: MatchOptions,
    ) -> Result<Self, BoardMatchError> {
        options.validate()?;
        let board = BoardState::ingest(input)?;
        let footprint = Footprint::new(footprint_raster, pins, &options)?;
        Ok(Self::new(board, footprint, options))
    }

    pub fn board(&self) -> &BoardModel {
        &self.board
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// A handle other threads can use to stop a running search.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn set_footprint(&mut self, raster: &GrayImage, pins: Vec<PinLocation>) -> Result<(), BoardMatchError> {
        self.footprint = Footprint::new(raster, pins, &self.options)?;
        Ok(())
    }

    fn engine(&self) -> MatchEngine<'_> {
        MatchEngine::new(self.board.current(), &self.footprint, &self.options).with_cancel(self.cancel.clone())
    }

    /// Deduplicated full-match candidates with nets attached, before the
    /// isolation check.
    pub fn get_candidates(&self) -> Vec<ComponentMatch> {
        let engine = self.engine();
        let raw = engine.run(&MatchMode::Full, None);
        dedupe_and_rank(attach_nets(raw, self.board.current()))
    }

    /// Every placement where each pin lands on its own net.
    pub fn get_matches(&self) -> Vec<ComponentMatch> {
        let matches = isolated_only(self.get_candidates(), &self.options.exempt_pin_pairs);
        tracing::info!("{} matches", matches.len());
        matches
    }

    /// Placements that become valid after one added solder point or trace cuts.
    pub fn get_near_misses(&self) -> Vec<ComponentMatch> {
        let full = self.get_matches();
        find_near_misses(&self.engine(), &full)
    }

    /// Full matches followed by near-misses.
    pub fn get_matches_with_interventions(&self) -> Vec<ComponentMatch> {
        let mut matches = self.get_matches();
        let near = find_near_misses(&self.engine(), &matches);
        matches.extend(near);
        matches
    }

    pub fn matches_on_pad(&self, side: Side, pad: PadId, pins: &[String]) -> Vec<ComponentMatch> {
        matches_on_pad(&self.engine(), side, pad, pins)
    }

    pub fn matches_on_net(&self, net: NetId, pins: &[String]) -> Vec<ComponentMatch> {
        matches_on_net(&self.engine(), net, pins)
    }

    /// Isolation check against the current net table.
    pub fn check_isolated_pins(&self, m: &ComponentMatch) -> bool {
        let with_nets;
        let m = if m.pin_to_nets.is_some() {
            m
        } else {
            with_nets = attach_nets(vec![m.clone()], self.board.current());
            match with_nets.first() {
                Some(m) => m,
                None => return false,
            }
        };
        check_isolated_pins(m, &self.options.exempt_pin_pairs)
    }

    pub fn integrate_trace_cuts(&mut self, cuts: &[TraceCut]) {
        self.board.integrate_trace_cuts(cuts, self.options.cut_thickness);
    }

    /// Applies every cut proposed by a near-miss.
    pub fn integrate_interventions(&mut self, m: &ComponentMatch) {
        let cuts = m.trace_cuts();
        if !cuts.is_empty() {
            self.integrate_trace_cuts(&cuts);
        }
    }

    pub fn revert(&mut self) -> bool {
        self.board.revert()
    }

    pub fn revert_original(&mut self) -> bool {
        self.board.revert_original()
    }
}
