//! Input loaders and match persistence.

pub mod codec;
pub mod render;

use std::path::{Path, PathBuf};

use image::GrayImage;
use serde::de::DeserializeOwned;

use crate::board::{BoardBounds, DrillRecord};
use crate::core::BoardMatchError;
use crate::footprint::PinLocation;
use crate::matcher::ComponentMatch;

pub use render::{render_matches, save_render};

/// Returns `path` when it exists, else the file of the same name inside
/// `library`.
pub fn resolve_input(path: &Path, library: Option<&Path>) -> Result<PathBuf, BoardMatchError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let (Some(library), Some(name)) = (library, path.file_name()) {
        let fallback = library.join(name);
        if fallback.exists() {
            tracing::debug!("Using {} from the footprint library", fallback.display());
            return Ok(fallback);
        }
    }
    Err(BoardMatchError::InputMissing(path.to_path_buf()))
}

/// Loads any `image`-readable raster as 8-bit grayscale.
pub fn load_mask(path: &Path, library: Option<&Path>) -> Result<GrayImage, BoardMatchError> {
    let resolved = resolve_input(path, library)?;
    let img = image::open(&resolved)?.to_luma8();
    tracing::debug!("Loaded {} ({}x{})", resolved.display(), img.width(), img.height());
    Ok(img)
}

/// Loads a footprint raster; the white border is added by `Footprint::new`.
pub fn load_footprint_raster(path: &Path, library: Option<&Path>) -> Result<GrayImage, BoardMatchError> {
    load_mask(path, library)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, BoardMatchError> {
    if !path.exists() {
        return Err(BoardMatchError::InputMissing(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn load_pin_table(path: &Path) -> Result<Vec<PinLocation>, BoardMatchError> {
    read_json(path)
}

pub fn load_drill_holes(path: &Path) -> Result<Vec<DrillRecord>, BoardMatchError> {
    read_json(path)
}

pub fn load_board_bounds(path: &Path) -> Result<BoardBounds, BoardMatchError> {
    let bounds: BoardBounds = read_json(path)?;
    if bounds.width <= 0.0 || bounds.height <= 0.0 {
        return Err(BoardMatchError::InvalidInput(format!(
            "board bounds must have a positive size, got {} x {}",
            bounds.width, bounds.height
        )));
    }
    Ok(bounds)
}

pub fn save_matches(path: &Path, matches: &[ComponentMatch]) -> Result<(), BoardMatchError> {
    let json = serde_json::to_string_pretty(matches)?;
    std::fs::write(path, json)?;
    tracing::info!("Saved {} matches to {}", matches.len(), path.display());
    Ok(())
}

pub fn load_matches(path: &Path) -> Result<Vec<ComponentMatch>, BoardMatchError> {
    read_json(path)
}
