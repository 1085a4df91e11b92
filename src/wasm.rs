//! WASM bindings for browser integration.
//!
//! JavaScript-friendly wrappers around band-gap detection on a precomputed cell.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;

use crate::config::BandGapOptions;
use crate::gaps::GapKind;
use crate::precomputed::{detect_band_gaps_json, PrecomputedInput};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Detect band gaps of a precomputed unit cell.
///
/// # Arguments
/// * `input_json` - `{"cell": {...}, "eigs": [...], "options": {...}}`, with an
///   optional `"christoffel"` tensor given row by row
///
/// # Returns
/// JSON band report: interval logs, gaps, kinds and frequency ranges
#[wasm_bindgen]
pub fn detect_band_gaps(input_json: &str) -> Result<String, JsValue> {
    detect_band_gaps_json(input_json).map_err(|e| JsValue::from_str(&format!("Band gap error: {}", e)))
}

/// Gap kind codes (`"p"`, `"w"`, `"wp"`, `"s"`, `"sw"`, `"swp"`) of every interval.
#[wasm_bindgen]
pub fn gap_kind_codes(input_json: &str) -> Result<String, JsValue> {
    let report = PrecomputedInput::from_json(input_json)
        .and_then(|input| input.run())
        .map_err(|e| JsValue::from_str(&format!("Band gap error: {}", e)))?;

    let codes: Vec<&str> = report.kinds.iter().map(|kind| kind.code()).collect();
    serde_json::to_string(&codes).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Human-readable description of a gap kind code.
#[wasm_bindgen]
pub fn describe_gap_kind(code: &str) -> Option<String> {
    [
        GapKind::Propagation,
        GapKind::Weak,
        GapKind::WeakPropagation,
        GapKind::Strong,
        GapKind::StrongWeak,
        GapKind::StrongWeakPropagation,
    ]
    .into_iter()
    .find(|kind| kind.code() == code)
    .map(|kind| kind.description().to_string())
}

/// Validate an options document against `n_eigs` eigenvalues.
///
/// # Returns
/// JSON of the resolved options, with defaults applied
#[wasm_bindgen]
pub fn resolve_options(options_json: &str, n_eigs: usize) -> Result<String, JsValue> {
    let resolved = BandGapOptions::from_json(options_json)
        .and_then(|options| options.resolve(n_eigs))
        .map_err(|e| JsValue::from_str(&format!("Invalid options: {}", e)))?;

    serde_json::to_string(&resolved).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
