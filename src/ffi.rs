//! FFI bindings for host UIs (iOS/Android/web shells).
//!
//! This module provides the UniFFI bindings that expose Rust functionality
//! to Kotlin and Swift. All FFI functions are prefixed with `ffi_` to avoid
//! naming conflicts with the internal API. Templates cross the boundary in
//! their persisted JSON form.

use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::samples::{GenerationStatus, SampleConfig, SampleGenerator};
use crate::training::{VarianceConfig, TRAINING_CORNER_COUNT};
use crate::{
    init_logging, load_construction, reorder_points_for_ai, ConstructionTemplate, GeoPoint,
    InventoryEntry, LayoutItem, PlacedLayout, PlacementSuggestion, SqliteStore, TemplateStore,
};

// ============================================================================
// Progress Callback Interface (for real-time updates to the host)
// ============================================================================

/// Callback interface for receiving progress during sample generation.
/// Implement this in Kotlin/Swift to drive a progress bar.
#[uniffi::export(callback_interface)]
pub trait SampleProgressCallback: Send + Sync {
    /// Called after each batch.
    /// - produced: Samples generated so far
    /// - total: Samples requested
    /// Return `false` to stop generation.
    fn on_progress(&self, produced: u32, total: u32) -> bool;
}

// ============================================================================
// Template Store
// ============================================================================

fn open_store(db_path: &str) -> Option<TemplateStore<SqliteStore>> {
    match SqliteStore::open(db_path) {
        Ok(backend) => Some(TemplateStore::new(backend)),
        Err(e) => {
            warn!("[ConstructionTemplatesRust] Failed to open {}: {}", db_path, e);
            None
        }
    }
}

/// All stored templates as a JSON array. `"[]"` when the store is unreadable.
#[uniffi::export]
pub fn ffi_list_constructions(db_path: String) -> String {
    init_logging();
    let templates = open_store(&db_path)
        .and_then(|mut store| {
            store
                .list()
                .map_err(|e| warn!("[ConstructionTemplatesRust] List failed: {}", e))
                .ok()
        })
        .unwrap_or_default();
    info!(
        "[ConstructionTemplatesRust] Listed {} constructions",
        templates.len()
    );
    serde_json::to_string(&templates).unwrap_or_else(|_| "[]".to_string())
}

/// Capture `items` (and an optional work area) and store the template.
/// Returns the stored template as JSON.
#[uniffi::export]
pub fn ffi_save_construction(
    db_path: String,
    name: String,
    items: Vec<LayoutItem>,
    work_area: Vec<GeoPoint>,
) -> Option<String> {
    init_logging();
    let mut store = open_store(&db_path)?;
    let work_area = (!work_area.is_empty()).then_some(work_area.as_slice());

    match store.save_construction(&name, &items, work_area) {
        Ok(template) => serde_json::to_string(&template).ok(),
        Err(e) => {
            warn!("[ConstructionTemplatesRust] Save failed: {}", e);
            None
        }
    }
}

/// Delete the template at `index`. Returns whether one was removed.
#[uniffi::export]
pub fn ffi_delete_construction(db_path: String, index: u32) -> bool {
    init_logging();
    let Some(mut store) = open_store(&db_path) else {
        return false;
    };
    match store.delete(index as usize) {
        Ok(removed) => {
            info!("[ConstructionTemplatesRust] Deleted '{}'", removed.name);
            true
        }
        Err(e) => {
            warn!("[ConstructionTemplatesRust] Delete failed: {}", e);
            false
        }
    }
}

// ============================================================================
// Placement
// ============================================================================

fn parse_template(template_json: &str) -> Option<ConstructionTemplate> {
    serde_json::from_str(template_json)
        .map_err(|e| warn!("[ConstructionTemplatesRust] Invalid template: {}", e))
        .ok()
}

/// Place a template (JSON) at `target`, turned by `rotation` degrees.
#[uniffi::export]
pub fn ffi_load_construction(
    template_json: String,
    target: GeoPoint,
    rotation: f64,
) -> Option<PlacedLayout> {
    init_logging();
    let template = parse_template(&template_json)?;
    Some(load_construction(&template, target, rotation))
}

/// Marker counts for a placed layout, for the inventory panel.
#[uniffi::export]
pub fn ffi_inventory(layout: PlacedLayout) -> Vec<InventoryEntry> {
    layout.inventory()
}

/// Reference corner first, the rest by polar angle.
#[uniffi::export]
pub fn ffi_reorder_points(points: Vec<GeoPoint>, reference_index: u32) -> Vec<GeoPoint> {
    reorder_points_for_ai(&points, reference_index as usize)
}

/// Heuristic placement from canonical corners.
#[uniffi::export]
pub fn ffi_fallback_placement(canonical: Vec<GeoPoint>) -> Option<PlacementSuggestion> {
    crate::fallback_placement(&canonical)
}

/// Ask the predictor for a placement, falling back locally on failure.
#[cfg(feature = "http")]
#[uniffi::export]
pub fn ffi_suggest_placement(
    config: crate::PredictorConfig,
    canonical: Vec<GeoPoint>,
) -> Option<PlacementSuggestion> {
    init_logging();
    crate::http::suggest_placement_sync(config, canonical)
}

// ============================================================================
// Training Samples
// ============================================================================

/// Variance settings in a host-friendly shape.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVarianceConfig {
    pub reference_point_index: u32,
    /// Up to four radii in meters; missing ones default to 0
    pub point_variance_radii: Vec<f64>,
}

impl From<FfiVarianceConfig> for VarianceConfig {
    fn from(c: FfiVarianceConfig) -> Self {
        let mut radii = [0.0; TRAINING_CORNER_COUNT];
        for (slot, radius) in radii.iter_mut().zip(c.point_variance_radii) {
            *slot = radius;
        }
        VarianceConfig {
            reference_point_index: c.reference_point_index as usize,
            point_variance_radii: radii,
        }
    }
}

/// Result of a sample generation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSampleResult {
    pub csv: String,
    pub file_name: String,
    pub total: u32,
    pub status: GenerationStatus,
}

/// Default sample settings.
#[uniffi::export]
pub fn default_sample_config() -> SampleConfig {
    SampleConfig::default()
}

/// Generate training samples for a template (JSON) around `center`.
///
/// The callback runs after each batch and may stop generation; the rows
/// produced until then are returned.
#[uniffi::export]
pub fn ffi_generate_samples_csv(
    template_json: String,
    variance: FfiVarianceConfig,
    center: GeoPoint,
    config: SampleConfig,
    seed: u64,
    callback: Box<dyn SampleProgressCallback>,
) -> Option<FfiSampleResult> {
    init_logging();
    let template = parse_template(&template_json)?;
    let start = std::time::Instant::now();

    let generator = match SampleGenerator::new(
        &template,
        variance.into(),
        center,
        config,
        StdRng::seed_from_u64(seed),
    ) {
        Ok(g) => g,
        Err(e) => {
            warn!("[ConstructionTemplatesRust] {}", e);
            return None;
        }
    };

    let token = generator.cancellation_token();
    let callback = Arc::new(callback);
    let run = generator
        .with_progress(Arc::new(move |produced, total| {
            if !callback.on_progress(produced, total) {
                token.cancel();
            }
        }))
        .run();

    info!(
        "[ConstructionTemplatesRust] {} samples ({:?}) in {:?}",
        run.total,
        run.status,
        start.elapsed()
    );

    Some(FfiSampleResult {
        file_name: run.file_name(),
        total: run.total as u32,
        status: run.status,
        csv: run.csv,
    })
}
