//! # Construction Templates
//!
//! Relative-geometry templates for traffic-control layouts (signage, cones,
//! barricades) placed on a web map.
//!
//! This library provides:
//! - Capture of placed markers, lines and points as (distance, bearing)
//!   offsets from a bounding-box anchor
//! - Lossless reconstruction of a template at any target point and rotation
//! - A self-healing template store over a single key-value entry
//! - Canonical ordering of work-area corners for the placement predictor
//! - A variance engine that synthesises labelled work-area samples
//! - An editor state machine that snaps work-area clicks to placed items
//!
//! ## Features
//!
//! - **`persistence`** - SQLite-backed key-value store
//! - **`parallel`** - Compute sample batches with rayon
//! - **`http`** - Async client for the placement predictor
//! - **`ffi`** - FFI bindings for host UIs
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use construction_templates::{
//!     load_construction, GeoPoint, LayoutItem, MemoryStore, TemplateStore,
//! };
//!
//! let mut store = TemplateStore::new(MemoryStore::default());
//! let items = vec![
//!     LayoutItem::marker(GeoPoint::new(49.8000, -97.0800), "Cone", "assets/cone.png"),
//!     LayoutItem::point(GeoPoint::new(49.8002, -97.0800), "Taper start"),
//! ];
//!
//! let template = store.save_construction("Lane closure", &items, None).unwrap();
//! let placed = load_construction(&template, GeoPoint::new(50.0, -97.0), 90.0);
//! assert_eq!(placed.items.len(), 2);
//! ```

use geo::{BoundingRect, MultiPoint, Point};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TemplateError};

// Spherical geodesy and flat-earth helpers
pub mod geo_utils;

// Algorithm toolbox - modular access to all algorithms
pub mod algorithms;

// Template model and capture
pub mod template;
pub use template::{ConstructionItem, ConstructionTemplate, LayoutItem, MarkerData};

// Reconstruction of templates at a target point and rotation
pub mod placement;
pub use placement::{
    load_construction, segment_points, InventoryEntry, MapSurface, PlacedItem, PlacedLayout,
    PointStyle, SegmentPoint, ShapeStyle,
};

// Template persistence over a key-value store
pub mod store;
pub use store::{KeyValueStore, MemoryStore, TemplateStore, STORAGE_KEY};

#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Canonical work-area ordering
pub mod ordering;
pub use ordering::reorder_points_for_ai;

// Training mode and single variations
pub mod training;
pub use training::{
    TrainingConfig, TrainingSession, VarianceConfig, Variation, MAX_VARIANCE_RADIUS_M,
    TRAINING_CORNER_COUNT,
};

// Batched training-sample generation
pub mod samples;
pub use samples::{
    CancellationToken, GenerationStatus, ProgressCallback, Sample, SampleConfig,
    SampleGenerator, SamplePreview, SampleRun, CSV_HEADER,
};

// Placement predictor boundary
pub mod predictor;
pub use predictor::{
    fallback_placement, manual_rotation, resolve_placement, HealthStatus, PlacementRequest,
    PlacementSuggestion, PredictionResponse, PredictorConfig, SuggestionSource,
};

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::PredictorClient;

// Editor mode state machine
pub mod session;
pub use session::{Editor, EditorConfig, EditorMode, WorkAreaProgress};

// FFI bindings for host UIs
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("ConstructionTemplatesRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A map coordinate in degrees.
///
/// # Example
/// ```
/// use construction_templates::GeoPoint;
/// let point = GeoPoint::new(49.8951, -97.1384); // Winnipeg
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// `[lat, lng]`, the pair layout the predictor and host UI exchange.
    pub fn to_pair(self) -> [f64; 2] {
        [self.lat, self.lng]
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<GeoPoint> for Point<f64> {
    fn from(p: GeoPoint) -> Self {
        Point::new(p.lng, p.lat)
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        let multi: MultiPoint<f64> = points.iter().copied().collect();
        let rect = multi.bounding_rect()?;

        Some(Self {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Position of a point relative to a reference point.
///
/// `destination(reference, distance, bearing)` reconstructs the original
/// point; everything in a template is stored in this form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RelativeOffset {
    /// Meters from the reference point
    pub distance: f64,
    /// Initial bearing in degrees, [0, 360)
    pub bearing: f64,
}

impl RelativeOffset {
    pub fn new(distance: f64, bearing: f64) -> Self {
        Self { distance, bearing }
    }

    /// Offset of `point` as seen from `reference`.
    pub fn between(reference: &GeoPoint, point: &GeoPoint) -> Self {
        Self {
            distance: geo_utils::haversine_distance(reference, point),
            bearing: geo_utils::initial_bearing(reference, point),
        }
    }

    /// Absolute position when anchored at `target` and turned by `rotation` degrees.
    pub fn resolve(&self, target: &GeoPoint, rotation: f64) -> GeoPoint {
        let bearing = (self.bearing + rotation).rem_euclid(360.0);
        geo_utils::destination(target, self.distance, bearing)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(49.8951, -97.1384).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_center_is_midpoint() {
        let points = vec![
            GeoPoint::new(49.8000, -97.0800),
            GeoPoint::new(49.8002, -97.0790),
            GeoPoint::new(49.8001, -97.0810),
        ];
        let bounds = Bounds::from_points(&points).unwrap();
        assert_eq!(bounds.min_lat, 49.8000);
        assert_eq!(bounds.max_lat, 49.8002);
        assert_eq!(bounds.min_lng, -97.0810);
        assert_eq!(bounds.max_lng, -97.0790);

        let center = bounds.center();
        assert!((center.lat - 49.8001).abs() < 1e-12);
        assert!((center.lng - -97.0800).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_empty() {
        assert!(Bounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_offset_round_trip() {
        let reference = GeoPoint::new(49.8001, -97.0800);
        let point = GeoPoint::new(49.8003, -97.0795);

        let offset = RelativeOffset::between(&reference, &point);
        let back = offset.resolve(&reference, 0.0);

        assert!((back.lat - point.lat).abs() < 1e-9);
        assert!((back.lng - point.lng).abs() < 1e-9);
    }
}
