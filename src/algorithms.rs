//! # Algorithm Toolbox
//!
//! Direct access to the geometry behind templates, without the store or
//! the editor state machine.
//!
//! ## Core Algorithms
//!
//! - **Placement**: Resolve relative offsets at a target point and rotation
//! - **Canonical Ordering**: Order work-area corners for the predictor
//! - **Variance**: Jitter corners and draw rotations for training data
//! - **Fallback Placement**: Heuristic rotation when the predictor is down
//!
//! ## Geographic Utilities
//!
//! - **Haversine Distance**: Great-circle distance between points
//! - **Bearing / Destination**: Spherical forward and inverse problems
//! - **Flat Jitter**: Small displacements at 111 km per degree
//!
//! # Example
//!
//! ```rust
//! use construction_templates::algorithms::{
//!     haversine_distance, place_offsets, GeoPoint, RelativeOffset,
//! };
//!
//! let target = GeoPoint::new(49.8951, -97.1384);
//! let offsets = [RelativeOffset::new(10.0, 0.0), RelativeOffset::new(10.0, 90.0)];
//! let placed = place_offsets(&offsets, target, 45.0);
//! assert!((haversine_distance(&target, &placed[0]) - 10.0).abs() < 1e-6);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, GeoPoint, RelativeOffset};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    compute_center, destination, haversine_distance, initial_bearing, jitter_flat,
    meters_to_degrees, point_in_polygon, polyline_length,
};

// =============================================================================
// Placement
// =============================================================================

/// Resolve offsets at `target`, adding `rotation` degrees to every bearing.
pub use crate::placement::place_offsets;

/// Turn a point about a center, keeping its great-circle distance.
pub use crate::placement::rotate_about;

/// Evenly spaced labelled points along a segmented line.
pub use crate::placement::{segment_points, SegmentPoint};

// =============================================================================
// Canonical Ordering
// =============================================================================

/// Reference corner first, the rest by polar angle around it.
pub use crate::ordering::{polar_angle, reorder_pairs, reorder_points_for_ai};

// =============================================================================
// Variance
// =============================================================================

/// Jitter all corners except the reference one within their radii.
pub use crate::training::vary_corners;

/// Uniform whole-degree rotation.
pub use crate::training::random_rotation;

// =============================================================================
// Fallback Placement
// =============================================================================

/// Rotation facing away from the first canonical edge.
pub use crate::predictor::{facing_rotation, fallback_placement, manual_rotation};

/// Unsigned area of a work area in square meters.
///
/// Uses the geo crate's Chamberlain-Duquette spherical area. Returns 0 for
/// fewer than three corners.
///
/// # Example
/// ```rust
/// use construction_templates::algorithms::{work_area_m2, GeoPoint};
///
/// let square = vec![
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(0.0, 0.001),
///     GeoPoint::new(0.001, 0.001),
///     GeoPoint::new(0.001, 0.0),
/// ];
/// let area = work_area_m2(&square);
/// assert!(area > 12_000.0 && area < 12_500.0);
/// ```
pub fn work_area_m2(corners: &[GeoPoint]) -> f64 {
    use geo::{ChamberlainDuquetteArea, Coord, LineString, Polygon};

    if corners.len() < 3 {
        return 0.0;
    }

    let ring: Vec<Coord<f64>> = corners
        .iter()
        .map(|p| Coord { x: p.lng, y: p.lat })
        .collect();
    Polygon::new(LineString::new(ring), vec![]).chamberlain_duquette_unsigned_area()
}

// =============================================================================
// Spatial Indexing
// =============================================================================

/// R-tree used for snapping clicks to placed items.
pub use rstar::RTree;

/// Trait for types that can be spatially indexed.
pub use rstar::RTreeObject;

/// Axis-aligned bounding box for spatial queries.
pub use rstar::AABB;
