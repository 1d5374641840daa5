//! Placement predictor boundary.
//!
//! The external predictor receives the canonical work area and suggests a
//! rotation (and optionally a position). Its failures never reach the
//! template model: [`resolve_placement`] always produces a usable
//! suggestion, falling back to a heuristic from the first two canonical
//! corners.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{geo_utils, GeoPoint, Result};

/// Predictor connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct PredictorConfig {
    pub endpoint: String,
    pub health_endpoint: String,
    pub timeout_secs: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/predict".to_string(),
            health_endpoint: "http://localhost:8080/api/health".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Request body: canonical corners as `[lat, lng]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    pub work_area_points: Vec<[f64; 2]>,
}

impl PlacementRequest {
    /// Build a request from corners already in canonical order.
    pub fn new(canonical: &[GeoPoint]) -> Self {
        Self {
            work_area_points: canonical.iter().map(|p| p.to_pair()).collect(),
        }
    }
}

/// Response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    #[serde(default)]
    pub rotation: f64,
    /// `[lat, lng]`; older servers only return a rotation
    #[serde(default)]
    pub position: Option<[f64; 2]>,
    #[serde(default)]
    pub error: Option<String>,
    /// Set when the server answered without its model
    #[serde(default)]
    pub fallback: bool,
}

/// Predictor health report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SuggestionSource {
    Predictor,
    Fallback,
}

/// Where and how to place a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct PlacementSuggestion {
    /// Degrees in [0, 360)
    pub rotation: f64,
    pub position: GeoPoint,
    pub source: SuggestionSource,
}

/// Rotation facing away from the line `from -> to`:
/// `atan2(Δlat, Δlng)` in degrees plus 90, normalised to [0, 360).
pub fn facing_rotation(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let angle = (to.lat - from.lat).atan2(to.lng - from.lng).to_degrees();
    let rotation = (angle + 90.0).rem_euclid(360.0);
    if rotation >= 360.0 {
        0.0
    } else {
        rotation
    }
}

/// Local heuristic used when the predictor is unavailable.
///
/// Rotation comes from canonical corners 0 and 1; the position is the mean
/// of all corners. `None` for an empty work area.
pub fn fallback_placement(canonical: &[GeoPoint]) -> Option<PlacementSuggestion> {
    let position = geo_utils::compute_center(canonical)?;
    let rotation = match canonical {
        [first, second, ..] => facing_rotation(first, second),
        _ => 0.0,
    };
    Some(PlacementSuggestion {
        rotation,
        position,
        source: SuggestionSource::Fallback,
    })
}

/// Turn a predictor outcome into a placement, falling back on any failure.
///
/// A successful response without a position is placed at the corner mean.
pub fn resolve_placement(
    canonical: &[GeoPoint],
    outcome: Result<PredictionResponse>,
) -> Option<PlacementSuggestion> {
    match outcome {
        Ok(response) if response.success && response.rotation.is_finite() => {
            let position = match response.position {
                Some(pair) => GeoPoint::from(pair),
                None => geo_utils::compute_center(canonical)?,
            };
            info!(
                "[Predictor] Suggested {:.1}° at ({:.6}, {:.6})",
                response.rotation, position.lat, position.lng
            );
            Some(PlacementSuggestion {
                rotation: response.rotation.rem_euclid(360.0),
                position,
                source: SuggestionSource::Predictor,
            })
        }
        Ok(response) => {
            warn!(
                "[Predictor] Unsuccessful response ({}), using fallback",
                response.error.as_deref().unwrap_or("no error given")
            );
            fallback_placement(canonical)
        }
        Err(e) => {
            warn!("[Predictor] {}, using fallback", e);
            fallback_placement(canonical)
        }
    }
}

/// Rotation chosen by clicking `click` relative to the work-area `center`.
pub fn manual_rotation(center: &GeoPoint, click: &GeoPoint) -> f64 {
    facing_rotation(center, click)
}
