//! Training mode: reconstruct a template with random rotations and jitter
//! its work-area corners to produce labelled variations.
//!
//! The reference corner (`reference_point_index`) is never moved. Every
//! other corner is shifted by a uniform distance in `[0, radius]` at a
//! uniform angle on a flat-earth approximation.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::placement::{place_offsets, render_items, PlacedItem, PointStyle, ShapeStyle};
use crate::samples::{SampleConfig, SampleGenerator};
use crate::{
    geo_utils, load_construction, reorder_points_for_ai, Bounds, ConstructionTemplate, GeoPoint,
    MapSurface, RelativeOffset, Result, TemplateError,
};

/// Corners a template needs for training and sample generation.
pub const TRAINING_CORNER_COUNT: usize = 4;

/// Largest jitter radius accepted for a corner.
pub const MAX_VARIANCE_RADIUS_M: f64 = 50.0;

/// Which corner stays fixed and how far the others may move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceConfig {
    pub reference_point_index: usize,
    /// Jitter radius per corner in meters, in click order
    pub point_variance_radii: [f64; TRAINING_CORNER_COUNT],
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            reference_point_index: 0,
            point_variance_radii: [10.0; TRAINING_CORNER_COUNT],
        }
    }
}

impl VarianceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reference_point_index >= TRAINING_CORNER_COUNT {
            return Err(TemplateError::InvalidReferenceIndex {
                index: self.reference_point_index,
            });
        }
        for (index, &radius) in self.point_variance_radii.iter().enumerate() {
            validate_radius(index, radius)?;
        }
        Ok(())
    }

    /// Radius for corner `index`; corners past the fourth never move.
    pub fn radius(&self, index: usize) -> f64 {
        self.point_variance_radii.get(index).copied().unwrap_or(0.0)
    }
}

fn validate_radius(index: usize, radius: f64) -> Result<()> {
    if radius.is_finite() && (0.0..=MAX_VARIANCE_RADIUS_M).contains(&radius) {
        Ok(())
    } else {
        Err(TemplateError::InvalidVarianceRadius { index, radius })
    }
}

/// Training session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    /// Target shown to the user; generation is not capped by it
    pub total_variations: u32,
    pub variance: VarianceConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            total_variations: 10,
            variance: VarianceConfig::default(),
        }
    }
}

/// Jitter every corner except the reference one.
///
/// Draws two values per non-reference corner (distance, then angle), so a
/// seeded RNG reproduces the same result.
pub fn vary_corners<R: Rng>(
    corners: &[GeoPoint],
    variance: &VarianceConfig,
    rng: &mut R,
) -> Vec<GeoPoint> {
    corners
        .iter()
        .enumerate()
        .map(|(i, corner)| {
            if i == variance.reference_point_index {
                return *corner;
            }
            let distance = rng.gen::<f64>() * variance.radius(i);
            let angle = rng.gen::<f64>() * std::f64::consts::TAU;
            geo_utils::jitter_flat(corner, distance, angle)
        })
        .collect()
}

/// Whole-degree rotation in [0, 360).
pub fn random_rotation<R: Rng>(rng: &mut R) -> f64 {
    rng.gen_range(0..360u32) as f64
}

// ============================================================================
// Session
// ============================================================================

/// State of an active training session for one template.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    template: ConstructionTemplate,
    /// First four work-area offsets, in click order
    original_work_area: Vec<RelativeOffset>,
    /// `original_work_area` expanded at the template's reference point
    work_area_points: Vec<GeoPoint>,
    config: TrainingConfig,
    current_rotation: f64,
    current_variation: u32,
}

impl TrainingSession {
    /// Start training on `template`. Its work area needs four corners.
    pub fn start(template: ConstructionTemplate, config: TrainingConfig) -> Result<Self> {
        config.variance.validate()?;
        let original_work_area: Vec<RelativeOffset> = template
            .require_work_area(TRAINING_CORNER_COUNT)?
            .iter()
            .take(TRAINING_CORNER_COUNT)
            .copied()
            .collect();
        let work_area_points = place_offsets(&original_work_area, template.reference_point, 0.0);

        info!(
            "[Training] Started on '{}' ({} items)",
            template.name,
            template.items.len()
        );

        Ok(Self {
            template,
            original_work_area,
            work_area_points,
            config,
            current_rotation: 0.0,
            current_variation: 0,
        })
    }

    pub fn template(&self) -> &ConstructionTemplate {
        &self.template
    }

    pub fn original_work_area(&self) -> &[RelativeOffset] {
        &self.original_work_area
    }

    /// Work-area corners at the template's reference point, unrotated.
    pub fn work_area_points(&self) -> &[GeoPoint] {
        &self.work_area_points
    }

    /// Work-area corners in canonical order for the predictor.
    pub fn canonical_work_area(&self) -> Vec<GeoPoint> {
        reorder_points_for_ai(&self.work_area_points, self.config.variance.reference_point_index)
    }

    pub fn variance(&self) -> &VarianceConfig {
        &self.config.variance
    }

    pub fn current_rotation(&self) -> f64 {
        self.current_rotation
    }

    pub fn current_variation(&self) -> u32 {
        self.current_variation
    }

    pub fn total_variations(&self) -> u32 {
        self.config.total_variations
    }

    pub fn set_reference_point_index(&mut self, index: usize) -> Result<()> {
        if index >= TRAINING_CORNER_COUNT {
            return Err(TemplateError::InvalidReferenceIndex { index });
        }
        self.config.variance.reference_point_index = index;
        Ok(())
    }

    pub fn set_variance_radius(&mut self, index: usize, radius: f64) -> Result<()> {
        validate_radius(index, radius)?;
        let slot = self
            .config
            .variance
            .point_variance_radii
            .get_mut(index)
            .ok_or(TemplateError::InvalidVarianceRadius { index, radius })?;
        *slot = radius;
        Ok(())
    }

    /// Place the template at `center` with a random whole-degree rotation
    /// and jitter its corners.
    pub fn generate_variation<R: Rng>(&mut self, center: GeoPoint, rng: &mut R) -> Variation {
        let rotation = random_rotation(rng);
        self.generate_variation_with(center, rotation, rng)
    }

    /// Like [`generate_variation`](Self::generate_variation) with a given
    /// rotation, e.g. one suggested by the placement predictor.
    pub fn generate_variation_with<R: Rng>(
        &mut self,
        center: GeoPoint,
        rotation: f64,
        rng: &mut R,
    ) -> Variation {
        let layout = load_construction(&self.template, center, rotation);
        let base_corners = place_offsets(&self.original_work_area, center, rotation);
        let varied_corners = vary_corners(&base_corners, &self.config.variance, rng);

        self.current_rotation = rotation;
        self.current_variation += 1;
        debug!(
            "[Training] Variation {}/{} at {}°",
            self.current_variation, self.config.total_variations, rotation
        );

        Variation {
            number: self.current_variation,
            rotation,
            center,
            items: layout.items,
            base_corners,
            varied_corners,
            reference_index: self.config.variance.reference_point_index,
        }
    }

    /// Sample generator seeded with this session's template and variance.
    pub fn sample_generator<R: Rng>(
        &self,
        center: GeoPoint,
        config: SampleConfig,
        rng: R,
    ) -> Result<SampleGenerator<R>> {
        SampleGenerator::new(&self.template, self.config.variance.clone(), center, config, rng)
    }
}

/// One generated training variation.
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    /// 1-based counter within the session
    pub number: u32,
    pub rotation: f64,
    pub center: GeoPoint,
    /// Template items placed at `center` with `rotation`
    pub items: Vec<PlacedItem>,
    /// Work-area corners before jitter
    pub base_corners: Vec<GeoPoint>,
    /// Work-area corners after jitter, in click order
    pub varied_corners: Vec<GeoPoint>,
    pub reference_index: usize,
}

impl Variation {
    /// Varied corners with the reference first, for the predictor.
    pub fn canonical_corners(&self) -> Vec<GeoPoint> {
        reorder_points_for_ai(&self.varied_corners, self.reference_index)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self.varied_corners.clone();
        points.extend(self.items.iter().flat_map(|i| i.coordinates()));
        Bounds::from_points(&points)
    }

    /// Draw items, the varied polygon, then numbered corner markers.
    /// The reference corner's label carries a `*`.
    pub fn render<S: MapSurface>(&self, surface: &mut S) -> Vec<S::Handle> {
        let mut handles = Vec::new();
        render_items(&self.items, surface, &mut handles);
        handles.push(surface.place_polygon(&self.varied_corners, &ShapeStyle::WORK_AREA));

        for (i, corner) in self.varied_corners.iter().enumerate() {
            let is_reference = i == self.reference_index;
            let label = if is_reference {
                format!("{}*", i + 1)
            } else {
                (i + 1).to_string()
            };
            handles.push(surface.place_point(*corner, &PointStyle::Corner { label, is_reference }));
        }
        handles
    }
}
