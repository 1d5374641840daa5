//! Batched generation of synthetic training samples.
//!
//! Each sample places the template's work area at a random rotation around
//! a randomly shifted center, jitters the non-reference corners and stores
//! the corners in canonical order. Generation runs in fixed-size batches;
//! between samples the [`CancellationToken`] is polled, and after each
//! batch the progress callback fires.
//!
//! Every sample draws from its own RNG seeded by the generator's RNG, so
//! the `parallel` feature changes throughput but not output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::placement::place_offsets;
use crate::training::{random_rotation, vary_corners, VarianceConfig, TRAINING_CORNER_COUNT};
use crate::{
    geo_utils, load_construction, reorder_points_for_ai, ConstructionTemplate, GeoPoint,
    PlacedLayout, RelativeOffset, Result,
};

/// First line of every sample CSV.
pub const CSV_HEADER: &str = "construction_name,construction_rotation,construction_center_lat,construction_center_lng,reference_point_lat,reference_point_lng,point2_lat,point2_lng,point3_lat,point3_lng,point4_lat,point4_lng";

/// Progress callback: `(produced, total)`.
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Sample generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct SampleConfig {
    pub sample_count: u32,
    /// Samples produced per [`SampleGenerator::step`]
    pub batch_size: u32,
    /// Largest random shift of the work-area center, in meters
    pub max_center_offset_m: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            sample_count: 5000,
            batch_size: 100,
            max_center_offset_m: 30.0,
        }
    }
}

/// Shared flag for stopping a running generation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum GenerationStatus {
    Running,
    Completed,
    Cancelled,
}

/// One synthetic training record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub construction_name: String,
    /// Whole degrees in [0, 360)
    pub rotation_angle: f64,
    pub construction_center: GeoPoint,
    pub reference_point: GeoPoint,
    pub point2: GeoPoint,
    pub point3: GeoPoint,
    pub point4: GeoPoint,
}

impl Sample {
    /// The four corners in canonical order.
    pub fn corners(&self) -> [GeoPoint; 4] {
        [self.reference_point, self.point2, self.point3, self.point4]
    }

    /// CSV line (with trailing newline) matching [`CSV_HEADER`].
    pub fn csv_row(&self) -> String {
        let mut row = csv_field(&self.construction_name);
        row.push_str(&format!(
            ",{},{},{}",
            self.rotation_angle, self.construction_center.lat, self.construction_center.lng
        ));
        for corner in self.corners() {
            row.push_str(&format!(",{},{}", corner.lat, corner.lng));
        }
        row.push('\n');
        row
    }
}

/// Quote a CSV field only when it would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Everything needed to compute one sample from a seed.
#[derive(Debug, Clone)]
struct SampleBlueprint {
    name: String,
    offsets: Vec<RelativeOffset>,
    variance: VarianceConfig,
    center: GeoPoint,
    max_center_offset_m: f64,
}

impl SampleBlueprint {
    fn sample(&self, seed: u64) -> Sample {
        let mut rng = StdRng::seed_from_u64(seed);

        let rotation = random_rotation(&mut rng);
        let shift = rng.gen::<f64>() * self.max_center_offset_m;
        let shift_bearing = rng.gen::<f64>() * 360.0;
        let center = geo_utils::destination(&self.center, shift, shift_bearing);

        let base = place_offsets(&self.offsets, center, rotation);
        let varied = vary_corners(&base, &self.variance, &mut rng);
        let ordered = reorder_points_for_ai(&varied, self.variance.reference_point_index);

        Sample {
            construction_name: self.name.clone(),
            rotation_angle: rotation,
            construction_center: center,
            reference_point: ordered[0],
            point2: ordered[1],
            point3: ordered[2],
            point4: ordered[3],
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Incremental sample generator.
///
/// Drive it with [`step`](Self::step) from an event loop, or call
/// [`run`](Self::run) on a worker thread.
pub struct SampleGenerator<R = StdRng> {
    blueprint: SampleBlueprint,
    config: SampleConfig,
    rng: R,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    samples: Vec<Sample>,
    csv: String,
    status: GenerationStatus,
}

impl<R: Rng> SampleGenerator<R> {
    /// Prepare generation for `template` around `center`.
    ///
    /// Fails before producing anything if the work area has fewer than four
    /// corners or the variance settings are out of range.
    pub fn new(
        template: &ConstructionTemplate,
        variance: VarianceConfig,
        center: GeoPoint,
        config: SampleConfig,
        rng: R,
    ) -> Result<Self> {
        variance.validate()?;
        let offsets = template
            .require_work_area(TRAINING_CORNER_COUNT)?
            .iter()
            .take(TRAINING_CORNER_COUNT)
            .copied()
            .collect();

        let mut csv = String::with_capacity(CSV_HEADER.len() + 1);
        csv.push_str(CSV_HEADER);
        csv.push('\n');

        Ok(Self {
            blueprint: SampleBlueprint {
                name: template.name.clone(),
                offsets,
                variance,
                center,
                max_center_offset_m: config.max_center_offset_m,
            },
            config,
            rng,
            cancel: CancellationToken::new(),
            progress: None,
            samples: Vec::new(),
            csv,
            status: GenerationStatus::Running,
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Token that stops this generator when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn produced(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn total(&self) -> u32 {
        self.config.sample_count
    }

    /// Produce the next batch.
    ///
    /// Returns `Running` while more batches remain. Once `Completed` or
    /// `Cancelled`, further calls do nothing.
    pub fn step(&mut self) -> GenerationStatus {
        if self.status != GenerationStatus::Running {
            return self.status;
        }
        if self.samples.is_empty() {
            info!(
                "[SampleGenerator] Generating {} samples for '{}'",
                self.config.sample_count, self.blueprint.name
            );
        }

        let remaining = self.total().saturating_sub(self.produced());
        let batch = remaining.min(self.config.batch_size.max(1));
        let seeds: Vec<u64> = (0..batch).map(|_| self.rng.gen()).collect();

        #[cfg(feature = "parallel")]
        let computed: Vec<Sample> = {
            use rayon::prelude::*;
            seeds.par_iter().map(|&seed| self.blueprint.sample(seed)).collect()
        };

        #[cfg(not(feature = "parallel"))]
        let computed = seeds.iter().map(|&seed| self.blueprint.sample(seed));

        for sample in computed {
            if self.cancel.is_cancelled() {
                self.status = GenerationStatus::Cancelled;
                break;
            }
            self.csv.push_str(&sample.csv_row());
            self.samples.push(sample);
        }

        if self.status == GenerationStatus::Running {
            if let Some(progress) = &self.progress {
                progress(self.produced(), self.total());
            }
            if self.produced() >= self.total() {
                self.status = GenerationStatus::Completed;
            }
        }

        match self.status {
            GenerationStatus::Completed => info!(
                "[SampleGenerator] Completed {} samples",
                self.samples.len()
            ),
            GenerationStatus::Cancelled => warn!(
                "[SampleGenerator] Cancelled after {} of {} samples",
                self.samples.len(),
                self.config.sample_count
            ),
            GenerationStatus::Running => {}
        }
        self.status
    }

    /// Step until completion or cancellation.
    pub fn run(mut self) -> SampleRun {
        while self.step() == GenerationStatus::Running {}
        self.finish()
    }

    /// Stop and hand over what has been produced so far.
    pub fn finish(self) -> SampleRun {
        SampleRun {
            total: self.samples.len(),
            csv: self.csv,
            samples: self.samples,
            status: self.status,
        }
    }
}

/// Output of a generation, complete or cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRun {
    /// Rows produced
    pub total: usize,
    /// Header plus one line per sample
    pub csv: String,
    pub samples: Vec<Sample>,
    pub status: GenerationStatus,
}

impl SampleRun {
    pub fn preview(&self) -> SamplePreview {
        SamplePreview::new(self.samples.clone())
    }

    /// Default export file name, `construction_samples_<millis>.csv`.
    pub fn file_name(&self) -> String {
        format!(
            "construction_samples_{}.csv",
            chrono::Utc::now().timestamp_millis()
        )
    }
}

/// Pager over generated samples.
#[derive(Debug, Clone, Default)]
pub struct SamplePreview {
    samples: Vec<Sample>,
    index: usize,
}

impl SamplePreview {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples, index: 0 }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Zero-based position of the current sample.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Sample> {
        self.samples.get(self.index)
    }

    /// Advance, stopping at the last sample.
    pub fn next(&mut self) -> Option<&Sample> {
        if self.index + 1 < self.samples.len() {
            self.index += 1;
        }
        self.current()
    }

    /// Go back, stopping at the first sample.
    pub fn previous(&mut self) -> Option<&Sample> {
        self.index = self.index.saturating_sub(1);
        self.current()
    }

    /// The template as it would be placed for the current sample.
    pub fn layout(&self, template: &ConstructionTemplate) -> Option<PlacedLayout> {
        self.current().map(|sample| {
            load_construction(template, sample.construction_center, sample.rotation_angle)
        })
    }
}
