//! Editor mode state machine.
//!
//! The [`Editor`] owns the template store, the items currently on the map
//! and one mode context. Every transition checks the current mode first and
//! fails with `InvalidMode` without touching anything when it does not
//! match; otherwise it swaps the whole context in one step.

use log::{debug, info};
use rand::Rng;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::samples::{CancellationToken, SampleConfig, SampleGenerator};
use crate::training::{TrainingConfig, TrainingSession, Variation};
use crate::{
    geo_utils, load_construction, reorder_points_for_ai, ConstructionTemplate, GeoPoint,
    KeyValueStore, LayoutItem, PlacedLayout, PlacementSuggestion, Result, TemplateError,
    TemplateStore,
};

/// Editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Clicks this close to a placed marker or point snap onto it
    pub snap_radius_m: f64,
    /// Clicks that complete a work area
    pub work_area_corner_count: usize,
    pub training: TrainingConfig,
    pub samples: SampleConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap_radius_m: 3.0,
            work_area_corner_count: 4,
            training: TrainingConfig::default(),
            samples: SampleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorMode {
    Idle,
    DrawingWorkArea,
    Placing,
    TrainingVariation,
    GeneratingSamples,
}

impl EditorMode {
    pub fn name(&self) -> &'static str {
        match self {
            EditorMode::Idle => "Idle",
            EditorMode::DrawingWorkArea => "DrawingWorkArea",
            EditorMode::Placing => "Placing",
            EditorMode::TrainingVariation => "TrainingVariation",
            EditorMode::GeneratingSamples => "GeneratingSamples",
        }
    }
}

/// Result of a work-area click.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkAreaProgress {
    /// Corner recorded; more are needed
    InProgress {
        count: usize,
        point: GeoPoint,
        snapped: bool,
    },
    /// Last corner recorded; the editor is back to `Idle`
    Complete(Vec<GeoPoint>),
}

enum Context {
    Idle,
    DrawingWorkArea { points: Vec<GeoPoint> },
    Placing { template: ConstructionTemplate },
    Training { session: TrainingSession },
    Generating {
        session: TrainingSession,
        token: CancellationToken,
    },
}

impl Context {
    fn mode(&self) -> EditorMode {
        match self {
            Context::Idle => EditorMode::Idle,
            Context::DrawingWorkArea { .. } => EditorMode::DrawingWorkArea,
            Context::Placing { .. } => EditorMode::Placing,
            Context::Training { .. } => EditorMode::TrainingVariation,
            Context::Generating { .. } => EditorMode::GeneratingSamples,
        }
    }
}

/// A snappable map coordinate.
#[derive(Debug, Clone, Copy)]
struct SnapTarget {
    position: GeoPoint,
}

impl RTreeObject for SnapTarget {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.position.lng, self.position.lat])
    }
}

/// Map editor session.
pub struct Editor<S: KeyValueStore> {
    store: TemplateStore<S>,
    config: EditorConfig,
    context: Context,
    placed_items: Vec<LayoutItem>,
    snap_index: RTree<SnapTarget>,
    work_area: Option<Vec<GeoPoint>>,
}

impl<S: KeyValueStore> Editor<S> {
    pub fn new(store: TemplateStore<S>, config: EditorConfig) -> Self {
        Self {
            store,
            config,
            context: Context::Idle,
            placed_items: Vec::new(),
            snap_index: RTree::new(),
            work_area: None,
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.context.mode()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&mut self) -> &mut TemplateStore<S> {
        &mut self.store
    }

    fn invalid_mode(&self, expected: EditorMode) -> TemplateError {
        TemplateError::InvalidMode {
            expected: expected.name(),
            actual: self.mode().name(),
        }
    }

    // ========================================================================
    // Map contents
    // ========================================================================

    /// Items currently on the map.
    pub fn placed_items(&self) -> &[LayoutItem] {
        &self.placed_items
    }

    /// Replace the items on the map (what capture reads and clicks snap to).
    pub fn set_placed_items(&mut self, items: Vec<LayoutItem>) {
        self.placed_items = items;
        self.rebuild_snap_index();
    }

    pub fn add_placed_item(&mut self, item: LayoutItem) {
        if let Some(position) = item.anchor() {
            self.snap_index.insert(SnapTarget { position });
        }
        self.placed_items.push(item);
    }

    pub fn clear_placed_items(&mut self) {
        self.set_placed_items(Vec::new());
    }

    fn rebuild_snap_index(&mut self) {
        let targets: Vec<SnapTarget> = self
            .placed_items
            .iter()
            .filter_map(|item| item.anchor().map(|position| SnapTarget { position }))
            .collect();
        self.snap_index = RTree::bulk_load(targets);
    }

    /// Nearest placed marker or point within the snap radius of `click`.
    pub fn snap_target(&self, click: &GeoPoint) -> Option<GeoPoint> {
        let radius = self.config.snap_radius_m;
        // Padded search box; the haversine filter below decides
        let (d_lat, d_lng) = geo_utils::meters_to_degrees(radius * 1.01, click.lat);
        let envelope = AABB::from_corners(
            [click.lng - d_lng, click.lat - d_lat],
            [click.lng + d_lng, click.lat + d_lat],
        );

        self.snap_index
            .locate_in_envelope(&envelope)
            .map(|t| (geo_utils::haversine_distance(click, &t.position), t.position))
            .filter(|(distance, _)| *distance <= radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, position)| position)
    }

    // ========================================================================
    // Work area
    // ========================================================================

    /// Completed work area waiting to be saved with the next template.
    pub fn work_area(&self) -> Option<&[GeoPoint]> {
        self.work_area.as_deref()
    }

    pub fn clear_work_area(&mut self) {
        self.work_area = None;
    }

    /// Completed work area in canonical order, for the predictor.
    pub fn canonical_work_area(&self, reference_index: usize) -> Option<Vec<GeoPoint>> {
        self.work_area
            .as_ref()
            .filter(|points| points.len() >= self.config.work_area_corner_count)
            .map(|points| reorder_points_for_ai(points, reference_index))
    }

    /// Start clicking a new work area. Discards any completed one.
    pub fn begin_work_area(&mut self) -> Result<()> {
        if !matches!(self.context, Context::Idle) {
            return Err(self.invalid_mode(EditorMode::Idle));
        }
        self.work_area = None;
        self.context = Context::DrawingWorkArea { points: Vec::new() };
        debug!("[Editor] Drawing work area");
        Ok(())
    }

    /// Record a work-area corner, snapping to a nearby placed item.
    pub fn add_work_area_point(&mut self, click: GeoPoint) -> Result<WorkAreaProgress> {
        let not_drawing = self.invalid_mode(EditorMode::DrawingWorkArea);
        let snapped = self.snap_target(&click);
        let point = snapped.unwrap_or(click);
        let needed = self.config.work_area_corner_count;

        let Context::DrawingWorkArea { points } = &mut self.context else {
            return Err(not_drawing);
        };
        points.push(point);

        if points.len() < needed {
            return Ok(WorkAreaProgress::InProgress {
                count: points.len(),
                point,
                snapped: snapped.is_some(),
            });
        }

        let corners = std::mem::take(points);
        info!("[Editor] Work area defined with {} points", corners.len());
        self.work_area = Some(corners.clone());
        self.context = Context::Idle;
        Ok(WorkAreaProgress::Complete(corners))
    }

    /// Leave the current mode.
    ///
    /// Drawing discards its points, placing drops the selection, training
    /// ends the session, and generation is signalled to stop (the mode
    /// changes once [`finish_sample_generation`](Self::finish_sample_generation)
    /// is called).
    pub fn cancel(&mut self) {
        match &self.context {
            Context::Generating { token, .. } => token.cancel(),
            Context::Idle => {}
            _ => {
                debug!("[Editor] Cancelled {}", self.mode().name());
                self.context = Context::Idle;
            }
        }
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// Capture the placed items (and completed work area) as a template.
    pub fn save_construction(&mut self, name: &str) -> Result<ConstructionTemplate> {
        if !matches!(self.context, Context::Idle) {
            return Err(self.invalid_mode(EditorMode::Idle));
        }
        let template =
            self.store
                .save_construction(name, &self.placed_items, self.work_area.as_deref())?;
        self.work_area = None;
        Ok(template)
    }

    pub fn templates(&mut self) -> Result<Vec<ConstructionTemplate>> {
        self.store.list()
    }

    pub fn delete_template(&mut self, index: usize) -> Result<ConstructionTemplate> {
        self.store.delete(index)
    }

    /// Select a stored template for placement.
    pub fn select_template(&mut self, index: usize) -> Result<&ConstructionTemplate> {
        if !matches!(self.context, Context::Idle | Context::Placing { .. }) {
            return Err(self.invalid_mode(EditorMode::Idle));
        }
        let template = self.store.get(index)?;
        info!("[Editor] Selected '{}'", template.name);
        self.context = Context::Placing { template };

        match &self.context {
            Context::Placing { template } => Ok(template),
            _ => Err(self.invalid_mode(EditorMode::Placing)),
        }
    }

    pub fn selected_template(&self) -> Option<&ConstructionTemplate> {
        match &self.context {
            Context::Placing { template } => Some(template),
            _ => None,
        }
    }

    /// Place the selected template where the suggestion says.
    pub fn place_selected(&mut self, suggestion: &PlacementSuggestion) -> Result<PlacedLayout> {
        self.place_selected_at(suggestion.position, suggestion.rotation)
    }

    /// Place the selected template at `target` turned by `rotation`.
    ///
    /// The placed items join the map contents and the editor returns to
    /// `Idle`.
    pub fn place_selected_at(&mut self, target: GeoPoint, rotation: f64) -> Result<PlacedLayout> {
        let layout = match &self.context {
            Context::Placing { template } => load_construction(template, target, rotation),
            Context::Idle => return Err(TemplateError::NoConstructionSelected),
            _ => return Err(self.invalid_mode(EditorMode::Placing)),
        };

        info!(
            "[Editor] Placed {} items at {:.0}°",
            layout.items.len(),
            rotation
        );
        for item in &layout.items {
            self.add_placed_item(item.clone());
        }
        self.context = Context::Idle;
        Ok(layout)
    }

    // ========================================================================
    // Training
    // ========================================================================

    /// Start training on the stored template at `index`.
    pub fn enter_training(&mut self, index: usize) -> Result<()> {
        if !matches!(self.context, Context::Idle | Context::Placing { .. }) {
            return Err(self.invalid_mode(EditorMode::Idle));
        }
        let template = self.store.get(index)?;
        self.start_training(template)
    }

    /// Start training on the template selected for placement.
    pub fn train_selected(&mut self) -> Result<()> {
        let template = match &self.context {
            Context::Placing { template } => template.clone(),
            Context::Idle => return Err(TemplateError::NoConstructionSelected),
            _ => return Err(self.invalid_mode(EditorMode::Placing)),
        };
        self.start_training(template)
    }

    fn start_training(&mut self, template: ConstructionTemplate) -> Result<()> {
        let session = TrainingSession::start(template, self.config.training.clone())?;
        self.context = Context::Training { session };
        Ok(())
    }

    pub fn training(&self) -> Option<&TrainingSession> {
        match &self.context {
            Context::Training { session } | Context::Generating { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Mutable session, for changing the reference corner or radii.
    /// Not available while samples are generating.
    pub fn training_mut(&mut self) -> Option<&mut TrainingSession> {
        match &mut self.context {
            Context::Training { session } => Some(session),
            _ => None,
        }
    }

    pub fn generate_variation<R: Rng>(
        &mut self,
        center: GeoPoint,
        rng: &mut R,
    ) -> Result<Variation> {
        let not_training = self.invalid_mode(EditorMode::TrainingVariation);
        match &mut self.context {
            Context::Training { session } => Ok(session.generate_variation(center, rng)),
            _ => Err(not_training),
        }
    }

    /// Switch to sample generation and hand back the generator to drive.
    pub fn begin_sample_generation<R: Rng>(
        &mut self,
        center: GeoPoint,
        rng: R,
    ) -> Result<SampleGenerator<R>> {
        let generator = match &self.context {
            Context::Training { session } => {
                session.sample_generator(center, self.config.samples.clone(), rng)?
            }
            _ => return Err(self.invalid_mode(EditorMode::TrainingVariation)),
        };
        let token = generator.cancellation_token();

        self.context = match std::mem::replace(&mut self.context, Context::Idle) {
            Context::Training { session } => Context::Generating { session, token },
            other => other,
        };
        Ok(generator)
    }

    /// Return to training once generation has completed or been cancelled.
    pub fn finish_sample_generation(&mut self) -> Result<()> {
        if !matches!(self.context, Context::Generating { .. }) {
            return Err(self.invalid_mode(EditorMode::GeneratingSamples));
        }
        self.context = match std::mem::replace(&mut self.context, Context::Idle) {
            Context::Generating { session, .. } => Context::Training { session },
            other => other,
        };
        Ok(())
    }

    /// Leave training (stopping any running generation).
    pub fn exit_training(&mut self) -> Result<()> {
        match &self.context {
            Context::Training { .. } => {}
            Context::Generating { token, .. } => token.cancel(),
            _ => return Err(self.invalid_mode(EditorMode::TrainingVariation)),
        }
        info!("[Editor] Exited training");
        self.context = Context::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::GenerationStatus;
    use crate::{fallback_placement, MemoryStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn editor() -> Editor<MemoryStore> {
        Editor::new(TemplateStore::new(MemoryStore::default()), EditorConfig::default())
    }

    fn cone_at(position: GeoPoint) -> LayoutItem {
        LayoutItem::marker(position, "Cone", "assets/cone.png")
    }

    fn square_corners(center: &GeoPoint) -> Vec<GeoPoint> {
        [315.0, 45.0, 135.0, 225.0]
            .iter()
            .map(|&b| geo_utils::destination(center, 14.142, b))
            .collect()
    }

    /// Editor holding one saved template with a 4-corner work area.
    fn editor_with_template() -> Editor<MemoryStore> {
        let mut editor = editor();
        let center = GeoPoint::new(49.8001, -97.08);
        editor.set_placed_items(vec![
            cone_at(geo_utils::destination(&center, 5.0, 270.0)),
            cone_at(geo_utils::destination(&center, 5.0, 90.0)),
        ]);
        editor.begin_work_area().unwrap();
        for corner in square_corners(&center) {
            editor.add_work_area_point(corner).unwrap();
        }
        editor.save_construction("Square").unwrap();
        editor
    }

    #[test]
    fn test_snapping() {
        let mut editor = editor();
        let cone = GeoPoint::new(49.8, -97.08);
        editor.set_placed_items(vec![cone_at(cone)]);

        let near = geo_utils::destination(&cone, 1.0, 45.0);
        let far = geo_utils::destination(&cone, 10.0, 45.0);
        assert_eq!(editor.snap_target(&near), Some(cone));
        assert_eq!(editor.snap_target(&far), None);

        editor.begin_work_area().unwrap();
        match editor.add_work_area_point(near).unwrap() {
            WorkAreaProgress::InProgress { count, point, snapped } => {
                assert_eq!(count, 1);
                assert_eq!(point, cone);
                assert!(snapped);
            }
            other => panic!("unexpected {:?}", other),
        }
        match editor.add_work_area_point(far).unwrap() {
            WorkAreaProgress::InProgress { point, snapped, .. } => {
                assert_eq!(point, far);
                assert!(!snapped);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_snaps_to_nearest() {
        let mut editor = editor();
        let a = GeoPoint::new(49.8, -97.08);
        let b = geo_utils::destination(&a, 4.0, 90.0);
        editor.set_placed_items(vec![
            cone_at(a),
            LayoutItem::point(b, "B"),
            LayoutItem::line(a, b),
        ]);
        let click = geo_utils::destination(&a, 2.5, 90.0);
        assert_eq!(editor.snap_target(&click), Some(b));
    }

    #[test]
    fn test_work_area_completes_at_four() {
        let mut editor = editor();
        let corners = square_corners(&GeoPoint::new(49.8, -97.08));
        editor.begin_work_area().unwrap();

        for corner in &corners[..3] {
            assert!(matches!(
                editor.add_work_area_point(*corner).unwrap(),
                WorkAreaProgress::InProgress { .. }
            ));
        }
        assert_eq!(editor.mode(), EditorMode::DrawingWorkArea);
        assert_eq!(
            editor.add_work_area_point(corners[3]).unwrap(),
            WorkAreaProgress::Complete(corners.clone())
        );
        assert_eq!(editor.mode(), EditorMode::Idle);
        assert_eq!(editor.work_area(), Some(corners.as_slice()));
        assert_eq!(editor.canonical_work_area(0).unwrap()[0], corners[0]);
    }

    #[test]
    fn test_cancel_drawing_discards_points() {
        let mut editor = editor();
        editor.begin_work_area().unwrap();
        editor.add_work_area_point(GeoPoint::new(49.8, -97.08)).unwrap();
        editor.cancel();
        assert_eq!(editor.mode(), EditorMode::Idle);
        assert!(editor.work_area().is_none());
    }

    #[test]
    fn test_invalid_mode_leaves_state() {
        let mut editor = editor();
        let result = editor.add_work_area_point(GeoPoint::new(49.8, -97.08));
        assert!(matches!(
            result,
            Err(TemplateError::InvalidMode {
                expected: "DrawingWorkArea",
                actual: "Idle"
            })
        ));
        assert_eq!(editor.mode(), EditorMode::Idle);

        editor.begin_work_area().unwrap();
        assert!(editor.begin_work_area().is_err());
        assert!(editor.save_construction("X").is_err());
        assert!(editor.exit_training().is_err());
        assert!(editor.finish_sample_generation().is_err());
        assert_eq!(editor.mode(), EditorMode::DrawingWorkArea);
    }

    #[test]
    fn test_save_without_items() {
        let mut editor = editor();
        assert!(matches!(
            editor.save_construction("Empty"),
            Err(TemplateError::NoItemsToSave)
        ));
        assert!(editor.templates().unwrap().is_empty());
    }

    #[test]
    fn test_save_consumes_work_area() {
        let mut editor = editor_with_template();
        assert!(editor.work_area().is_none());
        let templates = editor.templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].work_area_corner_count(), 4);
    }

    #[test]
    fn test_place_without_selection() {
        let mut editor = editor();
        assert!(matches!(
            editor.place_selected_at(GeoPoint::new(50.0, -97.0), 0.0),
            Err(TemplateError::NoConstructionSelected)
        ));
        assert!(matches!(
            editor.train_selected(),
            Err(TemplateError::NoConstructionSelected)
        ));
    }

    #[test]
    fn test_select_and_place() {
        let mut editor = editor_with_template();
        editor.clear_placed_items();

        assert_eq!(editor.select_template(0).unwrap().name, "Square");
        assert_eq!(editor.mode(), EditorMode::Placing);
        assert!(editor.select_template(5).is_err());
        assert_eq!(editor.mode(), EditorMode::Placing);

        let canonical = reorder_points_for_ai(&square_corners(&GeoPoint::new(50.0, -97.0)), 0);
        let suggestion = fallback_placement(&canonical).unwrap();
        let layout = editor.place_selected(&suggestion).unwrap();

        assert_eq!(layout.items.len(), 2);
        assert!(layout.work_area.is_some());
        assert_eq!(editor.placed_items().len(), 2);
        assert_eq!(editor.mode(), EditorMode::Idle);

        // Placed cones are snap targets now
        let cone = layout.items[0].anchor().unwrap();
        assert_eq!(editor.snap_target(&cone), Some(cone));
    }

    #[test]
    fn test_training_flow() {
        let mut editor = editor_with_template();
        let center = GeoPoint::new(50.0, -97.0);
        let mut rng = StdRng::seed_from_u64(1);

        editor.enter_training(0).unwrap();
        assert_eq!(editor.mode(), EditorMode::TrainingVariation);

        editor.training_mut().unwrap().set_reference_point_index(2).unwrap();
        let variation = editor.generate_variation(center, &mut rng).unwrap();
        assert_eq!(variation.varied_corners[2], variation.base_corners[2]);

        editor.config.samples.sample_count = 120;
        let generator = editor
            .begin_sample_generation(center, StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(editor.mode(), EditorMode::GeneratingSamples);
        assert!(editor.training_mut().is_none());
        assert!(editor.generate_variation(center, &mut rng).is_err());

        let run = generator.run();
        assert_eq!(run.status, GenerationStatus::Completed);
        assert_eq!(run.total, 120);

        editor.finish_sample_generation().unwrap();
        assert_eq!(editor.mode(), EditorMode::TrainingVariation);
        assert_eq!(editor.training().unwrap().current_variation(), 1);

        editor.exit_training().unwrap();
        assert_eq!(editor.mode(), EditorMode::Idle);
    }

    #[test]
    fn test_cancel_generation_through_editor() {
        let mut editor = editor_with_template();
        editor.enter_training(0).unwrap();
        let mut generator = editor
            .begin_sample_generation(GeoPoint::new(50.0, -97.0), StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(generator.step(), GenerationStatus::Running);
        editor.cancel();
        assert_eq!(editor.mode(), EditorMode::GeneratingSamples);
        assert_eq!(generator.step(), GenerationStatus::Cancelled);

        let run = generator.finish();
        assert_eq!(run.total, 100);
        editor.finish_sample_generation().unwrap();
        assert_eq!(editor.mode(), EditorMode::TrainingVariation);
    }

    #[test]
    fn test_training_requires_work_area() {
        let mut editor = editor();
        editor.set_placed_items(vec![cone_at(GeoPoint::new(49.8, -97.08))]);
        editor.save_construction("No area").unwrap();

        assert!(matches!(
            editor.enter_training(0),
            Err(TemplateError::InsufficientWorkArea { .. })
        ));
        assert_eq!(editor.mode(), EditorMode::Idle);
    }
}
