//! End-to-end template scenarios.
//!
//! Exercises the public API the way a map UI drives it: capture, store,
//! place, canonicalise the work area and generate training samples.
//!
//! Run with: `cargo test --test template_scenarios`
//! The SQLite restart test needs `--features persistence`.

use construction_templates::geo_utils::{haversine_distance, initial_bearing};
use construction_templates::{
    fallback_placement, load_construction, reorder_points_for_ai, Editor, EditorConfig,
    EditorMode, GenerationStatus, GeoPoint, KeyValueStore, LayoutItem, MemoryStore, SampleConfig,
    SuggestionSource, TemplateStore, WorkAreaProgress, CSV_HEADER, STORAGE_KEY,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Marker plus point 22.2 m apart on a north-south line.
fn cone_and_point() -> Vec<LayoutItem> {
    vec![
        LayoutItem::marker(GeoPoint::new(49.8000, -97.0800), "Cone", "assets/cone.png"),
        LayoutItem::point(GeoPoint::new(49.8002, -97.0800), "Taper"),
    ]
}

// ============================================================================
// Capture and reconstruction
// ============================================================================

#[test]
fn test_capture_and_load_scenario() {
    init_logging();
    let mut store = TemplateStore::new(MemoryStore::default());
    let items = cone_and_point();

    let template = store.save_construction("Test1", &items, None).unwrap();
    assert_eq!(template.name, "Test1");
    assert_eq!(template.items.len(), 2);
    assert!((template.reference_point.lat - 49.8001).abs() < 1e-9);
    assert!((template.reference_point.lng - -97.0800).abs() < 1e-9);

    let original = [
        items[0].anchor().unwrap(),
        items[1].anchor().unwrap(),
    ];
    let original_distance = haversine_distance(&original[0], &original[1]);
    assert!((original_distance - 22.24).abs() < 0.05);

    let stored = store.get(0).unwrap();
    let target = GeoPoint::new(50.0, -97.0);
    let placed = load_construction(&stored, target, 0.0);
    assert_eq!(placed.items.len(), 2);

    let marker = placed.items[0].anchor().unwrap();
    let point = placed.items[1].anchor().unwrap();
    assert!((haversine_distance(&marker, &point) - original_distance).abs() < 1e-3);

    // Marker sits south of the target, the point north of it
    let bearing = initial_bearing(&target, &point);
    assert!(bearing < 1e-6 || bearing > 360.0 - 1e-6);
    assert!((initial_bearing(&target, &marker) - 180.0).abs() < 1e-6);

    match &placed.items[0] {
        LayoutItem::Marker { popup_content, .. } => assert_eq!(popup_content, "Cone"),
        other => panic!("expected marker, got {:?}", other),
    }
}

#[test]
fn test_corrupt_store_heals() {
    init_logging();
    let mut store = TemplateStore::new(MemoryStore::default());
    store.save_construction("Kept", &cone_and_point(), None).unwrap();

    store.backend_mut().set(STORAGE_KEY, "{not json").unwrap();
    assert!(store.list().unwrap().is_empty());
    assert_eq!(
        store.backend().get(STORAGE_KEY).unwrap().as_deref(),
        Some("[]")
    );

    // Store is usable again
    store.save_construction("Fresh", &cone_and_point(), None).unwrap();
    assert_eq!(store.len().unwrap(), 1);
}

// ============================================================================
// Editor workflow
// ============================================================================

#[test]
fn test_editor_workflow() {
    init_logging();
    let config = EditorConfig {
        samples: SampleConfig {
            sample_count: 250,
            batch_size: 100,
            max_center_offset_m: 30.0,
        },
        ..Default::default()
    };
    let mut editor = Editor::new(TemplateStore::new(MemoryStore::default()), config);
    editor.set_placed_items(cone_and_point());

    // Work area clicked in arbitrary order around the layout
    let corners = vec![
        GeoPoint::new(49.8003, -97.0803),
        GeoPoint::new(49.7999, -97.0797),
        GeoPoint::new(49.8003, -97.0797),
        GeoPoint::new(49.7999, -97.0803),
    ];
    editor.begin_work_area().unwrap();
    let mut progress = None;
    for corner in &corners {
        progress = Some(editor.add_work_area_point(*corner).unwrap());
    }
    assert_eq!(progress, Some(WorkAreaProgress::Complete(corners.clone())));

    let canonical = editor.canonical_work_area(0).unwrap();
    assert_eq!(canonical[0], corners[0]);

    let template = editor.save_construction("Lane closure").unwrap();
    assert_eq!(template.work_area_corner_count(), 4);

    // Place the stored template on a new work area using the fallback
    let new_area = reorder_points_for_ai(
        &[
            GeoPoint::new(50.0000, -97.0000),
            GeoPoint::new(50.0004, -97.0000),
            GeoPoint::new(50.0004, -96.9994),
            GeoPoint::new(50.0000, -96.9994),
        ],
        0,
    );
    let suggestion = fallback_placement(&new_area).unwrap();
    assert_eq!(suggestion.source, SuggestionSource::Fallback);

    editor.clear_placed_items();
    editor.select_template(0).unwrap();
    let layout = editor.place_selected(&suggestion).unwrap();
    assert_eq!(layout.items.len(), 2);
    assert_eq!(layout.work_area.as_ref().map(Vec::len), Some(4));
    assert_eq!(layout.inventory().len(), 1);
    assert_eq!(editor.mode(), EditorMode::Idle);

    // Training and batch generation
    editor.enter_training(0).unwrap();
    let center = GeoPoint::new(50.0002, -96.9997);
    let mut rng = StdRng::seed_from_u64(11);
    let variation = editor.generate_variation(center, &mut rng).unwrap();
    assert_eq!(variation.varied_corners[0], variation.base_corners[0]);

    let generator = editor
        .begin_sample_generation(center, StdRng::seed_from_u64(12))
        .unwrap();
    let run = generator.run();
    editor.finish_sample_generation().unwrap();

    assert_eq!(run.status, GenerationStatus::Completed);
    assert_eq!(run.samples.len(), 250);
    let mut lines = run.csv.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER));
    assert_eq!(lines.count(), 250);
    assert!(run.samples.iter().all(|s| s.construction_name == "Lane closure"));

    editor.exit_training().unwrap();
    assert_eq!(editor.mode(), EditorMode::Idle);
}

// ============================================================================
// SQLite persistence
// ============================================================================

#[cfg(feature = "persistence")]
#[test]
fn test_templates_survive_restart() {
    use construction_templates::SqliteStore;
    use tempfile::TempDir;

    init_logging();
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir.path().join("templates.db");
    let db_path = db_path.to_str().unwrap();

    {
        let mut store = TemplateStore::new(SqliteStore::open(db_path).unwrap());
        store.save_construction("First", &cone_and_point(), None).unwrap();
        store.save_construction("Second", &cone_and_point(), None).unwrap();
    }

    let mut store = TemplateStore::new(SqliteStore::open(db_path).unwrap());
    let names: Vec<String> = store.list().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["First", "Second"]);

    store.delete(0).unwrap();
    assert_eq!(store.get(0).unwrap().name, "Second");
}
