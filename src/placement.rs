//! Reconstruction of templates at a target point and rotation.
//!
//! [`load_construction`] is a pure function of (template, target, rotation):
//! every stored offset is turned by the rotation and re-expanded from the
//! target. Drawing the result is a separate step through [`MapSurface`], so
//! the geometry can be tested without any rendering backend.

use serde::Serialize;

use crate::template::{sanitize_segment_distance, LayoutItem};

/// Most segments drawn along one line.
pub const MAX_SEGMENTS: usize = 10_000;
use crate::{geo_utils, Bounds, ConstructionItem, ConstructionTemplate, GeoPoint, RelativeOffset};

/// A reconstructed item in absolute coordinates.
///
/// Same shape as a captured [`LayoutItem`], so a placed layout can be
/// captured again.
pub type PlacedItem = LayoutItem;

/// Result of placing a template on the map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PlacedLayout {
    /// Work-area polygon, when the template has at least three corners
    pub work_area: Option<Vec<GeoPoint>>,
    pub items: Vec<LayoutItem>,
}

/// Count of one marker kind in a placed layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    pub name: String,
    pub icon_url: String,
    pub count: u32,
}

/// An interpolated point along a segmented line.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPoint {
    pub position: GeoPoint,
    pub label: String,
}

/// Place `template` with its reference point at `target`, turned by
/// `rotation` degrees clockwise.
///
/// # Example
/// ```
/// use construction_templates::{load_construction, ConstructionTemplate, GeoPoint, LayoutItem};
///
/// let items = vec![LayoutItem::point(GeoPoint::new(49.8, -97.08), "A")];
/// let template = ConstructionTemplate::capture("c1", "One", &items, None).unwrap();
/// let placed = load_construction(&template, GeoPoint::new(50.0, -97.0), 45.0);
/// assert_eq!(placed.items.len(), 1);
/// assert!(placed.work_area.is_none());
/// ```
pub fn load_construction(
    template: &ConstructionTemplate,
    target: GeoPoint,
    rotation: f64,
) -> PlacedLayout {
    let work_area = template
        .work_area
        .as_ref()
        .filter(|corners| corners.len() >= crate::template::MIN_WORK_AREA_POINTS)
        .map(|corners| place_offsets(corners, target, rotation));

    let items = template
        .items
        .iter()
        .map(|item| place_item(item, target, rotation))
        .collect();

    PlacedLayout { work_area, items }
}

/// Re-expand a list of offsets at `target` with `rotation`.
pub fn place_offsets(offsets: &[RelativeOffset], target: GeoPoint, rotation: f64) -> Vec<GeoPoint> {
    offsets.iter().map(|o| o.resolve(&target, rotation)).collect()
}

fn place_item(item: &ConstructionItem, target: GeoPoint, rotation: f64) -> PlacedItem {
    match item {
        ConstructionItem::Marker { offset, item_data } => LayoutItem::Marker {
            position: offset.resolve(&target, rotation),
            popup_content: item_data.popup_content.clone(),
            icon_url: item_data.icon_url.clone(),
        },
        ConstructionItem::Line {
            start_offset,
            end_offset,
            segmented,
            segment_distance,
        } => LayoutItem::Line {
            start: start_offset.resolve(&target, rotation),
            end: end_offset.resolve(&target, rotation),
            segmented: *segmented,
            segment_distance: *segment_distance,
        },
        ConstructionItem::Point { offset, label } => LayoutItem::Point {
            position: offset.resolve(&target, rotation),
            label: label.clone(),
        },
    }
}

/// Rotate `point` about `center` by `angle` degrees clockwise, keeping
/// its distance from `center`.
pub fn rotate_about(point: &GeoPoint, center: &GeoPoint, angle: f64) -> GeoPoint {
    RelativeOffset::between(center, point).resolve(center, angle)
}

/// Evenly spaced points from `start` to `end`, roughly `spacing` meters
/// apart, labelled `Start`, `<d> m`, ..., `End`.
///
/// At least one segment is produced, so the result always has both ends.
/// Zero, negative or non-finite spacing falls back to the default segment
/// distance, and the segment count is capped at [`MAX_SEGMENTS`].
pub fn segment_points(start: GeoPoint, end: GeoPoint, spacing: f64) -> Vec<SegmentPoint> {
    let spacing = sanitize_segment_distance(spacing);
    let length = geo_utils::haversine_distance(&start, &end);
    let segments = ((length / spacing).round() as usize).clamp(1, MAX_SEGMENTS);

    (0..=segments)
        .map(|i| {
            let ratio = i as f64 / segments as f64;
            let position = GeoPoint::new(
                start.lat + (end.lat - start.lat) * ratio,
                start.lng + (end.lng - start.lng) * ratio,
            );
            let label = if i == 0 {
                "Start".to_string()
            } else if i == segments {
                "End".to_string()
            } else {
                format!("{} m", (i as f64 * spacing * 10.0).round() / 10.0)
            };
            SegmentPoint { position, label }
        })
        .collect()
}

impl PlacedLayout {
    /// Marker counts grouped by popup content, in first-seen order.
    pub fn inventory(&self) -> Vec<InventoryEntry> {
        let mut entries: Vec<InventoryEntry> = Vec::new();
        for item in &self.items {
            if let LayoutItem::Marker {
                popup_content,
                icon_url,
                ..
            } = item
            {
                match entries.iter_mut().find(|e| &e.name == popup_content) {
                    Some(entry) => entry.count += 1,
                    None => entries.push(InventoryEntry {
                        name: popup_content.clone(),
                        icon_url: icon_url.clone(),
                        count: 1,
                    }),
                }
            }
        }
        entries
    }

    /// Bounds over the work area and every item, for fitting the viewport.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut points: Vec<GeoPoint> = self.work_area.clone().unwrap_or_default();
        points.extend(self.items.iter().flat_map(|i| i.coordinates()));
        Bounds::from_points(&points)
    }

    /// Draw the layout: work-area polygon first, then each item.
    ///
    /// Returns every handle created, in drawing order.
    pub fn render<S: MapSurface>(&self, surface: &mut S) -> Vec<S::Handle> {
        let mut handles = Vec::new();
        if let Some(ring) = &self.work_area {
            handles.push(surface.place_polygon(ring, &ShapeStyle::WORK_AREA));
        }
        render_items(&self.items, surface, &mut handles);
        handles
    }
}

pub(crate) fn render_items<S: MapSurface>(
    items: &[PlacedItem],
    surface: &mut S,
    handles: &mut Vec<S::Handle>,
) {
    for item in items {
        match item {
            LayoutItem::Marker {
                position,
                popup_content,
                icon_url,
            } => handles.push(surface.place_point(
                *position,
                &PointStyle::Icon {
                    icon_url: icon_url.clone(),
                    popup: popup_content.clone(),
                },
            )),
            LayoutItem::Line {
                start,
                end,
                segmented,
                segment_distance,
            } => {
                handles.push(surface.place_line(*start, *end, &ShapeStyle::LINE));
                if *segmented {
                    for point in segment_points(*start, *end, *segment_distance) {
                        handles.push(surface.place_point(
                            point.position,
                            &PointStyle::SegmentPoint { label: point.label },
                        ));
                    }
                }
            }
            LayoutItem::Point { position, label } => handles.push(surface.place_point(
                *position,
                &PointStyle::Labeled {
                    label: label.clone(),
                },
            )),
        }
    }
}

// ============================================================================
// Rendering surface
// ============================================================================

/// How a point-like object is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum PointStyle {
    /// Device marker with its icon and popup text
    Icon { icon_url: String, popup: String },
    /// Labelled point
    Labeled { label: String },
    /// Interpolated point on a segmented line
    SegmentPoint { label: String },
    /// Numbered work-area corner
    Corner { label: String, is_reference: bool },
}

/// Stroke and fill of a line or polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeStyle {
    pub color: &'static str,
    pub weight: u32,
    pub fill_color: Option<&'static str>,
    pub fill_opacity: f64,
    pub dash_array: Option<&'static str>,
}

impl ShapeStyle {
    pub const WORK_AREA: ShapeStyle = ShapeStyle {
        color: "#ff7800",
        weight: 2,
        fill_color: Some("#ff9933"),
        fill_opacity: 0.2,
        dash_array: Some("5, 5"),
    };

    pub const LINE: ShapeStyle = ShapeStyle {
        color: "#3b82f6",
        weight: 3,
        fill_color: None,
        fill_opacity: 0.0,
        dash_array: None,
    };
}

/// A map that can draw and remove objects.
///
/// The crate never reads back from the surface; handles are opaque tokens
/// the caller uses to remove what was drawn.
pub trait MapSurface {
    type Handle;

    fn place_point(&mut self, at: GeoPoint, style: &PointStyle) -> Self::Handle;

    fn place_line(&mut self, start: GeoPoint, end: GeoPoint, style: &ShapeStyle) -> Self::Handle;

    fn place_polygon(&mut self, ring: &[GeoPoint], style: &ShapeStyle) -> Self::Handle;

    fn remove(&mut self, handle: Self::Handle);
}
