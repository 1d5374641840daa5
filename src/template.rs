//! Construction template model and capture.
//!
//! A template stores every item as [`RelativeOffset`]s from a single anchor,
//! the midpoint of the bounding box over all captured coordinates. The
//! optional work area keeps its corners in click order.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{Bounds, GeoPoint, RelativeOffset, Result, TemplateError};

/// Label given to points captured without one.
pub const DEFAULT_POINT_LABEL: &str = "Point";

/// Spacing used when a line carries no usable segment distance.
pub const DEFAULT_SEGMENT_DISTANCE_M: f64 = 10.0;

/// Name given to stored templates that lost theirs.
pub const DEFAULT_TEMPLATE_NAME: &str = "Unnamed Construction";

/// Fewest corners a captured work area may have.
pub const MIN_WORK_AREA_POINTS: usize = 3;

// ============================================================================
// Absolute items (as placed on the map)
// ============================================================================

/// An item as it sits on the map, in absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LayoutItem {
    Marker {
        position: GeoPoint,
        popup_content: String,
        icon_url: String,
    },
    Line {
        start: GeoPoint,
        end: GeoPoint,
        segmented: bool,
        segment_distance: f64,
    },
    Point {
        position: GeoPoint,
        label: String,
    },
}

impl LayoutItem {
    pub fn marker(position: GeoPoint, popup_content: &str, icon_url: &str) -> Self {
        LayoutItem::Marker {
            position,
            popup_content: popup_content.to_string(),
            icon_url: icon_url.to_string(),
        }
    }

    /// An unsegmented line.
    pub fn line(start: GeoPoint, end: GeoPoint) -> Self {
        LayoutItem::Line {
            start,
            end,
            segmented: false,
            segment_distance: DEFAULT_SEGMENT_DISTANCE_M,
        }
    }

    pub fn segmented_line(start: GeoPoint, end: GeoPoint, segment_distance: f64) -> Self {
        LayoutItem::Line {
            start,
            end,
            segmented: true,
            segment_distance,
        }
    }

    pub fn point(position: GeoPoint, label: &str) -> Self {
        LayoutItem::Point {
            position,
            label: label.to_string(),
        }
    }

    /// Every coordinate the item occupies (both endpoints for lines).
    pub fn coordinates(&self) -> Vec<GeoPoint> {
        match self {
            LayoutItem::Marker { position, .. } | LayoutItem::Point { position, .. } => {
                vec![*position]
            }
            LayoutItem::Line { start, end, .. } => vec![*start, *end],
        }
    }

    /// Single anchor coordinate, used for snapping. Lines have none.
    pub fn anchor(&self) -> Option<GeoPoint> {
        match self {
            LayoutItem::Marker { position, .. } | LayoutItem::Point { position, .. } => {
                Some(*position)
            }
            LayoutItem::Line { .. } => None,
        }
    }
}

// ============================================================================
// Relative items (as stored in a template)
// ============================================================================

/// Marker metadata re-attached on reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    #[serde(default)]
    pub popup_content: String,
    #[serde(default)]
    pub icon_url: String,
}

/// A template item, positioned relative to the template's reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ItemRecord", into = "ItemRecord")]
pub enum ConstructionItem {
    Marker {
        offset: RelativeOffset,
        item_data: MarkerData,
    },
    Line {
        start_offset: RelativeOffset,
        end_offset: RelativeOffset,
        segmented: bool,
        segment_distance: f64,
    },
    Point {
        offset: RelativeOffset,
        label: String,
    },
}

impl ConstructionItem {
    /// Convert an absolute item into offsets from `reference`.
    pub fn from_layout(item: &LayoutItem, reference: &GeoPoint) -> Self {
        match item {
            LayoutItem::Marker {
                position,
                popup_content,
                icon_url,
            } => ConstructionItem::Marker {
                offset: RelativeOffset::between(reference, position),
                item_data: MarkerData {
                    popup_content: popup_content.clone(),
                    icon_url: normalize_icon_url(icon_url),
                },
            },
            LayoutItem::Line {
                start,
                end,
                segmented,
                segment_distance,
            } => ConstructionItem::Line {
                start_offset: RelativeOffset::between(reference, start),
                end_offset: RelativeOffset::between(reference, end),
                segmented: *segmented,
                segment_distance: sanitize_segment_distance(*segment_distance),
            },
            LayoutItem::Point { position, label } => ConstructionItem::Point {
                offset: RelativeOffset::between(reference, position),
                label: if label.is_empty() {
                    DEFAULT_POINT_LABEL.to_string()
                } else {
                    label.clone()
                },
            },
        }
    }

    /// Stored offsets in item order (two for lines).
    pub fn offsets(&self) -> Vec<RelativeOffset> {
        match self {
            ConstructionItem::Marker { offset, .. } | ConstructionItem::Point { offset, .. } => {
                vec![*offset]
            }
            ConstructionItem::Line {
                start_offset,
                end_offset,
                ..
            } => vec![*start_offset, *end_offset],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConstructionItem::Marker { .. } => "marker",
            ConstructionItem::Line { .. } => "line",
            ConstructionItem::Point { .. } => "point",
        }
    }
}

/// Persisted layout of an item, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ItemRecord {
    Marker {
        distance: f64,
        bearing: f64,
        #[serde(rename = "itemData", default)]
        item_data: MarkerData,
    },
    Line {
        start: RelativeOffset,
        end: RelativeOffset,
        #[serde(default)]
        segmented: bool,
        #[serde(rename = "segmentDistance", default = "default_segment_distance")]
        segment_distance: f64,
    },
    Point {
        distance: f64,
        bearing: f64,
        #[serde(default = "default_point_label")]
        label: String,
    },
}

fn default_segment_distance() -> f64 {
    DEFAULT_SEGMENT_DISTANCE_M
}

fn default_point_label() -> String {
    DEFAULT_POINT_LABEL.to_string()
}

impl From<ItemRecord> for ConstructionItem {
    fn from(record: ItemRecord) -> Self {
        match record {
            ItemRecord::Marker {
                distance,
                bearing,
                item_data,
            } => ConstructionItem::Marker {
                offset: RelativeOffset::new(distance, bearing),
                item_data,
            },
            ItemRecord::Line {
                start,
                end,
                segmented,
                segment_distance,
            } => ConstructionItem::Line {
                start_offset: start,
                end_offset: end,
                segmented,
                segment_distance: sanitize_segment_distance(segment_distance),
            },
            ItemRecord::Point {
                distance,
                bearing,
                label,
            } => ConstructionItem::Point {
                offset: RelativeOffset::new(distance, bearing),
                label,
            },
        }
    }
}

impl From<ConstructionItem> for ItemRecord {
    fn from(item: ConstructionItem) -> Self {
        match item {
            ConstructionItem::Marker { offset, item_data } => ItemRecord::Marker {
                distance: offset.distance,
                bearing: offset.bearing,
                item_data,
            },
            ConstructionItem::Line {
                start_offset,
                end_offset,
                segmented,
                segment_distance,
            } => ItemRecord::Line {
                start: start_offset,
                end: end_offset,
                segmented,
                segment_distance,
            },
            ConstructionItem::Point { offset, label } => ItemRecord::Point {
                distance: offset.distance,
                bearing: offset.bearing,
                label,
            },
        }
    }
}

// ============================================================================
// Template
// ============================================================================

/// A saved, reusable layout in relative geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    /// Bounding-box midpoint of the captured items
    pub reference_point: GeoPoint,
    pub items: Vec<ConstructionItem>,
    /// Work-area corners in click order, relative to `reference_point`
    #[serde(default)]
    pub work_area: Option<Vec<RelativeOffset>>,
}

impl ConstructionTemplate {
    /// Capture `items` (and optionally a work area) as a template.
    ///
    /// The reference point is the midpoint of the bounding box over every
    /// item coordinate. Work areas with fewer than three corners are dropped.
    ///
    /// # Example
    /// ```
    /// use construction_templates::{ConstructionTemplate, GeoPoint, LayoutItem};
    ///
    /// let items = vec![
    ///     LayoutItem::marker(GeoPoint::new(49.8000, -97.08), "Cone", ""),
    ///     LayoutItem::point(GeoPoint::new(49.8002, -97.08), "End"),
    /// ];
    /// let template = ConstructionTemplate::capture("c1", "Test1", &items, None).unwrap();
    /// assert!((template.reference_point.lat - 49.8001).abs() < 1e-9);
    /// ```
    pub fn capture(
        id: &str,
        name: &str,
        items: &[LayoutItem],
        work_area: Option<&[GeoPoint]>,
    ) -> Result<Self> {
        let coordinates: Vec<GeoPoint> = items.iter().flat_map(|i| i.coordinates()).collect();
        let bounds = Bounds::from_points(&coordinates).ok_or(TemplateError::NoItemsToSave)?;
        let reference_point = bounds.center();

        let work_area = match work_area {
            Some(points) if points.len() >= MIN_WORK_AREA_POINTS => Some(
                points
                    .iter()
                    .map(|p| RelativeOffset::between(&reference_point, p))
                    .collect(),
            ),
            Some(points) => {
                debug!(
                    "[Template] Ignoring work area with {} points (minimum {})",
                    points.len(),
                    MIN_WORK_AREA_POINTS
                );
                None
            }
            None => None,
        };

        let items = items
            .iter()
            .map(|item| ConstructionItem::from_layout(item, &reference_point))
            .collect();

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            reference_point,
            items,
            work_area,
        })
    }

    /// Number of stored work-area corners (0 without a work area).
    pub fn work_area_corner_count(&self) -> usize {
        self.work_area.as_ref().map_or(0, |w| w.len())
    }

    pub fn has_work_area(&self) -> bool {
        self.work_area_corner_count() >= MIN_WORK_AREA_POINTS
    }

    /// The work-area offsets, provided there are at least `minimum` corners.
    pub fn require_work_area(&self, minimum: usize) -> Result<&[RelativeOffset]> {
        match &self.work_area {
            Some(corners) if corners.len() >= minimum => Ok(corners),
            _ => Err(TemplateError::InsufficientWorkArea {
                name: self.name.clone(),
                corner_count: self.work_area_corner_count(),
                minimum_required: minimum,
            }),
        }
    }

    /// Work-area corners re-expanded at the stored reference point, unrotated.
    pub fn absolute_work_area(&self) -> Option<Vec<GeoPoint>> {
        self.work_area.as_ref().map(|corners| {
            corners
                .iter()
                .map(|o| o.resolve(&self.reference_point, 0.0))
                .collect()
        })
    }
}

/// Icon path as stored in templates: the file name under `assets/`.
pub fn normalize_icon_url(src: &str) -> String {
    match src.rsplit('/').next() {
        Some(file) if !file.is_empty() => format!("assets/{}", file),
        _ => String::new(),
    }
}

/// Usable segment spacing: positive and finite, else the default.
pub(crate) fn sanitize_segment_distance(distance: f64) -> f64 {
    if distance.is_finite() && distance > 0.0 {
        distance
    } else {
        DEFAULT_SEGMENT_DISTANCE_M
    }
}
