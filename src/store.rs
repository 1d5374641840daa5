//! Template persistence over a single key-value entry.
//!
//! All templates live in one JSON array under [`STORAGE_KEY`]. Reads are
//! lenient: a blob that is not a JSON array is replaced by `[]`, entries
//! that are not objects are skipped, and missing or unreadable fields get
//! defaults. None of this is reported as an error; it is logged.

use std::collections::HashMap;

use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use crate::template::DEFAULT_TEMPLATE_NAME;
use crate::{
    ConstructionItem, ConstructionTemplate, GeoPoint, LayoutItem, OptionExt, RelativeOffset,
    Result, TemplateError,
};

/// Key under which the template array is stored.
pub const STORAGE_KEY: &str = "savedConstructions";

/// Prefix of generated template ids.
pub const ID_PREFIX: &str = "construction_";

/// A string key-value store, such as browser local storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-process key-value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Ordered collection of templates persisted under [`STORAGE_KEY`].
///
/// Templates are never edited in place: they are appended, read and
/// deleted by index. Every write rewrites the whole array.
#[derive(Debug)]
pub struct TemplateStore<S: KeyValueStore> {
    backend: S,
    last_id_millis: i64,
}

impl<S: KeyValueStore> TemplateStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            last_id_millis: 0,
        }
    }

    /// The underlying key-value store.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn into_inner(self) -> S {
        self.backend
    }

    /// All stored templates, in insertion order.
    ///
    /// A stored value that is not a JSON array is reset to `[]`.
    pub fn list(&mut self) -> Result<Vec<ConstructionTemplate>> {
        let Some(raw) = self.backend.get(STORAGE_KEY)? else {
            return Ok(Vec::new());
        };

        match decode_templates(&raw) {
            Some(templates) => Ok(templates),
            None => {
                warn!("[TemplateStore] Stored constructions are corrupt, resetting to empty");
                self.backend.set(STORAGE_KEY, "[]")?;
                Ok(Vec::new())
            }
        }
    }

    pub fn len(&mut self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Template at `index`.
    pub fn get(&mut self, index: usize) -> Result<ConstructionTemplate> {
        let templates = self.list()?;
        let len = templates.len();
        templates.into_iter().nth(index).ok_or_not_found(index, len)
    }

    /// Append a template and persist the array.
    pub fn add(&mut self, template: ConstructionTemplate) -> Result<()> {
        let mut templates = self.list()?;
        info!(
            "[TemplateStore] Adding '{}' ({} items)",
            template.name,
            template.items.len()
        );
        templates.push(template);
        self.write(&templates)
    }

    /// Remove and return the template at `index`.
    pub fn delete(&mut self, index: usize) -> Result<ConstructionTemplate> {
        let mut templates = self.list()?;
        if index >= templates.len() {
            return Err(TemplateError::TemplateNotFound {
                index,
                len: templates.len(),
            });
        }
        let removed = templates.remove(index);
        info!("[TemplateStore] Deleted '{}' at index {}", removed.name, index);
        self.write(&templates)?;
        Ok(removed)
    }

    /// Capture `items` as a new template and append it.
    ///
    /// Fails with `NoItemsToSave` without writing anything when `items` is
    /// empty. The name is stored as given; an empty one falls back to the
    /// default template name.
    pub fn save_construction(
        &mut self,
        name: &str,
        items: &[LayoutItem],
        work_area: Option<&[GeoPoint]>,
    ) -> Result<ConstructionTemplate> {
        let name = if name.is_empty() {
            DEFAULT_TEMPLATE_NAME
        } else {
            name
        };
        let mut templates = self.list()?;
        let id = self.next_id(&templates);
        let template = ConstructionTemplate::capture(&id, name, items, work_area)?;

        info!(
            "[TemplateStore] Saved '{}' as {} ({} items, {} work-area points)",
            template.name,
            template.id,
            template.items.len(),
            template.work_area_corner_count()
        );
        templates.push(template.clone());
        self.write(&templates)?;
        Ok(template)
    }

    /// Time-based id, strictly greater than any id issued or stored.
    fn next_id(&mut self, existing: &[ConstructionTemplate]) -> String {
        let stored_max = existing
            .iter()
            .filter_map(|t| t.id.strip_prefix(ID_PREFIX)?.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        let floor = self.last_id_millis.max(stored_max);
        let now = chrono::Utc::now().timestamp_millis();
        self.last_id_millis = if now > floor { now } else { floor + 1 };
        format!("{}{}", ID_PREFIX, self.last_id_millis)
    }

    fn write(&mut self, templates: &[ConstructionTemplate]) -> Result<()> {
        let json = serde_json::to_string(templates)?;
        self.backend.set(STORAGE_KEY, &json)
    }
}

/// Decode the stored array. `None` means the blob itself is unusable.
fn decode_templates(raw: &str) -> Option<Vec<ConstructionTemplate>> {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => return None,
        Err(e) => {
            debug!("[TemplateStore] Parse error: {}", e);
            return None;
        }
    };

    Some(
        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| decode_entry(index, entry))
            .collect(),
    )
}

/// Repair and decode one stored template.
fn decode_entry(index: usize, entry: Value) -> Option<ConstructionTemplate> {
    let Value::Object(mut fields) = entry else {
        warn!("[TemplateStore] Skipping entry {}: not an object", index);
        return None;
    };

    if !matches!(fields.get("name"), Some(Value::String(_))) {
        fields.insert("name".into(), Value::from(DEFAULT_TEMPLATE_NAME));
    }
    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    fields.insert("id".into(), Value::from(id));

    let items = take_items(index, &mut fields);
    let mut work_area = take_work_area(index, &mut fields);
    let reference = take_reference_point(&mut fields);
    if reference.is_none() && work_area.take().is_some() {
        warn!(
            "[TemplateStore] Entry {}: dropping work area without a reference point",
            index
        );
    }

    match serde_json::from_value::<ConstructionTemplate>(Value::Object(fields)) {
        Ok(mut template) => {
            template.items = items;
            template.work_area = work_area;
            // Items are relative, so a lost anchor only matters to the work area
            template.reference_point = reference.unwrap_or(GeoPoint::new(0.0, 0.0));
            Some(template)
        }
        Err(e) => {
            warn!("[TemplateStore] Skipping entry {}: {}", index, e);
            None
        }
    }
}

fn take_items(index: usize, fields: &mut Map<String, Value>) -> Vec<ConstructionItem> {
    let raw = match fields.insert("items".into(), Value::Array(Vec::new())) {
        Some(Value::Array(raw)) => raw,
        Some(_) | None => return Vec::new(),
    };

    let total = raw.len();
    let items: Vec<ConstructionItem> = raw
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if items.len() < total {
        warn!(
            "[TemplateStore] Entry {}: dropped {} unreadable items",
            index,
            total - items.len()
        );
    }
    items
}

/// Remove the stored reference point, leaving a placeholder for decoding.
fn take_reference_point(fields: &mut Map<String, Value>) -> Option<GeoPoint> {
    let placeholder = json!({ "lat": 0.0, "lng": 0.0 });
    fields
        .insert("referencePoint".into(), placeholder)
        .and_then(|value| serde_json::from_value(value).ok())
}

fn take_work_area(index: usize, fields: &mut Map<String, Value>) -> Option<Vec<RelativeOffset>> {
    match fields.remove("workArea") {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(corners) => Some(corners),
            Err(e) => {
                warn!("[TemplateStore] Entry {}: dropping unreadable work area: {}", index, e);
                None
            }
        },
    }
}
