//! Lenient normalization of catalog JSON documents.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::{AssetRef, Catalog, Collection, Item, DEFAULT_SEQUENCE_FPS, MAX_SEQUENCE_FRAMES};
use crate::util::{Error, Result};

/// Build a [`Catalog`] from a parsed document.
///
/// The only hard failure is a document without a `collections` array.
/// Everything below that level is filled with defaults. Duplicate item ids
/// are logged and kept.
pub fn normalize(doc: &Value) -> Result<Catalog> {
    let cols = doc
        .get("collections")
        .ok_or_else(|| Error::catalog("missing collections"))?
        .as_array()
        .ok_or_else(|| Error::catalog("collections is not an array"))?;

    let collections = cols
        .iter()
        .enumerate()
        .map(|(idx, col)| normalize_collection(idx, col))
        .collect();

    let catalog = Catalog::new(collections);
    for id in catalog.duplicate_ids() {
        tracing::warn!(id = %id, "duplicate item id");
    }
    Ok(catalog)
}

fn normalize_collection(idx: usize, col: &Value) -> Collection {
    let id = field_string(col, "id").unwrap_or_else(|| format!("collection-{}", idx + 1));
    let name = field_string(col, "name")
        .or_else(|| field_string(col, "id"))
        .unwrap_or_else(|| format!("Collection {}", idx + 1));
    let items = col
        .get("items")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(|it| Arc::new(normalize_item(it))).collect())
        .unwrap_or_default();
    Collection { id, name, items }
}

fn normalize_item(raw: &Value) -> Item {
    Item {
        id: field_string(raw, "id").unwrap_or_else(|| "UNSET-ID".into()),
        name: field_string(raw, "name").unwrap_or_else(|| "Unnamed Item".into()),
        thumb: field_string(raw, "thumb").unwrap_or_default(),
        tags: normalize_tags(raw.get("tags")),
        asset: match raw.get("asset") {
            Some(Value::Object(obj)) => normalize_asset(obj),
            _ => AssetRef::Image { src: String::new(), animated: false },
        },
        description: field_string(raw, "description").unwrap_or_default(),
        details: normalize_map(raw.get("details")),
        specs: normalize_map(raw.get("specs")),
    }
}

fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(arr)) = value else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::with_capacity(arr.len());
    for tag in arr.iter().map(stringify) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn normalize_map(value: Option<&Value>) -> Vec<(String, String)> {
    match value {
        Some(Value::Object(obj)) => obj.iter().map(|(k, v)| (k.clone(), stringify(v))).collect(),
        _ => Vec::new(),
    }
}

fn normalize_asset(obj: &Map<String, Value>) -> AssetRef {
    let kind = obj.get("type").and_then(Value::as_str).map(str::to_ascii_lowercase);
    let src = || obj.get("src").filter(|v| truthy(v)).map(stringify).unwrap_or_default();

    match kind.as_deref() {
        Some("img") => AssetRef::Image { src: src(), animated: false },
        Some("gif") => AssetRef::Image { src: src(), animated: true },
        Some("webm") => AssetRef::Video { src: src() },
        Some("stl") => AssetRef::Model { src: src() },
        Some("pngseq") => AssetRef::FrameSequence {
            base: obj.get("base").filter(|v| truthy(v)).map(stringify),
            count: obj.get("count").and_then(positive_count),
            fps: obj
                .get("fps")
                .and_then(number)
                .map(|f| f as f32)
                .filter(|f| f.is_finite() && *f > 0.0)
                .unwrap_or(DEFAULT_SEQUENCE_FPS),
        },
        _ => AssetRef::Unknown {
            kind: obj.get("type").filter(|v| truthy(v)).map(stringify),
        },
    }
}

/// Non-empty string form of a field, treating falsy JSON values as absent.
fn field_string(value: &Value, key: &str) -> Option<String> {
    value.get(key).filter(|v| truthy(v)).map(stringify)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive_count(value: &Value) -> Option<u32> {
    number(value)
        .filter(|f| f.is_finite() && *f >= 1.0)
        .map(|f| f.floor().min(f64::from(MAX_SEQUENCE_FRAMES)) as u32)
}
