//! Item catalog model.
//!
//! A [`Catalog`] is built once at load time from a JSON document and is
//! read-only afterwards. Items are shared as `Arc<Item>` so the selection
//! controller and the session manager reference them without copying.

mod normalize;
mod sample;
mod source;

pub use normalize::normalize;
pub use sample::{sample_catalog, sample_document};
pub use source::{load_catalog, load_file, CatalogOrigin, LoadedCatalog, DEFAULT_SOURCES};

use std::collections::HashSet;
use std::sync::Arc;

use crate::util::{Error, Result};

/// Fallback playback rate for frame sequences without a usable `fps`.
pub const DEFAULT_SEQUENCE_FPS: f32 = 12.0;

/// Upper bound on frames a sequence preloads.
pub const MAX_SEQUENCE_FRAMES: u32 = 10_000;

/// Reference to the media or geometry an item previews.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRef {
    /// `img` or `gif`. Animated images show their first frame.
    Image { src: String, animated: bool },
    /// `webm`, played muted and looping.
    Video { src: String },
    /// `pngseq`: `{base}0001.png ..= {base}{count:04}.png`.
    FrameSequence {
        base: Option<String>,
        count: Option<u32>,
        fps: f32,
    },
    /// `stl`, binary or ASCII.
    Model { src: String },
    /// Missing or unrecognized `type`.
    Unknown { kind: Option<String> },
}

impl AssetRef {
    /// Catalog spelling of the asset type.
    pub fn kind(&self) -> &str {
        match self {
            Self::Image { animated: false, .. } => "img",
            Self::Image { animated: true, .. } => "gif",
            Self::Video { .. } => "webm",
            Self::FrameSequence { .. } => "pngseq",
            Self::Model { .. } => "stl",
            Self::Unknown { kind } => kind.as_deref().unwrap_or("none"),
        }
    }

    /// Primary source path, if the asset has one.
    pub fn src(&self) -> Option<&str> {
        match self {
            Self::Image { src, .. } | Self::Video { src } | Self::Model { src } => Some(src),
            Self::FrameSequence { base, .. } => base.as_deref(),
            Self::Unknown { .. } => None,
        }
    }

    /// Check that the fields required by the asset type are present.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::FrameSequence { base, count, .. } => {
                if base.as_deref().map_or(true, str::is_empty) {
                    return Err(Error::MissingAssetField { kind: "pngseq", field: "base" });
                }
                if count.map_or(true, |c| c == 0) {
                    return Err(Error::MissingAssetField { kind: "pngseq", field: "count" });
                }
                Ok(())
            }
            Self::Unknown { kind } => Err(Error::UnsupportedAsset(
                kind.clone().unwrap_or_else(|| "<missing>".into()),
            )),
            _ => Ok(()),
        }
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub thumb: String,
    pub tags: Vec<String>,
    pub asset: AssetRef,
    pub description: String,
    pub details: Vec<(String, String)>,
    pub specs: Vec<(String, String)>,
}

impl Item {
    /// Case-insensitive substring match on id, name or any tag.
    ///
    /// `needle` must already be trimmed and lowercased; an empty needle matches.
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.id.to_lowercase().contains(needle)
            || self.name.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub items: Vec<Arc<Item>>,
}

/// Normalized collections in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    collections: Vec<Collection>,
}

impl Catalog {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    /// Look up a collection, falling back to the first one for unknown ids.
    pub fn resolve(&self, id: Option<&str>) -> Option<&Collection> {
        id.and_then(|id| self.collection(id))
            .or_else(|| self.collections.first())
    }

    pub fn item_count(&self) -> usize {
        self.collections.iter().map(|c| c.items.len()).sum()
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.collections.iter().flat_map(|c| c.items.iter())
    }

    /// Item ids that appear more than once, in first-repeat order.
    pub fn duplicate_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for item in self.items() {
            if !seen.insert(item.id.as_str()) && !dupes.contains(&item.id) {
                dupes.push(item.id.clone());
            }
        }
        dupes
    }
}
