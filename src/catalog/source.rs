//! Catalog data sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{normalize, sample_catalog, Catalog};
use crate::util::{Error, Result};

/// Data files tried in order under the catalog root.
pub const DEFAULT_SOURCES: [&str; 2] = ["monospec-data.generated.json", "monospec-data.json"];

/// Where the loaded catalog came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOrigin {
    File { name: String, path: PathBuf },
    Sample,
}

/// Result of [`load_catalog`]: always usable.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: Arc<Catalog>,
    pub origin: CatalogOrigin,
    /// Sources that were tried and rejected, with the reason.
    pub failures: Vec<(String, String)>,
}

impl LoadedCatalog {
    /// Status bar text and whether the status LED is lit.
    pub fn status(&self) -> (String, bool) {
        match &self.origin {
            CatalogOrigin::File { name, .. } => (format!("DATA: {}", name.to_uppercase()), true),
            CatalogOrigin::Sample => ("DATA: SAMPLE".to_string(), false),
        }
    }
}

/// Read and normalize one catalog file.
pub fn load_file(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    let doc: serde_json::Value = serde_json::from_str(&text)?;
    normalize(&doc)
}

/// Try each source under `root` in order, then fall back to the built-in sample.
pub fn load_catalog<S: AsRef<str>>(root: &Path, sources: &[S]) -> LoadedCatalog {
    let mut failures = Vec::new();
    for name in sources {
        let name: &str = name.as_ref();
        let path = root.join(name);
        match load_file(&path) {
            Ok(catalog) => {
                tracing::info!(source = name, collections = catalog.collections().len(), "catalog loaded");
                return LoadedCatalog {
                    catalog: Arc::new(catalog),
                    origin: CatalogOrigin::File { name: name.to_string(), path },
                    failures,
                };
            }
            Err(e) => {
                tracing::warn!(source = name, error = %e, "data source failed");
                failures.push((name.to_string(), e.to_string()));
            }
        }
    }

    tracing::info!("using built-in sample catalog");
    LoadedCatalog {
        catalog: Arc::new(sample_catalog()),
        origin: CatalogOrigin::Sample,
        failures,
    }
}
