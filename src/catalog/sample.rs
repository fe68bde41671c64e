//! Built-in catalog used when no data file can be loaded.

use serde_json::{json, Value};

use super::{normalize, Catalog};

pub fn sample_document() -> Value {
    json!({
        "collections": [
            { "id": "handhelds", "name": "Handhelds", "items": [] },
            {
                "id": "print-models",
                "name": "3D Print Models",
                "items": [{
                    "id": "STL-SAMPLE-001",
                    "name": "Calibration Cube - 20mm",
                    "thumb": "",
                    "tags": ["3d-print", "stl", "test-part"],
                    "asset": { "type": "stl", "src": "assets/models/calibration-cube.stl" },
                    "description": "Sample STL profile for viewer validation.",
                    "details": { "Category": "3D Print", "Source": "Local" },
                    "specs": { "Material": "PLA", "LayerHeight": "0.2mm" }
                }]
            }
        ]
    })
}

pub fn sample_catalog() -> Catalog {
    // The document above always has a collections array.
    normalize(&sample_document()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetRef;

    #[test]
    fn test_sample_catalog() {
        let catalog = sample_catalog();
        assert_eq!(catalog.collections().len(), 2);
        assert!(catalog.collections()[0].items.is_empty());

        let cube = &catalog.collections()[1].items[0];
        assert_eq!(cube.id, "STL-SAMPLE-001");
        assert_eq!(cube.asset, AssetRef::Model { src: "assets/models/calibration-cube.stl".into() });
        assert_eq!(cube.specs[1], ("LayerHeight".to_string(), "0.2mm".to_string()));
    }
}
