use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DetectError, Result};

/// The three-class CT catalog of the reference deployment.
pub const BUNDLED_CATALOG_JSON: &str = include_str!("../assets/classes.json");

/// Color used for class ids the catalog doesn't know about.
pub const FALLBACK_COLOR: [u8; 3] = [255, 255, 0];

/// Display metadata for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    /// RGB
    pub color: [u8; 3],
}

/// Fixed `class_id -> (name, color)` table. Index in the list is the class id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassCatalog {
    classes: Vec<ClassInfo>,
}

impl ClassCatalog {
    pub fn new(classes: Vec<ClassInfo>) -> Result<Self> {
        if classes.is_empty() {
            return Err(DetectError::Catalog("catalog has no classes".to_string()));
        }
        if let Some(idx) = classes.iter().position(|c| c.name.trim().is_empty()) {
            return Err(DetectError::Catalog(format!("class {} has an empty name", idx)));
        }
        Ok(Self { classes })
    }

    /// Parse a JSON array of `{ "name": ..., "color": [r, g, b] }` entries.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let classes: Vec<ClassInfo> =
            serde_json::from_str(json).map_err(|e| DetectError::Catalog(e.to_string()))?;
        Self::new(classes)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, class_id: usize) -> Option<&ClassInfo> {
        self.classes.get(class_id)
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.classes.get(class_id) {
            Some(info) => info.name.clone(),
            None => format!("class_{}", class_id),
        }
    }

    pub fn color(&self, class_id: usize) -> [u8; 3] {
        self.classes
            .get(class_id)
            .map(|info| info.color)
            .unwrap_or(FALLBACK_COLOR)
    }
}
