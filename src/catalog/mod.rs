//! Product catalog
//!
//! The engine only ever reads catalog entries. Hosts hand it a
//! `CatalogProvider`; a session takes one snapshot when it starts and
//! refreshes it for manual queries.

pub mod resolver;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use resolver::{normalize_query, resolve_code, resolve_query, MatchResult, MatchRule};

/// Errors loading a catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A product record consulted for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    pub sku: String,
    pub name: String,
    /// Display fields owned by the host (price, stock, image...)
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, sku: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            barcode: None,
            sku: sku.into(),
            name: name.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Barcode if present and non-empty
    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref().filter(|b| !b.is_empty())
    }
}

/// Source of catalog snapshots
pub trait CatalogProvider {
    /// Current product list
    fn snapshot(&self) -> Vec<CatalogEntry>;
}

impl<P: CatalogProvider + ?Sized> CatalogProvider for Arc<P> {
    fn snapshot(&self) -> Vec<CatalogEntry> {
        (**self).snapshot()
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Parse a JSON array of entries
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// Load a JSON array of entries from disk
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&json)?;
        log::info!("Loaded {} catalog entries from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CatalogProvider for StaticCatalog {
    fn snapshot(&self) -> Vec<CatalogEntry> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_json() {
        let json = r#"[
            {"id": "1", "sku": "SKU1", "name": "Milk", "barcode": "7791234", "price": 1.5},
            {"id": "2", "sku": "SKU2", "name": "Bread"}
        ]"#;
        let catalog = StaticCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let milk = &catalog.entries()[0];
        assert_eq!(milk.barcode(), Some("7791234"));
        assert_eq!(milk.metadata.get("price"), Some(&serde_json::json!(1.5)));

        let bread = &catalog.entries()[1];
        assert_eq!(bread.barcode(), None);
        assert!(bread.metadata.is_empty());
    }

    #[test]
    fn test_empty_barcode_counts_as_absent() {
        let entry = CatalogEntry::new("1", "SKU1", "Milk").with_barcode("");
        assert_eq!(entry.barcode(), None);
    }

    #[test]
    fn test_parse_error() {
        let err = StaticCatalog::from_json_str("{\"id\": 1}").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StaticCatalog::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let catalog = StaticCatalog::new(vec![CatalogEntry::new("1", "SKU1", "Milk")]);
        let mut snapshot = catalog.snapshot();
        snapshot.clear();
        assert_eq!(catalog.len(), 1);
    }
}
