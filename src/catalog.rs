//! Database boundary.
//!
//! The advisor never talks to a server itself. Whatever can answer
//! `listIndexes`, `collStats` and `explain` for a namespace implements
//! [`IndexCatalog`]; [`OfflineCatalog`] answers from a JSON snapshot.

use crate::document::extjson::document_from_json;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::namespace::Namespace;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub trait IndexCatalog: Send + Sync {
    /// Indexes currently defined on the collection. Unknown collections
    /// have none.
    fn list_indexes(&self, namespace: &Namespace) -> Result<Vec<Index>>;

    fn collection_stats(&self, namespace: &Namespace) -> Result<Option<Document>>;

    /// Explain output for `command`, or `None` when no plan is available.
    fn explain(&self, namespace: &Namespace, command: &Document) -> Result<Option<Document>>;
}

#[derive(Debug, Clone, Default)]
struct CatalogEntry {
    indexes: Vec<Index>,
    stats: Option<Document>,
    explain: Option<Document>,
}

/// Catalog backed by a snapshot file of the form
/// `{ "db.coll": { "indexes": [...], "stats": {...}, "explain": {...} } }`.
///
/// The `explain` document is returned for every command on that namespace.
#[derive(Debug, Clone, Default)]
pub struct OfflineCatalog {
    entries: HashMap<Namespace, CatalogEntry>,
}

impl OfflineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(
            path = %path.display(),
            namespaces = catalog.entries.len(),
            "Loaded offline catalog"
        );
        Ok(catalog)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text)?;
        let Json::Object(map) = json else {
            return Err(Error::Catalog("snapshot must be a JSON object".to_string()));
        };

        let mut catalog = Self::new();
        for (ns, entry) in map {
            let namespace = Namespace::parse(&ns)?;
            let mut entry = document_from_json(entry)
                .map_err(|e| Error::Catalog(format!("{}: {}", namespace, e)))?;
            let indexes = match entry.remove("indexes") {
                Some(value) => value
                    .as_array()
                    .ok_or_else(|| Error::Catalog(format!("{}: indexes must be an array", namespace)))?
                    .iter()
                    .map(|spec| {
                        spec.as_document()
                            .ok_or_else(|| {
                                Error::Catalog(format!("{}: index entry is not a document", namespace))
                            })
                            .and_then(Index::from_spec)
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => Vec::new(),
            };
            debug!(namespace = %namespace, indexes = indexes.len(), "Catalog entry");
            catalog.entries.insert(
                namespace,
                CatalogEntry {
                    indexes,
                    stats: entry.get_document("stats").cloned(),
                    explain: entry.get_document("explain").cloned(),
                },
            );
        }
        Ok(catalog)
    }

    pub fn with_indexes(mut self, namespace: Namespace, indexes: Vec<Index>) -> Self {
        self.entries.entry(namespace).or_default().indexes = indexes;
        self
    }

    pub fn with_stats(mut self, namespace: Namespace, stats: Document) -> Self {
        self.entries.entry(namespace).or_default().stats = Some(stats);
        self
    }

    pub fn with_explain(mut self, namespace: Namespace, explain: Document) -> Self {
        self.entries.entry(namespace).or_default().explain = Some(explain);
        self
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.entries.keys()
    }
}

impl IndexCatalog for OfflineCatalog {
    fn list_indexes(&self, namespace: &Namespace) -> Result<Vec<Index>> {
        Ok(self
            .entries
            .get(namespace)
            .map(|e| e.indexes.clone())
            .unwrap_or_default())
    }

    fn collection_stats(&self, namespace: &Namespace) -> Result<Option<Document>> {
        Ok(self.entries.get(namespace).and_then(|e| e.stats.clone()))
    }

    fn explain(&self, namespace: &Namespace, _command: &Document) -> Result<Option<Document>> {
        Ok(self.entries.get(namespace).and_then(|e| e.explain.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::index::Field;

    const SNAPSHOT: &str = r#"{
        "shop.orders": {
            "indexes": [
                { "v": 2, "key": { "_id": 1 }, "name": "_id_" },
                { "v": 2, "key": { "status": 1, "created": -1 }, "name": "status_1_created_-1" }
            ],
            "stats": { "count": { "$numberLong": "1200" } },
            "explain": { "queryPlanner": { "winningPlan": { "stage": "COLLSCAN" } } }
        },
        "shop.customers": {}
    }"#;

    #[test]
    fn test_load_snapshot() {
        let catalog = OfflineCatalog::from_json(SNAPSHOT).unwrap();
        let orders = Namespace::new("shop", "orders");
        let indexes = catalog.list_indexes(&orders).unwrap();
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0], Index::id());
        assert_eq!(
            indexes[1],
            Index::compound(vec![Field::ascending("status"), Field::descending("created")])
        );
        assert_eq!(
            catalog.collection_stats(&orders).unwrap(),
            Some(doc! { "count" => 1200i64 })
        );
        assert!(catalog.explain(&orders, &Document::new()).unwrap().is_some());

        let customers = Namespace::new("shop", "customers");
        assert!(catalog.list_indexes(&customers).unwrap().is_empty());
        assert_eq!(catalog.collection_stats(&customers).unwrap(), None);
    }

    #[test]
    fn test_unknown_namespace_is_empty() {
        let catalog = OfflineCatalog::new();
        assert!(catalog
            .list_indexes(&Namespace::new("a", "b"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rejects_bad_snapshots() {
        assert!(matches!(
            OfflineCatalog::from_json("[1, 2]"),
            Err(Error::Catalog(_))
        ));
        assert!(matches!(
            OfflineCatalog::from_json(r#"{ "nodot": {} }"#),
            Err(Error::InvalidNamespace(_))
        ));
        assert!(OfflineCatalog::from_json(r#"{ "a.b": { "indexes": [ { "name": "x" } ] } }"#).is_err());
    }
}
