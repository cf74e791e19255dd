use crate::document::Document;
use crate::index::Index;
use crate::namespace::Namespace;
use crate::statistics::ShapeStatistics;
use serde::Serialize;
use std::collections::BTreeMap;

/// A profiled operation that raised an error on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedOperation {
    pub error_name: String,
    pub error_code: i64,
    pub message: Option<String>,
}

/// Finalized view of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionIndexResults {
    pub namespace: Namespace,
    /// Indexes reported by the catalog, before coalescing.
    pub existing_indexes: Vec<Index>,
    /// Raw candidates derived from the workload, duplicates included.
    pub candidate_count: usize,
    /// The coalesced index set.
    pub indexes: Vec<Index>,
    pub removed_indexes: Vec<Index>,
    pub statistics: Vec<ShapeStatistics>,
    pub operation_counts: BTreeMap<String, u64>,
    pub not_implemented: BTreeMap<String, u64>,
    pub failed_operations: Vec<FailedOperation>,
    pub collection_stats: Option<Document>,
}

impl CollectionIndexResults {
    /// Surviving indexes that do not exist yet.
    pub fn indexes_to_create(&self) -> impl Iterator<Item = &Index> {
        self.indexes
            .iter()
            .filter(move |i| !self.existing_indexes.contains(i))
    }

    /// Existing indexes made redundant by the coalesced set.
    pub fn indexes_to_drop(&self) -> impl Iterator<Item = &Index> {
        self.removed_indexes
            .iter()
            .filter(move |i| self.existing_indexes.contains(i))
    }

    pub fn total_operations(&self) -> u64 {
        self.operation_counts.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbIndexResult {
    pub db: String,
    pub collections: Vec<CollectionIndexResults>,
}

impl DbIndexResult {
    pub fn collection(&self, name: &str) -> Option<&CollectionIndexResults> {
        self.collections
            .iter()
            .find(|c| c.namespace.collection() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResults {
    pub databases: Vec<DbIndexResult>,
    /// Operations accepted by the processor.
    pub processed: u64,
    /// Operations outside the watched namespaces.
    pub ignored: u64,
}

impl IndexResults {
    pub fn db(&self, name: &str) -> Option<&DbIndexResult> {
        self.databases.iter().find(|d| d.db == name)
    }

    pub fn collection(&self, namespace: &Namespace) -> Option<&CollectionIndexResults> {
        self.db(namespace.db())?.collection(namespace.collection())
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionIndexResults> {
        self.databases.iter().flat_map(|d| d.collections.iter())
    }
}
