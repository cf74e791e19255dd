//! Index Recommendation Engine
//!
//! Derives raw candidate indexes from observed operations. Candidates are
//! neither deduplicated nor checked against existing indexes here; that is
//! the coalescer's job.

pub mod aggregation;
pub mod paths;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::{Direction, Field, Index};
use crate::namespace::Namespace;
use crate::operation::{Operation, OperationKind};
use serde::Serialize;
use tracing::trace;

/// A candidate index and the collection it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub namespace: Namespace,
    pub index: Index,
}

impl Candidate {
    pub fn new(namespace: Namespace, index: Index) -> Self {
        Self { namespace, index }
    }
}

/// Fields for the scalar-valued, non-operator entries of `filter`, in filter
/// order, with directions taken from `sort`.
pub fn scalar_fields(filter: &Document, sort: &Document) -> Vec<Field> {
    filter
        .iter()
        .filter(|(key, value)| value.is_scalar() && !key.starts_with('$'))
        .map(|(key, _)| {
            let direction = sort
                .get(key)
                .map(Direction::from_value)
                .unwrap_or(Direction::Unknown);
            Field::new(key, direction)
        })
        .collect()
}

/// Candidate for a flat filter. Filters with any nested document or array
/// value yield `None`; those go through [`paths::nested_candidate`].
pub fn query_candidate(filter: &Document, sort: &Document) -> Option<Index> {
    if !paths::is_top_level(filter) {
        return None;
    }
    Index::from_fields(scalar_fields(filter, sort))
}

#[derive(Debug, Default, Clone)]
pub struct IndexRecommender {
    candidates: Vec<Candidate>,
}

impl IndexRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive candidates from one operation, returning how many were added.
    ///
    /// Kinds whose shapes are not analyzed yet fail with
    /// [`Error::NotImplemented`], so callers can tell them apart from
    /// operations that simply produced nothing.
    pub fn add(&mut self, operation: &Operation) -> Result<usize> {
        let namespace = operation.namespace();
        let before = self.candidates.len();
        match operation.kind() {
            OperationKind::Query(shape) => {
                if let Some(index) = query_candidate(&shape.filter, &shape.sort) {
                    self.add_candidate(namespace.clone(), index);
                }
            }
            OperationKind::FindAndModify { filter, sort, .. } => {
                if let Some(index) = query_candidate(filter, sort) {
                    self.add_candidate(namespace.clone(), index);
                }
            }
            OperationKind::Aggregation { pipeline } => {
                self.candidates
                    .extend(aggregation::pipeline_candidates(namespace, pipeline));
            }
            OperationKind::Insert { .. }
            | OperationKind::NotSupported { .. }
            | OperationKind::Failed { .. } => {}
            kind @ (OperationKind::Count { .. }
            | OperationKind::Distinct { .. }
            | OperationKind::Update { .. }
            | OperationKind::Delete { .. }
            | OperationKind::GeoNear { .. }
            | OperationKind::Group { .. }) => {
                return Err(Error::NotImplemented(format!(
                    "index recommendation for {} operations",
                    kind.name()
                )));
            }
        }
        let added = self.candidates.len() - before;
        trace!(namespace = %namespace, added, "Derived index candidates");
        Ok(added)
    }

    /// Record a candidate derived outside this engine.
    pub fn add_candidate(&mut self, namespace: Namespace, index: Index) {
        self.candidates.push(Candidate::new(namespace, index));
    }

    /// All candidates so far, in derivation order.
    pub fn recommend(&self) -> Vec<Candidate> {
        self.candidates.clone()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }

    /// Candidates for one collection.
    pub fn candidates_for(&self, namespace: &Namespace) -> Vec<Index> {
        self.candidates
            .iter()
            .filter(|c| &c.namespace == namespace)
            .map(|c| c.index.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
