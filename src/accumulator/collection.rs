use super::results::{CollectionIndexResults, FailedOperation};
use crate::catalog::IndexCatalog;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::index::{Index, IndexCoalescer};
use crate::log::LogEntry;
use crate::namespace::Namespace;
use crate::operation::{Operation, OperationKind};
use crate::plan::QueryPlan;
use crate::recommend::paths::{self, nested_candidate};
use crate::recommend::{Candidate, IndexRecommender};
use crate::statistics::{StatisticsProcessor, TimeResolution};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-collection accumulator.
///
/// Operations are fed in one at a time; [`Collection::done`] produces an
/// owned snapshot and leaves the accumulator untouched, so it may be called
/// again after more operations arrive.
#[derive(Debug, Clone)]
pub struct Collection {
    namespace: Namespace,
    use_explain: bool,
    recommender: IndexRecommender,
    statistics: StatisticsProcessor,
    operation_counts: BTreeMap<String, u64>,
    not_implemented: BTreeMap<String, u64>,
    failed: Vec<FailedOperation>,
}

impl Collection {
    pub fn new(namespace: Namespace, resolution: TimeResolution, use_explain: bool) -> Self {
        Self {
            namespace,
            use_explain,
            recommender: IndexRecommender::new(),
            statistics: StatisticsProcessor::new(resolution),
            operation_counts: BTreeMap::new(),
            not_implemented: BTreeMap::new(),
            failed: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn add(&mut self, operation: &Operation, catalog: &dyn IndexCatalog) -> Result<()> {
        let kind = operation.kind();
        *self
            .operation_counts
            .entry(kind.name().to_string())
            .or_insert(0) += 1;

        if let OperationKind::Failed {
            error_name,
            error_code,
            message,
        } = kind
        {
            self.failed.push(FailedOperation {
                error_name: error_name.clone(),
                error_code: *error_code,
                message: message.clone(),
            });
            return Ok(());
        }

        match self.recommender.add(operation) {
            Ok(0) => self.add_nested_candidate(operation, catalog)?,
            Ok(_) => {}
            Err(Error::NotImplemented(what)) => {
                debug!(namespace = %self.namespace, what = %what, "Skipping candidate derivation");
                self.count_not_implemented(kind);
            }
            Err(e) => return Err(e),
        }

        match self.statistics.process(operation) {
            Ok(()) => Ok(()),
            Err(Error::NotImplemented(what)) => {
                debug!(namespace = %self.namespace, what = %what, "Skipping statistics");
                self.count_not_implemented(kind);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn add_log_entry(&mut self, entry: &LogEntry, catalog: &dyn IndexCatalog) -> Result<()> {
        self.add(&Operation::from_log_entry(entry), catalog)
    }

    fn count_not_implemented(&mut self, kind: &OperationKind) {
        *self
            .not_implemented
            .entry(kind.name().to_string())
            .or_insert(0) += 1;
    }

    /// Queries the recommender skipped because their filter is not flat get
    /// a candidate from path walking, multikey when the plan says so.
    fn add_nested_candidate(
        &mut self,
        operation: &Operation,
        catalog: &dyn IndexCatalog,
    ) -> Result<()> {
        if !matches!(
            operation.kind(),
            OperationKind::Query(_) | OperationKind::FindAndModify { .. }
        ) {
            return Ok(());
        }
        let (Some(filter), Some(sort)) = (operation.filter(), operation.sort()) else {
            return Ok(());
        };
        if paths::is_top_level(filter) {
            return Ok(());
        }

        let multikey = if self.use_explain {
            self.plan_is_multikey(operation, catalog)?
        } else {
            false
        };
        if let Some(index) = nested_candidate(filter, sort, multikey) {
            self.recommender.add_candidate(self.namespace.clone(), index);
        }
        Ok(())
    }

    fn plan_is_multikey(&self, operation: &Operation, catalog: &dyn IndexCatalog) -> Result<bool> {
        let command = operation
            .explainable_command()
            .unwrap_or_else(|| operation.raw().clone());
        Ok(catalog
            .explain(&self.namespace, &command)?
            .map(|explain| QueryPlan::new(&explain).is_multi_key())
            .unwrap_or(false))
    }

    /// Candidates this collection derived for other collections (joins).
    pub fn foreign_candidates(&self) -> impl Iterator<Item = &Candidate> + '_ {
        self.recommender
            .candidates()
            .filter(move |c| c.namespace != self.namespace)
    }

    pub fn done(&self, catalog: &dyn IndexCatalog) -> Result<CollectionIndexResults> {
        self.done_with(catalog, &[])
    }

    /// Finalize, also considering candidates other collections derived for
    /// this one.
    pub fn done_with(
        &self,
        catalog: &dyn IndexCatalog,
        routed: &[Index],
    ) -> Result<CollectionIndexResults> {
        let existing = catalog.list_indexes(&self.namespace)?;
        let collection_stats = catalog.collection_stats(&self.namespace)?;

        let mut candidates: Vec<Index> = self.recommender.candidates_for(&self.namespace);
        candidates.extend(routed.iter().cloned());
        let candidate_count = candidates.len();

        let mut all = existing.clone();
        if !all.iter().any(|i| matches!(i, Index::Id { .. })) {
            all.insert(0, Index::id());
        }
        all.extend(candidates);
        let coalesced = IndexCoalescer::new().coalesce(all);

        info!(
            namespace = %self.namespace,
            existing = existing.len(),
            candidates = candidate_count,
            indexes = coalesced.indexes.len(),
            removed = coalesced.removed_indexes.len(),
            "Finalized collection"
        );

        Ok(CollectionIndexResults {
            namespace: self.namespace.clone(),
            existing_indexes: existing,
            candidate_count,
            indexes: coalesced.indexes,
            removed_indexes: coalesced.removed_indexes,
            statistics: self.statistics.statistics(),
            operation_counts: self.operation_counts.clone(),
            not_implemented: self.not_implemented.clone(),
            failed_operations: self.failed.clone(),
            collection_stats,
        })
    }
}
