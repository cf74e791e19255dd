use super::db::Db;
use super::results::IndexResults;
use crate::catalog::IndexCatalog;
use crate::config::AdvisorConfig;
use crate::error::Result;
use crate::index::Index;
use crate::log::LogEntry;
use crate::namespace::Namespace;
use crate::operation::Operation;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, trace};

/// Top-level accumulator: routes operations to their database and
/// collection, dropping those outside the watched namespaces.
#[derive(Debug, Clone)]
pub struct Processor {
    config: AdvisorConfig,
    dbs: BTreeMap<String, Db>,
    processed: u64,
    ignored: u64,
}

impl Processor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            config,
            dbs: BTreeMap::new(),
            processed: 0,
            ignored: 0,
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Returns `false` when the operation's namespace is not watched.
    pub fn add(&mut self, operation: &Operation, catalog: &dyn IndexCatalog) -> Result<bool> {
        let namespace = operation.namespace();
        if !self.config.watches(namespace) {
            trace!(namespace = %namespace, "Ignoring unwatched namespace");
            self.ignored += 1;
            return Ok(false);
        }
        self.db_mut(namespace.db()).add(operation, catalog)?;
        self.processed += 1;
        Ok(true)
    }

    pub fn add_log_entry(&mut self, entry: &LogEntry, catalog: &dyn IndexCatalog) -> Result<bool> {
        self.add(&Operation::from_log_entry(entry), catalog)
    }

    fn db_mut(&mut self, name: &str) -> &mut Db {
        let (resolution, use_explain) = (self.config.time_resolution, self.config.use_explain);
        self.dbs
            .entry(name.to_string())
            .or_insert_with(|| Db::new(name, resolution, use_explain))
    }

    /// Join candidates keyed by their target collection, restricted to
    /// watched namespaces.
    fn routed_candidates(&self) -> HashMap<Namespace, Vec<Index>> {
        let mut routed: HashMap<Namespace, Vec<Index>> = HashMap::new();
        for candidate in self
            .dbs
            .values()
            .flat_map(|db| db.collections())
            .flat_map(|c| c.foreign_candidates())
            .filter(|c| self.config.watches(&c.namespace))
        {
            routed
                .entry(candidate.namespace.clone())
                .or_default()
                .push(candidate.index.clone());
        }
        routed
    }

    pub fn done(&self, catalog: &dyn IndexCatalog) -> Result<IndexResults> {
        let routed = self.routed_candidates();
        let parallel = self.config.parallel_finalize;

        let mut databases = Vec::with_capacity(self.dbs.len());
        for db in self.dbs.values() {
            databases.push(db.done_with(catalog, &routed, parallel)?);
        }
        // targets in databases that saw no operations of their own
        let mut orphan_dbs: Vec<&str> = routed
            .keys()
            .map(|ns| ns.db())
            .filter(|db| !self.dbs.contains_key(*db))
            .collect();
        orphan_dbs.sort_unstable();
        orphan_dbs.dedup();
        for name in orphan_dbs {
            let db = Db::new(name, self.config.time_resolution, self.config.use_explain);
            databases.push(db.done_with(catalog, &routed, parallel)?);
        }
        databases.sort_by(|a, b| a.db.cmp(&b.db));

        info!(
            databases = databases.len(),
            processed = self.processed,
            ignored = self.ignored,
            "Finalized processor"
        );
        Ok(IndexResults {
            databases,
            processed: self.processed,
            ignored: self.ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OfflineCatalog;
    use crate::doc;
    use crate::document::Document;
    use crate::index::Field;
    use crate::operation::OperationKind;
    use chrono::Utc;

    fn lookup_on(ns: Namespace) -> Operation {
        Operation::new(
            ns,
            Utc::now(),
            OperationKind::Aggregation {
                pipeline: vec![
                    doc! { "$match" => doc! { "status" => "open" } },
                    doc! {
                        "$lookup" => doc! {
                            "from" => "customers",
                            "localField" => "customerId",
                            "foreignField" => "customerId",
                            "as" => "customer",
                        },
                    },
                ],
            },
        )
    }

    #[test]
    fn test_namespace_filter() {
        let config = AdvisorConfig {
            namespaces: vec!["shop.*".to_string()],
            ..AdvisorConfig::default()
        };
        let catalog = OfflineCatalog::new();
        let mut processor = Processor::new(config);
        let watched = Operation::query(
            Namespace::new("shop", "orders"),
            Utc::now(),
            doc! { "a" => 1 },
            Document::new(),
        );
        let other = Operation::query(
            Namespace::new("crm", "leads"),
            Utc::now(),
            doc! { "a" => 1 },
            Document::new(),
        );
        assert!(processor.add(&watched, &catalog).unwrap());
        assert!(!processor.add(&other, &catalog).unwrap());

        let results = processor.done(&catalog).unwrap();
        assert_eq!(results.processed, 1);
        assert_eq!(results.ignored, 1);
        assert!(results.db("crm").is_none());
        assert!(results.collection(&Namespace::new("shop", "orders")).is_some());
    }

    #[test]
    fn test_join_candidates_routed_to_target() {
        let catalog = OfflineCatalog::new();
        let mut processor = Processor::new(AdvisorConfig::default());
        processor
            .add(&lookup_on(Namespace::new("shop", "orders")), &catalog)
            .unwrap();

        let results = processor.done(&catalog).unwrap();
        let orders = results.collection(&Namespace::new("shop", "orders")).unwrap();
        assert_eq!(
            orders.indexes,
            vec![Index::single_field(Field::unknown("status")), Index::id()]
        );
        let customers = results
            .collection(&Namespace::new("shop", "customers"))
            .unwrap();
        assert_eq!(
            customers.indexes,
            vec![Index::single_field(Field::unknown("customerId")), Index::id()]
        );
        assert_eq!(customers.total_operations(), 0);
    }

    #[test]
    fn test_done_is_repeatable_and_config_independent() {
        let catalog = OfflineCatalog::new();
        let ops = [
            lookup_on(Namespace::new("shop", "orders")),
            lookup_on(Namespace::new("shop", "returns")),
        ];

        let mut sequential = Processor::new(AdvisorConfig {
            parallel_finalize: false,
            ..AdvisorConfig::default()
        });
        let mut parallel = Processor::new(AdvisorConfig::default());
        for op in &ops {
            sequential.add(op, &catalog).unwrap();
            parallel.add(op, &catalog).unwrap();
        }

        let first = sequential.done(&catalog).unwrap();
        assert_eq!(first, sequential.done(&catalog).unwrap());
        assert_eq!(first, parallel.done(&catalog).unwrap());

        let customers = first
            .collection(&Namespace::new("shop", "customers"))
            .unwrap();
        assert_eq!(customers.candidate_count, 2);
        assert_eq!(customers.removed_indexes.len(), 1);
    }
}
