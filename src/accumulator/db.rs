use super::collection::Collection;
use super::results::{CollectionIndexResults, DbIndexResult};
use crate::catalog::IndexCatalog;
use crate::error::Result;
use crate::index::Index;
use crate::namespace::Namespace;
use crate::operation::Operation;
use crate::statistics::TimeResolution;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Collections of one database, created on first use.
#[derive(Debug, Clone)]
pub struct Db {
    name: String,
    resolution: TimeResolution,
    use_explain: bool,
    collections: BTreeMap<String, Collection>,
}

impl Db {
    pub fn new(name: impl Into<String>, resolution: TimeResolution, use_explain: bool) -> Self {
        Self {
            name: name.into(),
            resolution,
            use_explain,
            collections: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_mut(&mut self, namespace: &Namespace) -> &mut Collection {
        let (resolution, use_explain) = (self.resolution, self.use_explain);
        self.collections
            .entry(namespace.collection().to_string())
            .or_insert_with(|| {
                debug!(namespace = %namespace, "Tracking collection");
                Collection::new(namespace.clone(), resolution, use_explain)
            })
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }

    pub fn add(&mut self, operation: &Operation, catalog: &dyn IndexCatalog) -> Result<()> {
        self.collection_mut(operation.namespace()).add(operation, catalog)
    }

    pub fn done(&self, catalog: &dyn IndexCatalog) -> Result<DbIndexResult> {
        self.done_with(catalog, &HashMap::new(), false)
    }

    /// Finalize every collection. `routed` holds candidates other
    /// collections derived for collections of this database; targets that
    /// saw no operations of their own are finalized too.
    pub fn done_with(
        &self,
        catalog: &dyn IndexCatalog,
        routed: &HashMap<Namespace, Vec<Index>>,
        parallel: bool,
    ) -> Result<DbIndexResult> {
        let join_only: Vec<Collection> = routed
            .keys()
            .filter(|ns| ns.db() == self.name && !self.collections.contains_key(ns.collection()))
            .map(|ns| Collection::new(ns.clone(), self.resolution, self.use_explain))
            .collect();

        let targets: Vec<&Collection> = self.collections.values().chain(join_only.iter()).collect();
        let finalize = |collection: &&Collection| {
            let extra = routed
                .get(collection.namespace())
                .map(Vec::as_slice)
                .unwrap_or_default();
            collection.done_with(catalog, extra)
        };

        let mut collections: Vec<CollectionIndexResults> = if parallel {
            targets.par_iter().map(finalize).collect::<Result<_>>()?
        } else {
            targets.iter().map(finalize).collect::<Result<_>>()?
        };
        collections.sort_by(|a, b| a.namespace.cmp(&b.namespace));

        Ok(DbIndexResult {
            db: self.name.clone(),
            collections,
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
    use chrono::Utc;

    #[test]
    fn test_collections_created_lazily_and_sorted() {
        let catalog = OfflineCatalog::new();
        let mut db = Db::new("shop", TimeResolution::Second, false);
        for coll in ["orders", "carts", "orders"] {
            let op = Operation::query(
                Namespace::new("shop", coll),
                Utc::now(),
                doc! { "user" => 1 },
                Document::new(),
            );
            db.add(&op, &catalog).unwrap();
        }
        assert_eq!(db.collections().count(), 2);

        let result = db.done(&catalog).unwrap();
        let names: Vec<_> = result
            .collections
            .iter()
            .map(|c| c.namespace.collection())
            .collect();
        assert_eq!(names, vec!["carts", "orders"]);
        assert_eq!(
            result.collection("orders").unwrap().operation_counts.get("query"),
            Some(&2)
        );
    }

    #[test]
    fn test_routed_candidates_create_join_only_collections() {
        let catalog = OfflineCatalog::new();
        let db = Db::new("shop", TimeResolution::Second, false);
        let target = Namespace::new("shop", "customers");
        let mut routed = HashMap::new();
        routed.insert(target, vec![Index::single_field(Field::unknown("email"))]);

        let sequential = db.done_with(&catalog, &routed, false).unwrap();
        let parallel = db.done_with(&catalog, &routed, true).unwrap();
        assert_eq!(sequential, parallel);

        let customers = sequential.collection("customers").unwrap();
        assert_eq!(customers.candidate_count, 1);
        assert_eq!(
            customers.indexes,
            vec![Index::single_field(Field::unknown("email")), Index::id()]
        );
    }
}
