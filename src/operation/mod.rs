//! Operation model
//!
//! One [`Operation`] per ingested record: the namespace and timing metadata
//! shared by every kind, plus an [`OperationKind`] with the kind-specific
//! shape. Operations are immutable once built.

mod profile;

use crate::document::Document;
use crate::namespace::Namespace;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker for "not observed" numeric metrics.
pub const UNKNOWN_METRIC: i64 = -1;

/// Who issued the operation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ClientInfo {
    pub client: Option<String>,
    pub app_name: Option<String>,
    pub user: Option<String>,
}

/// Filter/sort/projection of a read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryShape {
    pub filter: Document,
    pub sort: Document,
    pub projection: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Query(QueryShape),
    Aggregation {
        pipeline: Vec<Document>,
    },
    Insert {
        documents: i64,
    },
    Update {
        filter: Document,
        update: Document,
        multi: bool,
        upsert: bool,
    },
    Delete {
        filter: Document,
    },
    Count {
        filter: Document,
    },
    Distinct {
        key: String,
        filter: Document,
    },
    FindAndModify {
        filter: Document,
        sort: Document,
        remove: bool,
    },
    GeoNear {
        filter: Document,
    },
    Group {
        key: Document,
        condition: Document,
    },
    /// Structurally valid record the advisor does not analyze.
    NotSupported {
        reason: String,
    },
    /// The recorded operation raised an error on the server.
    Failed {
        error_name: String,
        error_code: i64,
        message: Option<String>,
    },
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Query(_) => "query",
            OperationKind::Aggregation { .. } => "aggregation",
            OperationKind::Insert { .. } => "insert",
            OperationKind::Update { .. } => "update",
            OperationKind::Delete { .. } => "delete",
            OperationKind::Count { .. } => "count",
            OperationKind::Distinct { .. } => "distinct",
            OperationKind::FindAndModify { .. } => "findAndModify",
            OperationKind::GeoNear { .. } => "geoNear",
            OperationKind::Group { .. } => "group",
            OperationKind::NotSupported { .. } => "notSupported",
            OperationKind::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    namespace: Namespace,
    timestamp: DateTime<Utc>,
    client: ClientInfo,
    millis: i64,
    raw: Document,
    kind: OperationKind,
}

impl Operation {
    pub fn new(namespace: Namespace, timestamp: DateTime<Utc>, kind: OperationKind) -> Self {
        Self {
            namespace,
            timestamp,
            client: ClientInfo::default(),
            millis: UNKNOWN_METRIC,
            raw: Document::new(),
            kind,
        }
    }

    /// Shorthand for a find with the given filter and sort.
    pub fn query(
        namespace: Namespace,
        timestamp: DateTime<Utc>,
        filter: Document,
        sort: Document,
    ) -> Self {
        Self::new(
            namespace,
            timestamp,
            OperationKind::Query(QueryShape {
                filter,
                sort,
                projection: Document::new(),
            }),
        )
    }

    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    pub fn with_millis(mut self, millis: i64) -> Self {
        self.millis = millis;
        self
    }

    pub fn with_raw(mut self, raw: Document) -> Self {
        self.raw = raw;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Execution time in milliseconds, [`UNKNOWN_METRIC`] when not recorded.
    pub fn millis(&self) -> i64 {
        self.millis
    }

    /// The record this operation was decoded from.
    pub fn raw(&self) -> &Document {
        &self.raw
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    /// The predicate document, for kinds that carry one.
    pub fn filter(&self) -> Option<&Document> {
        match &self.kind {
            OperationKind::Query(shape) => Some(&shape.filter),
            OperationKind::Update { filter, .. }
            | OperationKind::Delete { filter }
            | OperationKind::Count { filter }
            | OperationKind::Distinct { filter, .. }
            | OperationKind::FindAndModify { filter, .. }
            | OperationKind::GeoNear { filter } => Some(filter),
            OperationKind::Group { condition, .. } => Some(condition),
            OperationKind::Aggregation { .. }
            | OperationKind::Insert { .. }
            | OperationKind::NotSupported { .. }
            | OperationKind::Failed { .. } => None,
        }
    }

    pub fn sort(&self) -> Option<&Document> {
        match &self.kind {
            OperationKind::Query(shape) => Some(&shape.sort),
            OperationKind::FindAndModify { sort, .. } => Some(sort),
            _ => None,
        }
    }

    pub fn pipeline(&self) -> Option<&[Document]> {
        match &self.kind {
            OperationKind::Aggregation { pipeline } => Some(pipeline),
            _ => None,
        }
    }

    /// The command to hand to `explain` for plan-based enrichment.
    pub fn explainable_command(&self) -> Option<Document> {
        match &self.kind {
            OperationKind::Query(shape) => {
                let mut cmd = Document::new();
                cmd.insert("find", self.namespace.collection());
                cmd.insert("filter", shape.filter.clone());
                if !shape.sort.is_empty() {
                    cmd.insert("sort", shape.sort.clone());
                }
                Some(cmd)
            }
            _ => None,
        }
    }

    pub fn is_analyzable(&self) -> bool {
        !matches!(
            self.kind,
            OperationKind::NotSupported { .. } | OperationKind::Failed { .. }
        )
    }
}
