//! Explain-output reader.
//!
//! Walks the winning plan's `inputStage` chain looking for the stage that
//! scans an index. "No index used" is a normal answer: every accessor then
//! reports `false`/`None`.

use crate::document::{Document, Value};

const INDEX_SCAN_STAGES: [&str; 2] = ["IXSCAN", "DISTINCT_SCAN"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    stage: Option<Document>,
}

impl QueryPlan {
    pub fn new(explain: &Document) -> Self {
        let root = explain
            .get_document("queryPlanner")
            .and_then(|qp| qp.get_document("winningPlan"))
            .or_else(|| explain.get_document("winningPlan"))
            .unwrap_or(explain);
        Self {
            stage: find_index_stage(root).cloned(),
        }
    }

    pub fn is_index_scan(&self) -> bool {
        self.stage.is_some()
    }

    pub fn index_name(&self) -> Option<&str> {
        self.stage.as_ref()?.get_str("indexName")
    }

    /// The key pattern of the scanned index.
    pub fn key(&self) -> Option<&Document> {
        self.stage.as_ref()?.get_document("keyPattern")
    }

    pub fn is_unique(&self) -> bool {
        self.flag("isUnique")
    }

    pub fn is_sparse(&self) -> bool {
        self.flag("isSparse")
    }

    pub fn is_partial(&self) -> bool {
        self.flag("isPartial")
    }

    pub fn is_multi_key(&self) -> bool {
        self.flag("isMultiKey")
    }

    fn flag(&self, name: &str) -> bool {
        self.stage
            .as_ref()
            .and_then(|s| s.get_bool(name))
            .unwrap_or(false)
    }
}

fn find_index_stage(stage: &Document) -> Option<&Document> {
    let mut current = Some(stage);
    while let Some(stage) = current {
        if stage
            .get_str("stage")
            .is_some_and(|name| INDEX_SCAN_STAGES.contains(&name))
        {
            return Some(stage);
        }
        current = stage
            .get_document("queryPlan")
            .or_else(|| stage.get_document("inputStage"))
            .or_else(|| {
                stage
                    .get_array("inputStages")
                    .and_then(|stages| stages.first())
                    .and_then(Value::as_document)
            });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn explain(winning_plan: Document) -> Document {
        doc! { "queryPlanner" => doc! { "winningPlan" => winning_plan } }
    }

    #[test]
    fn test_finds_nested_index_scan() {
        let plan = QueryPlan::new(&explain(doc! {
            "stage" => "FETCH",
            "inputStage" => doc! {
                "stage" => "IXSCAN",
                "indexName" => "tags_1",
                "keyPattern" => doc! { "tags" => 1 },
                "isMultiKey" => true,
                "isUnique" => false,
                "isSparse" => false,
                "isPartial" => false,
            },
        }));
        assert!(plan.is_index_scan());
        assert_eq!(plan.index_name(), Some("tags_1"));
        assert_eq!(plan.key(), Some(&doc! { "tags" => 1 }));
        assert!(plan.is_multi_key());
        assert!(!plan.is_unique());
    }

    #[test]
    fn test_collection_scan_reports_nothing() {
        let plan = QueryPlan::new(&explain(doc! { "stage" => "COLLSCAN" }));
        assert!(!plan.is_index_scan());
        assert_eq!(plan.index_name(), None);
        assert_eq!(plan.key(), None);
        assert!(!plan.is_multi_key());
        assert!(!plan.is_partial());
    }

    #[test]
    fn test_distinct_scan_and_sbe_wrapper() {
        let plan = QueryPlan::new(&explain(doc! {
            "queryPlan" => doc! {
                "stage" => "PROJECTION_COVERED",
                "inputStage" => doc! {
                    "stage" => "DISTINCT_SCAN",
                    "indexName" => "sku_1",
                    "isUnique" => true,
                },
            },
        }));
        assert_eq!(plan.index_name(), Some("sku_1"));
        assert!(plan.is_unique());
    }

    #[test]
    fn test_first_of_input_stages() {
        let plan = QueryPlan::new(&explain(doc! {
            "stage" => "OR",
            "inputStages" => vec![
                Value::from(doc! { "stage" => "IXSCAN", "indexName" => "a_1" }),
                Value::from(doc! { "stage" => "IXSCAN", "indexName" => "b_1" }),
            ],
        }));
        assert_eq!(plan.index_name(), Some("a_1"));
    }
}
