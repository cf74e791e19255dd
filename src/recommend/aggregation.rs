use super::{query_candidate, scalar_fields, Candidate};
use crate::document::{Document, Value};
use crate::index::{Field, Index};
use crate::namespace::Namespace;

/// Candidates for every collection an aggregation pipeline reads.
///
/// Only a leading `$match` (optionally followed by `$sort`) can use an index
/// on the aggregated collection. Each `$lookup`/`$graphLookup` contributes
/// one candidate on the joined collection.
pub fn pipeline_candidates(namespace: &Namespace, pipeline: &[Document]) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    if let Some(filter) = pipeline.first().and_then(|s| s.get_document("$match")) {
        let empty = Document::new();
        let sort = pipeline
            .get(1)
            .and_then(|s| s.get_document("$sort"))
            .unwrap_or(&empty);
        if let Some(index) = query_candidate(filter, sort) {
            candidates.push(Candidate::new(namespace.clone(), index));
        }
    }

    for stage in pipeline {
        if let Some(lookup) = stage.get_document("$lookup") {
            if let Some(candidate) = join_candidate(namespace, lookup, "foreignField", |l| {
                l.get_array("pipeline")
                    .and_then(|p| p.first())
                    .and_then(Value::as_document)
                    .and_then(|s| s.get_document("$match"))
            }) {
                candidates.push(candidate);
            }
        } else if let Some(graph) = stage.get_document("$graphLookup") {
            if let Some(candidate) = join_candidate(namespace, graph, "connectToField", |g| {
                g.get_document("restrictSearchWithMatch")
            }) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

fn join_candidate<'a, F>(
    namespace: &Namespace,
    stage: &'a Document,
    join_field: &str,
    extra_filter: F,
) -> Option<Candidate>
where
    F: Fn(&'a Document) -> Option<&'a Document>,
{
    let from = stage.get_str("from")?;
    let mut fields: Vec<Field> = stage
        .get_str(join_field)
        .map(|f| vec![Field::unknown(f)])
        .unwrap_or_default();

    if let Some(filter) = extra_filter(stage) {
        for field in scalar_fields(filter, &Document::new()) {
            if !fields.iter().any(|f| f.name == field.name) {
                fields.push(field);
            }
        }
    }

    Index::from_fields(fields).map(|index| Candidate::new(namespace.sibling(from), index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn ns() -> Namespace {
        Namespace::new("shop", "orders")
    }

    #[test]
    fn test_leading_match_with_sort() {
        let pipeline = vec![
            doc! { "$match" => doc! { "status" => "open", "region" => "eu" } },
            doc! { "$sort" => doc! { "region" => -1 } },
            doc! { "$group" => doc! { "_id" => "$region" } },
        ];
        let candidates = pipeline_candidates(&ns(), &pipeline);
        assert_eq!(
            candidates,
            vec![Candidate::new(
                ns(),
                Index::compound(vec![Field::unknown("status"), Field::descending("region")])
            )]
        );
    }

    #[test]
    fn test_late_match_is_ignored() {
        let pipeline = vec![
            doc! { "$group" => doc! { "_id" => "$region", "n" => doc! { "$sum" => 1 } } },
            doc! { "$match" => doc! { "n" => 5 } },
        ];
        assert!(pipeline_candidates(&ns(), &pipeline).is_empty());
    }

    #[test]
    fn test_lookup_targets_foreign_collection() {
        let pipeline = vec![doc! {
            "$lookup" => doc! {
                "from" => "customers",
                "localField" => "customerId",
                "foreignField" => "_id",
                "as" => "customer",
            },
        }];
        assert_eq!(
            pipeline_candidates(&ns(), &pipeline),
            vec![Candidate::new(
                Namespace::new("shop", "customers"),
                Index::single_field(Field::unknown("_id"))
            )]
        );
    }

    #[test]
    fn test_lookup_sub_pipeline_and_graph_lookup() {
        let pipeline = vec![
            doc! {
                "$lookup" => doc! {
                    "from" => "items",
                    "pipeline" => vec![Value::from(doc! { "$match" => doc! { "active" => true } })],
                    "as" => "items",
                },
            },
            doc! {
                "$graphLookup" => doc! {
                    "from" => "employees",
                    "startWith" => "$managerId",
                    "connectFromField" => "managerId",
                    "connectToField" => "empId",
                    "as" => "chain",
                    "restrictSearchWithMatch" => doc! { "dept" => "ops" },
                },
            },
        ];
        let candidates = pipeline_candidates(&ns(), &pipeline);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].namespace.collection(), "items");
        assert_eq!(candidates[0].index, Index::single_field(Field::unknown("active")));
        assert_eq!(candidates[1].namespace.collection(), "employees");
        assert_eq!(
            candidates[1].index,
            Index::compound(vec![Field::unknown("empId"), Field::unknown("dept")])
        );
    }
}
