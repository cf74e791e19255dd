//! Path walking over full query filters.
//!
//! The recommender only turns flat, scalar-valued filters into candidates.
//! Filters with operators, embedded documents, arrays or logical
//! combinators are walked here instead, producing the indexable field paths
//! and whether any of them is known to hold arrays.

use crate::document::{Document, Value};
use crate::index::{Direction, Field, Index};

/// A field path referenced by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPath {
    pub path: String,
    /// The filter treats this path as array-valued.
    pub array: bool,
}

const LOGICAL_OPERATORS: [&str; 3] = ["$and", "$or", "$nor"];
const ARRAY_OPERATORS: [&str; 2] = ["$all", "$size"];

/// Every value is a scalar: no embedded documents, operator documents or
/// arrays.
pub fn is_top_level(filter: &Document) -> bool {
    filter.iter().all(|(_, value)| value.is_scalar())
}

/// Indexable paths of `filter` in first-seen order, without duplicates.
pub fn filter_paths(filter: &Document) -> Vec<FilterPath> {
    let mut paths = Vec::new();
    collect(filter, "", false, &mut paths);
    paths
}

fn push(paths: &mut Vec<FilterPath>, path: String, array: bool) {
    match paths.iter_mut().find(|p| p.path == path) {
        Some(existing) => existing.array |= array,
        None => paths.push(FilterPath { path, array }),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn is_operator_document(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn collect(filter: &Document, prefix: &str, in_array: bool, paths: &mut Vec<FilterPath>) {
    for (key, value) in filter.iter() {
        if LOGICAL_OPERATORS.contains(&key) {
            for clause in value.as_array().unwrap_or_default() {
                if let Some(clause) = clause.as_document() {
                    collect(clause, prefix, in_array, paths);
                }
            }
            continue;
        }
        if key.starts_with('$') {
            // $text, $where, $expr, $comment: not a field path
            continue;
        }

        let path = join(prefix, key);
        match value {
            Value::Document(doc) if is_operator_document(doc) => {
                collect_operators(doc, path, in_array, paths);
            }
            Value::Array(_) => push(paths, path, true),
            // equality on an embedded document indexes the field itself
            _ => push(paths, path, in_array),
        }
    }
}

fn collect_operators(ops: &Document, path: String, in_array: bool, paths: &mut Vec<FilterPath>) {
    let mut array = in_array;
    let mut nested: Option<&Document> = None;
    for (op, operand) in ops.iter() {
        if op == "$elemMatch" {
            array = true;
            if let Some(doc) = operand.as_document().filter(|d| !is_operator_document(d)) {
                nested = Some(doc);
            }
        } else if ARRAY_OPERATORS.contains(&op) {
            array = true;
        }
    }
    match nested {
        Some(doc) => collect(doc, &path, true, paths),
        None => push(paths, path, array),
    }
}

/// Candidate for a filter the recommender skipped. Sort directions are
/// applied where the sort names the same path.
pub fn nested_candidate(filter: &Document, sort: &Document, multikey: bool) -> Option<Index> {
    let paths = filter_paths(filter);
    if paths.is_empty() {
        return None;
    }
    let multikey = multikey || paths.iter().any(|p| p.array);
    let fields: Vec<Field> = paths
        .into_iter()
        .map(|p| {
            let direction = sort
                .get(&p.path)
                .map(Direction::from_value)
                .unwrap_or(Direction::Unknown);
            Field::new(p.path, direction)
        })
        .collect();
    if multikey {
        Some(Index::multikey(fields))
    } else {
        Index::from_fields(fields)
    }
}
