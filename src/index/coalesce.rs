//! Index coalescing
//!
//! Reduces a flat list of existing and candidate indexes to a minimal set
//! that still serves every observed access pattern. Every input index ends up
//! in exactly one of the two output lists; the only synthesized index is the
//! merged text index, which replaces the text indexes it was built from.

use super::{Field, Index, TextField};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Outcome of coalescing: the surviving indexes and the ones made redundant.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndexCoalesceResult {
    pub indexes: Vec<Index>,
    pub removed_indexes: Vec<Index>,
}

/// Stateless redundancy-elimination engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexCoalescer;

impl IndexCoalescer {
    pub fn new() -> Self {
        Self
    }

    pub fn coalesce(&self, candidates: Vec<Index>) -> IndexCoalesceResult {
        if candidates.is_empty() {
            return IndexCoalesceResult::default();
        }
        let total = candidates.len();

        let mut single = Vec::new();
        let mut multi = Vec::new();
        let mut text = Vec::new();
        let mut passthrough = Vec::new();
        for index in candidates {
            match index {
                Index::SingleField { .. } => single.push(index),
                Index::Compound { .. } | Index::Multikey { .. } | Index::CompoundText { .. } => {
                    multi.push(index)
                }
                Index::Text { .. } => text.push(index),
                Index::Id { .. }
                | Index::Hashed { .. }
                | Index::TwoD { .. }
                | Index::TwoDSphere { .. }
                | Index::Ttl { .. } => passthrough.push(index),
            }
        }

        let has_id = passthrough.iter().any(|i| matches!(i, Index::Id { .. }));
        let single_removed = redundant_single_fields(&single, &multi, has_id);

        multi.sort_by_key(|i| i.ordered_fields().len());
        let multi_removed = redundant_multi_fields(&multi);

        let mut result = IndexCoalesceResult::default();
        split_into(&mut result, single, &single_removed);
        split_into(&mut result, multi, &multi_removed);

        if !text.is_empty() {
            result.indexes.push(merge_text_indexes(&text));
            result.removed_indexes.extend(text);
        }

        result.indexes.extend(passthrough);

        debug!(
            input = total,
            kept = result.indexes.len(),
            removed = result.removed_indexes.len(),
            "Coalesced index set"
        );
        result
    }
}

fn split_into(result: &mut IndexCoalesceResult, indexes: Vec<Index>, removed: &[bool]) {
    for (index, is_removed) in indexes.into_iter().zip(removed) {
        if *is_removed {
            result.removed_indexes.push(index);
        } else {
            result.indexes.push(index);
        }
    }
}

/// A single-field index is redundant when a multi-field index leads with the
/// same path, when the `_id` index already covers it, or when an earlier
/// surviving single-field index (or a unique twin) covers the same path.
/// Unique indexes are never redundant.
fn redundant_single_fields(single: &[Index], multi: &[Index], has_id: bool) -> Vec<bool> {
    let mut removed = vec![false; single.len()];
    for i in 0..single.len() {
        let index = &single[i];
        if index.is_unique() {
            continue;
        }
        let Some(field) = index.ordered_fields().first() else {
            continue;
        };

        if has_id && field.name == "_id" {
            removed[i] = true;
            continue;
        }

        let led_by_multi = multi.iter().any(|m| {
            m.ordered_fields()
                .first()
                .is_some_and(|first| first.name == field.name)
        });
        if led_by_multi {
            removed[i] = true;
            continue;
        }

        let duplicate = single.iter().enumerate().any(|(j, other)| {
            j != i
                && other.ordered_fields().first().is_some_and(|f| f.name == field.name)
                && (other.is_unique() || (j < i && !removed[j]))
        });
        removed[i] = duplicate;
    }
    removed
}

/// `multi` must be sorted by field count, shortest first.
fn redundant_multi_fields(multi: &[Index]) -> Vec<bool> {
    let mut removed = vec![false; multi.len()];
    for i in 0..multi.len() {
        let shorter = &multi[i];
        if shorter.is_unique() {
            continue;
        }
        let len = shorter.ordered_fields().len();
        for j in 0..multi.len() {
            if i == j {
                continue;
            }
            let longer = &multi[j];
            let other_len = longer.ordered_fields().len();
            if other_len < len {
                continue;
            }
            // equal-length twins: keep the first survivor, or the unique one
            if other_len == len && !(longer.is_unique() || (j < i && !removed[j])) {
                continue;
            }
            // an index already marked removed may still absorb shorter ones
            if absorbs(longer, shorter) {
                removed[i] = true;
                break;
            }
        }
    }
    removed
}

/// Does `longer` serve every query `shorter` serves?
fn absorbs(longer: &Index, shorter: &Index) -> bool {
    let kinds_compatible = match shorter {
        // text information only lives in the compound text index itself
        Index::CompoundText { .. } => false,
        // array information must survive in the absorbing index
        Index::Multikey { .. } => matches!(longer, Index::Multikey { .. }),
        _ => true,
    };
    kinds_compatible && is_prefix(shorter.ordered_fields(), longer.ordered_fields())
}

fn is_prefix(prefix: &[Field], fields: &[Field]) -> bool {
    !prefix.is_empty()
        && prefix.len() <= fields.len()
        && prefix.iter().zip(fields).all(|(a, b)| a.matches(b))
}

/// Fold all text indexes into one. Fewer-field indexes go first; the first
/// occurrence of a path decides its weight.
fn merge_text_indexes(text: &[Index]) -> Index {
    let mut ordered: Vec<&Index> = text.iter().collect();
    ordered.sort_by_key(|i| text_fields(i).len());

    let mut seen = HashSet::new();
    let mut merged: Vec<TextField> = Vec::new();
    for index in ordered {
        for field in text_fields(index) {
            if seen.insert(field.path.clone()) {
                merged.push(field.clone());
            }
        }
    }
    Index::text(merged)
}

fn text_fields(index: &Index) -> &[TextField] {
    match index {
        Index::Text { fields, .. } => fields,
        _ => &[],
    }
}
