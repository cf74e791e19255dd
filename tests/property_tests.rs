use index_advisor::statistics::normalize_shape;
use index_advisor::{Direction, Document, Field, Index, IndexCoalescer, Value};
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Ascending),
        Just(Direction::Descending),
        Just(Direction::Unknown),
    ]
}

fn field() -> impl Strategy<Value = Field> {
    (prop::sample::select(vec!["a", "b", "c", "d"]), direction())
        .prop_map(|(name, dir)| Field::new(name, dir))
}

// Everything but text indexes, whose merge synthesizes a new index.
fn index() -> impl Strategy<Value = Index> {
    prop_oneof![
        Just(Index::id()),
        field().prop_map(Index::single_field),
        prop_vec(field(), 2..4).prop_map(Index::compound),
        prop_vec(field(), 1..3).prop_map(Index::multikey),
        Just(Index::hashed("h")),
        Just(Index::two_d_sphere("loc")),
    ]
    .prop_flat_map(|index| (Just(index), any::<bool>()))
    .prop_map(|(index, unique)| index.with_unique(unique))
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
        (-1.0e6f64..1.0e6).prop_map(Value::from),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop_vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop_vec(("[a-z]{1,4}", inner), 0..4).prop_map(|entries| {
                Value::Document(entries.into_iter().collect::<Document>())
            }),
        ]
    })
}

fn filter() -> impl Strategy<Value = Document> {
    prop_vec(("[a-z]{1,4}", value()), 0..5)
        .prop_map(|entries| entries.into_iter().collect::<Document>())
}

fn count_in(haystack: &[Index], needle: &Index) -> usize {
    haystack.iter().filter(|i| *i == needle).count()
}

// Property: coalescing partitions its input
proptest! {
    #[test]
    fn prop_coalesce_partitions_input(input in prop_vec(index(), 0..12)) {
        let result = IndexCoalescer::new().coalesce(input.clone());

        prop_assert_eq!(
            result.indexes.len() + result.removed_indexes.len(),
            input.len()
        );
        for index in &input {
            let out = count_in(&result.indexes, index) + count_in(&result.removed_indexes, index);
            prop_assert_eq!(out, count_in(&input, index));
        }
    }
}

// Property: unique indexes always survive
proptest! {
    #[test]
    fn prop_unique_indexes_survive(input in prop_vec(index(), 0..12)) {
        let result = IndexCoalescer::new().coalesce(input);
        prop_assert!(result.removed_indexes.iter().all(|i| !i.is_unique()));
    }
}

// Property: coalescing its own output removes nothing more
proptest! {
    #[test]
    fn prop_coalesce_is_stable(input in prop_vec(index(), 0..12)) {
        let first = IndexCoalescer::new().coalesce(input);
        let second = IndexCoalescer::new().coalesce(first.indexes.clone());
        prop_assert!(second.removed_indexes.is_empty());
        prop_assert_eq!(second.indexes.len(), first.indexes.len());
    }
}

// Property: shape normalization is idempotent
proptest! {
    #[test]
    fn prop_normalization_idempotent(filter in filter()) {
        let once = normalize_shape(&filter);
        let twice = normalize_shape(&once);
        prop_assert_eq!(twice, once.clone());
        prop_assert_eq!(once.len(), filter.len());
    }
}
