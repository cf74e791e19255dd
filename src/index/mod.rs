//! Index model
//!
//! Closed set of index shapes the advisor reasons about. Every variant carries
//! the shared [`IndexOptions`]; names of generated indexes are derived from
//! their content so two identical recommendations compare equal.

pub mod coalesce;
pub mod spec;

use crate::document::{Document, Value};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

pub use coalesce::{IndexCoalesceResult, IndexCoalescer};

/// Sort direction of an index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Ascending,
    Descending,
    /// No sort evidence was observed. A final state, not an error.
    Unknown,
}

impl Direction {
    /// Map a stored `1`/`-1` (any sign-carrying number) to a direction.
    pub fn from_value(value: &Value) -> Self {
        match value.as_f64() {
            Some(v) if v > 0.0 => Direction::Ascending,
            Some(v) if v < 0.0 => Direction::Descending,
            _ => Direction::Unknown,
        }
    }

    /// Numeric encoding for an index definition. `Unknown` has none.
    pub fn to_i32(self, field: &str) -> Result<i32> {
        match self {
            Direction::Ascending => Ok(1),
            Direction::Descending => Ok(-1),
            Direction::Unknown => Err(Error::InvalidDirection(field.to_string())),
        }
    }

    /// Two directions agree when equal or when either side is unknown.
    pub fn is_compatible(self, other: Direction) -> bool {
        self == other || self == Direction::Unknown || other == Direction::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub name: String,
    pub direction: Direction,
}

impl Field {
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    pub fn ascending(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Ascending)
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Descending)
    }

    pub fn unknown(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Unknown)
    }

    /// Same path, compatible direction.
    pub fn matches(&self, other: &Field) -> bool {
        self.name == other.name && self.direction.is_compatible(other.direction)
    }

    fn name_part(&self) -> String {
        match self.direction {
            Direction::Ascending => format!("{}_1", self.name),
            Direction::Descending => format!("{}_-1", self.name),
            Direction::Unknown => self.name.clone(),
        }
    }
}

/// A text-indexed path with its weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TextField {
    pub path: Vec<String>,
    pub weight: i32,
}

impl TextField {
    pub fn new(path: &str, weight: i32) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            weight,
        }
    }

    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// Options shared by every index variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IndexOptions {
    pub name: String,
    pub sparse: bool,
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_filter_expression: Option<Document>,
}

impl IndexOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Index {
    Id {
        options: IndexOptions,
    },
    SingleField {
        options: IndexOptions,
        field: Field,
    },
    Compound {
        options: IndexOptions,
        fields: Vec<Field>,
    },
    /// Same shape as a compound index, but at least one path holds arrays.
    Multikey {
        options: IndexOptions,
        fields: Vec<Field>,
    },
    Text {
        options: IndexOptions,
        fields: Vec<TextField>,
    },
    CompoundText {
        options: IndexOptions,
        fields: Vec<Field>,
        text_fields: Vec<TextField>,
    },
    Hashed {
        options: IndexOptions,
        field: String,
    },
    #[serde(rename = "2d")]
    TwoD {
        options: IndexOptions,
        field: String,
    },
    #[serde(rename = "2dsphere")]
    TwoDSphere {
        options: IndexOptions,
        field: String,
    },
    Ttl {
        options: IndexOptions,
        field: Field,
        expire_after_seconds: i64,
    },
}

/// Name generated from an ordered field list, e.g. `a_1_b_-1`.
pub fn fields_name(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::name_part)
        .collect::<Vec<_>>()
        .join("_")
}

/// Name generated from text fields: dotted path and weight pairs, e.g.
/// `a_1_b_10`.
pub fn text_fields_name(fields: &[TextField]) -> String {
    fields
        .iter()
        .map(|f| format!("{}_{}", f.dotted_path(), f.weight))
        .collect::<Vec<_>>()
        .join("_")
}

impl Index {
    pub const ID_INDEX_NAME: &'static str = "_id_";

    pub fn id() -> Self {
        Index::Id {
            options: IndexOptions::named(Self::ID_INDEX_NAME),
        }
    }

    pub fn single_field(field: Field) -> Self {
        Index::SingleField {
            options: IndexOptions::named(field.name_part()),
            field,
        }
    }

    pub fn compound(fields: Vec<Field>) -> Self {
        Index::Compound {
            options: IndexOptions::named(fields_name(&fields)),
            fields,
        }
    }

    pub fn multikey(fields: Vec<Field>) -> Self {
        Index::Multikey {
            options: IndexOptions::named(fields_name(&fields)),
            fields,
        }
    }

    /// One field gives a single-field index, more give a compound one.
    /// Returns `None` for an empty field list.
    pub fn from_fields(mut fields: Vec<Field>) -> Option<Self> {
        match fields.len() {
            0 => None,
            1 => fields.pop().map(Index::single_field),
            _ => Some(Index::compound(fields)),
        }
    }

    pub fn text(fields: Vec<TextField>) -> Self {
        Index::Text {
            options: IndexOptions::named(text_fields_name(&fields)),
            fields,
        }
    }

    pub fn compound_text(fields: Vec<Field>, text_fields: Vec<TextField>) -> Self {
        let name = format!("{}_{}", fields_name(&fields), text_fields_name(&text_fields));
        Index::CompoundText {
            options: IndexOptions::named(name),
            fields,
            text_fields,
        }
    }

    pub fn hashed(field: impl Into<String>) -> Self {
        let field = field.into();
        Index::Hashed {
            options: IndexOptions::named(format!("{}_hashed", field)),
            field,
        }
    }

    pub fn two_d(field: impl Into<String>) -> Self {
        let field = field.into();
        Index::TwoD {
            options: IndexOptions::named(format!("{}_2d", field)),
            field,
        }
    }

    pub fn two_d_sphere(field: impl Into<String>) -> Self {
        let field = field.into();
        Index::TwoDSphere {
            options: IndexOptions::named(format!("{}_2dsphere", field)),
            field,
        }
    }

    pub fn ttl(field: Field, expire_after_seconds: i64) -> Self {
        Index::Ttl {
            options: IndexOptions::named(field.name_part()),
            field,
            expire_after_seconds,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        match self {
            Index::Id { options }
            | Index::SingleField { options, .. }
            | Index::Compound { options, .. }
            | Index::Multikey { options, .. }
            | Index::Text { options, .. }
            | Index::CompoundText { options, .. }
            | Index::Hashed { options, .. }
            | Index::TwoD { options, .. }
            | Index::TwoDSphere { options, .. }
            | Index::Ttl { options, .. } => options,
        }
    }

    fn options_mut(&mut self) -> &mut IndexOptions {
        match self {
            Index::Id { options }
            | Index::SingleField { options, .. }
            | Index::Compound { options, .. }
            | Index::Multikey { options, .. }
            | Index::Text { options, .. }
            | Index::CompoundText { options, .. }
            | Index::Hashed { options, .. }
            | Index::TwoD { options, .. }
            | Index::TwoDSphere { options, .. }
            | Index::Ttl { options, .. } => options,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options_mut().name = name.into();
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.options_mut().unique = unique;
        self
    }

    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.options_mut().sparse = sparse;
        self
    }

    pub fn with_partial_filter(mut self, filter: Option<Document>) -> Self {
        self.options_mut().partial_filter_expression = filter;
        self
    }

    pub fn name(&self) -> &str {
        &self.options().name
    }

    pub fn is_unique(&self) -> bool {
        self.options().unique
    }

    pub fn is_sparse(&self) -> bool {
        self.options().sparse
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Index::Id { .. } => "id",
            Index::SingleField { .. } => "single_field",
            Index::Compound { .. } => "compound",
            Index::Multikey { .. } => "multikey",
            Index::Text { .. } => "text",
            Index::CompoundText { .. } => "compound_text",
            Index::Hashed { .. } => "hashed",
            Index::TwoD { .. } => "2d",
            Index::TwoDSphere { .. } => "2dsphere",
            Index::Ttl { .. } => "ttl",
        }
    }

    /// The ordered, direction-carrying keys that take part in prefix
    /// containment. Empty for variants without ordinary keys.
    pub fn ordered_fields(&self) -> &[Field] {
        match self {
            Index::SingleField { field, .. } | Index::Ttl { field, .. } => {
                std::slice::from_ref(field)
            }
            Index::Compound { fields, .. }
            | Index::Multikey { fields, .. }
            | Index::CompoundText { fields, .. } => fields,
            Index::Id { .. }
            | Index::Text { .. }
            | Index::Hashed { .. }
            | Index::TwoD { .. }
            | Index::TwoDSphere { .. } => &[],
        }
    }

    /// Key pattern for an index definition. Fails on a field whose
    /// direction is unknown.
    pub fn key_pattern(&self) -> Result<Document> {
        self.build_key_pattern(|f| f.direction.to_i32(&f.name))
    }

    /// Key pattern with unknown directions emitted as ascending. Only for
    /// producing executable index definitions.
    pub fn key_pattern_with_default(&self) -> Document {
        let pattern = self.build_key_pattern(|f| {
            Ok(f.direction.to_i32(&f.name).unwrap_or(1))
        });
        // the closure never fails
        pattern.unwrap_or_default()
    }

    fn build_key_pattern<F>(&self, dir: F) -> Result<Document>
    where
        F: Fn(&Field) -> Result<i32>,
    {
        let mut key = Document::new();
        match self {
            Index::Id { .. } => key.insert("_id", 1),
            Index::SingleField { field, .. } | Index::Ttl { field, .. } => {
                key.insert(field.name.clone(), dir(field)?)
            }
            Index::Compound { fields, .. } | Index::Multikey { fields, .. } => {
                for f in fields {
                    key.insert(f.name.clone(), dir(f)?);
                }
            }
            Index::Text { .. } => {
                key.insert("_fts", "text");
                key.insert("_ftsx", 1);
            }
            Index::CompoundText { fields, .. } => {
                for f in fields {
                    key.insert(f.name.clone(), dir(f)?);
                }
                key.insert("_fts", "text");
                key.insert("_ftsx", 1);
            }
            Index::Hashed { field, .. } => key.insert(field.clone(), "hashed"),
            Index::TwoD { field, .. } => key.insert(field.clone(), "2d"),
            Index::TwoDSphere { field, .. } => key.insert(field.clone(), "2dsphere"),
        }
        Ok(key)
    }

    /// Text weights document, for the text variants.
    pub fn weights(&self) -> Option<Document> {
        match self {
            Index::Text { fields, .. } | Index::CompoundText { text_fields: fields, .. } => Some(
                fields
                    .iter()
                    .map(|f| (f.dotted_path(), Value::Int32(f.weight)))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind(), self.name(), self.key_pattern_with_default())?;
        if self.is_unique() {
            f.write_str(" unique")?;
        }
        if self.is_sparse() {
            f.write_str(" sparse")?;
        }
        Ok(())
    }
}
