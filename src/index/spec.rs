//! Decoding `listIndexes` entries into [`Index`] values.

use super::{Direction, Field, Index, TextField};
use crate::document::{Document, Value};
use crate::error::{Error, Result};

impl Index {
    /// Build an index from a `listIndexes` specification document
    /// (`{ v, key, name, unique?, sparse?, partialFilterExpression?, ... }`).
    pub fn from_spec(spec: &Document) -> Result<Self> {
        let key = spec
            .get_document("key")
            .ok_or_else(|| Error::IndexSpec(format!("missing key document in {}", spec)))?;
        if key.is_empty() {
            return Err(Error::IndexSpec(format!("empty key document in {}", spec)));
        }

        let index = if is_text_key(key) {
            text_index(key, spec)?
        } else {
            plain_index(key, spec)?
        };

        let index = match spec.get_str("name") {
            Some(name) => index.with_name(name),
            None => index,
        };
        Ok(index
            .with_unique(spec.get_bool("unique").unwrap_or(false))
            .with_sparse(spec.get_bool("sparse").unwrap_or(false))
            .with_partial_filter(spec.get_document("partialFilterExpression").cloned()))
    }
}

fn is_text_key(key: &Document) -> bool {
    key.get_str("_fts") == Some("text")
}

fn plain_index(key: &Document, spec: &Document) -> Result<Index> {
    if key.len() == 1 {
        if let Some((name, value)) = key.iter().next() {
            if name == "_id" && value.as_f64().is_some() {
                return Ok(Index::id());
            }
            match value {
                Value::String(kind) => return special_index(name, kind),
                _ => {
                    let field = numeric_field(name, value)?;
                    return Ok(match spec.get_i64("expireAfterSeconds") {
                        Some(seconds) => Index::ttl(field, seconds),
                        None => Index::single_field(field),
                    });
                }
            }
        }
    }

    let fields = key
        .iter()
        .map(|(name, value)| numeric_field(name, value))
        .collect::<Result<Vec<_>>>()?;
    Ok(Index::compound(fields))
}

fn numeric_field(name: &str, value: &Value) -> Result<Field> {
    match Direction::from_value(value) {
        Direction::Unknown => Err(Error::IndexSpec(format!(
            "unsupported key value {} for field {:?}",
            value, name
        ))),
        direction => Ok(Field::new(name, direction)),
    }
}

fn special_index(field: &str, kind: &str) -> Result<Index> {
    match kind {
        "hashed" => Ok(Index::hashed(field)),
        "2d" => Ok(Index::two_d(field)),
        "2dsphere" => Ok(Index::two_d_sphere(field)),
        other => Err(Error::IndexSpec(format!(
            "unsupported index type {:?} on field {:?}",
            other, field
        ))),
    }
}

fn text_field(path: &str, weight: &Value) -> Result<TextField> {
    let weight = match weight.as_i64() {
        Some(w) => i32::try_from(w).map_err(|_| {
            Error::IndexSpec(format!("text weight {} for {:?} is out of range", w, path))
        })?,
        None => 1,
    };
    Ok(TextField::new(path, weight))
}

fn text_index(key: &Document, spec: &Document) -> Result<Index> {
    let prefix = key
        .iter()
        .filter(|(name, _)| *name != "_fts" && *name != "_ftsx")
        .map(|(name, value)| numeric_field(name, value))
        .collect::<Result<Vec<_>>>()?;

    let text_fields: Vec<TextField> = match spec.get_document("weights") {
        Some(weights) => weights
            .iter()
            .map(|(path, weight)| text_field(path, weight))
            .collect::<Result<_>>()?,
        None => Vec::new(),
    };

    Ok(if prefix.is_empty() {
        Index::text(text_fields)
    } else {
        Index::compound_text(prefix, text_fields)
    })
}
