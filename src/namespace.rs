use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `(database, collection)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace {
    db: String,
    collection: String,
}

impl Namespace {
    pub fn new(db: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            collection: collection.into(),
        }
    }

    /// Split `"db.collection"` at the first dot; the collection part may
    /// contain further dots.
    pub fn parse(ns: &str) -> Result<Self> {
        match ns.split_once('.') {
            Some((db, collection)) if !db.is_empty() && !collection.is_empty() => {
                Ok(Self::new(db, collection))
            }
            _ => Err(Error::InvalidNamespace(ns.to_string())),
        }
    }

    pub fn db(&self) -> &str {
        &self.db
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Same database, different collection.
    pub fn sibling(&self, collection: impl Into<String>) -> Self {
        Self::new(self.db.clone(), collection)
    }

    /// Match against a watch pattern: an exact namespace, `db.*` or `*`.
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        match pattern.split_once('.') {
            Some((db, "*")) => db == self.db,
            Some((db, collection)) => db == self.db && collection == self.collection,
            None => pattern == self.db,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.collection)
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Namespace {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.to_string()
    }
}
