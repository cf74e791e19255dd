//! Ordered document tree
//!
//! Every operation, filter, plan and index specification the advisor looks at
//! is carried as a [`Document`]: an insertion-ordered list of key/value pairs.
//! Key order matters (it decides the field order of recommended indexes), so
//! documents are never sorted.

pub mod extjson;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// Binary subtype used for UUID values.
pub const BINARY_SUBTYPE_UUID: u8 = 4;

/// A binary payload with its subtype tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

impl Binary {
    /// Parse a textual UUID (`xxxxxxxx-xxxx-...`) into a subtype 4 binary.
    pub fn from_uuid_str(uuid: &str) -> Option<Self> {
        let digits: String = uuid.chars().filter(|c| *c != '-').collect();
        if digits.len() != 32 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let bytes = (0..16)
            .map(|i| u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()?;
        Some(Self {
            subtype: BINARY_SUBTYPE_UUID,
            bytes,
        })
    }

    /// Canonical hyphenated form, only for 16-byte UUID payloads.
    pub fn to_uuid_string(&self) -> Option<String> {
        if self.subtype != BINARY_SUBTYPE_UUID || self.bytes.len() != 16 {
            return None;
        }
        let hex = to_hex(&self.bytes);
        Some(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A single value in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Timestamp { time: u32, increment: u32 },
    Binary(Binary),
    /// Hex representation of a 12-byte object id
    ObjectId(String),
    Document(Document),
    Array(Vec<Value>),
}

impl Value {
    /// Scalars are everything except documents and arrays.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Value::Document(_) | Value::Array(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Integer view of any numeric value. Doubles are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Double(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Truthiness as the server applies it to option flags: booleans as-is,
    /// numbers are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Int32(v) => Some(*v != 0),
            Value::Int64(v) => Some(*v != 0),
            Value::Double(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered key/value tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place (order is kept) or
    /// appending a new entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Value::as_document)
    }

    pub fn get_array(&self, key: &str) -> Option<&[Value]> {
        self.get(key).and_then(Value::as_array)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Key of the first entry, which names the command in a command document.
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build a [`Document`] from `key => value` pairs.
///
/// ```
/// use index_advisor::doc;
/// let d = doc! { "a" => 1, "b" => doc! { "c" => "x" } };
/// assert_eq!(d.len(), 2);
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut d = $crate::document::Document::new();
        $(d.insert($key, $value);)+
        d
    }};
}

// Bare when the key reads back as a shell key, quoted otherwise.
fn write_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if bare {
        f.write_str(key)
    } else {
        write_str_literal(f, key)
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            _ => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

// Shell-style rendering. Type-distinguishing (1 and 1.0 and true all render
// differently), so it doubles as a stable key for shape lookups.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::String(s) => write_str_literal(f, s),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "NumberLong({})", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(
                f,
                "ISODate(\"{}\")",
                dt.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Value::Timestamp { time, increment } => {
                write!(f, "Timestamp({}, {})", time, increment)
            }
            Value::Binary(bin) => match bin.to_uuid_string() {
                Some(uuid) => write!(f, "UUID(\"{}\")", uuid),
                None => write!(f, "BinData({}, \"{}\")", bin.subtype, to_hex(&bin.bytes)),
            },
            Value::ObjectId(oid) => write!(f, "ObjectId(\"{}\")", oid),
            Value::Document(d) => write!(f, "{}", d),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, " {}", item)?;
                }
                if items.is_empty() {
                    f.write_str("]")
                } else {
                    f.write_str(" ]")
                }
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(" ")?;
            write_key(f, k)?;
            write!(f, ": {}", v)?;
        }
        f.write_str(" }")
    }
}

struct Wrapper<'a, K: Serialize, V: Serialize>(K, &'a V);

impl<K: Serialize, V: Serialize> Serialize for Wrapper<'_, K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.0, self.1)?;
        map.end()
    }
}

// Relaxed Extended JSON output, the same dialect `extjson` reads back.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::DateTime(dt) => Wrapper(
                "$date",
                &dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .serialize(serializer),
            Value::Timestamp { time, increment } => {
                let mut inner = Document::new();
                inner.insert("t", *time as i64);
                inner.insert("i", *increment as i64);
                Wrapper("$timestamp", &inner).serialize(serializer)
            }
            Value::Binary(bin) => match bin.to_uuid_string() {
                Some(uuid) => Wrapper("$uuid", &uuid).serialize(serializer),
                None => {
                    let mut inner = Document::new();
                    inner.insert("hex", to_hex(&bin.bytes));
                    inner.insert("subType", format!("{:02x}", bin.subtype));
                    Wrapper("$binary", &inner).serialize(serializer)
                }
            },
            Value::ObjectId(oid) => Wrapper("$oid", oid).serialize(serializer),
            Value::Document(d) => d.serialize(serializer),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
