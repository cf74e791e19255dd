//! Extended JSON → document conversion.
//!
//! Profiler exports and rewritten log literals arrive as JSON that encodes
//! non-JSON types with `$`-prefixed wrapper objects (`{"$date": ...}`,
//! `{"$numberLong": "5"}`, ...). Both the canonical and relaxed dialects are
//! accepted. Wrappers we do not understand stay ordinary documents.

use super::{Binary, Document, Value};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Number, Value as Json};

/// Parse a JSON text whose top level must be an object.
pub fn parse_document(text: &str) -> Result<Document> {
    let json: Json = serde_json::from_str(text)?;
    match json {
        Json::Object(map) => document_from_map(map),
        other => Err(Error::DocumentLiteral(format!(
            "expected an object, found {}",
            json_type_name(&other)
        ))),
    }
}

pub fn document_from_json(json: Json) -> Result<Document> {
    match json {
        Json::Object(map) => document_from_map(map),
        other => Err(Error::DocumentLiteral(format!(
            "expected an object, found {}",
            json_type_name(&other)
        ))),
    }
}

pub fn value_from_json(json: Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => number_value(&n),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(map) => match wrapper_value(&map)? {
            Some(value) => value,
            None => Value::Document(document_from_map(map)?),
        },
    })
}

fn document_from_map(map: Map<String, Json>) -> Result<Document> {
    let mut doc = Document::new();
    for (k, v) in map {
        doc.insert(k, value_from_json(v)?);
    }
    Ok(doc)
}

fn number_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Value::Int32(small),
            Err(_) => Value::Int64(i),
        }
    } else if let Some(u) = n.as_u64() {
        Value::Int64(u as i64)
    } else {
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn json_type_name(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

fn bad_wrapper(key: &str, json: &Json) -> Error {
    Error::DocumentLiteral(format!("malformed {} value: {}", key, json))
}

/// Decode a single-key type wrapper, or `None` when `map` is a plain document.
fn wrapper_value(map: &Map<String, Json>) -> Result<Option<Value>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some((key, inner)) = map.iter().next() else {
        return Ok(None);
    };
    let value = match key.as_str() {
        "$date" => Value::DateTime(parse_date(inner).ok_or_else(|| bad_wrapper(key, inner))?),
        "$numberLong" => Value::Int64(
            numeric_text(inner)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| bad_wrapper(key, inner))?,
        ),
        "$numberInt" => Value::Int32(
            numeric_text(inner)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| bad_wrapper(key, inner))?,
        ),
        "$numberDouble" | "$numberDecimal" => Value::Double(
            numeric_text(inner)
                .and_then(|s| parse_double(&s))
                .ok_or_else(|| bad_wrapper(key, inner))?,
        ),
        "$uuid" => Value::Binary(
            inner
                .as_str()
                .and_then(Binary::from_uuid_str)
                .ok_or_else(|| bad_wrapper(key, inner))?,
        ),
        "$oid" => Value::ObjectId(
            inner
                .as_str()
                .filter(|s| s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()))
                .ok_or_else(|| bad_wrapper(key, inner))?
                .to_ascii_lowercase(),
        ),
        "$timestamp" => {
            let t = inner
                .get("t")
                .and_then(Json::as_u64)
                .and_then(|t| u32::try_from(t).ok());
            let i = inner
                .get("i")
                .and_then(Json::as_u64)
                .and_then(|i| u32::try_from(i).ok());
            match (t, i) {
                (Some(t), Some(i)) => Value::Timestamp {
                    time: t,
                    increment: i,
                },
                _ => return Err(bad_wrapper(key, inner)),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn numeric_text(json: &Json) -> Option<String> {
    match json {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => s.parse().ok(),
    }
}

fn parse_date(json: &Json) -> Option<DateTime<Utc>> {
    match json {
        Json::String(s) => parse_date_str(s),
        Json::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Json::Object(inner) => inner
            .get("$numberLong")
            .and_then(numeric_text)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Accepts RFC 3339 as well as the `+0000`-style offsets the server logs use.
pub fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
