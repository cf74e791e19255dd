//! Decoding profiler records (`system.profile` documents).

use super::{ClientInfo, Operation, OperationKind, QueryShape, UNKNOWN_METRIC};
use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use chrono::{DateTime, Utc};

impl Operation {
    /// Classify one profiler record. Only a missing or malformed `ns` is an
    /// error; every other absent field falls back to a default.
    pub fn from_profile(record: &Document) -> Result<Operation> {
        let ns = record
            .get_str("ns")
            .ok_or_else(|| Error::InvalidNamespace(String::new()))?;
        let mut namespace = Namespace::parse(ns)?;

        let empty = Document::new();
        let command = record
            .get_document("command")
            .or_else(|| record.get_document("query"))
            .unwrap_or(&empty);

        // pre-3.6 servers record commands against `db.$cmd`
        if namespace.collection() == "$cmd" {
            if let Some(Value::String(coll)) = command.iter().next().map(|(_, v)| v) {
                namespace = namespace.sibling(coll.clone());
            }
        }

        let kind = if let Some(kind) = failure(record) {
            kind
        } else {
            match record.get_str("op").unwrap_or_default() {
                "query" => legacy_or_find(command),
                "command" => command_kind(command),
                "insert" => OperationKind::Insert {
                    documents: record
                        .get_i64("ninserted")
                        .or_else(|| command.get_array("documents").map(|d| d.len() as i64))
                        .unwrap_or(1),
                },
                "update" => update_kind(command, record),
                "remove" => OperationKind::Delete {
                    filter: first_document(command, &["q", "query"])
                        .or_else(|| record.get_document("query").cloned())
                        .unwrap_or_default(),
                },
                other => OperationKind::NotSupported {
                    reason: format!("op {:?}", other),
                },
            }
        };

        let client = ClientInfo {
            client: record.get_str("client").map(str::to_string),
            app_name: record.get_str("appName").map(str::to_string),
            user: record.get_str("user").map(str::to_string),
        };
        let timestamp = record
            .get("ts")
            .and_then(Value::as_datetime)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Operation::new(namespace, timestamp, kind)
            .with_client(client)
            .with_millis(record.get_i64("millis").unwrap_or(UNKNOWN_METRIC))
            .with_raw(record.clone()))
    }
}

fn failure(record: &Document) -> Option<OperationKind> {
    let name = record.get_str("errName");
    let code = record.get_i64("errCode");
    if name.is_none() && code.is_none() {
        return None;
    }
    Some(OperationKind::Failed {
        error_name: name.unwrap_or("UnknownError").to_string(),
        error_code: code.unwrap_or(UNKNOWN_METRIC),
        message: record.get_str("errMsg").map(str::to_string),
    })
}

fn first_document(doc: &Document, keys: &[&str]) -> Option<Document> {
    keys.iter().find_map(|k| doc.get_document(k)).cloned()
}

fn doc_or_empty(doc: &Document, key: &str) -> Document {
    doc.get_document(key).cloned().unwrap_or_default()
}

/// `op: "query"` records carry either a find command (3.2+) or the legacy
/// OP_QUERY document, which is a bare filter or `{ $query, $orderby }`.
fn legacy_or_find(command: &Document) -> OperationKind {
    if command.contains_key("find") {
        return command_kind(command);
    }
    if command.contains_key("$query") || command.contains_key("query") {
        return OperationKind::Query(QueryShape {
            filter: first_document(command, &["$query", "query"]).unwrap_or_default(),
            sort: first_document(command, &["$orderby", "orderby"]).unwrap_or_default(),
            projection: Document::new(),
        });
    }
    OperationKind::Query(QueryShape {
        filter: command.clone(),
        ..Default::default()
    })
}

fn command_kind(command: &Document) -> OperationKind {
    let Some(name) = command.first_key() else {
        return OperationKind::NotSupported {
            reason: "empty command".to_string(),
        };
    };
    match name {
        "find" => OperationKind::Query(QueryShape {
            filter: doc_or_empty(command, "filter"),
            sort: doc_or_empty(command, "sort"),
            projection: doc_or_empty(command, "projection"),
        }),
        "aggregate" => OperationKind::Aggregation {
            pipeline: command
                .get_array("pipeline")
                .unwrap_or_default()
                .iter()
                .filter_map(Value::as_document)
                .cloned()
                .collect(),
        },
        "count" => OperationKind::Count {
            filter: doc_or_empty(command, "query"),
        },
        "distinct" => OperationKind::Distinct {
            key: command.get_str("key").unwrap_or_default().to_string(),
            filter: doc_or_empty(command, "query"),
        },
        "findAndModify" | "findandmodify" => OperationKind::FindAndModify {
            filter: doc_or_empty(command, "query"),
            sort: doc_or_empty(command, "sort"),
            remove: command.get_bool("remove").unwrap_or(false),
        },
        "geoNear" => OperationKind::GeoNear {
            filter: doc_or_empty(command, "query"),
        },
        "group" => {
            let group = doc_or_empty(command, "group");
            OperationKind::Group {
                key: doc_or_empty(&group, "key"),
                condition: doc_or_empty(&group, "cond"),
            }
        }
        "insert" => OperationKind::Insert {
            documents: command.get_array("documents").map_or(1, |d| d.len() as i64),
        },
        "update" => {
            let first = first_statement(command, "updates");
            OperationKind::Update {
                filter: doc_or_empty(&first, "q"),
                update: doc_or_empty(&first, "u"),
                multi: first.get_bool("multi").unwrap_or(false),
                upsert: first.get_bool("upsert").unwrap_or(false),
            }
        }
        "delete" => OperationKind::Delete {
            filter: doc_or_empty(&first_statement(command, "deletes"), "q"),
        },
        other => OperationKind::NotSupported {
            reason: format!("command {:?}", other),
        },
    }
}

fn first_statement(command: &Document, key: &str) -> Document {
    command
        .get_array(key)
        .and_then(|stmts| stmts.first())
        .and_then(Value::as_document)
        .cloned()
        .unwrap_or_default()
}

fn update_kind(command: &Document, record: &Document) -> OperationKind {
    let filter = first_document(command, &["q", "query"])
        .or_else(|| record.get_document("query").cloned())
        .unwrap_or_default();
    let update = first_document(command, &["u", "updateobj"])
        .or_else(|| record.get_document("updateobj").cloned())
        .unwrap_or_default();
    OperationKind::Update {
        filter,
        update,
        multi: command.get_bool("multi").unwrap_or(false),
        upsert: command.get_bool("upsert").unwrap_or(false),
    }
}
