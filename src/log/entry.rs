use crate::document::Document;
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use crate::operation::{ClientInfo, Operation, OperationKind, QueryShape, UNKNOWN_METRIC};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl Severity {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "F" => Ok(Severity::Fatal),
            "E" => Ok(Severity::Error),
            "W" => Ok(Severity::Warning),
            "I" => Ok(Severity::Info),
            "D" => Ok(Severity::Debug),
            other => Err(Error::InvalidSeverity(other.to_string())),
        }
    }
}

/// One stage of a `planSummary:` value, e.g. `IXSCAN { a: 1 }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSummary {
    pub stage: String,
    pub key: Option<Document>,
}

/// A fully parsed `find` command line.
///
/// Numeric metrics that were not on the line hold [`UNKNOWN_METRIC`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub component: String,
    pub connection: String,
    pub namespace: Namespace,
    pub command_name: String,
    pub command: Document,
    pub app_name: Option<String>,
    pub plan_summary: Vec<PlanSummary>,
    pub keys_examined: i64,
    pub docs_examined: i64,
    pub cursor_exhausted: bool,
    pub num_yields: i64,
    pub n_returned: i64,
    pub query_hash: Option<String>,
    pub result_length: i64,
    pub locks: Option<String>,
    pub protocol: Option<String>,
    pub execution_time_ms: i64,
}

impl LogEntry {
    pub fn new(
        timestamp: DateTime<Utc>,
        severity: Severity,
        component: String,
        connection: String,
        namespace: Namespace,
    ) -> Self {
        Self {
            timestamp,
            severity,
            component,
            connection,
            namespace,
            command_name: String::new(),
            command: Document::new(),
            app_name: None,
            plan_summary: Vec::new(),
            keys_examined: UNKNOWN_METRIC,
            docs_examined: UNKNOWN_METRIC,
            cursor_exhausted: false,
            num_yields: UNKNOWN_METRIC,
            n_returned: UNKNOWN_METRIC,
            query_hash: None,
            result_length: UNKNOWN_METRIC,
            locks: None,
            protocol: None,
            execution_time_ms: UNKNOWN_METRIC,
        }
    }
}

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Entry(LogEntry),
    /// Valid line the advisor does not analyze (other component or command).
    NotSupported { line_number: usize, reason: String },
}

impl Operation {
    /// Turn a parsed `find` line into a Query operation.
    pub fn from_log_entry(entry: &LogEntry) -> Operation {
        let cmd = &entry.command;
        let kind = OperationKind::Query(QueryShape {
            filter: cmd.get_document("filter").cloned().unwrap_or_default(),
            sort: cmd.get_document("sort").cloned().unwrap_or_default(),
            projection: cmd.get_document("projection").cloned().unwrap_or_default(),
        });
        let client = ClientInfo {
            client: Some(entry.connection.clone()),
            app_name: entry.app_name.clone(),
            user: None,
        };
        Operation::new(entry.namespace.clone(), entry.timestamp, kind)
            .with_client(client)
            .with_millis(entry.execution_time_ms)
            .with_raw(entry.command.clone())
    }
}
