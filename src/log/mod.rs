//! Server log ingestion
//!
//! Turns legacy text-format server log lines into [`LogEntry`] values. Only
//! `COMMAND` lines carrying a `find` are analyzed; every other well-formed
//! line becomes [`LogRecord::NotSupported`].

mod entry;
pub mod literal;
mod parser;

pub use entry::{LogEntry, LogRecord, PlanSummary, Severity};
pub use parser::{parse_line, LogParser, FIELD_MARKERS};
