#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use index_advisor::{Document, Namespace, Operation};
use std::io::Write;
use tempfile::NamedTempFile;

pub const TEXT_FIND: &str = r#"2017-08-17T12:35:38.311+0200 I COMMAND  [conn3] command test.t appName: "MongoDB Shell" command: find { find: "t", filter: { $text: { $search: "world" } } } planSummary: IXSCAN { _fts: "text", _ftsx: 1 } keysExamined:1 docsExamined:1 cursorExhausted:1 numYields:0 nreturned:1 reslen:212 locks:{ Global: { acquireCount: { r: 2 } } } protocol:op_msg 10ms"#;

pub fn ns(s: &str) -> Namespace {
    Namespace::parse(s).expect("valid namespace")
}

pub fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, hour, minute, second)
        .single()
        .expect("valid timestamp")
}

pub fn find(namespace: &str, filter: Document) -> Operation {
    Operation::query(ns(namespace), at(12, 0, 0), filter, Document::new())
}

pub fn find_sorted(namespace: &str, filter: Document, sort: Document) -> Operation {
    Operation::query(ns(namespace), at(12, 0, 0), filter, sort)
}

/// Write `lines` to a temporary file, one per line.
pub fn temp_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    for line in lines {
        writeln!(file, "{}", line).expect("write temp file");
    }
    file.flush().expect("flush temp file");
    file
}

/// Log line for a `find` on `namespace` with the given filter literal.
pub fn find_line(namespace: &str, filter: &str, millis: u32) -> String {
    let collection = namespace.split_once('.').map(|(_, c)| c).unwrap_or(namespace);
    format!(
        r#"2024-05-06T12:00:00.000+0000 I  COMMAND  [conn1] command {ns} command: find {{ find: "{coll}", filter: {filter} }} planSummary: COLLSCAN keysExamined:0 docsExamined:10 nreturned:1 reslen:100 protocol:op_msg {ms}ms"#,
        ns = namespace,
        coll = collection,
        filter = filter,
        ms = millis
    )
}
