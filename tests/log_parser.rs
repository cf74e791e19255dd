mod common;

use common::{find_line, TEXT_FIND};
use index_advisor::log::{parse_line, PlanSummary, Severity};
use index_advisor::{doc, Error, LogParser, LogRecord, Operation, OperationKind};
use std::io::Cursor;

#[test]
fn test_text_find_line() {
    let record = parse_line(TEXT_FIND, 1).unwrap();
    let LogRecord::Entry(entry) = record else {
        panic!("expected an entry, got {:?}", record);
    };

    assert_eq!(entry.severity, Severity::Info);
    assert_eq!(entry.component, "COMMAND");
    assert_eq!(entry.namespace.to_string(), "test.t");
    assert_eq!(entry.app_name.as_deref(), Some("MongoDB Shell"));
    assert_eq!(entry.result_length, 212);
    assert_eq!(entry.protocol.as_deref(), Some("op_msg"));
    assert_eq!(entry.execution_time_ms, 10);
    assert_eq!(entry.keys_examined, 1);
    assert_eq!(entry.docs_examined, 1);
    assert_eq!(entry.n_returned, 1);
    assert_eq!(entry.num_yields, 0);
    assert!(entry.cursor_exhausted);
    assert_eq!(
        entry.command,
        doc! {
            "find" => "t",
            "filter" => doc! { "$text" => doc! { "$search" => "world" } },
        }
    );
    assert_eq!(
        entry.plan_summary,
        vec![PlanSummary {
            stage: "IXSCAN".to_string(),
            key: Some(doc! { "_fts" => "text", "_ftsx" => 1 }),
        }]
    );

    let op = Operation::from_log_entry(&entry);
    assert_eq!(op.millis(), 10);
    let OperationKind::Query(shape) = op.kind() else {
        panic!("expected a query");
    };
    assert_eq!(shape.filter, doc! { "$text" => doc! { "$search" => "world" } });
}

#[test]
fn test_mixed_log_stream() {
    let input = [
        find_line("shop.orders", r#"{ status: "open" }"#, 4),
        "2024-05-06T12:00:01.000+0000 I  NETWORK  [listener] connection accepted".to_string(),
        String::new(),
        "2024-05-06T12:00:02.000+0000 Z  COMMAND  [conn1] command shop.orders".to_string(),
        find_line("shop.orders", r#"{ created: ISODate("2024-01-01T00:00:00Z") }"#, 7),
    ]
    .join("\n");

    let records: Vec<_> = LogParser::new(Cursor::new(input)).collect();
    assert_eq!(records.len(), 4);
    assert!(matches!(records[0], Ok(LogRecord::Entry(_))));
    assert!(matches!(records[1], Ok(LogRecord::NotSupported { line_number: 2, .. })));
    assert!(matches!(records[2], Err(Error::InvalidSeverity(_))));
    match &records[3] {
        Ok(LogRecord::Entry(entry)) => {
            let filter = entry.command.get_document("filter").unwrap();
            assert!(filter.get("created").and_then(|v| v.as_datetime()).is_some());
            assert_eq!(entry.execution_time_ms, 7);
        }
        other => panic!("unexpected record {:?}", other),
    }
}

#[test]
fn test_unparseable_literal_is_reported() {
    let line = find_line("shop.orders", "{ status: }", 1);
    let err = parse_line(&line, 9).unwrap_err();
    assert!(err.is_record_error());
}
