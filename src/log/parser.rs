use super::entry::{LogEntry, LogRecord, PlanSummary, Severity};
use super::literal::parse_literal;
use crate::document::extjson::parse_date_str;
use crate::error::{Error, Result};
use crate::namespace::Namespace;
use std::io::BufRead;

/// Field markers that open a new segment of the free-text tail, in the order
/// the server prints them.
pub const FIELD_MARKERS: [&str; 12] = [
    "appName:",
    "command:",
    "planSummary:",
    "keysExamined:",
    "docsExamined:",
    "cursorExhausted:",
    "numYields:",
    "nreturned:",
    "queryHash:",
    "reslen:",
    "locks:",
    "protocol:",
];

/// Pull parser over server log lines.
///
/// `has_next` advances to the next non-blank line, `next_record` parses it.
/// Parse failures are returned to the caller; the parser never skips a line
/// on its own.
pub struct LogParser<R> {
    reader: R,
    line_number: usize,
    pending: Option<String>,
}

impl<R: BufRead> LogParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            pending: None,
        }
    }

    /// Line number of the most recently read line (1-based).
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn has_next(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            self.line_number += 1;
            if !line.trim().is_empty() {
                self.pending = Some(line.trim_end().to_string());
                return Ok(true);
            }
        }
    }

    pub fn next_record(&mut self) -> Result<LogRecord> {
        if !self.has_next()? {
            return Err(Error::Parse {
                line: self.line_number,
                message: "no more lines".to_string(),
            });
        }
        let line = self.pending.take().unwrap_or_default();
        parse_line(&line, self.line_number)
    }
}

impl<R: BufRead> Iterator for LogParser<R> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_record()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn not_supported(line_number: usize, reason: impl Into<String>) -> Result<LogRecord> {
    Ok(LogRecord::NotSupported {
        line_number,
        reason: reason.into(),
    })
}

/// Split off the first whitespace-delimited token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(end) => Some((&s[..end], s[end..].trim_start())),
        None => Some((s, "")),
    }
}

/// Parse a single log line.
pub fn parse_line(line: &str, line_number: usize) -> Result<LogRecord> {
    let (timestamp, rest) =
        next_token(line).ok_or_else(|| parse_error(line_number, "empty line"))?;
    let (severity, rest) =
        next_token(rest).ok_or_else(|| parse_error(line_number, "missing severity"))?;
    let severity = Severity::parse(severity)?;
    let (component, rest) =
        next_token(rest).ok_or_else(|| parse_error(line_number, "missing component"))?;
    if component != "COMMAND" {
        return not_supported(line_number, format!("component {}", component));
    }
    let (connection, rest) =
        next_token(rest).ok_or_else(|| parse_error(line_number, "missing connection"))?;
    let (op, rest) = next_token(rest).ok_or_else(|| parse_error(line_number, "missing operation"))?;
    if op != "command" {
        return not_supported(line_number, format!("operation {}", op));
    }
    let (ns, rest) = next_token(rest).ok_or_else(|| parse_error(line_number, "missing namespace"))?;

    let (rest, execution_time_ms) = strip_duration(rest);
    let segments = split_segments(rest);
    let Some(command) = segments.iter().find(|(m, _)| *m == "command:") else {
        return not_supported(line_number, "no command segment");
    };
    let (command_name, literal) = match command.1.find('{') {
        Some(brace) => (command.1[..brace].trim(), &command.1[brace..]),
        None => (command.1.trim(), ""),
    };
    if command_name != "find" {
        return not_supported(line_number, format!("command {}", command_name));
    }

    let timestamp = parse_date_str(timestamp)
        .ok_or_else(|| parse_error(line_number, format!("invalid timestamp {:?}", timestamp)))?;
    let namespace =
        Namespace::parse(ns).map_err(|_| parse_error(line_number, format!("invalid namespace {:?}", ns)))?;

    let mut entry = LogEntry::new(
        timestamp,
        severity,
        component.to_string(),
        connection.trim_matches(|c| c == '[' || c == ']').to_string(),
        namespace,
    );
    entry.command_name = command_name.to_string();
    entry.command = parse_literal(literal)?;
    entry.execution_time_ms = execution_time_ms;

    for (marker, value) in &segments {
        match *marker {
            "appName:" => entry.app_name = Some(unquote(value)),
            "planSummary:" => entry.plan_summary = parse_plan_summary(value)?,
            "keysExamined:" => entry.keys_examined = parse_number(value, line_number)?,
            "docsExamined:" => entry.docs_examined = parse_number(value, line_number)?,
            "cursorExhausted:" => entry.cursor_exhausted = matches!(*value, "1" | "true"),
            "numYields:" => entry.num_yields = parse_number(value, line_number)?,
            "nreturned:" => entry.n_returned = parse_number(value, line_number)?,
            "queryHash:" => entry.query_hash = Some(value.to_string()),
            "reslen:" => entry.result_length = parse_number(value, line_number)?,
            "locks:" => entry.locks = Some(value.to_string()),
            "protocol:" => entry.protocol = Some(value.to_string()),
            _ => {}
        }
    }
    Ok(LogRecord::Entry(entry))
}

/// Remove a trailing `<N>ms` token, returning the duration or `-1`.
fn strip_duration(rest: &str) -> (&str, i64) {
    let trimmed = rest.trim_end();
    let start = trimmed
        .rfind(char::is_whitespace)
        .map(|i| i + 1)
        .unwrap_or(0);
    let last = &trimmed[start..];
    match last.strip_suffix("ms").and_then(|n| n.parse::<i64>().ok()) {
        Some(ms) => (trimmed[..start].trim_end(), ms),
        None => (trimmed, crate::operation::UNKNOWN_METRIC),
    }
}

/// Cut the tail into `(marker, value)` segments. A marker only counts at a
/// word boundary, outside string literals and at brace depth zero.
fn split_segments(rest: &str) -> Vec<(&'static str, &str)> {
    let mut starts: Vec<(usize, &'static str)> = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_ws = true;

    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            prev_ws = false;
            continue;
        }
        if depth == 0 && prev_ws {
            if let Some(marker) = FIELD_MARKERS.iter().copied().find(|m| rest[i..].starts_with(*m)) {
                starts.push((i, marker));
            }
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            _ => {}
        }
        prev_ws = c.is_whitespace();
    }

    starts
        .iter()
        .enumerate()
        .map(|(n, (start, marker))| {
            let end = starts.get(n + 1).map_or(rest.len(), |(next, _)| *next);
            (*marker, rest[start + marker.len()..end].trim())
        })
        .collect()
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn parse_number(value: &str, line_number: usize) -> Result<i64> {
    value
        .parse()
        .map_err(|_| parse_error(line_number, format!("invalid number {:?}", value)))
}

/// `COLLSCAN`, `IXSCAN { a: 1 }` or several stages separated by commas.
fn parse_plan_summary(value: &str) -> Result<Vec<PlanSummary>> {
    let mut stages = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                stages.push(parse_stage(&value[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !value[start..].trim().is_empty() {
        stages.push(parse_stage(&value[start..])?);
    }
    Ok(stages)
}

fn parse_stage(text: &str) -> Result<PlanSummary> {
    let text = text.trim();
    Ok(match text.find('{') {
        Some(brace) => PlanSummary {
            stage: text[..brace].trim().to_string(),
            key: Some(parse_literal(&text[brace..])?),
        },
        None => PlanSummary {
            stage: text.to_string(),
            key: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    const TEXT_FIND: &str = r#"2017-08-17T12:35:38.311+0200 I COMMAND  [conn3] command test.t appName: "MongoDB Shell" command: find { find: "t", filter: { $text: { $search: "world" } } } planSummary: IXSCAN { _fts: "text", _ftsx: 1 } keysExamined:1 docsExamined:1 cursorExhausted:1 numYields:0 nreturned:1 reslen:212 locks:{ Global: { acquireCount: { r: 2 } } } protocol:op_msg 10ms"#;

    fn entry(record: LogRecord) -> LogEntry {
        match record {
            LogRecord::Entry(e) => e,
            other => panic!("expected an entry, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_find_line() {
        let e = entry(parse_line(TEXT_FIND, 1).unwrap());
        assert_eq!(e.severity, Severity::Info);
        assert_eq!(e.connection, "conn3");
        assert_eq!(e.namespace, Namespace::new("test", "t"));
        assert_eq!(e.app_name.as_deref(), Some("MongoDB Shell"));
        assert_eq!(e.result_length, 212);
        assert_eq!(e.protocol.as_deref(), Some("op_msg"));
        assert_eq!(e.execution_time_ms, 10);
        assert_eq!(e.keys_examined, 1);
        assert_eq!(e.num_yields, 0);
        assert!(e.cursor_exhausted);
        assert_eq!(
            e.command,
            doc! { "find" => "t", "filter" => doc! { "$text" => doc! { "$search" => "world" } } }
        );
        assert_eq!(e.plan_summary.len(), 1);
        assert_eq!(e.plan_summary[0].stage, "IXSCAN");
        assert_eq!(
            e.plan_summary[0].key,
            Some(doc! { "_fts" => "text", "_ftsx" => 1 })
        );
        assert!(e.locks.as_deref().is_some_and(|l| l.starts_with("{ Global")));
    }

    #[test]
    fn test_missing_metrics_stay_unknown() {
        let line = r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: find { find: "t", filter: { a: 1 } } planSummary: COLLSCAN"#;
        let e = entry(parse_line(line, 1).unwrap());
        assert_eq!(e.execution_time_ms, -1);
        assert_eq!(e.result_length, -1);
        assert_eq!(e.docs_examined, -1);
        assert_eq!(e.plan_summary, vec![PlanSummary { stage: "COLLSCAN".to_string(), key: None }]);
    }

    #[test]
    fn test_invalid_severity() {
        let line = "2017-08-17T12:35:38.311+0200 Q COMMAND [conn3] command test.t";
        assert!(matches!(parse_line(line, 1), Err(Error::InvalidSeverity(s)) if s == "Q"));
    }

    #[test]
    fn test_not_supported_lines() {
        let network = "2017-08-17T12:35:38.311+0200 I NETWORK [listener] connection accepted";
        assert!(matches!(parse_line(network, 1).unwrap(), LogRecord::NotSupported { .. }));

        let insert = r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: insert { insert: "t", documents: 1 } 3ms"#;
        assert!(matches!(
            parse_line(insert, 1).unwrap(),
            LogRecord::NotSupported { reason, .. } if reason == "command insert"
        ));
    }

    #[test]
    fn test_bad_literal_is_error() {
        let line = r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: find { find: "t", filter: { a: } } 3ms"#;
        assert!(matches!(parse_line(line, 7), Err(Error::DocumentLiteral(_))));
    }

    #[test]
    fn test_marker_text_inside_values_does_not_split() {
        let line = r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: find { find: "t", filter: { note: "reslen:5 locks:x" } } reslen:99 5ms"#;
        let e = entry(parse_line(line, 1).unwrap());
        assert_eq!(e.result_length, 99);
        assert_eq!(
            e.command.get_document("filter").and_then(|f| f.get_str("note")),
            Some("reslen:5 locks:x")
        );
    }

    #[test]
    fn test_marker_text_inside_single_quotes_does_not_split() {
        let line = r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: find { find: "t", filter: { note: 'done reslen:5' } } reslen:99 5ms"#;
        let e = entry(parse_line(line, 1).unwrap());
        assert_eq!(e.result_length, 99);
        assert_eq!(
            e.command.get_document("filter").and_then(|f| f.get_str("note")),
            Some("done reslen:5")
        );
    }

    #[test]
    fn test_malformed_uuid_is_error() {
        let uuid = format!("a{}a", "é".repeat(15));
        let line = format!(
            r#"2017-08-17T12:35:38.311+0200 I COMMAND [conn3] command test.t command: find {{ find: "t", filter: {{ id: UUID("{}") }} }} 2ms"#,
            uuid
        );
        assert!(matches!(parse_line(&line, 4), Err(Error::DocumentLiteral(_))));
    }

    #[test]
    fn test_multi_stage_plan_summary() {
        let stages = parse_plan_summary("IXSCAN { a: 1 }, IXSCAN { b: -1 }").unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].key, Some(doc! { "b" => -1 }));
    }

    #[test]
    fn test_parser_iterates_lines() {
        let input = format!("{}\n\n2017-08-17T12:35:38.311+0200 I NETWORK [x] y\n", TEXT_FIND);
        let mut parser = LogParser::new(input.as_bytes());
        assert!(parser.has_next().unwrap());
        assert!(matches!(parser.next_record().unwrap(), LogRecord::Entry(_)));
        assert!(parser.has_next().unwrap());
        assert!(matches!(parser.next_record().unwrap(), LogRecord::NotSupported { line_number: 3, .. }));
        assert!(!parser.has_next().unwrap());
        assert!(parser.next().is_none());
    }
}
