//! File-backed operation sources.
//!
//! A source pulls records from its input, turns them into [`Operation`]s and
//! hands every operation on a watched namespace to a callback. Malformed
//! records are logged and counted, never fatal; I/O errors and callback
//! errors stop the run.

use crate::document::extjson::parse_document;
use crate::error::{Error, Result};
use crate::log::{LogParser, LogRecord};
use crate::namespace::Namespace;
use crate::operation::Operation;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub trait OperationSource {
    fn for_each(
        &mut self,
        namespaces: &[String],
        on_record: &mut dyn FnMut(Operation) -> Result<()>,
    ) -> Result<()>;
}

/// Per-run counters shared by the file sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub delivered: u64,
    /// Well-formed records the advisor does not analyze.
    pub not_supported: u64,
    /// Malformed records.
    pub skipped: u64,
    /// Records on namespaces outside the watch list.
    pub filtered: u64,
}

fn watched(namespaces: &[String], namespace: &Namespace) -> bool {
    namespaces.is_empty() || namespaces.iter().any(|p| namespace.matches_pattern(p))
}

/// Legacy text-format server log.
#[derive(Debug)]
pub struct LogFileSource {
    path: PathBuf,
    stats: SourceStats,
}

impl LogFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stats: SourceStats::default(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    fn run<R: BufRead>(
        &mut self,
        reader: R,
        namespaces: &[String],
        on_record: &mut dyn FnMut(Operation) -> Result<()>,
    ) -> Result<()> {
        let mut parser = LogParser::new(reader);
        while parser.has_next()? {
            match parser.next_record() {
                Ok(LogRecord::Entry(entry)) => {
                    if !watched(namespaces, &entry.namespace) {
                        self.stats.filtered += 1;
                        continue;
                    }
                    on_record(Operation::from_log_entry(&entry))?;
                    self.stats.delivered += 1;
                }
                Ok(LogRecord::NotSupported {
                    line_number,
                    reason,
                }) => {
                    debug!(line = line_number, reason = %reason, "Line not analyzed");
                    self.stats.not_supported += 1;
                }
                Err(e) if e.is_record_error() => {
                    warn!(
                        path = %self.path.display(),
                        line = parser.line_number(),
                        error = %e,
                        "Skipping malformed log line"
                    );
                    self.stats.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl OperationSource for LogFileSource {
    fn for_each(
        &mut self,
        namespaces: &[String],
        on_record: &mut dyn FnMut(Operation) -> Result<()>,
    ) -> Result<()> {
        let file = File::open(&self.path)?;
        self.run(BufReader::new(file), namespaces, on_record)?;
        info!(path = %self.path.display(), stats = ?self.stats, "Finished log file");
        Ok(())
    }
}

/// Profiler export: one Extended-JSON `system.profile` document per line.
#[derive(Debug)]
pub struct ProfileSource {
    path: PathBuf,
    stats: SourceStats,
}

impl ProfileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stats: SourceStats::default(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    fn parse_record(line: &str, line_number: usize) -> Result<Operation> {
        let record = parse_document(line).map_err(|e| Error::Parse {
            line: line_number,
            message: e.to_string(),
        })?;
        Operation::from_profile(&record)
    }

    fn run<R: BufRead>(
        &mut self,
        reader: R,
        namespaces: &[String],
        on_record: &mut dyn FnMut(Operation) -> Result<()>,
    ) -> Result<()> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let operation = match Self::parse_record(&line, idx + 1) {
                Ok(op) => op,
                Err(e) if e.is_record_error() => {
                    warn!(
                        path = %self.path.display(),
                        line = idx + 1,
                        error = %e,
                        "Skipping malformed profile record"
                    );
                    self.stats.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !watched(namespaces, operation.namespace()) {
                self.stats.filtered += 1;
                continue;
            }
            if !operation.is_analyzable() {
                self.stats.not_supported += 1;
            }
            on_record(operation)?;
            self.stats.delivered += 1;
        }
        Ok(())
    }
}

impl OperationSource for ProfileSource {
    fn for_each(
        &mut self,
        namespaces: &[String],
        on_record: &mut dyn FnMut(Operation) -> Result<()>,
    ) -> Result<()> {
        let file = File::open(&self.path)?;
        self.run(BufReader::new(file), namespaces, on_record)?;
        info!(path = %self.path.display(), stats = ?self.stats, "Finished profile export");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const FIND: &str = r#"2020-03-04T10:11:12.345+0000 I  COMMAND  [conn7] command db.people command: find { find: "people", filter: { name: "peter" }, $db: "db" } planSummary: COLLSCAN keysExamined:0 docsExamined:3 nreturned:1 reslen:150 protocol:op_msg 2ms"#;

    #[test]
    fn test_log_source_counts() {
        let input = format!(
            "{}\n\n2020-03-04T10:11:12.345+0000 X  COMMAND  [conn7] junk\n2020-03-04T10:11:12.345+0000 I  NETWORK  [listener] connection accepted\n",
            FIND
        );
        let mut source = LogFileSource::new("memory");
        let mut seen = Vec::new();
        source
            .run(Cursor::new(input), &[], &mut |op| {
                seen.push(op);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].filter().and_then(|f| f.get_str("name")), Some("peter"));
        assert_eq!(seen[0].millis(), 2);
        assert_eq!(
            source.stats(),
            SourceStats {
                delivered: 1,
                not_supported: 1,
                skipped: 1,
                filtered: 0,
            }
        );
    }

    #[test]
    fn test_log_source_filters_namespaces() {
        let mut source = LogFileSource::new("memory");
        let mut count = 0;
        source
            .run(Cursor::new(FIND), &["other.*".to_string()], &mut |_| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(source.stats().filtered, 1);
    }

    #[test]
    fn test_callback_errors_stop_the_run() {
        let mut source = LogFileSource::new("memory");
        let result = source.run(Cursor::new(FIND), &[], &mut |_| {
            Err(Error::Catalog("down".to_string()))
        });
        assert!(matches!(result, Err(Error::Catalog(_))));
    }

    #[test]
    fn test_profile_source() {
        let input = concat!(
            r#"{"op": "query", "ns": "db.people", "command": {"find": "people", "filter": {"age": {"$numberInt": "3"}}}, "millis": 4, "ts": {"$date": "2020-01-01T00:00:00Z"}}"#,
            "\n",
            "{ not json\n",
            r#"{"op": "insert", "ns": "db.people", "ninserted": 1}"#,
            "\n",
        );
        let mut source = ProfileSource::new("memory");
        let mut seen = Vec::new();
        source
            .run(Cursor::new(input), &[], &mut |op| {
                seen.push(op);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind().name(), "query");
        assert_eq!(seen[0].millis(), 4);
        assert_eq!(seen[1].kind().name(), "insert");
        assert_eq!(source.stats().skipped, 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut source = ProfileSource::new("/nonexistent/profile.json");
        assert!(matches!(
            source.for_each(&[], &mut |_| Ok(())),
            Err(Error::Io(_))
        ));
    }
}
