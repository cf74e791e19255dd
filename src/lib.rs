//! Offline index advisor.
//!
//! Reads recorded query activity (server log lines and profiler exports),
//! derives the indexes that activity would use, merges them with the indexes
//! a collection already has and reports a redundancy-free set together with
//! per-shape query statistics.

pub mod accumulator;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod log;
pub mod logging;
pub mod namespace;
pub mod operation;
pub mod plan;
pub mod recommend;
pub mod source;
pub mod statistics;

pub use accumulator::{
    Collection, CollectionIndexResults, Db, DbIndexResult, FailedOperation, IndexResults, Processor,
};
pub use catalog::{IndexCatalog, OfflineCatalog};
pub use config::AdvisorConfig;
pub use document::{Document, Value};
pub use error::{Error, Result};
pub use index::{Direction, Field, Index, IndexCoalesceResult, IndexCoalescer, TextField};
pub use log::{LogEntry, LogParser, LogRecord};
pub use namespace::Namespace;
pub use operation::{Operation, OperationKind};
pub use plan::QueryPlan;
pub use recommend::{Candidate, IndexRecommender};
pub use source::{LogFileSource, OperationSource, ProfileSource, SourceStats};
pub use statistics::{ShapeStatistics, StatisticsProcessor, TimeResolution};
