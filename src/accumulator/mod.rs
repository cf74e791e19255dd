//! Collection / Db / Processor accumulators.
//!
//! Operations flow Processor → Db → Collection. Each level creates its
//! children on first use and finalizes them with `done()`, which produces an
//! owned result tree and can be called any number of times.

mod collection;
mod db;
mod processor;
mod results;

pub use collection::Collection;
pub use db::Db;
pub use processor::Processor;
pub use results::{CollectionIndexResults, DbIndexResult, FailedOperation, IndexResults};
