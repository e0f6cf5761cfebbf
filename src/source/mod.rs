//! Ordered line sources feeding the transaction pipeline.
//!
//! Every source yields `Result<RawLine, PipelineError>` in the order the
//! underlying store returns it. Nothing here re-sorts.

pub mod csv;
pub mod sqlite;

pub use self::csv::{csv_lines, csv_lines_from_reader};
pub use self::sqlite::SqliteLines;
