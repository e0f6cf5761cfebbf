pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod line;
pub mod report;
pub mod session;
pub mod source;

use crate::config::GroupOrder;
use crate::engine::stream::TransactionStream;
use crate::error::PipelineError;
use crate::line::RawLine;
use std::path::Path;

pub use crate::engine::transaction::{Transaction, TransactionLine};
pub use crate::session::Session;

/// Streams transactions out of a CSV export of the line table.
pub fn stream_transactions(
    path: impl AsRef<Path>,
    order: GroupOrder,
) -> Result<TransactionStream<impl Iterator<Item = Result<RawLine, PipelineError>>>, PipelineError>
{
    let lines = source::csv_lines(path)?;
    Ok(TransactionStream::with_order(lines, order))
}
