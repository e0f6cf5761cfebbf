use crate::error::PipelineError;
use crate::line::{CsvLine, RawLine};

use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Streams lines from a CSV export of the transaction query, in file order.
pub fn csv_lines(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<RawLine, PipelineError>>, PipelineError> {
    let file = File::open(path)?;
    Ok(csv_lines_from_reader(file))
}

pub fn csv_lines_from_reader<R: Read>(
    reader: R,
) -> impl Iterator<Item = Result<RawLine, PipelineError>> {
    let rdr = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    rdr.into_deserialize::<CsvLine>()
        .map(|result| match result {
            Ok(line) => RawLine::try_from(line),
            Err(e) => Err(csv_error(e)),
        })
}

fn csv_error(err: csv::Error) -> PipelineError {
    match err.kind() {
        csv::ErrorKind::Deserialize { .. } => PipelineError::schema("record", err.to_string()),
        _ => PipelineError::Csv(err),
    }
}
