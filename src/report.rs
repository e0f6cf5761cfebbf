use crate::engine::transaction::{checked_sum, Transaction};
use crate::error::PipelineError;

use rust_decimal::Decimal;
use std::fmt;
use std::io::Write;

pub const REPORT_HEADER: [&str; 5] = ["id", "timestamp", "lines", "total", "tax"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub transactions: u64,
    pub lines: u64,
    pub total: Decimal,
    pub tax: Decimal,
}

impl Summary {
    /// Folds a transaction into the totals, leaving them unchanged on
    /// overflow.
    pub fn add(&mut self, tx: &Transaction) -> Result<(), PipelineError> {
        let total = checked_sum(self.total, tx.total, "total")?;
        let tax = checked_sum(self.tax, tx.tax, "tax")?;

        self.transactions += 1;
        self.lines += tx.lines.len() as u64;
        self.total = total;
        self.tax = tax;
        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transactions, {} lines, total {}, tax {}",
            self.transactions,
            self.lines,
            self.total.round_dp(2),
            self.tax.round_dp(2)
        )
    }
}

/// Writes one CSV row per transaction and keeps running totals.
pub struct Report<W: Write> {
    writer: csv::Writer<W>,
    summary: Summary,
}

impl<W: Write> Report<W> {
    pub fn new(writer: W) -> Result<Self, PipelineError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(REPORT_HEADER)?;

        Ok(Self {
            writer,
            summary: Summary::default(),
        })
    }

    pub fn record(&mut self, tx: &Transaction) -> Result<(), PipelineError> {
        self.summary.add(tx)?;
        self.writer.write_record([
            tx.id.to_string(),
            tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.lines.len().to_string(),
            tx.total.to_string(),
            tx.tax.to_string(),
        ])?;
        Ok(())
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn finish(mut self) -> Result<Summary, PipelineError> {
        self.writer.flush()?;
        Ok(self.summary)
    }
}
