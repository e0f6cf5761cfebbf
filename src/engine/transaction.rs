use crate::engine::grouper::LineGroup;
use crate::error::PipelineError;
use crate::line::RawLine;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionLine {
    pub id: i64,
    pub item_num: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub tax: Decimal,
    pub cost: Decimal,
}

impl From<RawLine> for TransactionLine {
    fn from(line: RawLine) -> Self {
        Self {
            id: line.unique_id,
            item_num: line.item_num,
            quantity: line.quantity,
            price: line.unit_price,
            tax: line.tax,
            cost: line.cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub total: Decimal,
    pub tax: Decimal,
    pub lines: Vec<TransactionLine>,
}

impl Transaction {
    pub fn new(id: i64, timestamp: NaiveDateTime) -> Self {
        Self {
            id,
            timestamp,
            total: Decimal::ZERO,
            tax: Decimal::ZERO,
            lines: Vec::new(),
        }
    }

    /// Appends a sold line and folds its price and tax into the totals.
    ///
    /// On overflow the transaction is left unchanged.
    pub fn push_line(&mut self, line: TransactionLine) -> Result<(), PipelineError> {
        let total = checked_sum(self.total, line.price, "total")?;
        let tax = checked_sum(self.tax, line.tax, "tax")?;

        self.total = total;
        self.tax = tax;
        self.lines.push(line);
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        let expected_total: Decimal = self.lines.iter().map(|l| l.price).sum();
        let expected_tax: Decimal = self.lines.iter().map(|l| l.tax).sum();

        self.total == expected_total && self.tax == expected_tax
    }
}

/// Folds a closed group into a transaction.
///
/// Id and timestamp come from the group's first line. Only lines carrying
/// the item-sold marker become transaction lines; everything else is dropped
/// without touching the totals. A group with no sold lines still yields a
/// transaction, with zero totals. Totals that overflow `Decimal` fail the
/// group with a schema error.
impl TryFrom<LineGroup> for Transaction {
    type Error = PipelineError;

    fn try_from(group: LineGroup) -> Result<Self, Self::Error> {
        let first = group.first();
        let mut tx = Transaction::new(first.transaction_id, first.timestamp);

        for line in group.into_lines() {
            if line.is_item_sold() {
                tx.push_line(line.into())?;
            }
        }

        Ok(tx)
    }
}

pub(crate) fn checked_sum(
    sum: Decimal,
    value: Decimal,
    field: &str,
) -> Result<Decimal, PipelineError> {
    sum.checked_add(value)
        .ok_or_else(|| PipelineError::schema(field, format!("{} + {} overflows", sum, value)))
}
