use crate::error::PipelineError;

use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rusqlite::Row;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Marker present in `type_marker` for lines that record a sold item.
pub const ITEM_SOLD_MARKER: char = 'A';

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One point-of-sale line as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub transaction_id: i64,
    pub timestamp: NaiveDateTime,
    pub item_num: String,
    pub unit_price: Decimal,
    pub cost: Decimal,
    pub tax: Decimal,
    pub quantity: Decimal,
    pub unique_id: i64,
    pub type_marker: String,
}

impl RawLine {
    pub fn is_item_sold(&self) -> bool {
        self.type_marker.contains(ITEM_SOLD_MARKER)
    }
}

/// A line as exported to CSV, one column per field of the transaction query.
#[derive(Debug, Deserialize)]
pub struct CsvLine {
    pub unique_id: Option<i64>,
    pub item_num: Option<String>,
    pub retail: Option<Decimal>,
    pub cost: Option<Decimal>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub timestamp: Option<String>,
    pub transaction_id: Option<i64>,
    pub num_units: Option<Decimal>,
    pub tax: Option<Decimal>,
}

impl TryFrom<CsvLine> for RawLine {
    type Error = PipelineError;

    fn try_from(csv: CsvLine) -> Result<Self, Self::Error> {
        let timestamp = required(csv.timestamp, "timestamp")?;

        Ok(RawLine {
            transaction_id: required(csv.transaction_id, "transaction_id")?,
            timestamp: parse_timestamp("timestamp", &timestamp)?,
            item_num: required(csv.item_num, "item_num")?,
            unit_price: required(csv.retail, "retail")?,
            cost: required(csv.cost, "cost")?,
            tax: required(csv.tax, "tax")?,
            quantity: required(csv.num_units, "num_units")?,
            unique_id: required(csv.unique_id, "unique_id")?,
            type_marker: required(csv.kind, "type")?,
        })
    }
}

impl TryFrom<&Row<'_>> for RawLine {
    type Error = PipelineError;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        let tax = ["statetax", "countytax", "citytax"]
            .into_iter()
            .try_fold(Decimal::ZERO, |sum, field| {
                sum.checked_add(decimal_column(row, field)?)
                    .ok_or_else(|| PipelineError::schema(field, "tax sum overflows"))
            })?;
        let timestamp = text_column(row, "timestamp")?;

        Ok(RawLine {
            transaction_id: integer_column(row, "transaction_id")?,
            timestamp: parse_timestamp("timestamp", &timestamp)?,
            item_num: text_column(row, "item_num")?,
            unit_price: decimal_column(row, "retail")?,
            cost: decimal_column(row, "cost")?,
            tax,
            quantity: decimal_column(row, "num_units")?,
            unique_id: integer_column(row, "unique_id")?,
            type_marker: text_column(row, "type")?,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, PipelineError> {
    value.ok_or_else(|| PipelineError::schema(field, "missing value"))
}

pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<NaiveDateTime, PipelineError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| PipelineError::schema(field, format!("unparseable timestamp '{}'", raw)))
}

fn column<'r>(row: &'r Row<'_>, field: &str) -> Result<ValueRef<'r>, PipelineError> {
    row.get_ref(field)
        .map_err(|e| PipelineError::schema(field, e.to_string()))
}

pub(crate) fn decimal_column(row: &Row<'_>, field: &str) -> Result<Decimal, PipelineError> {
    match column(row, field)? {
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| PipelineError::schema(field, e.to_string()))?;
            Decimal::from_str(text.trim())
                .map_err(|e| PipelineError::schema(field, format!("'{}': {}", text, e)))
        }
        // REAL storage cannot hold every cent amount exactly
        ValueRef::Real(r) => Err(PipelineError::schema(
            field,
            format!("floating-point value {} is not an exact decimal", r),
        )),
        ValueRef::Null => Err(PipelineError::schema(field, "missing value")),
        ValueRef::Blob(_) => Err(PipelineError::schema(field, "unexpected blob")),
    }
}

pub(crate) fn integer_column(row: &Row<'_>, field: &str) -> Result<i64, PipelineError> {
    match column(row, field)? {
        ValueRef::Integer(i) => Ok(i),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse().ok())
            .ok_or_else(|| PipelineError::schema(field, "not an integer")),
        ValueRef::Null => Err(PipelineError::schema(field, "missing value")),
        _ => Err(PipelineError::schema(field, "not an integer")),
    }
}

pub(crate) fn text_column(row: &Row<'_>, field: &str) -> Result<String, PipelineError> {
    match column(row, field)? {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|text| text.trim_end().to_string())
            .map_err(|e| PipelineError::schema(field, e.to_string())),
        ValueRef::Integer(i) => Ok(i.to_string()),
        ValueRef::Null => Err(PipelineError::schema(field, "missing value")),
        _ => Err(PipelineError::schema(field, "not text")),
    }
}

pub(crate) fn optional_text_column(
    row: &Row<'_>,
    field: &str,
) -> Result<Option<String>, PipelineError> {
    match column(row, field)? {
        ValueRef::Null => Ok(None),
        _ => text_column(row, field).map(Some),
    }
}
