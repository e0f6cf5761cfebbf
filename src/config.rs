use crate::error::PipelineError;

use chrono::NaiveDate;
use std::path::PathBuf;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const MAX_CHUNK_SIZE: usize = 100_000;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub read_only: bool,
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_only: true,
        }
    }
}

/// Calendar-day bounds applied to the stored timestamp of each line.
///
/// Bounds are inclusive and compared against `date(the_time)` with no
/// timezone conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub on: Option<NaiveDate>,
}

impl DateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start = Some(date);
        self
    }

    pub fn end(mut self, date: NaiveDate) -> Self {
        self.end = Some(date);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.on = Some(date);
        self
    }

    /// Renders the filter as extra `AND` clauses, numbering placeholders
    /// from `first_param`, with the values to bind in the same order.
    pub(crate) fn clauses(&self, first_param: usize) -> (String, Vec<String>) {
        let bounds = [(">=", self.start), ("<=", self.end), ("=", self.on)];

        let mut sql = String::new();
        let mut params = Vec::new();
        for (op, date) in bounds {
            if let Some(date) = date {
                sql.push_str(&format!(
                    " AND date(the_time) {} date(?{})",
                    op,
                    first_param + params.len()
                ));
                params.push(date.format("%Y-%m-%d").to_string());
            }
        }
        (sql, params)
    }
}

/// Direction the grouper checks transaction ids against, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupOrder {
    #[default]
    Unchecked,
    Descending,
    Ascending,
}

impl GroupOrder {
    /// Whether `next` may follow `previous` at a group boundary.
    pub fn allows(self, previous: i64, next: i64) -> bool {
        match self {
            GroupOrder::Unchecked => true,
            GroupOrder::Descending => next < previous,
            GroupOrder::Ascending => next > previous,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransactionQuery {
    pub filter: DateFilter,
    pub chunk_size: usize,
    pub order: GroupOrder,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            filter: DateFilter::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            order: GroupOrder::Unchecked,
        }
    }
}

impl TransactionQuery {
    pub fn new(filter: DateFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_order(mut self, order: GroupOrder) -> Self {
        self.order = order;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::config("chunk size must be at least 1"));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(PipelineError::config(format!(
                "chunk size {} exceeds the maximum of {}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        Ok(())
    }
}

/// Parses a calendar day as `YYYY-MM-DD` or `MM/DD/YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| PipelineError::config(format!("invalid date '{}'", raw)))
}
