//! Keyset-paginated reader over the `items_sold_final` line table.
//!
//! Each chunk is one execution of a cached statement, resuming strictly
//! after the last `(isfm_id, unique_id)` already read, so no cursor stays
//! open between chunks.
//!
//! Money and quantity columns are read through `CAST(... AS TEXT)`, so a
//! store whose columns carry NUMERIC affinity still yields exact decimals.
//!
//! Every chunk re-runs the ordered query with the resume predicate. On a
//! large store, create the matching index or each chunk sorts the whole
//! filtered table:
//!
//! ```sql
//! CREATE INDEX items_sold_final_keyset ON items_sold_final (isfm_id DESC, unique_id);
//! ```

use crate::config::DateFilter;
use crate::error::PipelineError;
use crate::line::RawLine;

use rusqlite::{Connection, ToSql};
use std::collections::VecDeque;

/// Rows never handed to the pipeline: voided items, voided sales, and tax,
/// subtotal, refund and layaway type markers.
pub(crate) const LINE_EXCLUSIONS: &str = "void_item_flag != 'Y'
               AND void_sale_flag != 'Y'
               AND the_type NOT GLOB '*[TSRL]*'";

const LINE_COLUMNS: &str = "unique_id,
               item_num,
               CAST(retail AS TEXT) AS retail,
               CAST(wholesale AS TEXT) AS cost,
               the_type AS type,
               the_time AS timestamp,
               isfm_id AS transaction_id,
               CAST(num_units AS TEXT) AS num_units,
               CAST(statetax AS TEXT) AS statetax,
               CAST(countytax AS TEXT) AS countytax,
               CAST(citytax AS TEXT) AS citytax";

/// Number of parameters bound ahead of the date filter: resume id, resume
/// unique id, chunk limit.
const KEYSET_PARAMS: usize = 3;

pub(crate) fn count_sql(filter: &DateFilter) -> (String, Vec<String>) {
    let (clauses, params) = filter.clauses(1);
    let sql = format!(
        "SELECT count(*) FROM items_sold_final WHERE {}{}",
        LINE_EXCLUSIONS, clauses
    );
    (sql, params)
}

fn chunk_sql(filter: &DateFilter) -> (String, Vec<String>) {
    let (clauses, params) = filter.clauses(KEYSET_PARAMS + 1);
    let sql = format!(
        "SELECT {}
         FROM items_sold_final
         WHERE {}
           AND (?1 IS NULL OR isfm_id < ?1 OR (isfm_id = ?1 AND unique_id > ?2)){}
         ORDER BY isfm_id DESC, unique_id ASC
         LIMIT ?3",
        LINE_COLUMNS, LINE_EXCLUSIONS, clauses
    );
    (sql, params)
}

/// Ordered, chunked line source backed by a SQLite connection.
pub struct SqliteLines<'c> {
    conn: &'c Connection,
    sql: String,
    filter_params: Vec<String>,
    chunk_size: usize,
    resume_after: Option<(i64, i64)>,
    buffer: VecDeque<Result<RawLine, PipelineError>>,
    exhausted: bool,
    chunks: u64,
}

impl<'c> SqliteLines<'c> {
    pub fn new(conn: &'c Connection, filter: &DateFilter, chunk_size: usize) -> Self {
        let (sql, filter_params) = chunk_sql(filter);
        Self {
            conn,
            sql,
            filter_params,
            chunk_size: chunk_size.max(1),
            resume_after: None,
            buffer: VecDeque::new(),
            exhausted: false,
            chunks: 0,
        }
    }

    fn fill(&mut self) {
        if let Err(e) = self.fetch_chunk() {
            self.buffer.push_back(Err(e));
            self.exhausted = true;
        }
    }

    fn fetch_chunk(&mut self) -> Result<(), PipelineError> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(&self.sql)?;

        let resume_id = self.resume_after.map(|(id, _)| id);
        let resume_unique = self.resume_after.map(|(_, unique)| unique);
        let limit = i64::try_from(self.chunk_size)
            .map_err(|_| PipelineError::config("chunk size does not fit a SQL LIMIT"))?;

        let mut params: Vec<&dyn ToSql> = vec![&resume_id, &resume_unique, &limit];
        params.extend(self.filter_params.iter().map(|p| p as &dyn ToSql));

        let mut rows = stmt.query(params.as_slice())?;
        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            fetched += 1;
            match RawLine::try_from(row) {
                Ok(line) => {
                    self.resume_after = Some((line.transaction_id, line.unique_id));
                    self.buffer.push_back(Ok(line));
                }
                Err(e) => {
                    self.buffer.push_back(Err(e));
                    self.exhausted = true;
                    return Ok(());
                }
            }
        }

        self.chunks += 1;
        log::debug!("Fetched chunk {} ({} lines)", self.chunks, fetched);

        if fetched < self.chunk_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for SqliteLines<'_> {
    type Item = Result<RawLine, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.buffer.pop_front() {
                return Some(line);
            }
            if self.exhausted {
                return None;
            }
            self.fill();
        }
    }
}
