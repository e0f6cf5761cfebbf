use crate::catalog::{Item, ITEMS_SQL, ITEM_SQL};
use crate::config::{DatabaseConfig, DateFilter, TransactionQuery};
use crate::engine::stream::TransactionStream;
use crate::error::PipelineError;
use crate::source::sqlite::{count_sql, SqliteLines};

use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;

/// A connection to the point-of-sale store.
///
/// The session owns everything scoped to the connection: rusqlite's
/// prepared statement cache and the item lookup memo. Streams borrow the
/// session, so it cannot be closed while one is alive. Every call after
/// [`Session::close`] fails with [`PipelineError::ClosedResource`].
pub struct Session {
    conn: Option<Connection>,
    items: HashMap<String, Item>,
}

impl Session {
    pub fn open(config: &DatabaseConfig) -> Result<Self, PipelineError> {
        let conn = if config.read_only {
            let conn = Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.execute_batch("PRAGMA query_only = ON")?;
            conn
        } else {
            Connection::open(&config.path)?
        };

        log::info!("Opened point-of-sale store {}", config.path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            items: HashMap::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn connection(&self) -> Result<&Connection, PipelineError> {
        self.conn.as_ref().ok_or(PipelineError::ClosedResource)
    }

    /// Streams the transactions selected by `query`, newest id first.
    pub fn transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<TransactionStream<SqliteLines<'_>>, PipelineError> {
        query.validate()?;
        let conn = self.connection()?;

        log::info!(
            "Streaming transactions (filter: {:?}, chunk size: {}, order check: {:?})",
            query.filter,
            query.chunk_size,
            query.order
        );
        let lines = SqliteLines::new(conn, &query.filter, query.chunk_size);
        Ok(TransactionStream::with_order(lines, query.order))
    }

    /// Number of line rows a transaction query with `filter` would read.
    pub fn count_lines(&self, filter: &DateFilter) -> Result<u64, PipelineError> {
        let conn = self.connection()?;
        let (sql, params) = count_sql(filter);

        let mut stmt = conn.prepare_cached(&sql)?;
        let count: i64 = stmt.query_row(params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Looks up one catalog item, memoized for the life of the session.
    pub fn item(&mut self, item_num: &str) -> Result<Item, PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::ClosedResource);
        }
        if let Some(item) = self.items.get(item_num) {
            return Ok(item.clone());
        }
        self.refresh_item(item_num)
    }

    /// Looks up one catalog item, bypassing and replacing the memo.
    pub fn refresh_item(&mut self, item_num: &str) -> Result<Item, PipelineError> {
        let found = {
            let conn = self.connection()?;
            let mut stmt = conn.prepare_cached(ITEM_SQL)?;
            let found = stmt
                .query_row([item_num], |row| Ok(Item::try_from(row)))
                .optional()?;
            found
        };
        let item = found.ok_or_else(|| PipelineError::ItemNotFound(item_num.to_string()))??;

        self.items.insert(item_num.to_string(), item.clone());
        Ok(item)
    }

    /// Every catalog item, optionally including deleted ones.
    pub fn items(&self, include_deleted: bool) -> Result<Vec<Item>, PipelineError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(ITEMS_SQL)?;

        let mut rows = stmt.query([include_deleted])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(Item::try_from(row)?);
        }
        Ok(items)
    }

    /// Closes the connection. Closing an already closed session is a no-op.
    pub fn close(&mut self) -> Result<(), PipelineError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        self.items.clear();
        conn.flush_prepared_statement_cache();
        conn.close().map_err(|(_, e)| PipelineError::Source(e))?;

        log::info!("Closed point-of-sale store");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close point-of-sale store: {}", e);
        }
    }
}
