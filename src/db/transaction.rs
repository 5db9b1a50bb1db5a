//! Transaction module - the context handed to a read-write unit of work

use super::cursor::{run_query, CursorTracker, RowCursor};
use super::statement::Statement;
use crate::context::Context;
use crate::error::{Error, Result};

/// An open read-write transaction.
///
/// Only reachable by reference from inside
/// [`Database::read_write_transaction`](super::Database::read_write_transaction),
/// so it cannot outlive the unit of work. Reads observe the transaction's own
/// uncommitted writes.
pub struct Transaction<'conn> {
    inner: rusqlite::Transaction<'conn>,
    ctx: Context,
    tracker: CursorTracker,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn new(
        inner: rusqlite::Transaction<'conn>,
        ctx: &Context,
        tracker: &CursorTracker,
    ) -> Self {
        Transaction {
            inner,
            ctx: ctx.clone(),
            tracker: tracker.clone(),
        }
    }

    /// Execute a DML statement and return the number of rows it changed
    pub fn update(&self, statement: &Statement) -> Result<u64> {
        self.ctx.check()?;
        log::trace!("update: {}", statement.sql());

        let mut prepared = self
            .inner
            .prepare(statement.sql())
            .map_err(|e| Error::from_sqlite(e, &self.ctx))?;
        statement.bind(&mut prepared)?;
        let changes = prepared
            .raw_execute()
            .map_err(|e| Error::from_sqlite(e, &self.ctx))?;

        Ok(changes as u64)
    }

    /// Execute DML statements in order, stopping at the first failure
    pub fn batch_update(&self, statements: &[Statement]) -> Result<Vec<u64>> {
        statements
            .iter()
            .map(|statement| self.update(statement))
            .collect()
    }

    /// Run a query inside the transaction and hand its cursor to `f`
    pub fn query<T, F>(&self, statement: &Statement, f: F) -> Result<T>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<T>,
    {
        run_query(&self.inner, &self.ctx, &self.tracker, statement, f)
    }

    pub(crate) fn commit(self) -> Result<()> {
        self.ctx.check()?;
        self.inner
            .commit()
            .map_err(|e| Error::from_sqlite(e, &self.ctx))
    }

    pub(crate) fn rollback(self) {
        if let Err(e) = self.inner.rollback() {
            log::warn!("rollback failed: {e}");
        }
    }
}
