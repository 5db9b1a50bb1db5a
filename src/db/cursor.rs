//! Cursor module - forward-only iteration over query results

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rusqlite::Connection;

use super::row::Row;
use super::statement::Statement;
use crate::context::Context;
use crate::error::{Error, Result};

/// Counts the cursors a handle has open
#[derive(Debug, Clone, Default)]
pub(crate) struct CursorTracker(Arc<AtomicUsize>);

impl CursorTracker {
    pub(crate) fn open_count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> CursorGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        CursorGuard(self.0.clone())
    }
}

struct CursorGuard(Arc<AtomicUsize>);

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Lazy, forward-only cursor over the rows of one query.
///
/// `next` returns `Ok(None)` once the rows are exhausted. After exhaustion,
/// an error, or `stop`, the underlying statement is reset and every further
/// `next` returns `Ok(None)`.
pub struct RowCursor<'stmt> {
    rows: Option<rusqlite::Rows<'stmt>>,
    guard: Option<CursorGuard>,
    columns: Arc<[String]>,
    ctx: Context,
}

impl<'stmt> RowCursor<'stmt> {
    fn new(
        rows: rusqlite::Rows<'stmt>,
        columns: Arc<[String]>,
        ctx: &Context,
        tracker: &CursorTracker,
    ) -> Self {
        RowCursor {
            rows: Some(rows),
            guard: Some(tracker.acquire()),
            columns,
            ctx: ctx.clone(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Fetch the next row
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };

        let step = match rows.next() {
            Ok(Some(row)) => Row::from_sqlite(row, &self.columns).map(Some),
            Ok(None) => Ok(None),
            Err(err) => Err(Error::from_sqlite(err, &self.ctx)),
        };

        if !matches!(step, Ok(Some(_))) {
            self.stop();
        }
        step
    }

    /// Drain the remaining rows
    pub fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Release the cursor. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(rows) = self.rows.take() {
            drop(rows);
            log::trace!("cursor released");
        }
        self.guard.take();
    }

    pub fn is_stopped(&self) -> bool {
        self.rows.is_none()
    }
}

impl Drop for RowCursor<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `statement` on `conn` and hand its cursor to `f`.
///
/// The cursor is released before this returns, whether `f` drained it,
/// returned early, or failed.
pub(crate) fn run_query<T, F>(
    conn: &Connection,
    ctx: &Context,
    tracker: &CursorTracker,
    statement: &Statement,
    f: F,
) -> Result<T>
where
    F: FnOnce(&mut RowCursor<'_>) -> Result<T>,
{
    ctx.check()?;
    log::trace!("query: {}", statement.sql());

    let mut prepared = conn
        .prepare(statement.sql())
        .map_err(|e| Error::from_sqlite(e, ctx))?;
    statement.bind(&mut prepared)?;

    let columns: Arc<[String]> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut cursor = RowCursor::new(prepared.raw_query(), columns, ctx, tracker);
    let result = f(&mut cursor);
    cursor.stop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, v INTEGER);
             INSERT INTO t VALUES (1, 5), (2, -9223372036854775807 - 1), (3, 7);",
        )
        .unwrap();
        conn
    }

    #[test_log::test]
    fn exhaustion_releases_cursor() {
        let conn = sample();
        let tracker = CursorTracker::default();
        let ids = run_query(
            &conn,
            &Context::background(),
            &tracker,
            &Statement::new("SELECT id FROM t ORDER BY id"),
            |cursor| {
                assert_eq!(tracker.open_count(), 1);
                let mut ids = Vec::new();
                while let Some(row) = cursor.next()? {
                    ids.push(row.get::<i64>(0)?);
                }
                assert!(cursor.is_stopped());
                assert_eq!(tracker.open_count(), 0);
                assert!(cursor.next()?.is_none());
                Ok(ids)
            },
        )
        .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test_log::test]
    fn step_error_stops_cursor_and_propagates() {
        let conn = sample();
        let tracker = CursorTracker::default();
        let mut seen = Vec::new();
        let result = run_query(
            &conn,
            &Context::background(),
            &tracker,
            &Statement::new("SELECT abs(v) FROM t ORDER BY id"),
            |cursor| {
                while let Some(row) = cursor.next()? {
                    seen.push(row.get::<i64>(0)?);
                }
                Ok(())
            },
        );

        assert!(matches!(result, Err(Error::Statement(_))));
        assert_eq!(seen, vec![5]);
        assert_eq!(tracker.open_count(), 0);
    }

    #[test_log::test]
    fn early_return_releases_cursor() {
        let conn = sample();
        let tracker = CursorTracker::default();
        let result: Result<()> = run_query(
            &conn,
            &Context::background(),
            &tracker,
            &Statement::new("SELECT id FROM t"),
            |cursor| {
                cursor.next()?;
                Err(Error::InvalidArgument("stop here".to_string()))
            },
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(tracker.open_count(), 0);
    }

    #[test_log::test]
    fn cancelled_context_runs_nothing() {
        let conn = sample();
        let tracker = CursorTracker::default();
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();
        let result: Result<()> =
            run_query(&conn, &ctx, &tracker, &Statement::new("SELECT 1"), |_| {
                panic!("callback must not run")
            });
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
