//! Database module - the handle to one named database

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags, TransactionBehavior};

use super::cursor::{run_query, CursorTracker, RowCursor};
use super::statement::Statement;
use super::transaction::Transaction;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::resource::DatabaseId;

/// Virtual machine steps between cancellation checks
const PROGRESS_STEPS: i32 = 1_000;

/// Longest single busy wait before `ctx` is checked again
const LOCK_WAIT_SLICE: Duration = Duration::from_millis(20);

/// Exclusive handle to one database.
///
/// Each operation opens its own handle; the handle cannot be cloned or
/// shared between threads. Dropping it closes the connection.
pub struct Database {
    id: DatabaseId,
    conn: Connection,
    tracker: CursorTracker,
    config: ClientConfig,
}

impl Database {
    /// Open a handle to an existing database
    pub fn open(ctx: &Context, database: &str, config: &ClientConfig) -> Result<Self> {
        ctx.check()?;
        config.validate()?;
        let id: DatabaseId = database.parse()?;
        let path = id.path_in(&config.data_dir);
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }

        let conn = open_connection(&path, config).map_err(|source| Error::Open {
            database: id.to_string(),
            source,
        })?;

        log::debug!("opened database {id}");
        Ok(Database {
            id,
            conn,
            tracker: CursorTracker::default(),
            config: config.clone(),
        })
    }

    pub fn id(&self) -> &DatabaseId {
        &self.id
    }

    /// Number of cursors currently open on this handle
    pub fn open_cursors(&self) -> usize {
        self.tracker.open_count()
    }

    /// A single-use read that runs outside any read-write transaction
    pub fn single<'a>(&'a self, ctx: &'a Context) -> SingleUse<'a> {
        SingleUse { db: self, ctx }
    }

    /// Run `body` inside a read-write transaction and commit it.
    ///
    /// Any error from `body` rolls the transaction back and is returned as is.
    /// Lock contention re-runs `body` in a fresh transaction, up to the
    /// configured number of attempts. Waiting for the write lock ends as soon
    /// as `ctx` is done.
    pub fn read_write_transaction<T, F>(&mut self, ctx: &Context, mut body: F) -> Result<T>
    where
        F: FnMut(&Transaction<'_>) -> Result<T>,
    {
        arm(&self.conn, ctx, &self.config);
        let result = self.run_with_retry(ctx, &mut body);
        disarm(&self.conn, &self.config);
        result
    }

    fn run_with_retry<T, F>(&mut self, ctx: &Context, body: &mut F) -> Result<T>
    where
        F: FnMut(&Transaction<'_>) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            ctx.check()?;
            match self.attempt(ctx, body) {
                Err(err) if err.is_contention() => {
                    ctx.check()?;
                    if attempt >= self.config.max_commit_attempts {
                        return Err(Error::Aborted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let backoff = self.config.retry_backoff(attempt);
                    log::warn!(
                        "transaction attempt {attempt} on {} hit contention ({err}); retrying in {backoff:?}",
                        self.id
                    );
                    sleep_within(ctx, backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn attempt<T, F>(&mut self, ctx: &Context, body: &mut F) -> Result<T>
    where
        F: FnMut(&Transaction<'_>) -> Result<T>,
    {
        let budget = self.config.busy_timeout();
        let started = Instant::now();
        let inner = loop {
            let slice = lock_wait(ctx, budget.saturating_sub(started.elapsed()));
            self.conn.busy_timeout(slice).map_err(Error::Statement)?;
            match self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
            {
                Ok(inner) => break inner,
                Err(e) => {
                    let err = Error::from_sqlite(e, ctx);
                    if err.is_contention() && started.elapsed() < budget {
                        ctx.check()?;
                        continue;
                    }
                    return Err(err);
                }
            }
        };
        inner
            .busy_timeout(deadline_wait(ctx, &self.config))
            .map_err(Error::Statement)?;
        let txn = Transaction::new(inner, ctx, &self.tracker);

        match body(&txn) {
            Ok(value) => {
                txn.commit()?;
                log::debug!("committed transaction on {}", self.id);
                Ok(value)
            }
            Err(err) => {
                txn.rollback();
                log::debug!("rolled back transaction on {}: {err}", self.id);
                Err(err)
            }
        }
    }

    /// Close the handle, reporting any failure to release it
    pub fn close(self) -> Result<()> {
        let id = self.id;
        self.conn.close().map_err(|(_, e)| Error::Statement(e))?;
        log::debug!("closed database {id}");
        Ok(())
    }
}

/// Reads that run as their own implicit transaction
pub struct SingleUse<'a> {
    db: &'a Database,
    ctx: &'a Context,
}

impl SingleUse<'_> {
    /// Run a query and hand its cursor to `f`
    pub fn query<T, F>(&self, statement: &Statement, f: F) -> Result<T>
    where
        F: FnOnce(&mut RowCursor<'_>) -> Result<T>,
    {
        arm(&self.db.conn, self.ctx, &self.db.config);
        let result = run_query(&self.db.conn, self.ctx, &self.db.tracker, statement, f);
        disarm(&self.db.conn, &self.db.config);
        result
    }
}

/// Open an existing database file with the client's connection settings
pub(crate) fn open_connection(path: &Path, config: &ClientConfig) -> rusqlite::Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    configure(&conn, config)?;
    Ok(conn)
}

fn configure(conn: &Connection, config: &ClientConfig) -> rusqlite::Result<()> {
    // Enable extended result codes for better error handling
    conn.execute_batch("PRAGMA extended_result_codes = ON")?;
    let mode: String = conn.query_row(
        &format!("PRAGMA journal_mode = {}", config.journal_mode.as_str()),
        [],
        |row| row.get(0),
    )?;
    log::trace!("journal_mode = {mode}");
    conn.execute_batch(&format!(
        "PRAGMA synchronous = {};
         PRAGMA cache_size = -64000;
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;",
        config.synchronous.as_str(),
    ))?;
    conn.busy_timeout(config.busy_timeout())
}

/// Interrupt running statements once `ctx` is done, and never wait on a
/// lock past its deadline
fn arm(conn: &Connection, ctx: &Context, config: &ClientConfig) {
    if let Err(e) = conn.busy_timeout(deadline_wait(ctx, config)) {
        log::warn!("failed to set busy timeout: {e}");
    }
    let ctx = AssertUnwindSafe(ctx.clone());
    conn.progress_handler(PROGRESS_STEPS, Some(move || ctx.is_done()));
}

fn disarm(conn: &Connection, config: &ClientConfig) {
    conn.progress_handler(0, None::<fn() -> bool>);
    if let Err(e) = conn.busy_timeout(config.busy_timeout()) {
        log::warn!("failed to restore busy timeout: {e}");
    }
}

/// The configured busy timeout, cut short at the deadline
fn deadline_wait(ctx: &Context, config: &ClientConfig) -> Duration {
    ctx.remaining()
        .map_or(config.busy_timeout(), |left| left.min(config.busy_timeout()))
}

/// One busy wait for the write lock: at most `left`, cut to a short slice
/// so `ctx` is checked between waits
fn lock_wait(ctx: &Context, left: Duration) -> Duration {
    let slice = left.min(LOCK_WAIT_SLICE);
    ctx.remaining().map_or(slice, |remaining| remaining.min(slice))
}

/// Sleep for `duration`, waking early at the deadline and between slices
/// to notice cancellation
fn sleep_within(ctx: &Context, duration: Duration) {
    let until = Instant::now() + duration;
    while !ctx.is_done() {
        let left = until.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        let nap = ctx.remaining().map_or(left, |remaining| remaining.min(left));
        thread::sleep(nap.min(LOCK_WAIT_SLICE));
    }
}
