//! Runner - one unit of work against one database, reported to a writer

use std::io::Write;

use crate::admin::DatabaseAdmin;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::db::{Database, Row, Statement};
use crate::ddl::validate_statements;
use crate::error::Result;
use crate::models::{Outcome, UnitOfWork};

/// Executes units of work, each on its own freshly opened handle.
///
/// The runner never retries. Contention retries happen inside the read-write
/// transaction and surface as `Error::Aborted` once exhausted.
#[derive(Debug, Clone)]
pub struct Runner {
    config: ClientConfig,
}

impl Runner {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Runner { config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn run<W: Write>(
        &self,
        ctx: &Context,
        database: &str,
        work: &UnitOfWork,
        out: &mut W,
    ) -> Result<Outcome> {
        match work {
            UnitOfWork::WriteThenRead { insert, followup } => {
                self.write_then_read(ctx, database, insert, followup, out)
            }
            UnitOfWork::ParameterizedRead { query } => {
                self.parameterized_read(ctx, database, query, out)
            }
            UnitOfWork::SchemaChange { statements } => {
                self.schema_change(ctx, database, statements, out)
            }
        }
    }

    /// Status lines are written only after the transaction has committed.
    fn write_then_read<W: Write>(
        &self,
        ctx: &Context,
        database: &str,
        insert: &Statement,
        followup: &Statement,
        out: &mut W,
    ) -> Result<Outcome> {
        let mut db = Database::open(ctx, database, &self.config)?;
        let (inserted, rows) = db.read_write_transaction(ctx, |txn| {
            let inserted = txn.update(insert)?;
            let rows = txn.query(followup, |cursor| cursor.collect_rows())?;
            Ok((inserted, rows))
        })?;
        // The write is durable once committed
        if let Err(e) = db.close() {
            log::warn!("failed to close {database} after commit: {e}");
        }

        writeln!(out, "{inserted} record(s) inserted.")?;
        for row in &rows {
            writeln!(out, "Found record name with {}", row.display_values().join(", "))?;
        }
        Ok(Outcome::WriteThenRead { inserted, rows })
    }

    fn parameterized_read<W: Write>(
        &self,
        ctx: &Context,
        database: &str,
        query: &Statement,
        out: &mut W,
    ) -> Result<Outcome> {
        let db = Database::open(ctx, database, &self.config)?;
        let rows = db.single(ctx).query(query, |cursor| {
            let mut rows: Vec<Row> = Vec::new();
            while let Some(row) = cursor.next()? {
                writeln!(out, "{}", row.display_values().join(" "))?;
                rows.push(row);
            }
            Ok(rows)
        })?;
        db.close()?;

        Ok(Outcome::Rows { rows })
    }

    fn schema_change<W: Write>(
        &self,
        ctx: &Context,
        database: &str,
        statements: &[String],
        out: &mut W,
    ) -> Result<Outcome> {
        let kinds = validate_statements(statements)?;
        let admin = DatabaseAdmin::new(self.config.clone())?;
        let operation = admin.update_database_ddl(ctx, database, statements.to_vec())?;
        operation.wait(ctx)?;

        for kind in &kinds {
            writeln!(out, "{}", kind.describe())?;
        }
        Ok(Outcome::SchemaChange {
            operation: operation.name().to_string(),
            statements: statements.len(),
        })
    }
}
