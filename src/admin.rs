//! Admin module - database lifecycle and long-running schema operations

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusqlite::TransactionBehavior;
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::context::Context;
use crate::db::database::open_connection;
use crate::db::{Database, Statement};
use crate::ddl::validate_statements;
use crate::error::{Error, Result};
use crate::resource::DatabaseId;

static NEXT_OPERATION: AtomicU64 = AtomicU64::new(1);

/// Progress of a long-running operation
#[derive(Debug, Clone)]
pub enum OperationState {
    Pending,
    Done,
    Failed(Arc<Error>),
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::Pending)
    }
}

/// Handle to a schema change running in the background
#[derive(Debug)]
pub struct AdminOperation {
    name: String,
    state: watch::Receiver<OperationState>,
    poll_interval: Duration,
}

impl AdminOperation {
    /// `<database>/operations/<id>`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> OperationState {
        self.state.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Block until the operation finishes, or `ctx` is done.
    ///
    /// Giving up on the wait does not stop the operation.
    pub fn wait(&self, ctx: &Context) -> Result<()> {
        loop {
            ctx.check()?;
            if let Some(result) = self.outcome() {
                return result;
            }
            if self.state.has_changed().is_err() {
                return self.outcome().unwrap_or_else(|| Err(self.abandoned()));
            }
            let nap = ctx
                .remaining()
                .map_or(self.poll_interval, |left| left.min(self.poll_interval));
            thread::sleep(nap);
        }
    }

    /// Resolve once the operation finishes
    pub async fn wait_async(&self) -> Result<()> {
        let mut state = self.state.clone();
        if state.wait_for(OperationState::is_terminal).await.is_err() {
            return self.outcome().unwrap_or_else(|| Err(self.abandoned()));
        }
        self.outcome().unwrap_or_else(|| Err(self.abandoned()))
    }

    fn outcome(&self) -> Option<Result<()>> {
        match &*self.state.borrow() {
            OperationState::Pending => None,
            OperationState::Done => Some(Ok(())),
            OperationState::Failed(err) => Some(Err(Error::Admin {
                operation: self.name.clone(),
                source: err.clone(),
            })),
        }
    }

    fn abandoned(&self) -> Error {
        Error::Internal(format!("operation {} ended without a result", self.name))
    }
}

enum Job {
    Create,
    Update,
}

/// Client for administrative calls against databases under one data directory
#[derive(Debug, Clone)]
pub struct DatabaseAdmin {
    config: ClientConfig,
}

impl DatabaseAdmin {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(DatabaseAdmin { config })
    }

    /// Create an empty database, then apply `extra_statements` to it.
    ///
    /// If the extra statements fail, the database is removed again.
    pub fn create_database(
        &self,
        ctx: &Context,
        database: &str,
        extra_statements: Vec<String>,
    ) -> Result<AdminOperation> {
        ctx.check()?;
        let id: DatabaseId = database.parse()?;
        if !extra_statements.is_empty() {
            validate_statements(&extra_statements)?;
        }

        let path = id.path_in(&self.config.data_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(source) = open_connection(&path, &self.config) {
            remove_database_files(&path);
            return Err(Error::Open {
                database: id.to_string(),
                source,
            });
        }

        log::debug!("created database {id}");
        self.spawn(&id, path, extra_statements, Job::Create)
    }

    /// Submit schema statements; they are applied together or not at all
    pub fn update_database_ddl(
        &self,
        ctx: &Context,
        database: &str,
        statements: Vec<String>,
    ) -> Result<AdminOperation> {
        ctx.check()?;
        let id: DatabaseId = database.parse()?;
        validate_statements(&statements)?;

        let path = id.path_in(&self.config.data_dir);
        if !path.is_file() {
            return Err(Error::NotFound(id.to_string()));
        }

        self.spawn(&id, path, statements, Job::Update)
    }

    /// The statements that recreate the database's current schema
    pub fn get_database_ddl(&self, ctx: &Context, database: &str) -> Result<Vec<String>> {
        let db = Database::open(ctx, database, &self.config)?;
        let statement = Statement::new(
            "SELECT sql FROM sqlite_master WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%' \
             ORDER BY CASE WHEN type = 'table' THEN 1 WHEN type = 'index' THEN 2 ELSE 3 END, name",
        );
        let ddl = db.single(ctx).query(&statement, |cursor| {
            let mut ddl = Vec::new();
            while let Some(row) = cursor.next()? {
                ddl.push(row.get::<String>(0)?);
            }
            Ok(ddl)
        })?;
        db.close()?;
        Ok(ddl)
    }

    pub fn drop_database(&self, ctx: &Context, database: &str) -> Result<()> {
        ctx.check()?;
        let id: DatabaseId = database.parse()?;
        let path = id.path_in(&self.config.data_dir);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        remove_database_files(&path);
        log::debug!("dropped database {id}");
        Ok(())
    }

    fn spawn(
        &self,
        id: &DatabaseId,
        path: PathBuf,
        statements: Vec<String>,
        job: Job,
    ) -> Result<AdminOperation> {
        let name = format!(
            "{id}/operations/_auto_op_{}",
            NEXT_OPERATION.fetch_add(1, Ordering::Relaxed)
        );
        let (sender, receiver) = watch::channel(OperationState::Pending);
        let config = self.config.clone();
        let worker_name = name.clone();

        thread::Builder::new()
            .name("ddl-worker".to_string())
            .spawn(move || {
                let state = match apply_statements(&path, &statements, &config) {
                    Ok(()) => {
                        log::debug!("operation {worker_name} done");
                        OperationState::Done
                    }
                    Err(err) => {
                        log::debug!("operation {worker_name} failed: {err}");
                        if matches!(job, Job::Create) {
                            remove_database_files(&path);
                        }
                        OperationState::Failed(Arc::new(err))
                    }
                };
                sender.send_replace(state);
            })?;

        log::debug!("submitted operation {name}");
        Ok(AdminOperation {
            name,
            state: receiver,
            poll_interval: self.config.admin_poll_interval(),
        })
    }
}

fn apply_statements(path: &Path, statements: &[String], config: &ClientConfig) -> Result<()> {
    if statements.is_empty() {
        return Ok(());
    }

    let mut conn = open_connection(path, config).map_err(Error::Statement)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(Error::Statement)?;
    for statement in statements {
        log::trace!("ddl: {statement}");
        tx.execute_batch(statement).map_err(Error::Statement)?;
    }
    tx.commit().map_err(Error::Statement)?;
    conn.close().map_err(|(_, e)| Error::Statement(e))
}

fn remove_database_files(path: &Path) {
    for suffix in ["", "-wal", "-shm", "-journal"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        if let Err(e) = fs::remove_file(&file) {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("failed to remove {}: {e}", Path::new(&file).display());
            }
        }
    }
}
