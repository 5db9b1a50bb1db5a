pub mod admin;
pub mod config;
pub mod context;
pub mod db;
pub mod ddl;
mod error;
mod models;
pub mod resource;
pub mod runner;
pub mod snippets;

pub use admin::{AdminOperation, DatabaseAdmin, OperationState};
pub use config::{ClientConfig, JournalMode, Synchronous};
pub use context::{CancelHandle, Context};
pub use db::{Database, FromColumn, Params, Row, RowCursor, SingleUse, Statement, Transaction, Value};
pub use error::{Error, Result};
pub use models::{Outcome, UnitOfWork};
pub use resource::DatabaseId;
pub use runner::Runner;

pub fn sqlite_version() -> &'static str {
    rusqlite::version()
}
