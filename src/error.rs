use std::sync::Arc;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::context::Context;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Invalid database id {0:?}: expected projects/<project>/instances/<instance>/databases/<database>"
    )]
    InvalidDatabaseId(String),
    #[error("Database not found: {0}")]
    NotFound(String),
    #[error("Database already exists: {0}")]
    AlreadyExists(String),
    #[error("Failed to open {database}: {source}")]
    Open {
        database: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("SQLite Error: {0}")]
    Statement(#[source] rusqlite::Error),
    #[error("Transaction aborted after {attempts} attempt(s): {source}")]
    Aborted {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
    #[error("Cannot decode column {column}: {message}")]
    Decode { column: String, message: String },
    #[error("Operation {operation} failed: {source}")]
    Admin {
        operation: String,
        #[source]
        source: Arc<Error>,
    },
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Maps a driver error raised while `ctx` was active. An interrupted
    /// statement is reported as the context's own error.
    pub(crate) fn from_sqlite(err: rusqlite::Error, ctx: &Context) -> Self {
        if sqlite_code(&err) == Some(ErrorCode::OperationInterrupted) {
            return ctx.err().unwrap_or(Self::Cancelled);
        }
        Self::Statement(err)
    }

    /// Whether a read-write transaction failing with this error may be
    /// attempted again.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        match self {
            Self::Statement(err) => matches!(
                sqlite_code(err),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

fn sqlite_code(err: &rusqlite::Error) -> Option<ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    }
}
