//! The three sample operations: DML write-then-read, a date-parameter query,
//! and adding an index.
//!
//! Each expects the sample schema:
//!
//! ```sql
//! CREATE TABLE Singers (SingerId INTEGER NOT NULL PRIMARY KEY, FirstName TEXT, LastName TEXT)
//! CREATE TABLE Albums (SingerId INTEGER NOT NULL, AlbumId INTEGER NOT NULL, AlbumTitle TEXT,
//!                      PRIMARY KEY (SingerId, AlbumId))
//! CREATE TABLE Venues (VenueId INTEGER NOT NULL PRIMARY KEY, VenueName TEXT, LastContactDate DATE)
//! ```

use std::io::Write;

use chrono::NaiveDate;

use crate::context::Context;
use crate::db::Statement;
use crate::error::{Error, Result};
use crate::models::UnitOfWork;
use crate::runner::Runner;

/// Insert singer 11 and read it back before the transaction commits
pub fn write_and_read_using_dml<W: Write>(runner: &Runner, out: &mut W, database: &str) -> Result<()> {
    let work = UnitOfWork::WriteThenRead {
        insert: Statement::new(
            "INSERT INTO Singers (SingerId, FirstName, LastName) VALUES (11, 'Timothy', 'Campbell')",
        ),
        followup: Statement::new("SELECT FirstName, LastName FROM Singers WHERE SingerId = 11"),
    };
    runner.run(&Context::background(), database, &work, out)?;
    Ok(())
}

/// List venues last contacted before 2019-01-01
pub fn query_with_date<W: Write>(runner: &Runner, out: &mut W, database: &str) -> Result<()> {
    let example_date = NaiveDate::from_ymd_opt(2019, 1, 1)
        .ok_or_else(|| Error::Internal("invalid example date".to_string()))?;
    let work = UnitOfWork::ParameterizedRead {
        query: Statement::new(
            "SELECT VenueId, VenueName, LastContactDate FROM Venues \
             WHERE LastContactDate < @lastContactDate",
        )
        .with_param("lastContactDate", example_date),
    };
    runner.run(&Context::background(), database, &work, out)?;
    Ok(())
}

/// Index albums by title
pub fn add_index<W: Write>(runner: &Runner, out: &mut W, database: &str) -> Result<()> {
    let work = UnitOfWork::SchemaChange {
        statements: vec!["CREATE INDEX AlbumsByAlbumTitle ON Albums(AlbumTitle)".to_string()],
    };
    runner.run(&Context::background(), database, &work, out)?;
    Ok(())
}
