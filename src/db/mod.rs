//! Database module - the client side of a managed SQLite database

mod cursor;
pub(crate) mod database;
mod params;
mod row;
mod statement;
mod transaction;

pub use cursor::RowCursor;
pub use database::{Database, SingleUse};
pub use params::{Params, Value, DATE_FORMAT};
pub use row::{FromColumn, Row};
pub use statement::Statement;
pub use transaction::Transaction;
