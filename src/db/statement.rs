//! Statement module - SQL text paired with its named parameters

use std::collections::BTreeSet;

use super::params::{bare_name, Params, Value};
use crate::error::{Error, Result};

/// An immutable SQL statement with named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    /// Returns a copy of this statement with `name` bound to `value`.
    ///
    /// `name` may be given with or without its `@` prefix.
    #[must_use]
    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(bare_name(name).to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        for (name, value) in params {
            self.params.insert(bare_name(&name).to_string(), value);
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Bind every parameter of `prepared` from this statement's values.
    ///
    /// Each SQL parameter needs a value and each value needs a parameter.
    pub(crate) fn bind(&self, prepared: &mut rusqlite::Statement<'_>) -> Result<()> {
        let mut used = BTreeSet::new();

        for index in 1..=prepared.parameter_count() {
            let Some(sql_name) = prepared.parameter_name(index).map(str::to_string) else {
                return Err(Error::InvalidArgument(format!(
                    "positional parameter {index} is not supported; use @name"
                )));
            };
            let name = bare_name(&sql_name);
            let value = self.params.get(name).ok_or_else(|| {
                Error::InvalidArgument(format!("no value supplied for parameter {sql_name}"))
            })?;
            prepared
                .raw_bind_parameter(index, value)
                .map_err(Error::Statement)?;
            used.insert(name.to_string());
        }

        if let Some(unused) = self.params.keys().find(|name| !used.contains(*name)) {
            return Err(Error::InvalidArgument(format!(
                "statement has no parameter named @{unused}"
            )));
        }

        Ok(())
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Statement::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Statement::new(sql)
    }
}
