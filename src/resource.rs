//! Fully qualified database resource names

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;

/// `projects/<project>/instances/<instance>/databases/<database>`
static DATABASE_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^projects/([a-z][a-z0-9_-]*)/instances/([a-z][a-z0-9_-]*)/databases/([a-z][a-z0-9_-]*)$",
    )
    .expect("database id pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseId {
    project: String,
    instance: String,
    database: String,
}

impl DatabaseId {
    pub fn new(project: &str, instance: &str, database: &str) -> Result<Self, Error> {
        format!("projects/{project}/instances/{instance}/databases/{database}").parse()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Location of this database's file under `data_dir`
    pub fn path_in(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.project)
            .join(&self.instance)
            .join(format!("{}.db", self.database))
    }
}

impl FromStr for DatabaseId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = DATABASE_ID_REGEX
            .captures(s)
            .ok_or_else(|| Error::InvalidDatabaseId(s.to_string()))?;
        Ok(Self {
            project: captures[1].to_string(),
            instance: captures[2].to_string(),
            database: captures[3].to_string(),
        })
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn parses_fully_qualified_name() {
        let id: DatabaseId = "projects/my-project/instances/test-instance/databases/example-db"
            .parse()
            .unwrap();
        assert_eq!(id.project(), "my-project");
        assert_eq!(id.instance(), "test-instance");
        assert_eq!(id.database(), "example-db");
        assert_eq!(
            id.to_string(),
            "projects/my-project/instances/test-instance/databases/example-db"
        );
    }

    #[test_log::test]
    fn rejects_malformed_names() {
        for bad in [
            "",
            "example-db",
            "projects/p/instances/i",
            "projects/p/instances/i/databases/",
            "projects/p/instances/i/databases/d/extra",
            "projects/../instances/i/databases/d",
            "projects/P/instances/i/databases/d",
        ] {
            assert!(
                matches!(bad.parse::<DatabaseId>(), Err(Error::InvalidDatabaseId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test_log::test]
    fn maps_to_nested_file() {
        let id = DatabaseId::new("p", "i", "d").unwrap();
        assert_eq!(
            id.path_in(Path::new("/data")),
            PathBuf::from("/data/p/i/d.db")
        );
    }
}
