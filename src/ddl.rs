//! Schema statement classification and validation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Leading keywords of a schema statement, e.g. `CREATE UNIQUE INDEX`
static DDL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(CREATE|ALTER|DROP)\s+(?:(?:UNIQUE|TEMP|TEMPORARY|VIRTUAL)\s+)?(TABLE|INDEX|VIEW|TRIGGER)\b",
    )
    .expect("ddl pattern is valid")
});

/// What a schema statement does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdlKind {
    CreateTable,
    CreateIndex,
    AlterTable,
    DropTable,
    DropIndex,
    /// Views and triggers
    Other,
}

impl DdlKind {
    /// Classify a statement, `None` if it is not a schema statement
    pub fn of(statement: &str) -> Option<DdlKind> {
        let captures = DDL_REGEX.captures(statement)?;
        let verb = captures[1].to_uppercase();
        let object = captures[2].to_uppercase();
        Some(match (verb.as_str(), object.as_str()) {
            ("CREATE", "TABLE") => DdlKind::CreateTable,
            ("CREATE", "INDEX") => DdlKind::CreateIndex,
            ("ALTER", "TABLE") => DdlKind::AlterTable,
            ("DROP", "TABLE") => DdlKind::DropTable,
            ("DROP", "INDEX") => DdlKind::DropIndex,
            _ => DdlKind::Other,
        })
    }

    /// Status line reported once a statement of this kind is applied
    pub fn describe(&self) -> &'static str {
        match self {
            DdlKind::CreateTable => "Created table",
            DdlKind::CreateIndex => "Added index",
            DdlKind::AlterTable => "Altered table",
            DdlKind::DropTable => "Dropped table",
            DdlKind::DropIndex => "Dropped index",
            DdlKind::Other => "Applied schema change",
        }
    }
}

/// Check a batch of schema statements before it is submitted
pub fn validate_statements(statements: &[String]) -> Result<Vec<DdlKind>> {
    if statements.is_empty() {
        return Err(Error::InvalidArgument(
            "at least one DDL statement is required".to_string(),
        ));
    }

    statements
        .iter()
        .map(|statement| {
            if statement.trim().is_empty() {
                return Err(Error::InvalidArgument("empty DDL statement".to_string()));
            }
            if has_separator(statement) {
                return Err(Error::InvalidArgument(format!(
                    "DDL statements must be submitted one per entry: {statement}"
                )));
            }
            DdlKind::of(statement).ok_or_else(|| {
                Error::InvalidArgument(format!("not a schema statement: {statement}"))
            })
        })
        .collect()
}

/// Whether `statement` has a `;` outside quotes, identifiers and comments
fn has_separator(statement: &str) -> bool {
    let mut chars = statement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ';' => return true,
            '\'' | '"' | '`' => {
                // A doubled quote inside the literal closes and reopens it
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = ' ';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn classifies_common_statements() {
        assert_eq!(
            DdlKind::of("CREATE INDEX AlbumsByAlbumTitle ON Albums(AlbumTitle)"),
            Some(DdlKind::CreateIndex)
        );
        assert_eq!(
            DdlKind::of("create unique index i on t(a)"),
            Some(DdlKind::CreateIndex)
        );
        assert_eq!(
            DdlKind::of("  CREATE TABLE Venues (VenueId INTEGER)"),
            Some(DdlKind::CreateTable)
        );
        assert_eq!(
            DdlKind::of("ALTER TABLE Albums ADD COLUMN MarketingBudget INTEGER"),
            Some(DdlKind::AlterTable)
        );
        assert_eq!(DdlKind::of("DROP INDEX i"), Some(DdlKind::DropIndex));
        assert_eq!(DdlKind::of("DROP TABLE t"), Some(DdlKind::DropTable));
        assert_eq!(
            DdlKind::of("CREATE VIEW v AS SELECT 1"),
            Some(DdlKind::Other)
        );
    }

    #[test_log::test]
    fn rejects_non_schema_statements() {
        assert_eq!(DdlKind::of("INSERT INTO t VALUES (1)"), None);
        assert_eq!(DdlKind::of("SELECT 1"), None);
        assert_eq!(DdlKind::of("CREATE TABLEX t (a)"), None);
    }

    #[test_log::test]
    fn validates_batches() {
        assert!(matches!(
            validate_statements(&[]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_statements(&["   ".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_statements(&["CREATE INDEX i ON t(a); DROP TABLE t".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_statements(&["CREATE TABLE t (a INTEGER);".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_statements(&[
                "CREATE TABLE t (a INTEGER)".to_string(),
                "DELETE FROM t".to_string(),
            ]),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            validate_statements(&[
                "CREATE TABLE t (a INTEGER)".to_string(),
                "CREATE INDEX i ON t(a)".to_string(),
            ])
            .unwrap(),
            vec![DdlKind::CreateTable, DdlKind::CreateIndex]
        );
    }

    #[test_log::test]
    fn semicolons_inside_literals_are_not_separators() {
        assert_eq!(
            validate_statements(&[
                "CREATE TABLE Notes (Id INTEGER, Sep TEXT DEFAULT ';')".to_string(),
                "CREATE TABLE \"a;b\" (Id INTEGER) -- trailing; comment".to_string(),
                "CREATE TABLE Quotes (Id INTEGER, Q TEXT DEFAULT 'it''s; fine')".to_string(),
            ])
            .unwrap(),
            vec![DdlKind::CreateTable; 3]
        );
        assert!(matches!(
            validate_statements(&["CREATE TABLE t (a TEXT DEFAULT ';'); DROP TABLE u".to_string()]),
            Err(Error::InvalidArgument(_))
        ));
    }
}
