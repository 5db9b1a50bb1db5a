//! Shared fixture: a sample database under a temporary data directory

#![allow(dead_code)]

use db_snippets::{ClientConfig, Context, Database, DatabaseAdmin, Runner, Statement};
use tempfile::TempDir;

pub const DATABASE: &str = "projects/test-project/instances/test-instance/databases/example-db";

pub fn sample_schema() -> Vec<String> {
    vec![
        "CREATE TABLE Singers (SingerId INTEGER NOT NULL PRIMARY KEY, FirstName TEXT, LastName TEXT)"
            .to_string(),
        "CREATE TABLE Albums (SingerId INTEGER NOT NULL, AlbumId INTEGER NOT NULL, AlbumTitle TEXT, PRIMARY KEY (SingerId, AlbumId))"
            .to_string(),
        "CREATE TABLE Venues (VenueId INTEGER NOT NULL PRIMARY KEY, VenueName TEXT, LastContactDate DATE)"
            .to_string(),
    ]
}

pub struct Fixture {
    // Held so the directory outlives the test
    pub dir: TempDir,
    pub config: ClientConfig,
}

impl Fixture {
    /// An empty data directory with no databases
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            data_dir: dir.path().to_path_buf(),
            ..ClientConfig::default()
        };
        Fixture { dir, config }
    }

    /// The sample schema, with venues and albums loaded
    pub fn new() -> Self {
        let fixture = Self::empty();
        let ctx = Context::background();
        fixture
            .admin()
            .create_database(&ctx, DATABASE, sample_schema())
            .unwrap()
            .wait(&ctx)
            .unwrap();
        fixture.seed();
        fixture
    }

    pub fn admin(&self) -> DatabaseAdmin {
        DatabaseAdmin::new(self.config.clone()).unwrap()
    }

    pub fn runner(&self) -> Runner {
        Runner::new(self.config.clone()).unwrap()
    }

    pub fn open(&self) -> Database {
        Database::open(&Context::background(), DATABASE, &self.config).unwrap()
    }

    fn seed(&self) {
        let mut db = self.open();
        db.read_write_transaction(&Context::background(), |txn| {
            txn.batch_update(&[
                Statement::new(
                    "INSERT INTO Venues (VenueId, VenueName, LastContactDate) VALUES \
                     (4, 'Venue 4', '2018-09-02'), \
                     (19, 'Venue 19', '2019-01-15'), \
                     (42, 'Venue 42', '2018-10-01')",
                ),
                Statement::new(
                    "INSERT INTO Albums (SingerId, AlbumId, AlbumTitle) VALUES \
                     (1, 1, 'Total Junk'), (1, 2, 'Go, Go, Go'), (2, 1, 'Green')",
                ),
            ])
        })
        .unwrap();
        db.close().unwrap();
    }

    /// First and last name of a singer, read on a fresh handle
    pub fn singer(&self, id: i64) -> Option<(String, String)> {
        let db = self.open();
        let ctx = Context::background();
        let found = db
            .single(&ctx)
            .query(
                &Statement::new("SELECT FirstName, LastName FROM Singers WHERE SingerId = @id")
                    .with_param("id", id),
                |cursor| match cursor.next()? {
                    Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
                    None => Ok(None),
                },
            )
            .unwrap();
        db.close().unwrap();
        found
    }
}
