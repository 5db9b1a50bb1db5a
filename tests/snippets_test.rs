//! Tests for the sample operations
//! Run with: cargo test --test snippets_test

mod common;

use common::{Fixture, DATABASE};
use db_snippets::{snippets, Error};
use pretty_assertions::assert_eq;

fn output(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer).unwrap()
}

#[test_log::test]
fn test_write_and_read_using_dml() {
    let fixture = Fixture::new();
    let runner = fixture.runner();
    let mut out = Vec::new();

    snippets::write_and_read_using_dml(&runner, &mut out, DATABASE).unwrap();

    assert_eq!(
        output(out),
        "1 record(s) inserted.\nFound record name with Timothy, Campbell\n"
    );
    assert_eq!(
        fixture.singer(11),
        Some(("Timothy".to_string(), "Campbell".to_string()))
    );

    let result = snippets::write_and_read_using_dml(&runner, &mut Vec::new(), DATABASE);
    assert!(matches!(result, Err(Error::Statement(_))));
}

#[test_log::test]
fn test_query_with_date() {
    let fixture = Fixture::new();
    let mut out = Vec::new();

    snippets::query_with_date(&fixture.runner(), &mut out, DATABASE).unwrap();

    let mut lines: Vec<_> = output(out).lines().map(String::from).collect();
    lines.sort();
    assert_eq!(lines, vec!["4 Venue 4 2018-09-02", "42 Venue 42 2018-10-01"]);
}

#[test_log::test]
fn test_add_index() {
    let fixture = Fixture::new();
    let runner = fixture.runner();
    let mut out = Vec::new();

    snippets::add_index(&runner, &mut out, DATABASE).unwrap();
    assert_eq!(output(out), "Added index\n");

    let result = snippets::add_index(&runner, &mut Vec::new(), DATABASE);
    assert!(matches!(result, Err(Error::Admin { .. })));
}

#[test_log::test]
fn test_snippets_on_missing_database() {
    let fixture = Fixture::empty();
    let result = snippets::query_with_date(&fixture.runner(), &mut Vec::new(), DATABASE);
    assert!(matches!(result, Err(Error::NotFound(_))));
}
