// CLI integration tests for the decode and fields subcommands.
use std::path::Path;
use std::process::Command;

use serde_json::{json, Value};

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_dtojson");
    Command::new(exe)
}

const SCHEMA: &str = r#"{
    "enums": { "Size": ["SMALL", "LARGE"] },
    "objects": {
        "Animal": { "fields": { "name": "str" } },
        "Dog":    { "extends": ["Animal"], "fields": { "size": "Size" } },
        "Home":   { "fields": { "kind": "str", "pet": "Animal", "skip": "none" } }
    },
    "switches": [
        { "by": "sibling_field", "owner": "Home", "field": "pet", "discriminator": "kind",
          "cases": { "dog": "Dog" } }
    ]
}"#;

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path.to_str().expect("utf8 path").to_string()
}

fn parse_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

#[test]
fn decode_ndjson_through_schema() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write(temp.path(), "schema.json", SCHEMA);
    let input = write(
        temp.path(),
        "homes.ndjson",
        concat!(
            r#"{"kind": "dog", "pet": {"name": "Rex", "size": "LARGE", "extra": 1}, "skip": 5}"#,
            "\n",
            r#"{"kind": "cat", "pet": {"name": "Tom"}}"#,
            "\n",
        ),
    );

    let output = cmd()
        .args(["decode", "--schema", &schema, "--root", "Home", "--ndjson", "-i", &input])
        .output()
        .expect("decode");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let lines = parse_lines(&output.stdout);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], json!({"kind": "dog", "pet": {"size": "LARGE", "name": "Rex"}, "skip": null}));
    assert_eq!(lines[1], json!({"kind": "cat", "pet": null, "skip": null}));
}

#[test]
fn decode_with_json_pointer() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write(temp.path(), "schema.json", SCHEMA);
    let input = write(temp.path(), "wrapped.json", r#"{"data": {"pet": {"name": "Rex"}, "kind": "dog"}}"#);

    let output = cmd()
        .args(["decode", "--schema", &schema, "--root", "Home", "--json-pointer", "/data", "-i", &input])
        .output()
        .expect("decode");
    assert!(output.status.success());
    let lines = parse_lines(&output.stdout);
    assert_eq!(lines[0]["pet"], json!({"size": null, "name": "Rex"}));
}

#[test]
fn unknown_enum_member_fails_the_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write(temp.path(), "schema.json", SCHEMA);
    let input = write(temp.path(), "bad.json", r#"{"kind": "dog", "pet": {"size": "HUGE"}}"#);

    let output = cmd()
        .args(["decode", "--schema", &schema, "--root", "Home", "-i", &input])
        .output()
        .expect("decode");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("HUGE"));
}

#[test]
fn fields_lists_merged_table() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write(temp.path(), "schema.json", SCHEMA);

    let output = cmd()
        .args(["fields", "--schema", &schema, "--type", "Dog"])
        .output()
        .expect("fields");
    assert!(output.status.success());
    let table: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(table, json!({"size": "Size", "name": "str"}));
}

#[test]
fn glob_that_matches_nothing_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let schema = write(temp.path(), "schema.json", SCHEMA);
    let pattern = temp.path().join("*.missing");

    let output = cmd()
        .args(["decode", "--schema", &schema, "--root", "Home", "-i", pattern.to_str().unwrap()])
        .output()
        .expect("decode");
    assert!(!output.status.success());
}
