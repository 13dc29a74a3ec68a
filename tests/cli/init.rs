//! Tests for `keyrack init`.

use crate::support::*;
use std::fs;

#[test]
fn test_init_creates_host_manifest() {
    let t = Test::new();

    let output = t.run(&["init", "--label", "alice"]);
    assert_success(&output);
    assert_stderr_contains(&output, "initialized");
    assert_stderr_contains(&output, "keyrack set");

    let contents = fs::read_to_string(t.host_manifest()).unwrap();
    assert!(contents.contains("alice"));
    assert!(contents.contains("ssh-ed25519"));
}

#[test]
fn test_init_twice_fails() {
    let t = Test::init();

    let output = t.run(&["init", "--label", "alice"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");
}

#[test]
fn test_init_with_age_pubkey() {
    let t = Test::new();

    let output = t.run(&["init", "--label", "ci", "--pubkey", BOB_RECIPIENT]);
    assert_success(&output);
    assert_stderr_contains(&output, "age recipient");
}

#[test]
fn test_init_per_owner() {
    let t = Test::init();

    let output = t.run(&["init", "--owner", "mechanic", "--label", "mechanic"]);
    assert_success(&output);
    assert!(t.keyrack_home().join("keyrack.host.mechanic.toml").exists());
    assert_stderr_contains(&output, "--owner mechanic");
}

#[test]
fn test_init_missing_pubkey_file() {
    let t = Test::new();

    let output = t.run(&["init", "--pubkey", "/nonexistent/id.pub"]);
    assert_failure(&output);
}
