//! Error paths and output conventions.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_get_before_init_is_absent() {
    let t = Test::new();
    t.write_repo(ACME_REPO);

    let output = t.get("API_KEY", "prod");
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "keyrack set");
}

#[test]
fn test_invalid_env_rejected() {
    let t = Test::init();

    let output = t.run(&["get", "--key", "API_KEY", "--env", "staging"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "staging");
}

#[test]
fn test_invalid_owner_rejected() {
    let t = Test::new();

    let output = t.run(&["init", "--owner", "Bad Owner"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid owner");
}

#[test]
fn test_invalid_key_name_rejected() {
    let t = Test::init();

    let output = t.run(&["get", "--key", "bad name", "--env", "prod"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid");
}

#[test]
fn test_errors_go_to_stderr() {
    let t = Test::new();

    let output = t.run(&["recipient", "list"]);
    assert_failure(&output);
    assert!(stdout(&output).is_empty());
    assert_stderr_contains(&output, "keyrack init");
}

#[test]
fn test_completions_bash() {
    let t = Test::new();

    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("keyrack"));
}

#[test]
fn test_help_hides_daemon_entry_point() {
    let t = Test::new();

    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("unlock"))
        .stdout(predicate::str::contains("Daemon entry point").not());
}
