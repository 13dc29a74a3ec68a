//! Tests for `unlock`, `relock`, `status` and `kill`.

use crate::support::*;

#[test]
fn test_status_without_daemon() {
    let t = Test::init();

    let output = t.run(&["status"]);
    assert_success(&output);
    assert_stderr_contains(&output, "no daemon running");

    let output = t.run(&["status", "--json"]);
    assert_success(&output);
    assert_eq!(stdout(&output).trim(), "[]");
}

#[test]
fn test_relock_without_daemon() {
    let t = Test::init();

    let output = t.run(&["relock"]);
    assert_success(&output);
    assert_stderr_contains(&output, "no daemon running");
}

#[test]
fn test_kill_is_idempotent() {
    let t = Test::init();

    assert_success(&t.run(&["kill"]));
    let output = t.run(&["kill"]);
    assert_success(&output);
    assert_stderr_contains(&output, "no daemon running");
}

#[test]
fn test_unlock_get_relock_secure_key() {
    let t = Test::with_repo(ACME_REPO);
    assert_success(&t.set_stored("API_KEY", "prod", "os.secure", "sk_live_secure"));

    let output = t.run(&["unlock", "--key", "API_KEY", "--env", "prod"]);
    assert_success(&output);
    assert_stderr_contains(&output, "acme.prod.API_KEY unlocked");

    let output = t.get("API_KEY", "prod");
    assert_success(&output);
    assert_eq!(stdout(&output).trim_end(), "sk_live_secure");

    let output = t.run(&["status"]);
    assert_success(&output);
    assert_stderr_contains(&output, "acme.prod.API_KEY");
    assert_stdout_excludes(&output, "sk_live_secure");

    let output = t.run(&["relock", "--key", "API_KEY"]);
    assert_success(&output);
    assert_stderr_contains(&output, "relocked");

    let output = t.get("API_KEY", "prod");
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "locked");

    assert_success(&t.run(&["kill"]));
}

#[test]
fn test_reconfigure_evicts_cached_grant() {
    let t = Test::with_repo(ACME_REPO);
    assert_success(&t.set_stored("API_KEY", "prod", "os.secure", "sk_live_secure"));
    assert_success(&t.run(&["unlock", "--key", "API_KEY", "--env", "prod"]));
    assert_success(&t.get("API_KEY", "prod"));

    let output = t.run_with_stdin(
        &[
            "set",
            "--key",
            "API_KEY",
            "--env",
            "prod",
            "--vault",
            "os.secure",
            "--mechanism",
            "PERMANENT_VIA_ACCESS_KEY",
        ],
        "sk_live_secure",
    );
    assert_success(&output);
    assert_stderr_contains(&output, "updated");

    let output = t.get("API_KEY", "prod");
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "blocked");
    assert_stdout_excludes(&output, "sk_live_secure");
}

#[test]
fn test_del_evicts_cached_grant() {
    let t = Test::with_repo(ACME_REPO);
    assert_success(&t.set_stored("API_KEY", "prod", "os.secure", "sk_live_secure"));
    assert_success(&t.run(&["unlock", "--key", "API_KEY", "--env", "prod"]));
    assert_success(&t.get("API_KEY", "prod"));

    assert_success(&t.run(&["del", "--key", "acme.prod.API_KEY"]));

    let output = t.get("API_KEY", "prod");
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "absent");
    assert_stdout_excludes(&output, "sk_live_secure");

    let output = t.run(&["status"]);
    assert_stderr_contains(&output, "no keys unlocked");
}
