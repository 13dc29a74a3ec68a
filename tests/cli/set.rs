//! Tests for `keyrack set` and `keyrack del`.

use crate::support::*;

#[test]
fn test_set_is_idempotent() {
    let t = Test::with_repo(ACME_REPO);

    let first = t.set_stored("API_KEY", "prod", "os.direct", "sk_live_1");
    assert_success(&first);
    assert_stderr_contains(&first, "acme.prod.API_KEY created");

    let second = t.set_stored("API_KEY", "prod", "os.direct", "sk_live_1");
    assert_success(&second);
    assert_stderr_contains(&second, "acme.prod.API_KEY found");
}

#[test]
fn test_set_then_get_roundtrip() {
    let t = Test::with_repo(ACME_REPO);
    assert_roundtrip(&t, "DB_URL", "prep", "postgres://prep.internal/app");
}

#[test]
fn test_set_rejects_all_env() {
    let t = Test::with_repo(ACME_REPO);

    let output = t.set_stored("API_KEY", "all", "os.direct", "x");
    assert_failure(&output);
    assert_stderr_contains(&output, "selector");
}

#[test]
fn test_set_sso_requires_exid() {
    let t = Test::with_repo(ACME_REPO);

    let output = t.run(&["set", "--key", "AWS_PROFILE", "--env", "prod", "--vault", "aws.iam.sso"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "requires --exid");
}

#[test]
fn test_set_without_repo_needs_org() {
    let t = Test::init();

    let output = t.set_stored("API_KEY", "prod", "os.direct", "x");
    assert_failure(&output);
    assert_stderr_contains(&output, "--org");

    let output = t.run_with_stdin(
        &["set", "--key", "API_KEY", "--env", "prod", "--org", "acme", "--vault", "os.direct"],
        "x",
    );
    assert_success(&output);
}

#[test]
fn test_set_empty_secret_fails() {
    let t = Test::with_repo(ACME_REPO);

    let output = t.set_stored("API_KEY", "prod", "os.direct", "\n");
    assert_failure(&output);
    assert_stderr_contains(&output, "empty secret");
}

#[test]
fn test_set_before_init() {
    let t = Test::new();
    t.write_repo(ACME_REPO);

    let output = t.set_stored("API_KEY", "prod", "os.direct", "x");
    assert_failure(&output);
    assert_stderr_contains(&output, "keyrack init");
}

#[test]
fn test_del_removes_config() {
    let t = Test::with_repo(ACME_REPO);
    assert_success(&t.set_stored("API_KEY", "prod", "os.direct", "sk_live_1"));

    let output = t.run(&["del", "--key", "acme.prod.API_KEY"]);
    assert_success(&output);
    assert_stderr_contains(&output, "removed");

    let output = t.get("API_KEY", "prod");
    assert_exit_code(&output, 2);
    assert_stderr_contains(&output, "absent");

    let output = t.run(&["del", "--key", "acme.prod.API_KEY"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "not configured");
}
