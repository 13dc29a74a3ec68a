//! Tests for `keyrack recipient`.

use crate::support::*;

#[test]
fn test_recipient_list_json() {
    let t = Test::init();

    let output = t.run(&["recipient", "list", "--json"]);
    assert_success(&output);
    let recipients: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(recipients.as_array().unwrap().len(), 1);
    assert_eq!(recipients[0]["label"], "alice");
}

#[test]
fn test_recipient_set_and_del() {
    let t = Test::with_repo(ACME_REPO);
    assert_success(&t.set_stored("API_KEY", "prod", "os.direct", "sk_live_abc"));

    let output = t.run(&["recipient", "set", "--label", "bob", "--pubkey", BOB_RECIPIENT]);
    assert_success(&output);
    assert_stderr_contains(&output, "recipient bob created");

    let output = t.run(&["recipient", "list"]);
    assert_success(&output);
    assert_stderr_contains(&output, "bob");

    // still readable by alice after resealing for both
    assert_roundtrip(&t, "API_KEY", "prod", "sk_live_abc");

    let output = t.run(&["recipient", "del", "--label", "bob"]);
    assert_success(&output);
    assert_stderr_contains(&output, "removed");
}

#[test]
fn test_recipient_last_cannot_be_removed() {
    let t = Test::init();

    let output = t.run(&["recipient", "del", "--label", "alice"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "last recipient");
}

#[test]
fn test_recipient_del_unknown() {
    let t = Test::init();

    let output = t.run(&["recipient", "del", "--label", "mallory"]);
    assert_failure(&output);
    assert_stderr_contains(&output, "not found");
}
