//! Test fixtures and constants.

use std::path::PathBuf;

/// age recipient bridged from `fixtures/id_ed25519.pub`.
pub const FIXTURE_RECIPIENT: &str = "age1gh8vqezyp38ppsl8ng3weptaservvtyz6f6cf4ady54g83xkx3fqlx45ln";

/// age identity bridged from `fixtures/id_ed25519`.
pub const FIXTURE_IDENTITY: &str =
    "AGE-SECRET-KEY-1QSWZ96RN59XSCJLAFG3NCN4DTVEYJE0LZSLKP04M82EYLAM2K38QMS7ATG";

/// A second, unrelated age recipient.
pub const BOB_RECIPIENT: &str = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

/// Repo manifest declaring two keys in prod and prep for org `acme`.
pub const ACME_REPO: &str = r#"org = "acme"

[env]
prod = ["API_KEY", "DB_URL"]
prep = ["API_KEY", "DB_URL"]
"#;

/// Path to a file under `tests/fixtures/`.
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
