//! Constants used throughout keyrack.
//!
//! Centralizes magic strings and configuration values.

use std::time::Duration;

/// Repo manifest file name, looked up in the working directory.
pub const REPO_MANIFEST_FILE: &str = "keyrack.toml";

/// Home directory relative to `$HOME` (`~/.keyrack`).
pub const HOME_DIR: &str = ".keyrack";

/// Prefix shared by host manifests, vault files and daemon sockets.
pub const FILE_PREFIX: &str = "keyrack";

/// Default unlock lifetime for `sudo` keys.
pub const SUDO_TTL: Duration = Duration::from_secs(30 * 60);

/// Default unlock lifetime for every other env.
pub const DEFAULT_TTL: Duration = Duration::from_secs(9 * 60 * 60);

/// How often `find_or_spawn` pings a freshly spawned daemon.
pub const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long `find_or_spawn` waits before giving up.
pub const SPAWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for one daemon request document.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Sentinel prefix returned by the identity bridge for passphrase-protected keys.
pub const DELEGATE_SENTINEL: &str = "keyrack-ssh-delegate:";

/// age CLIs that can decrypt with an ssh identity, in preference order.
pub const AGE_CLIS: &[&str] = &["age", "rage"];

/// Environment variable overrides.
pub mod env {
    pub const OWNER: &str = "KEYRACK_OWNER";
    pub const HOME: &str = "KEYRACK_HOME";
    pub const RUNTIME_DIR: &str = "KEYRACK_RUNTIME_DIR";
    pub const PRIKEY: &str = "KEYRACK_PRIKEY";
    pub const LOG: &str = "KEYRACK_LOG";
}
