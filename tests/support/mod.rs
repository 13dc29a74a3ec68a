//! Test support utilities for keyrack integration tests.
//!
//! Provides isolated environments for the binary and in-process daemons for
//! library-level tests.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod daemon;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own project dir, home dir and runtime dir. No
/// process-global state is mutated: child processes get everything through
/// `.current_dir()` and `.env()` so tests can run in parallel.
pub struct Test {
    /// Working directory (where `keyrack.toml` lives)
    pub dir: TempDir,
    /// `$HOME`, holding `.ssh/` and `.keyrack/`
    pub home: TempDir,
    /// Daemon sockets and pid files
    pub runtime: TempDir,
}

impl Test {
    /// Empty environment with the fixture ssh key installed as
    /// `~/.ssh/id_ed25519`.
    pub fn new() -> Self {
        let t = Self {
            dir: TempDir::new().expect("failed to create temp dir"),
            home: TempDir::new().expect("failed to create temp home"),
            runtime: TempDir::new().expect("failed to create temp runtime dir"),
        };
        t.install_ssh_key();
        t
    }

    /// Environment with the host manifest initialized.
    pub fn init() -> Self {
        let t = Self::new();
        assert_success(&t.run(&["init", "--label", "alice"]));
        t
    }

    /// Initialized environment with a repo manifest for org `acme`.
    pub fn with_repo(manifest: &str) -> Self {
        let t = Self::init();
        t.write_repo(manifest);
        t
    }

    pub fn keyrack_home(&self) -> PathBuf {
        self.home.path().join(".keyrack")
    }

    pub fn host_manifest(&self) -> PathBuf {
        self.keyrack_home().join("keyrack.host.toml")
    }

    pub fn write_repo(&self, manifest: &str) {
        fs::write(self.dir.path().join("keyrack.toml"), manifest).expect("failed to write keyrack.toml");
    }

    fn install_ssh_key(&self) {
        let ssh = self.home.path().join(".ssh");
        fs::create_dir_all(&ssh).expect("failed to create .ssh");
        copy_private(&fixture("id_ed25519"), &ssh.join("id_ed25519"));
        fs::copy(fixture("id_ed25519.pub"), ssh.join("id_ed25519.pub")).expect("failed to copy pubkey");
    }
}

impl Drop for Test {
    fn drop(&mut self) {
        // a daemon spawned by `unlock` outlives the command
        let _ = self.cmd().arg("kill").output();
    }
}

fn copy_private(from: &Path, to: &Path) {
    fs::copy(from, to).expect("failed to copy private key");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(to, fs::Permissions::from_mode(0o600)).expect("failed to chmod key");
    }
}
