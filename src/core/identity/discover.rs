//! Best-effort identity discovery.
//!
//! Searches the SSH agent's loaded keys first, then conventional key files,
//! and returns the first private key whose derived recipient is wanted.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace};

use super::{pub_path_for, recipient_from_ssh_pubkey, IdentityMaterial};
use crate::error::{ConfigError, IdentityError, Result};

/// Key locations to search for a matching private key.
#[derive(Debug, Clone)]
pub struct Discovery {
    ssh_dir: PathBuf,
    use_agent: bool,
}

impl Discovery {
    /// Search `~/.ssh` and the running SSH agent.
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self {
            ssh_dir: home.join(".ssh"),
            use_agent: std::env::var_os("SSH_AUTH_SOCK").is_some(),
        })
    }

    /// Search only `dir`, ignoring any SSH agent.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_dir: dir.into(),
            use_agent: false,
        }
    }

    /// Find the first private key whose recipient is in `targets`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::NotFound` when no candidate matches.
    pub fn find(&self, targets: &[String]) -> Result<PathBuf> {
        for path in self.candidates() {
            match candidate_recipient(&path) {
                Some(recipient) if targets.contains(&recipient) => {
                    debug!(path = %path.display(), "found matching identity");
                    return Ok(path);
                }
                Some(_) => trace!(path = %path.display(), "key does not match any recipient"),
                None => trace!(path = %path.display(), "key not usable"),
            }
        }

        Err(IdentityError::NotFound.into())
    }

    /// Candidate private key paths, agent-loaded keys first, deduplicated.
    fn candidates(&self) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = Vec::new();
        let mut push = |path: PathBuf| {
            if path.is_file() && !out.contains(&path) {
                out.push(path);
            }
        };

        if self.use_agent {
            for path in self.agent_key_files() {
                push(path);
            }
        }

        push(self.ssh_dir.join("id_ed25519"));

        let mut extra: Vec<PathBuf> = fs::read_dir(&self.ssh_dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("id_ed25519_") && !n.ends_with(".pub"))
            })
            .collect();
        extra.sort();
        for path in extra {
            push(path);
        }

        out
    }

    /// Private key files whose `.pub` sibling matches a key loaded in the
    /// SSH agent.
    fn agent_key_files(&self) -> Vec<PathBuf> {
        let output = Command::new("ssh-add")
            .arg("-L")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        let listed = match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).to_string(),
            _ => return Vec::new(),
        };

        let agent_keys: Vec<&str> = listed
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .collect();

        fs::read_dir(&self.ssh_dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "pub"))
            .filter(|p| {
                fs::read_to_string(p)
                    .ok()
                    .and_then(|line| line.split_whitespace().nth(1).map(str::to_string))
                    .is_some_and(|blob| agent_keys.contains(&blob.as_str()))
            })
            .map(|p| p.with_extension(""))
            .collect()
    }
}

/// Recipient for a private key path, preferring its `.pub` sibling so that
/// passphrase-protected keys never need to be opened.
fn candidate_recipient(path: &Path) -> Option<String> {
    let pub_path = pub_path_for(path);
    if let Ok(line) = fs::read_to_string(&pub_path) {
        return recipient_from_ssh_pubkey(&line).ok();
    }

    match IdentityMaterial::load(path).ok()? {
        material @ IdentityMaterial::Native(_) => material.recipient(),
        IdentityMaterial::Delegated { .. } => None,
    }
}
