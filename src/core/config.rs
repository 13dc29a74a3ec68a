//! Runtime settings.
//!
//! Resolved once per invocation from flags and environment, then passed to
//! everything that touches the filesystem or the daemon.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::constants::{self, env};
use crate::core::daemon::DaemonRegistry;
use crate::core::domain::Owner;
use crate::core::session::SessionResolver;
use crate::error::{ConfigError, Result};

/// Where keyrack keeps its files, and for whom.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `~/.keyrack` unless `KEYRACK_HOME` is set.
    pub home: PathBuf,
    /// Directory holding daemon sockets and pid files.
    pub runtime_dir: PathBuf,
    pub owner: Owner,
    /// Explicit private key for decryption; discovered when absent.
    pub prikey: Option<PathBuf>,
}

impl Settings {
    /// Settings with explicit paths.
    pub fn new(home: impl Into<PathBuf>, runtime_dir: impl Into<PathBuf>, owner: Owner) -> Self {
        Self {
            home: home.into(),
            runtime_dir: runtime_dir.into(),
            owner,
            prikey: None,
        }
    }

    /// Resolve settings from the environment.
    ///
    /// `owner` and `prikey` come from flags (which clap already fills from
    /// `KEYRACK_OWNER` / `KEYRACK_PRIKEY`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDir` if neither `KEYRACK_HOME` nor a home
    /// directory is available, or `ConfigError::InvalidOwner`.
    pub fn resolve(owner: Option<&str>, prikey: Option<PathBuf>) -> Result<Self> {
        let home = match std::env::var_os(env::HOME) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join(constants::HOME_DIR),
        };

        let runtime_dir = match std::env::var_os(env::RUNTIME_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::runtime_dir().unwrap_or_else(|| {
                std::env::temp_dir().join(format!(
                    "{}-{}",
                    constants::FILE_PREFIX,
                    nix::unistd::getuid().as_raw()
                ))
            }),
        };

        let owner = match owner {
            Some(name) if !name.is_empty() => Owner::named(name)?,
            _ => Owner::default(),
        };

        debug!(
            home = %home.display(),
            runtime = %runtime_dir.display(),
            owner = %owner,
            "settings resolved"
        );

        Ok(Self {
            home,
            runtime_dir,
            owner,
            prikey,
        })
    }

    pub fn with_prikey(mut self, prikey: Option<PathBuf>) -> Self {
        self.prikey = prikey;
        self
    }

    /// `<home>/keyrack.host[.<owner>].toml`
    pub fn host_manifest_path(&self) -> PathBuf {
        let base = self.owner.qualify(&format!("{}.host", constants::FILE_PREFIX));
        self.home.join(format!("{}.toml", base))
    }

    /// `<home>/vault/os.direct/keyrack[.<owner>].toml`
    pub fn direct_vault_path(&self) -> PathBuf {
        let base = self.owner.qualify(constants::FILE_PREFIX);
        self.vault_root().join("os.direct").join(format!("{}.toml", base))
    }

    /// `<home>/vault/os.secure[/<owner>]`
    pub fn secure_vault_dir(&self) -> PathBuf {
        let dir = self.vault_root().join("os.secure");
        if self.owner.is_default() {
            dir
        } else {
            dir.join(self.owner.to_string())
        }
    }

    /// Daemon registry for this owner in the caller's login session.
    pub fn registry(&self, resolver: &dyn SessionResolver) -> Result<DaemonRegistry> {
        Ok(DaemonRegistry::new(
            &self.runtime_dir,
            resolver.current_session_id()?,
            self.owner.clone(),
        ))
    }

    pub fn prikey(&self) -> Option<&Path> {
        self.prikey.as_deref()
    }

    fn vault_root(&self) -> PathBuf {
        self.home.join("vault")
    }
}
