//! `1password`: secrets read through the `op` CLI at unlock time.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use zeroize::Zeroizing;

use super::{grant_for, UnlockContext, VaultAdapter, VaultOutcome};
use crate::core::domain::{KeyHostConfig, VaultKind};
use crate::error::{Result, VaultError};

const INSTALL: &str = "install the 1Password CLI (https://developer.1password.com/docs/cli/)";

#[derive(Debug, Clone)]
pub struct OnePasswordVault {
    cli: String,
}

impl OnePasswordVault {
    pub fn new() -> Self {
        Self::with_cli("op")
    }

    pub fn with_cli(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }
}

impl Default for OnePasswordVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultAdapter for OnePasswordVault {
    fn kind(&self) -> VaultKind {
        VaultKind::OnePassword
    }

    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome> {
        if config.exid.as_deref().map_or(true, str::is_empty) {
            return Ok(VaultOutcome::invalid(format!(
                "{} has no op:// reference (exid)",
                config.slug
            )));
        }
        Ok(VaultOutcome::RequiresUnlock)
    }

    async fn unlock(&self, config: &KeyHostConfig, _ctx: UnlockContext<'_>) -> Result<VaultOutcome> {
        let Some(reference) = config.exid.as_deref().filter(|r| !r.is_empty()) else {
            return self.get(config).await;
        };

        which::which(&self.cli).map_err(|_| VaultError::CliMissing {
            cli: self.cli.clone(),
            install: INSTALL,
        })?;

        // stdin and stderr stay attached so `op` can prompt for sign-in
        let output = Command::new(&self.cli)
            .args(["read", reference])
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await?;

        if !output.status.success() {
            return Ok(VaultOutcome::invalid(format!(
                "`{} read {}` failed",
                self.cli, reference
            )));
        }

        let secret = Zeroizing::new(String::from_utf8_lossy(&output.stdout).into_owned());
        let secret = secret.trim_end_matches(['\r', '\n']);
        if secret.is_empty() {
            return Ok(VaultOutcome::invalid(format!("{} resolved to an empty value", reference)));
        }

        debug!(slug = %config.slug, "read secret from 1password");
        Ok(VaultOutcome::Granted(grant_for(config, secret)))
    }
}
