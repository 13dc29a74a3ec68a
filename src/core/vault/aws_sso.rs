//! `aws.iam.sso`: grants derived from an AWS SSO session.
//!
//! The granted secret is the profile name (`exid`), i.e. what `AWS_PROFILE`
//! should be set to once the session is live.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{grant_for, UnlockContext, VaultAdapter, VaultOutcome};
use crate::core::domain::{KeyGrant, KeyHostConfig, VaultKind};
use crate::error::{Result, VaultError};

const INSTALL: &str = "install the AWS CLI v2 (https://aws.amazon.com/cli/)";

#[derive(Debug, Clone)]
pub struct AwsSsoVault {
    cli: String,
}

impl AwsSsoVault {
    pub fn new() -> Self {
        Self::with_cli("aws")
    }

    /// Use a specific `aws` executable.
    pub fn with_cli(cli: impl Into<String>) -> Self {
        Self { cli: cli.into() }
    }

    fn profile<'a>(&self, config: &'a KeyHostConfig) -> std::result::Result<&'a str, VaultOutcome> {
        config
            .exid
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| VaultOutcome::invalid(format!("{} has no aws profile (exid)", config.slug)))
    }

    fn require_cli(&self) -> Result<()> {
        which::which(&self.cli).map(|_| ()).map_err(|_| {
            VaultError::CliMissing {
                cli: self.cli.clone(),
                install: INSTALL,
            }
            .into()
        })
    }

    /// Whether the profile currently has a valid session.
    async fn session_live(&self, profile: &str) -> Result<bool> {
        let status = Command::new(&self.cli)
            .args(["sts", "get-caller-identity", "--profile", profile])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        debug!(profile, live = status.success(), "checked aws sso session");
        Ok(status.success())
    }
}

impl Default for AwsSsoVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VaultAdapter for AwsSsoVault {
    fn kind(&self) -> VaultKind {
        VaultKind::AwsIamSso
    }

    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome> {
        let profile = match self.profile(config) {
            Ok(p) => p,
            Err(outcome) => return Ok(outcome),
        };
        if let Err(e) = self.require_cli() {
            return Ok(VaultOutcome::invalid(e.to_string()));
        }

        if self.session_live(profile).await? {
            Ok(VaultOutcome::Granted(grant_for(config, profile)))
        } else {
            Ok(VaultOutcome::RequiresUnlock)
        }
    }

    async fn unlock(&self, config: &KeyHostConfig, _ctx: UnlockContext<'_>) -> Result<VaultOutcome> {
        let profile = match self.profile(config) {
            Ok(p) => p,
            Err(outcome) => return Ok(outcome),
        };
        self.require_cli()?;

        if !self.session_live(profile).await? {
            // interactive: the CLI opens a browser and may prompt
            let status = Command::new(&self.cli)
                .args(["sso", "login", "--profile", profile])
                .status()
                .await?;
            if !status.success() {
                return Ok(VaultOutcome::invalid(format!(
                    "`{} sso login --profile {}` failed",
                    self.cli, profile
                )));
            }
        }

        if self.session_live(profile).await? {
            Ok(VaultOutcome::Granted(grant_for(config, profile)))
        } else {
            Ok(VaultOutcome::invalid(format!(
                "aws profile {} still has no valid session after login",
                profile
            )))
        }
    }

    async fn relock(&self, grant: &KeyGrant) -> Result<()> {
        self.require_cli()?;
        let profile = grant.key.secret();
        let output = Command::new(&self.cli)
            .args(["sso", "logout", "--profile", profile])
            .stdin(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(VaultError::CliFailed {
                cli: format!("{} sso logout", self.cli),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        debug!(profile, "aws sso session logged out");
        Ok(())
    }
}
