//! `os.secure`: one age-encrypted file per slug.
//!
//! Secrets are encrypted to the host recipients, so reading one always
//! needs the bridged identity and therefore an unlock.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroizing;

use super::{grant_for, UnlockContext, VaultAdapter, VaultOutcome};
use crate::core::cipher;
use crate::core::domain::{KeyHostConfig, Recipient, Slug, VaultKind};
use crate::core::manifest::write_atomic;
use crate::error::{IdentityError, ManifestError, Result};

#[derive(Debug, Clone)]
pub struct SecureVault {
    dir: PathBuf,
    recipients: Vec<Recipient>,
}

impl SecureVault {
    pub fn new(dir: impl Into<PathBuf>, recipients: Vec<Recipient>) -> Self {
        Self {
            dir: dir.into(),
            recipients,
        }
    }

    fn path_for(&self, slug: &Slug) -> PathBuf {
        self.dir.join(format!("{}.age", slug))
    }

    fn missing(config: &KeyHostConfig) -> VaultOutcome {
        VaultOutcome::invalid(format!(
            "no secret stored for {}: run `keyrack set --key {} --env {} --org {} --vault os.secure`",
            config.slug,
            config.slug.name(),
            config.env,
            config.org
        ))
    }
}

#[async_trait]
impl VaultAdapter for SecureVault {
    fn kind(&self) -> VaultKind {
        VaultKind::OsSecure
    }

    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome> {
        if self.path_for(&config.slug).exists() {
            Ok(VaultOutcome::RequiresUnlock)
        } else {
            Ok(Self::missing(config))
        }
    }

    async fn unlock(&self, config: &KeyHostConfig, ctx: UnlockContext<'_>) -> Result<VaultOutcome> {
        let path = self.path_for(&config.slug);
        if !path.exists() {
            return Ok(Self::missing(config));
        }
        let identity = ctx.identity.ok_or(IdentityError::NotFound)?;

        let ciphertext = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        let secret = Zeroizing::new(cipher::decrypt(&ciphertext, identity)?);
        debug!(slug = %config.slug, "decrypted os.secure secret");

        Ok(VaultOutcome::Granted(grant_for(config, secret.as_str())))
    }

    fn store(&self, slug: &Slug, secret: &str) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(ManifestError::NoRecipients.into());
        }
        let ciphertext = cipher::encrypt(secret, &self.recipients)?;
        write_atomic(&self.path_for(slug), ciphertext.as_bytes(), Some(0o600))?;
        debug!(slug = %slug, "stored secret in os.secure");
        Ok(())
    }

    fn remove(&self, slug: &Slug) -> Result<bool> {
        match fs::remove_file(self.path_for(slug)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
