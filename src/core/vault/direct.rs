//! `os.direct`: plaintext secrets in a `0600` TOML file.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use zeroize::Zeroizing;

use super::{grant_for, UnlockContext, VaultAdapter, VaultOutcome};
use crate::core::domain::{KeyHostConfig, Slug, VaultKind};
use crate::core::manifest::write_atomic;
use crate::error::{ManifestError, Result};

/// Plaintext store keyed by slug.
#[derive(Debug, Clone)]
pub struct DirectVault {
    path: PathBuf,
}

impl DirectVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = Zeroizing::new(fs::read_to_string(&self.path).map_err(|source| {
            ManifestError::Read {
                path: self.path.clone(),
                source,
            }
        })?);
        Ok(toml::from_str(&contents)?)
    }

    fn write(&self, secrets: &BTreeMap<String, String>) -> Result<()> {
        let contents = Zeroizing::new(toml::to_string(secrets)?);
        write_atomic(&self.path, contents.as_bytes(), Some(0o600))
    }
}

#[async_trait]
impl VaultAdapter for DirectVault {
    fn kind(&self) -> VaultKind {
        VaultKind::OsDirect
    }

    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome> {
        let secrets = self.read()?;
        Ok(match secrets.get(&config.slug.to_string()) {
            Some(secret) => VaultOutcome::Granted(grant_for(config, secret.as_str())),
            None => VaultOutcome::invalid(format!(
                "no secret stored for {}: run `keyrack set --key {} --env {} --org {} --vault os.direct`",
                config.slug,
                config.slug.name(),
                config.env,
                config.org
            )),
        })
    }

    async fn unlock(&self, config: &KeyHostConfig, _ctx: UnlockContext<'_>) -> Result<VaultOutcome> {
        self.get(config).await
    }

    fn store(&self, slug: &Slug, secret: &str) -> Result<()> {
        let mut secrets = self.read()?;
        secrets.insert(slug.to_string(), secret.to_string());
        debug!(slug = %slug, "stored secret in os.direct");
        self.write(&secrets)
    }

    fn remove(&self, slug: &Slug) -> Result<bool> {
        let mut secrets = self.read()?;
        let existed = secrets.remove(&slug.to_string()).is_some();
        if existed {
            self.write(&secrets)?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::HostSpec;
    use chrono::Utc;
    use tempfile::TempDir;

    fn config(slug: &str) -> KeyHostConfig {
        HostSpec {
            slug: slug.parse().unwrap(),
            mechanism: None,
            vault: VaultKind::OsDirect,
            exid: None,
            vault_recipient: None,
            max_duration: None,
        }
        .into_config(Utc::now())
    }

    #[tokio::test]
    async fn test_store_get_remove() {
        let dir = TempDir::new().unwrap();
        let vault = DirectVault::new(dir.path().join("vault/os.direct/keyrack.toml"));
        let config = config("acme.prod.DB_URL");

        assert!(matches!(vault.get(&config).await.unwrap(), VaultOutcome::Invalid { .. }));

        vault.store(&config.slug, "postgres://db").unwrap();
        match vault.get(&config).await.unwrap() {
            VaultOutcome::Granted(grant) => assert_eq!(grant.key.secret(), "postgres://db"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(vault.remove(&config.slug).unwrap());
        assert!(!vault.remove(&config.slug).unwrap());
    }
}
