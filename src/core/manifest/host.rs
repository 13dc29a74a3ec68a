//! Host manifest.
//!
//! `keyrack.host[.<owner>].toml` holds the recipient set in plaintext and the
//! slug → [`KeyHostConfig`] table age-encrypted to those recipients:
//!
//! ```toml
//! hosts = """
//! -----BEGIN AGE ENCRYPTED FILE-----
//! ...
//! """
//!
//! [keyrack]
//! version = "0.1.0"
//! owner = "default"
//!
//! [[recipients]]
//! label = "alice"
//! mechanism = "ssh"
//! pubkey = "ssh-ed25519 AAAA..."
//! added_at = "2026-01-01T00:00:00Z"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::cipher;
use crate::core::domain::{Effect, HostSpec, KeyHostConfig, Owner, Recipient, Slug};
use crate::core::identity::IdentityMaterial;
use crate::error::{ManifestError, Result};

/// Decrypted slug → config table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostTable(BTreeMap<String, KeyHostConfig>);

impl HostTable {
    pub fn get(&self, slug: &Slug) -> Option<&KeyHostConfig> {
        self.0.get(&slug.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyHostConfig> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Create or update the config for `spec.slug`.
    ///
    /// Re-applying identical settings is a no-op reported as `Found`.
    pub fn set(&mut self, spec: HostSpec, now: DateTime<Utc>) -> Result<Effect> {
        spec.validate()?;
        let key = spec.slug.to_string();
        let fresh = spec.into_config(now);

        match self.0.get_mut(&key) {
            Some(existing) if existing.same_settings(&fresh) => Ok(Effect::Found),
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = KeyHostConfig {
                    created_at,
                    ..fresh
                };
                Ok(Effect::Updated)
            }
            None => {
                self.0.insert(key, fresh);
                Ok(Effect::Created)
            }
        }
    }

    /// Remove and return the config for `slug`.
    pub fn remove(&mut self, slug: &Slug) -> Result<KeyHostConfig> {
        self.0
            .remove(&slug.to_string())
            .ok_or_else(|| ManifestError::HostNotFound(slug.to_string()).into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Meta {
    version: String,
    owner: String,
}

/// Parsed host manifest. The host table stays sealed until [`open`](Self::open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hosts: Option<String>,
    keyrack: Meta,
    #[serde(default)]
    recipients: Vec<Recipient>,
}

impl HostManifest {
    pub fn new(owner: &Owner, recipient: Recipient) -> Self {
        Self {
            hosts: None,
            keyrack: Meta {
                version: env!("CARGO_PKG_VERSION").to_string(),
                owner: owner.to_string(),
            },
            recipients: vec![recipient],
        }
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// age recipient strings, the targets for identity discovery.
    pub fn recipient_keys(&self) -> Result<Vec<String>> {
        self.recipients.iter().map(Recipient::age_recipient).collect()
    }

    /// Whether the host table holds any ciphertext.
    pub fn is_sealed(&self) -> bool {
        self.hosts.is_some()
    }

    /// Decrypt the host table.
    pub fn open(&self, identity: &IdentityMaterial) -> Result<HostTable> {
        match &self.hosts {
            None => Ok(HostTable::default()),
            Some(ciphertext) => {
                let plaintext = zeroize::Zeroizing::new(cipher::decrypt(ciphertext, identity)?);
                let table: HostTable = toml::from_str(&plaintext)?;
                debug!(hosts = table.len(), "host table decrypted");
                Ok(table)
            }
        }
    }

    /// Encrypt `table` to the current recipient set.
    pub fn seal(&mut self, table: &HostTable) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(ManifestError::NoRecipients.into());
        }
        if table.is_empty() {
            self.hosts = None;
            return Ok(());
        }
        let plaintext = zeroize::Zeroizing::new(toml::to_string_pretty(table)?);
        self.hosts = Some(cipher::encrypt(&plaintext, &self.recipients)?);
        Ok(())
    }

    /// Add or replace the recipient with `recipient.label()`.
    pub fn upsert_recipient(&mut self, recipient: Recipient) -> Effect {
        match self
            .recipients
            .iter_mut()
            .find(|r| r.label() == recipient.label())
        {
            Some(existing) if existing.pubkey() == recipient.pubkey() => Effect::Found,
            Some(existing) => {
                *existing = recipient;
                Effect::Updated
            }
            None => {
                self.recipients.push(recipient);
                Effect::Created
            }
        }
    }

    /// Remove a recipient by label. The last recipient cannot be removed.
    pub fn remove_recipient(&mut self, label: &str) -> Result<Recipient> {
        let index = self
            .recipients
            .iter()
            .position(|r| r.label() == label)
            .ok_or_else(|| ManifestError::RecipientNotFound(label.to_string()))?;

        if self.recipients.len() == 1 {
            return Err(ManifestError::LastRecipient(label.to_string()).into());
        }
        Ok(self.recipients.remove(index))
    }

    fn validate(&self) -> Result<()> {
        if self.keyrack.version.split('.').count() < 2 {
            return Err(ManifestError::InvalidRepo(format!(
                "host manifest version '{}' is not semver",
                self.keyrack.version
            ))
            .into());
        }
        if self.recipients.is_empty() {
            return Err(ManifestError::NoRecipients.into());
        }
        Ok(())
    }
}

/// Reads and writes one owner's host manifest.
#[derive(Debug, Clone)]
pub struct HostManifestStore {
    path: PathBuf,
    owner: Owner,
}

impl HostManifestStore {
    pub fn new(path: impl Into<PathBuf>, owner: Owner) -> Self {
        Self {
            path: path.into(),
            owner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the manifest with its first recipient.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::AlreadyInitialized` if one already exists.
    pub fn init(&self, recipient: Recipient) -> Result<HostManifest> {
        if self.exists() {
            return Err(ManifestError::AlreadyInitialized(self.path.clone()).into());
        }
        let manifest = HostManifest::new(&self.owner, recipient);
        self.save(&manifest)?;
        Ok(manifest)
    }

    /// Load the manifest without decrypting the host table.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::NotInitialized` naming the init command when
    /// the file does not exist.
    pub fn load(&self) -> Result<HostManifest> {
        debug!(path = %self.path.display(), "loading host manifest");

        if !self.exists() {
            return Err(ManifestError::NotInitialized {
                owner: self.owner.to_string(),
                command: format!("keyrack init{}", self.owner.flag()),
            }
            .into());
        }

        let contents = fs::read_to_string(&self.path).map_err(|source| ManifestError::Read {
            path: self.path.clone(),
            source,
        })?;
        let manifest: HostManifest = toml::from_str(&contents)?;
        manifest.validate()?;

        debug!(
            recipients = manifest.recipients.len(),
            sealed = manifest.is_sealed(),
            "host manifest loaded"
        );
        Ok(manifest)
    }

    pub fn save(&self, manifest: &HostManifest) -> Result<()> {
        debug!(path = %self.path.display(), "saving host manifest");
        let contents = toml::to_string_pretty(manifest)?;
        super::write_atomic(&self.path, contents.as_bytes(), Some(0o600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::VaultKind;
    use age::x25519;
    use tempfile::TempDir;

    fn native() -> (Recipient, IdentityMaterial) {
        let identity = x25519::Identity::generate();
        let recipient =
            Recipient::new("alice", &identity.to_public().to_string(), Utc::now()).unwrap();
        (recipient, IdentityMaterial::Native(identity))
    }

    fn spec(slug: &str) -> HostSpec {
        HostSpec {
            slug: slug.parse().unwrap(),
            mechanism: None,
            vault: VaultKind::OsDirect,
            exid: None,
            vault_recipient: None,
            max_duration: None,
        }
    }

    #[test]
    fn test_findsert_effects() {
        let mut table = HostTable::default();
        let now = Utc::now();

        assert_eq!(table.set(spec("acme.prod.KEY"), now).unwrap(), Effect::Created);
        assert_eq!(table.set(spec("acme.prod.KEY"), now).unwrap(), Effect::Found);

        let mut changed = spec("acme.prod.KEY");
        changed.vault = VaultKind::OsSecure;
        assert_eq!(table.set(changed, now).unwrap(), Effect::Updated);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_update_keeps_created_at() {
        let mut table = HostTable::default();
        let first = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_700_000_500, 0).unwrap();
        table.set(spec("acme.prod.KEY"), first).unwrap();

        let mut changed = spec("acme.prod.KEY");
        changed.max_duration = Some("1h".to_string());
        table.set(changed, later).unwrap();

        let config = table.get(&"acme.prod.KEY".parse().unwrap()).unwrap();
        assert_eq!(config.created_at, first);
        assert_eq!(config.updated_at, later);
    }

    #[test]
    fn test_remove_missing_host() {
        let mut table = HostTable::default();
        assert!(table.remove(&"acme.prod.KEY".parse().unwrap()).is_err());
    }

    #[test]
    fn test_seal_open_roundtrip_hides_slugs() {
        let dir = TempDir::new().unwrap();
        let store = HostManifestStore::new(dir.path().join("keyrack.host.toml"), Owner::default());
        let (recipient, identity) = native();

        let mut manifest = store.init(recipient).unwrap();
        let mut table = HostTable::default();
        table.set(spec("acme.prod.STRIPE_KEY"), Utc::now()).unwrap();
        manifest.seal(&table).unwrap();
        store.save(&manifest).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("STRIPE_KEY"));
        assert!(raw.contains("BEGIN AGE ENCRYPTED FILE"));

        let loaded = store.load().unwrap();
        assert_eq!(loaded.open(&identity).unwrap(), table);
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let store = HostManifestStore::new(dir.path().join("keyrack.host.toml"), Owner::default());
        store.init(native().0).unwrap();
        assert!(store.init(native().0).is_err());
    }

    #[test]
    fn test_load_missing_names_init_command() {
        let dir = TempDir::new().unwrap();
        let owner = Owner::named("mechanic").unwrap();
        let store = HostManifestStore::new(dir.path().join("keyrack.host.mechanic.toml"), owner);

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("keyrack init --owner mechanic"));
    }

    #[test]
    fn test_recipient_upsert_and_last_guard() {
        let (alice, _) = native();
        let mut manifest = HostManifest::new(&Owner::default(), alice.clone());

        assert_eq!(manifest.upsert_recipient(alice.clone()), Effect::Found);

        let bob_key = x25519::Identity::generate().to_public().to_string();
        let bob = Recipient::new("bob", &bob_key, Utc::now()).unwrap();
        assert_eq!(manifest.upsert_recipient(bob), Effect::Created);

        manifest.remove_recipient("bob").unwrap();
        assert!(manifest.remove_recipient("alice").is_err());
        assert!(manifest.remove_recipient("carol").is_err());
    }
}
