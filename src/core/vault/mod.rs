//! Vault adapters.
//!
//! A vault is wherever a key's secret physically lives. Every vault is
//! reached through [`VaultAdapter`]; the engine dispatches through a
//! [`VaultRegistry`] keyed by [`VaultKind`] and never inspects adapter types.

mod aws_sso;
mod direct;
mod envvar;
mod onepassword;
mod secure;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use aws_sso::AwsSsoVault;
pub use direct::DirectVault;
pub use envvar::EnvVarVault;
pub use onepassword::OnePasswordVault;
pub use secure::SecureVault;

use crate::core::config::Settings;
use crate::core::domain::{GrantSource, KeyGrant, KeyHostConfig, Recipient, Slug, VaultKind};
use crate::core::identity::IdentityMaterial;
use crate::error::{Result, VaultError};

/// What an adapter can say about a key right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultOutcome {
    Granted(KeyGrant),
    /// Usable only after an interactive unlock.
    RequiresUnlock,
    Invalid { message: String },
}

impl VaultOutcome {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Context an adapter may need to perform an interactive unlock.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlockContext<'a> {
    /// Identity able to decrypt host-protected material.
    pub identity: Option<&'a IdentityMaterial>,
}

/// Uniform interface over one kind of secret store.
#[async_trait]
pub trait VaultAdapter: Send + Sync {
    fn kind(&self) -> VaultKind;

    /// Resolve without user interaction.
    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome>;

    /// Resolve, interacting with the user or external CLIs as needed.
    async fn unlock(&self, config: &KeyHostConfig, ctx: UnlockContext<'_>) -> Result<VaultOutcome>;

    /// Invalidate whatever session backs a previously issued grant.
    async fn relock(&self, _grant: &KeyGrant) -> Result<()> {
        Ok(())
    }

    /// Store a secret for `slug`. Only storage vaults support this.
    fn store(&self, _slug: &Slug, _secret: &str) -> Result<()> {
        Err(VaultError::NotStorable(self.kind().to_string()).into())
    }

    /// Forget the secret for `slug`, returning whether one existed.
    fn remove(&self, _slug: &Slug) -> Result<bool> {
        Ok(false)
    }
}

/// Grant for `config` carrying `secret`.
pub(crate) fn grant_for(config: &KeyHostConfig, secret: impl Into<String>) -> KeyGrant {
    KeyGrant::new(
        config.slug.clone(),
        secret,
        GrantSource {
            vault: config.vault,
            mechanism: config.mechanism,
        },
    )
}

/// Adapters keyed by the vault they serve.
#[derive(Clone, Default)]
pub struct VaultRegistry {
    adapters: BTreeMap<VaultKind, Arc<dyn VaultAdapter>>,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five built-in adapters, rooted at `settings`.
    pub fn standard(settings: &Settings, recipients: &[Recipient]) -> Self {
        Self::new()
            .with(Arc::new(EnvVarVault))
            .with(Arc::new(DirectVault::new(settings.direct_vault_path())))
            .with(Arc::new(SecureVault::new(
                settings.secure_vault_dir(),
                recipients.to_vec(),
            )))
            .with(Arc::new(AwsSsoVault::new()))
            .with(Arc::new(OnePasswordVault::new()))
    }

    /// Register `adapter`, replacing any adapter for the same kind.
    pub fn with(mut self, adapter: Arc<dyn VaultAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: VaultKind) -> Result<&Arc<dyn VaultAdapter>> {
        self.adapters
            .get(&kind)
            .ok_or_else(|| VaultError::NotRegistered(kind.to_string()).into())
    }
}
