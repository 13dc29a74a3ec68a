//! Grant types.
//!
//! A [`KeyGrant`] is a resolved, usable secret plus its provenance. Grants
//! live only in the daemon cache or as transient resolution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::core::domain::{Env, Mechanism, Slug, VaultKind};

/// Secret value of a grant, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantKey {
    secret: String,
}

impl GrantKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl Drop for GrantKey {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl std::fmt::Debug for GrantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantKey")
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Where a grant came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSource {
    pub vault: VaultKind,
    pub mechanism: Mechanism,
}

/// A resolved, usable secret value plus its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyGrant {
    pub slug: Slug,
    pub key: GrantKey,
    pub source: GrantSource,
    pub env: Env,
    pub org: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<DateTime<Utc>>,
}

impl KeyGrant {
    /// Grant for `slug` with env and org taken from the slug.
    pub fn new(slug: Slug, secret: impl Into<String>, source: GrantSource) -> Self {
        Self {
            env: slug.env(),
            org: slug.org().to_string(),
            slug,
            key: GrantKey::new(secret),
            source,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}
