//! Host configuration types.
//!
//! A [`KeyHostConfig`] records where a slug's secret lives and how it may be
//! used. Host configs live in the encrypted half of the host manifest.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::domain::{Env, Slug};
use crate::core::ttl;
use crate::error::{ConfigError, Result};

/// Secret storage backend a key is resolved through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VaultKind {
    #[serde(rename = "os.envvar")]
    OsEnvvar,
    #[serde(rename = "os.direct")]
    OsDirect,
    #[serde(rename = "os.secure")]
    OsSecure,
    #[serde(rename = "aws.iam.sso")]
    AwsIamSso,
    #[serde(rename = "1password")]
    OnePassword,
}

impl VaultKind {
    pub const ALL: [VaultKind; 5] = [
        VaultKind::OsEnvvar,
        VaultKind::OsDirect,
        VaultKind::OsSecure,
        VaultKind::AwsIamSso,
        VaultKind::OnePassword,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OsEnvvar => "os.envvar",
            Self::OsDirect => "os.direct",
            Self::OsSecure => "os.secure",
            Self::AwsIamSso => "aws.iam.sso",
            Self::OnePassword => "1password",
        }
    }

    /// Mechanism assumed when `set` is called without `--mechanism`.
    pub fn default_mechanism(&self) -> Mechanism {
        match self {
            Self::OsEnvvar | Self::OsDirect | Self::OsSecure => Mechanism::PermanentViaReplica,
            Self::AwsIamSso => Mechanism::EphemeralViaSession,
            Self::OnePassword => Mechanism::PermanentViaReference,
        }
    }

    /// Whether the secret itself is stored by keyrack (as opposed to an
    /// external system referenced by `exid`).
    pub fn stores_secret(&self) -> bool {
        matches!(self, Self::OsDirect | Self::OsSecure)
    }

    /// Hint shown when a required `--exid` is missing.
    pub fn exid_hint(&self) -> Option<&'static str> {
        match self {
            Self::AwsIamSso => Some("the aws sso profile name, e.g. --exid acme-prod"),
            Self::OnePassword => Some("an op:// secret reference, e.g. --exid op://vault/item/field"),
            _ => None,
        }
    }

    /// Vault most likely intended for a key name, used in `fix` hints.
    pub fn infer_for(name: &str) -> Self {
        if name == "AWS_PROFILE" {
            Self::AwsIamSso
        } else {
            Self::OsSecure
        }
    }
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ConfigError::InvalidVault(s.to_string()).into())
    }
}

/// Lifetime and provenance classification of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mechanism {
    /// A stored copy of a stable secret.
    PermanentViaReplica,
    /// A pointer into a password manager, read at unlock time.
    PermanentViaReference,
    /// A non-expiring cloud access key.
    PermanentViaAccessKey,
    /// Derived from an interactive SSO session.
    EphemeralViaSession,
    /// Minted from an OIDC token exchange.
    EphemeralViaOidc,
}

impl Mechanism {
    pub const ALL: [Mechanism; 5] = [
        Mechanism::PermanentViaReplica,
        Mechanism::PermanentViaReference,
        Mechanism::PermanentViaAccessKey,
        Mechanism::EphemeralViaSession,
        Mechanism::EphemeralViaOidc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermanentViaReplica => "PERMANENT_VIA_REPLICA",
            Self::PermanentViaReference => "PERMANENT_VIA_REFERENCE",
            Self::PermanentViaAccessKey => "PERMANENT_VIA_ACCESS_KEY",
            Self::EphemeralViaSession => "EPHEMERAL_VIA_SESSION",
            Self::EphemeralViaOidc => "EPHEMERAL_VIA_OIDC",
        }
    }

    /// Long-lived credentials that must not be granted without an explicit
    /// opt-in.
    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::PermanentViaAccessKey)
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mechanism {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::InvalidMechanism(s.to_string()).into())
    }
}

/// Configuration for one slug, stored in the host manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyHostConfig {
    pub slug: Slug,
    pub env: Env,
    pub org: String,
    pub mechanism: Mechanism,
    pub vault: VaultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_recipient: Option<String>,
    /// Upper bound on unlock lifetime, e.g. `"1h"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Requested configuration for `set`, before timestamps are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSpec {
    pub slug: Slug,
    pub mechanism: Option<Mechanism>,
    pub vault: VaultKind,
    pub exid: Option<String>,
    pub vault_recipient: Option<String>,
    pub max_duration: Option<String>,
}

impl HostSpec {
    /// Validate the request before it touches disk.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an `all` env, a missing `exid` on vaults
    /// that need one, or an unparsable `max_duration`.
    pub fn validate(&self) -> Result<()> {
        self.slug.env().require_concrete()?;

        if let Some(hint) = self.vault.exid_hint() {
            if self.exid.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingExid {
                    vault: self.vault.to_string(),
                    hint,
                }
                .into());
            }
        }

        if let Some(max) = &self.max_duration {
            ttl::parse(max)?;
        }

        Ok(())
    }

    /// Build a fresh config stamped with `now`.
    pub fn into_config(self, now: DateTime<Utc>) -> KeyHostConfig {
        KeyHostConfig {
            env: self.slug.env(),
            org: self.slug.org().to_string(),
            mechanism: self
                .mechanism
                .unwrap_or_else(|| self.vault.default_mechanism()),
            vault: self.vault,
            exid: self.exid,
            vault_recipient: self.vault_recipient,
            max_duration: self.max_duration,
            created_at: now,
            updated_at: now,
            slug: self.slug,
        }
    }
}

impl KeyHostConfig {
    /// Whether `other` carries the same settings, ignoring timestamps.
    pub fn same_settings(&self, other: &KeyHostConfig) -> bool {
        self.slug == other.slug
            && self.mechanism == other.mechanism
            && self.vault == other.vault
            && self.exid == other.exid
            && self.vault_recipient == other.vault_recipient
            && self.max_duration == other.max_duration
    }

    /// Parsed `max_duration`, if configured.
    pub fn max_duration(&self) -> Result<Option<Duration>> {
        self.max_duration.as_deref().map(ttl::parse).transpose()
    }
}

/// Outcome of an idempotent (findsert) write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    Created,
    Found,
    Updated,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Found => "found",
            Self::Updated => "updated",
        })
    }
}
