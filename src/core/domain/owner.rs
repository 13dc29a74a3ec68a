//! Owner namespace.
//!
//! Every manifest, vault file and daemon socket is partitioned by owner.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

const DEFAULT: &str = "default";

/// Namespace partitioning manifests, vault storage and daemon sockets.
///
/// The default owner adds no path segment, so a single-owner host keeps
/// short file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Owner(Option<String>);

impl Owner {
    /// Named owner.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidOwner` unless the name matches
    /// `[a-z0-9][a-z0-9_-]*`.
    pub fn named(name: &str) -> Result<Self> {
        if name == DEFAULT {
            return Ok(Self::default());
        }

        let mut chars = name.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

        if !valid {
            return Err(ConfigError::InvalidOwner(name.to_string()).into());
        }

        Ok(Self(Some(name.to_string())))
    }

    pub fn is_default(&self) -> bool {
        self.0.is_none()
    }

    /// Append `.<owner>` to `base` unless this is the default owner.
    pub fn qualify(&self, base: &str) -> String {
        match &self.0 {
            Some(name) => format!("{}.{}", base, name),
            None => base.to_string(),
        }
    }

    /// Flag to repeat in suggested commands (empty for the default owner).
    pub fn flag(&self) -> String {
        match &self.0 {
            Some(name) => format!(" --owner {}", name),
            None => String::new(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or(DEFAULT))
    }
}

impl FromStr for Owner {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::named(s)
    }
}
