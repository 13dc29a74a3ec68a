//! Resolution outcomes.
//!
//! Every requested key resolves to exactly one [`Attempt`]. Only `Granted`
//! is usable; every other variant tells the caller how to proceed.

use serde::{Deserialize, Serialize};

use crate::core::domain::KeyGrant;

/// Outcome of resolving one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Attempt {
    /// Usable now.
    Granted { grant: KeyGrant },
    /// Configured, but needs `keyrack unlock` first.
    Locked { slug: String, fix: String },
    /// Disallowed by the dangerous-mechanism firewall.
    Blocked { slug: String, reasons: Vec<String> },
    /// Not configured, or ambiguous.
    Absent { slug: String, fix: String },
    /// Configured, but the stored value failed a correctness check.
    Invalid { slug: String, message: String },
}

impl Attempt {
    /// Slug (or raw name, when unresolvable) the attempt is about.
    pub fn slug(&self) -> String {
        match self {
            Self::Granted { grant } => grant.slug.to_string(),
            Self::Locked { slug, .. }
            | Self::Blocked { slug, .. }
            | Self::Absent { slug, .. }
            | Self::Invalid { slug, .. } => slug.clone(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Granted { .. } => "granted",
            Self::Locked { .. } => "locked",
            Self::Blocked { .. } => "blocked",
            Self::Absent { .. } => "absent",
            Self::Invalid { .. } => "invalid",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }

    pub fn grant(&self) -> Option<&KeyGrant> {
        match self {
            Self::Granted { grant } => Some(grant),
            _ => None,
        }
    }
}
