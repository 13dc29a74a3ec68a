//! Recipient representation.
//!
//! A recipient is a party allowed to decrypt host-manifest-protected
//! material.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::identity;
use crate::error::{CipherError, Result};

/// How a recipient's public key is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientMechanism {
    /// Native age X25519 recipient (`age1…`).
    Age,
    /// ssh-ed25519 public key, bridged to X25519.
    Ssh,
}

impl fmt::Display for RecipientMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Age => "age",
            Self::Ssh => "ssh",
        })
    }
}

/// A party authorized to decrypt host-manifest-protected material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    label: String,
    mechanism: RecipientMechanism,
    pubkey: String,
    added_at: DateTime<Utc>,
}

impl Recipient {
    /// Create a new recipient, validating the public key.
    ///
    /// The mechanism is detected from the key: `age1…` keys are native,
    /// `ssh-ed25519 …` lines are bridged.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidRecipient` if the key is neither.
    pub fn new(label: impl Into<String>, pubkey: &str, added_at: DateTime<Utc>) -> Result<Self> {
        let pubkey = pubkey.trim();
        let mechanism = if pubkey.starts_with("age1") {
            pubkey
                .parse::<age::x25519::Recipient>()
                .map_err(|_| CipherError::InvalidRecipient(pubkey.to_string()))?;
            RecipientMechanism::Age
        } else if pubkey.starts_with("ssh-") {
            identity::recipient_from_ssh_pubkey(pubkey)?;
            RecipientMechanism::Ssh
        } else {
            return Err(CipherError::InvalidRecipient(pubkey.to_string()).into());
        };

        Ok(Self {
            label: label.into(),
            mechanism,
            pubkey: pubkey.to_string(),
            added_at,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn mechanism(&self) -> RecipientMechanism {
        self.mechanism
    }

    pub fn pubkey(&self) -> &str {
        &self.pubkey
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// The age X25519 recipient this key encrypts to.
    pub fn age_recipient(&self) -> Result<String> {
        match self.mechanism {
            RecipientMechanism::Age => Ok(self.pubkey.clone()),
            RecipientMechanism::Ssh => identity::recipient_from_ssh_pubkey(&self.pubkey),
        }
    }
}
