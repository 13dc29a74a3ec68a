//! Cryptographic operations.
//!
//! Host-manifest content and `os.secure` secrets are age-encrypted to the
//! host recipients. Recipients may be native age keys or ssh-ed25519 keys
//! bridged by [`crate::core::identity`].

use crate::core::domain::Recipient;
use crate::core::identity::IdentityMaterial;
use crate::error::Result;

mod age;

pub use age::{parse_recipient, Age};

/// Cryptographic backend trait.
///
/// Abstracts encryption and decryption so that the manifest and vault code
/// do not depend on the age API directly.
pub trait Cipher {
    /// Type representing a recipient public key.
    type Recipient;

    /// Type representing a private identity/key.
    type Identity;

    /// Encrypt plaintext for multiple recipients.
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if encryption fails.
    fn encrypt(&self, plaintext: &str, recipients: &[Self::Recipient]) -> Result<String>;

    /// Decrypt an encrypted string using a private identity.
    ///
    /// # Errors
    ///
    /// Returns `CipherError` if decryption fails.
    fn decrypt(&self, encrypted: &str, identity: &Self::Identity) -> Result<String>;
}

/// Encrypt plaintext for every host recipient.
///
/// This is a convenience wrapper around `Age::encrypt`.
pub fn encrypt(plaintext: &str, recipients: &[Recipient]) -> Result<String> {
    Age.encrypt(plaintext, recipients)
}

/// Decrypt an age-encrypted string with a bridged or native identity.
///
/// This is a convenience wrapper around `Age::decrypt`.
pub fn decrypt(encrypted: &str, identity: &IdentityMaterial) -> Result<String> {
    Age.decrypt(encrypted, identity)
}
