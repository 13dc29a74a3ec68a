//! Identity bridge.
//!
//! Lets one ed25519 SSH key act as an age identity, so operators never
//! manage a second keypair:
//!
//! - public side: `ssh-ed25519 …` line → `age1…` recipient
//! - private side: unencrypted OpenSSH key → `AGE-SECRET-KEY-1…` identity
//! - passphrase-protected keys are never opened in-process; decryption is
//!   delegated to an external age CLI via a sentinel identity string
//! - discovery searches the SSH agent and conventional key paths for a key
//!   matching a set of recipients

mod convert;
mod discover;

use std::fs;
use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use age::x25519;
use ssh_key::{Algorithm, PrivateKey, PublicKey};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::core::constants;
use crate::error::{IdentityError, Result};

pub use discover::Discovery;

/// Derive the age recipient for an SSH public key line.
///
/// The comment field is ignored, so the same key always yields the same
/// recipient.
///
/// # Errors
///
/// Returns `IdentityError::InvalidPublicKey` for malformed input and
/// `IdentityError::UnsupportedKeyType` for anything but ed25519.
pub fn recipient_from_ssh_pubkey(line: &str) -> Result<String> {
    let key = PublicKey::from_openssh(line.trim())
        .map_err(|e| IdentityError::InvalidPublicKey(e.to_string()))?;

    let ed25519 = key
        .key_data()
        .ed25519()
        .ok_or_else(|| IdentityError::UnsupportedKeyType(key.algorithm().to_string()))?;

    let u = convert::public_to_montgomery(&ed25519.0)?;
    convert::encode_recipient(&u)
}

/// Derive an identity string from an OpenSSH private key file.
///
/// Unencrypted ed25519 keys yield an `AGE-SECRET-KEY-1…` string.
/// Passphrase-protected keys yield `keyrack-ssh-delegate:<absolute path>`
/// when an age CLI is available to do the decryption.
///
/// # Errors
///
/// Returns `IdentityError::DelegateUnavailable` for a protected key with no
/// age CLI on `PATH`, and `IdentityError::InvalidPrivateKey` or
/// `IdentityError::UnsupportedKeyType` for keys that cannot be bridged.
pub fn derive_identity(path: &Path) -> Result<Zeroizing<String>> {
    debug!(path = %path.display(), "deriving identity from ssh key");
    warn_on_loose_permissions(path);

    let invalid = |reason: String| IdentityError::InvalidPrivateKey {
        path: path.to_path_buf(),
        reason,
    };

    let pem = Zeroizing::new(fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?);
    let key = PrivateKey::from_openssh(pem.as_bytes()).map_err(|e| invalid(e.to_string()))?;

    if key.algorithm() != Algorithm::Ed25519 {
        return Err(IdentityError::UnsupportedKeyType(key.algorithm().to_string()).into());
    }

    if key.is_encrypted() {
        debug!(path = %path.display(), "key is passphrase protected, delegating");
        return delegate_sentinel(path);
    }

    let keypair = key
        .key_data()
        .ed25519()
        .ok_or_else(|| invalid("missing ed25519 key material".to_string()))?;
    let seed = Zeroizing::new(keypair.private.to_bytes());
    let scalar = convert::seed_to_scalar(&seed);

    convert::encode_identity(&scalar)
}

/// Private half of a decryption identity.
pub enum IdentityMaterial {
    /// In-process X25519 identity.
    Native(x25519::Identity),
    /// Decryption delegated to an external age CLI using this ssh key.
    Delegated { key_path: PathBuf },
}

impl IdentityMaterial {
    /// Parse an identity string produced by [`derive_identity`] or read from
    /// a native age identity file.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidPrivateKey` if the string is neither.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(path) = text.strip_prefix(constants::DELEGATE_SENTINEL) {
            return Ok(Self::Delegated {
                key_path: PathBuf::from(path),
            });
        }

        text.parse::<x25519::Identity>()
            .map(Self::Native)
            .map_err(|e| {
                IdentityError::InvalidPrivateKey {
                    path: PathBuf::from("<identity>"),
                    reason: e.to_string(),
                }
                .into()
            })
    }

    /// Load an identity from a key file: an OpenSSH private key or a native
    /// age identity file.
    pub fn load(path: &Path) -> Result<Self> {
        let head = fs::read_to_string(path).map_err(|e| IdentityError::InvalidPrivateKey {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let head = Zeroizing::new(head);

        if let Some(line) = head.lines().find(|l| l.starts_with("AGE-SECRET-KEY-")) {
            warn_on_loose_permissions(path);
            return Self::parse(line);
        }

        Self::parse(&derive_identity(path)?)
    }

    /// The age recipient this identity decrypts for.
    ///
    /// Delegated identities read the sibling `.pub` file.
    pub fn recipient(&self) -> Option<String> {
        match self {
            Self::Native(identity) => Some(identity.to_public().to_string()),
            Self::Delegated { key_path } => {
                let pub_path = pub_path_for(key_path);
                let line = fs::read_to_string(pub_path).ok()?;
                recipient_from_ssh_pubkey(&line).ok()
            }
        }
    }
}

impl std::fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native(identity) => f
                .debug_struct("Native")
                .field("recipient", &identity.to_public().to_string())
                .finish(),
            Self::Delegated { key_path } => f
                .debug_struct("Delegated")
                .field("key_path", key_path)
                .finish(),
        }
    }
}

/// Resolve the identity used to decrypt host-manifest content.
///
/// An explicit key path wins; otherwise discovery looks for a key whose
/// recipient is one of `targets`.
pub fn resolve(prikey: Option<&Path>, targets: &[String]) -> Result<IdentityMaterial> {
    match prikey {
        Some(path) => IdentityMaterial::load(path),
        None => {
            let path = Discovery::new()?.find(targets)?;
            IdentityMaterial::load(&path)
        }
    }
}

/// First age-compatible CLI on `PATH`.
pub fn age_cli() -> Option<PathBuf> {
    constants::AGE_CLIS
        .iter()
        .find_map(|cli| which::which(cli).ok())
}

fn delegate_sentinel(path: &Path) -> Result<Zeroizing<String>> {
    if age_cli().is_none() {
        return Err(IdentityError::DelegateUnavailable {
            path: path.to_path_buf(),
        }
        .into());
    }

    let absolute = fs::canonicalize(path).map_err(|e| IdentityError::InvalidPrivateKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(Zeroizing::new(format!(
        "{}{}",
        constants::DELEGATE_SENTINEL,
        absolute.display()
    )))
}

pub(crate) fn pub_path_for(key_path: &Path) -> PathBuf {
    let mut name = key_path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

#[cfg(unix)]
fn warn_on_loose_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode),
                "insecure key file permissions"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_on_loose_permissions(_path: &Path) {}

/// Expose a native identity as its `AGE-SECRET-KEY-1…` string.
pub fn to_secret_string(identity: &x25519::Identity) -> Zeroizing<String> {
    Zeroizing::new(identity.to_string().expose_secret().to_string())
}
