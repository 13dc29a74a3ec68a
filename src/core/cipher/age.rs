//! Age encryption backend implementation.
//!
//! Encrypts to native and ssh-bridged recipients with ASCII armor, and
//! decrypts either in-process or by delegating to an age CLI.

use std::io::{Read, Write};
use std::process::{Command, Stdio};

use ::age::x25519;
use tracing::{debug, trace};

use super::Cipher;
use crate::core::domain::{Recipient, RecipientMechanism};
use crate::core::identity::{self, IdentityMaterial};
use crate::error::{CipherError, Result, VaultError};

/// Age-based cryptographic backend
pub struct Age;

impl Cipher for Age {
    type Recipient = Recipient;
    type Identity = IdentityMaterial;

    fn encrypt(&self, plaintext: &str, recipients: &[Recipient]) -> Result<String> {
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        let stanzas = stanza_recipients(recipients)?;
        let encryptor =
            ::age::Encryptor::with_recipients(stanzas.iter().map(|r| r.as_ref() as &dyn ::age::Recipient))
                .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(::age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                ::age::armor::Format::AsciiArmor,
            )?)
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        writer.write_all(plaintext.as_bytes())?;
        let armored = writer
            .finish()
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
        armored
            .finish()
            .map_err(|e| CipherError::ArmorFailed(format!("{}", e)))?;

        trace!(ciphertext_len = encrypted.len(), "encrypted");

        String::from_utf8(encrypted)
            .map_err(|e| CipherError::EncryptionFailed(format!("UTF-8 error: {}", e)).into())
    }

    fn decrypt(&self, encrypted: &str, identity: &IdentityMaterial) -> Result<String> {
        trace!(ciphertext_len = encrypted.len(), "decrypting");

        let decrypted = match identity {
            IdentityMaterial::Native(identity) => decrypt_native(encrypted, identity)?,
            IdentityMaterial::Delegated { key_path } => {
                debug!(key = %key_path.display(), "delegating decryption to age cli");
                decrypt_delegated(encrypted, key_path)?
            }
        };

        trace!(plaintext_len = decrypted.len(), "decrypted");

        String::from_utf8(decrypted)
            .map_err(|e| CipherError::DecryptionFailed(format!("UTF-8 error: {}", e)).into())
    }
}

/// Every age recipient stanza a recipient list encrypts to.
///
/// ssh recipients get both the bridged X25519 stanza (for in-process
/// decryption) and a native ssh-ed25519 stanza (for delegated decryption of
/// passphrase-protected keys).
fn stanza_recipients(recipients: &[Recipient]) -> Result<Vec<Box<dyn ::age::Recipient + Send>>> {
    let mut out: Vec<Box<dyn ::age::Recipient + Send>> = Vec::new();
    for recipient in recipients {
        out.push(Box::new(parse_recipient(&recipient.age_recipient()?)?));

        if recipient.mechanism() == RecipientMechanism::Ssh {
            let ssh: ::age::ssh::Recipient = recipient
                .pubkey()
                .parse()
                .map_err(|_| CipherError::InvalidRecipient(recipient.pubkey().to_string()))?;
            out.push(Box::new(ssh));
        }
    }
    Ok(out)
}

fn decrypt_native(encrypted: &str, identity: &x25519::Identity) -> Result<Vec<u8>> {
    let reader = ::age::armor::ArmoredReader::new(encrypted.as_bytes());
    let decryptor = ::age::Decryptor::new(reader)
        .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

    let mut decrypted = Vec::new();
    let mut reader = decryptor
        .decrypt(std::iter::once(identity as &dyn ::age::Identity))
        .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

    reader.read_to_end(&mut decrypted)?;
    Ok(decrypted)
}

fn decrypt_delegated(encrypted: &str, key_path: &std::path::Path) -> Result<Vec<u8>> {
    let cli = identity::age_cli().ok_or_else(|| VaultError::CliMissing {
        cli: "age".to_string(),
        install: "install age (https://age-encryption.org) or rage",
    })?;

    let mut child = Command::new(&cli)
        .arg("--decrypt")
        .arg("--identity")
        .arg(key_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CipherError::DecryptionFailed(format!("failed to spawn {}: {}", cli.display(), e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(encrypted.as_bytes()).map_err(|e| {
            CipherError::DecryptionFailed(format!("failed to write ciphertext: {}", e))
        })?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| CipherError::DecryptionFailed(format!("{} failed: {}", cli.display(), e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CipherError::DecryptionFailed(format!(
            "{} --decrypt failed: {}",
            cli.display(),
            stderr.trim()
        ))
        .into());
    }

    Ok(output.stdout)
}

/// Parse a public key string into an age recipient
///
/// # Errors
///
/// Returns `CipherError::InvalidRecipient` if the key format is invalid.
pub fn parse_recipient(key: &str) -> Result<x25519::Recipient> {
    key.parse::<x25519::Recipient>()
        .map_err(|_| CipherError::InvalidRecipient(key.to_string()).into())
}
