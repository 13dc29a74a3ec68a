//! ed25519 → X25519 conversion and bech32 encoding.

use bech32::{Bech32, Hrp};
use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{IdentityError, Result};

const RECIPIENT_HRP: &str = "age";
const IDENTITY_HRP: &str = "age-secret-key-";

/// Map an ed25519 public key (Edwards y) to its X25519 (Montgomery u) form.
pub(super) fn public_to_montgomery(ed25519: &[u8; 32]) -> Result<[u8; 32]> {
    let point = CompressedEdwardsY(*ed25519).decompress().ok_or_else(|| {
        IdentityError::InvalidPublicKey("not a point on the ed25519 curve".to_string())
    })?;
    Ok(point.to_montgomery().to_bytes())
}

/// Derive the X25519 scalar for an ed25519 seed: `SHA-512(seed)[..32]`.
///
/// Clamping is left to the X25519 implementation, which clamps on use.
pub(super) fn seed_to_scalar(seed: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut digest = Sha512::digest(seed);
    let mut scalar = Zeroizing::new([0u8; 32]);
    scalar.copy_from_slice(&digest[..32]);
    digest.as_mut_slice().zeroize();
    scalar
}

/// bech32 `age1…` recipient string.
pub(super) fn encode_recipient(u: &[u8; 32]) -> Result<String> {
    encode(RECIPIENT_HRP, u)
}

/// bech32 `AGE-SECRET-KEY-1…` identity string.
pub(super) fn encode_identity(scalar: &[u8; 32]) -> Result<Zeroizing<String>> {
    let lower = Zeroizing::new(encode(IDENTITY_HRP, scalar)?);
    Ok(Zeroizing::new(lower.to_uppercase()))
}

fn encode(hrp: &str, data: &[u8]) -> Result<String> {
    let hrp = Hrp::parse(hrp).map_err(|e| IdentityError::Encoding(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, data).map_err(|e| IdentityError::Encoding(e.to_string()).into())
}
