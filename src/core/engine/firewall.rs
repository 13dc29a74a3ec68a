//! Dangerous-credential firewall.
//!
//! Long-lived credentials are never granted unless the caller opts in.
//! Each rule that fires contributes one human-readable reason.

use crate::core::domain::{Attempt, KeyGrant, Mechanism};

const ACCESS_KEY_PREFIX: &str = "AKIA";
const ACCESS_KEY_LEN: usize = 20;

/// Reasons a mechanism is disallowed by default.
pub fn mechanism_reasons(mechanism: Mechanism) -> Vec<String> {
    if mechanism.is_dangerous() {
        vec![format!(
            "mechanism {} grants a non-expiring cloud access key; prefer EPHEMERAL_VIA_SESSION",
            mechanism
        )]
    } else {
        Vec::new()
    }
}

/// Reasons a secret value looks like a long-lived credential.
pub fn secret_reasons(secret: &str) -> Vec<String> {
    if looks_like_access_key(secret) {
        vec!["secret looks like a long-lived AWS access key id (AKIA...)".to_string()]
    } else {
        Vec::new()
    }
}

/// Turn a grant into `Granted`, or `Blocked` if any rule fires and the
/// caller did not pass `allow_dangerous`.
pub fn screen(grant: KeyGrant, allow_dangerous: bool) -> Attempt {
    if allow_dangerous {
        return Attempt::Granted { grant };
    }

    let mut reasons = mechanism_reasons(grant.source.mechanism);
    reasons.extend(secret_reasons(grant.key.secret()));

    if reasons.is_empty() {
        Attempt::Granted { grant }
    } else {
        Attempt::Blocked {
            slug: grant.slug.to_string(),
            reasons,
        }
    }
}

fn looks_like_access_key(secret: &str) -> bool {
    secret
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            token.len() == ACCESS_KEY_LEN
                && token.starts_with(ACCESS_KEY_PREFIX)
                && token
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        })
}
