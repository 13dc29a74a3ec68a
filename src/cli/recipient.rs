//! Recipient commands.
//!
//! Recipients are stored in plaintext; changing the set re-encrypts the
//! host table for the new set, which needs an identity that can open it.

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::domain::{Effect, Recipient};
use crate::core::identity;
use crate::core::manifest::{HostManifest, HostManifestStore};
use crate::error::{IdentityError, Result};

/// Public key from a literal line or a file containing one.
pub fn read_pubkey(arg: &str) -> Result<String> {
    let trimmed = arg.trim();
    if trimmed.starts_with("ssh-") || trimmed.starts_with("age1") {
        return Ok(trimmed.to_string());
    }

    let path = Path::new(trimmed);
    let contents = std::fs::read_to_string(path).map_err(|e| {
        IdentityError::InvalidPublicKey(format!("{}: {}", path.display(), e))
    })?;
    contents
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .ok_or_else(|| IdentityError::InvalidPublicKey(format!("{} is empty", path.display())).into())
}

fn store(settings: &Settings) -> HostManifestStore {
    HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone())
}

/// Re-encrypt the host table after the recipient set changed.
fn reseal(settings: &Settings, before: &HostManifest, after: &mut HostManifest) -> Result<()> {
    if !before.is_sealed() {
        return Ok(());
    }
    let identity = identity::resolve(settings.prikey(), &before.recipient_keys()?)?;
    let table = before.open(&identity)?;
    after.seal(&table)
}

/// Add or replace a recipient.
pub fn set(settings: &Settings, label: &str, pubkey: &str) -> Result<()> {
    let store = store(settings);
    let before = store.load()?;
    let recipient = Recipient::new(label, &read_pubkey(pubkey)?, Utc::now())?;

    let mut after = before.clone();
    let effect = after.upsert_recipient(recipient);
    if effect != Effect::Found {
        reseal(settings, &before, &mut after)?;
        store.save(&after)?;
    }

    output::success(&format!("recipient {} {}", output::slug(label), effect));
    Ok(())
}

/// Remove a recipient. The last one cannot be removed.
pub fn del(settings: &Settings, label: &str) -> Result<()> {
    let store = store(settings);
    let before = store.load()?;

    let mut after = before.clone();
    after.remove_recipient(label)?;
    reseal(settings, &before, &mut after)?;
    store.save(&after)?;

    output::success(&format!("recipient {} removed", output::slug(label)));
    Ok(())
}

#[derive(Serialize)]
struct RecipientView<'a> {
    label: &'a str,
    mechanism: String,
    pubkey: &'a str,
    added_at: String,
}

/// List recipients.
pub fn list(settings: &Settings, json: bool) -> Result<()> {
    let manifest = store(settings).load()?;

    if json {
        let views: Vec<RecipientView> = manifest
            .recipients()
            .iter()
            .map(|r| RecipientView {
                label: r.label(),
                mechanism: r.mechanism().to_string(),
                pubkey: r.pubkey(),
                added_at: r.added_at().to_rfc3339(),
            })
            .collect();
        output::data(&serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    output::section("Recipients");
    for r in manifest.recipients() {
        output::kv(r.label(), format!("{} {}", r.mechanism(), abbreviate(r.pubkey())));
    }
    Ok(())
}

fn abbreviate(pubkey: &str) -> String {
    const KEEP: usize = 24;
    let body = pubkey.split_whitespace().nth(1).unwrap_or(pubkey);
    if body.len() > KEEP {
        format!("{}…", &body[..KEEP])
    } else {
        body.to_string()
    }
}
