//! Init command - create the host manifest.

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use crate::cli::{output, recipient};
use crate::core::config::Settings;
use crate::core::domain::Recipient;
use crate::core::manifest::HostManifestStore;
use crate::error::{ConfigError, Result};

/// Create the host manifest for `settings.owner` with one recipient.
///
/// The recipient defaults to `~/.ssh/id_ed25519.pub`, labelled with the
/// current username.
pub fn execute(settings: &Settings, pubkey: Option<&str>, label: Option<String>) -> Result<()> {
    let pubkey = match pubkey {
        Some(arg) => recipient::read_pubkey(arg)?,
        None => recipient::read_pubkey(&default_pubkey()?.to_string_lossy())?,
    };
    let label = label.unwrap_or_else(whoami::username);

    info!(owner = %settings.owner, label = %label, "initializing host manifest");

    let store = HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone());
    let recipient = Recipient::new(label, &pubkey, Utc::now())?;
    let mechanism = recipient.mechanism();
    store.init(recipient)?;

    output::success(&format!(
        "initialized {} ({} recipient)",
        output::path(store.path().display()),
        mechanism
    ));
    output::hint(&format!(
        "next: {}",
        output::cmd(&format!(
            "keyrack set --key <NAME> --env <env> --vault <vault>{}",
            settings.owner.flag()
        ))
    ));
    Ok(())
}

fn default_pubkey() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or(ConfigError::NoHomeDir)?
        .join(".ssh")
        .join("id_ed25519.pub"))
}
