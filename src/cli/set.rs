//! Set and del commands.
//!
//! `set` is an idempotent findsert into the host table; for storage vaults
//! it also stores the secret, read from stdin or a hidden prompt.

use std::io::{self, IsTerminal, Read};

use chrono::Utc;
use dialoguer::Password;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::domain::{Effect, Env, HostSpec, Mechanism, OrgSelector, Slug, VaultKind};
use crate::core::identity;
use crate::core::manifest::{HostManifest, HostManifestStore, HostTable, RepoManifest};
use crate::core::session;
use crate::core::vault::VaultRegistry;
use crate::error::{Result, VaultError};

/// Arguments of `keyrack set`.
#[derive(Debug, Clone)]
pub struct SetArgs {
    pub key: String,
    pub env: Env,
    pub org: Option<String>,
    pub vault: VaultKind,
    pub mechanism: Option<Mechanism>,
    pub exid: Option<String>,
    pub max_duration: Option<String>,
}

/// Configure a key.
pub async fn set(settings: &Settings, args: SetArgs) -> Result<()> {
    let env = args.env.require_concrete()?;
    let cwd = std::env::current_dir()?;
    let repo = RepoManifest::find(&cwd)?;
    let org = match &args.org {
        Some(raw) => raw.parse::<OrgSelector>()?,
        None => OrgSelector::This,
    }
    .resolve(repo.as_ref().map(RepoManifest::org))?;

    let spec = HostSpec {
        slug: Slug::new(org, env, args.key.as_str())?,
        mechanism: args.mechanism,
        vault: args.vault,
        exid: args.exid,
        vault_recipient: None,
        max_duration: args.max_duration,
    };
    spec.validate()?;
    let slug = spec.slug.clone();

    let store = HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone());
    let mut manifest = store.load()?;
    let mut table = open(settings, &manifest)?;
    let secret = if args.vault.stores_secret() {
        Some(read_secret(&slug)?)
    } else {
        None
    };

    let effect = table.set(spec, Utc::now())?;
    manifest.seal(&table)?;
    store.save(&manifest)?;
    info!(slug = %slug, effect = %effect, "host config written");

    if let Some(secret) = secret {
        VaultRegistry::standard(settings, manifest.recipients())
            .get(args.vault)?
            .store(&slug, &secret)?;
        output::success(&format!(
            "{} {} (secret stored in {})",
            output::slug(&slug.to_string()),
            effect,
            args.vault
        ));
    } else {
        output::success(&format!("{} {}", output::slug(&slug.to_string()), effect));
    }

    if effect != Effect::Found || args.vault.stores_secret() {
        evict(settings, &slug).await?;
    }
    Ok(())
}

/// Remove a key configuration and any secret stored for it.
pub async fn del(settings: &Settings, key: &str) -> Result<()> {
    let slug: Slug = key.parse()?;

    let store = HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone());
    let mut manifest = store.load()?;
    let mut table = open(settings, &manifest)?;

    let removed = table.remove(&slug)?;
    manifest.seal(&table)?;
    store.save(&manifest)?;

    let vaults = VaultRegistry::standard(settings, manifest.recipients());
    let had_secret = vaults.get(removed.vault)?.remove(&slug)?;
    info!(slug = %slug, had_secret, "host config removed");
    evict(settings, &slug).await?;

    output::success(&format!("{} removed", output::slug(&slug.to_string())));
    Ok(())
}

/// Drop any grant the session daemon cached under the old config. Never
/// spawns a daemon.
async fn evict(settings: &Settings, slug: &Slug) -> Result<()> {
    let resolver = session::default_resolver();
    if let Some(daemon) = settings.registry(resolver.as_ref())?.find().await {
        let relocked = daemon.relock(Some(vec![slug.to_string()]), None).await?;
        debug!(slug = %slug, evicted = !relocked.is_empty(), "cached grant evicted");
    }
    Ok(())
}

fn open(settings: &Settings, manifest: &HostManifest) -> Result<HostTable> {
    if !manifest.is_sealed() {
        return Ok(HostTable::default());
    }
    let identity = identity::resolve(settings.prikey(), &manifest.recipient_keys()?)?;
    manifest.open(&identity)
}

fn read_secret(slug: &Slug) -> Result<Zeroizing<String>> {
    let value = if io::stdin().is_terminal() {
        Zeroizing::new(
            Password::new()
                .with_prompt(format!("Secret for {}", output::slug(&slug.to_string())))
                .interact()?,
        )
    } else {
        let mut input = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut input)?;
        Zeroizing::new(input.trim_end_matches(['\r', '\n']).to_string())
    };

    if value.is_empty() {
        return Err(VaultError::EmptySecret(slug.to_string()).into());
    }
    Ok(value)
}
