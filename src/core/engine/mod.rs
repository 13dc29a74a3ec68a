//! Grant resolution engine.
//!
//! Every requested key ends in exactly one [`Attempt`]. The daemon cache is
//! consulted first so that cached grants never require decrypting the host
//! manifest; only misses open the host table and reach a vault adapter.

pub mod firewall;
mod resolve;
mod unlock;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub use resolve::{GrantRequest, Target};
pub use unlock::UnlockRequest;

use crate::core::config::Settings;
use crate::core::daemon::DaemonClient;
use crate::core::domain::{Attempt, Env, KeyGrant, KeyHostConfig, Owner, Slug};
use crate::core::identity::{self, IdentityMaterial};
use crate::core::manifest::{HostManifestStore, HostTable, RepoManifest};
use crate::core::vault::{VaultOutcome, VaultRegistry};
use crate::error::{DaemonError, Error, Result};

use resolve::Wanted;

/// Host table plus the identity that decrypted it.
struct Opened {
    table: HostTable,
    identity: Option<IdentityMaterial>,
}

/// Lazily decrypted host manifest.
struct HostSource {
    store: HostManifestStore,
    prikey: Option<PathBuf>,
    opened: Option<Opened>,
}

impl HostSource {
    fn open(&mut self) -> Result<&Opened> {
        let opened = match self.opened.take() {
            Some(opened) => opened,
            None => self.load()?,
        };
        Ok(self.opened.insert(opened))
    }

    fn load(&self) -> Result<Opened> {
        if !self.store.exists() {
            debug!("no host manifest, treating host table as empty");
            return Ok(Opened {
                table: HostTable::default(),
                identity: None,
            });
        }

        let manifest = self.store.load()?;
        if !manifest.is_sealed() {
            return Ok(Opened {
                table: HostTable::default(),
                identity: None,
            });
        }

        let identity = identity::resolve(self.prikey.as_deref(), &manifest.recipient_keys()?)?;
        let table = manifest.open(&identity)?;
        Ok(Opened {
            table,
            identity: Some(identity),
        })
    }
}

/// Resolves grant requests for one owner.
pub struct GrantEngine {
    hosts: HostSource,
    repo: Option<RepoManifest>,
    vaults: VaultRegistry,
    daemon: Option<DaemonClient>,
    owner: Owner,
}

impl GrantEngine {
    pub fn new(settings: &Settings, repo: Option<RepoManifest>, vaults: VaultRegistry) -> Self {
        Self {
            hosts: HostSource {
                store: HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone()),
                prikey: settings.prikey.clone(),
                opened: None,
            },
            repo,
            vaults,
            daemon: None,
            owner: settings.owner.clone(),
        }
    }

    /// Engine with the standard vaults and the repo manifest found in `cwd`.
    pub fn from_settings(settings: &Settings, cwd: &Path) -> Result<Self> {
        let store = HostManifestStore::new(settings.host_manifest_path(), settings.owner.clone());
        let recipients = if store.exists() {
            store.load()?.recipients().to_vec()
        } else {
            Vec::new()
        };
        let repo = RepoManifest::find(cwd)?;
        Ok(Self::new(
            settings,
            repo,
            VaultRegistry::standard(settings, &recipients),
        ))
    }

    /// Daemon to consult for cached grants. Without one every key is a miss.
    pub fn with_daemon(mut self, daemon: Option<DaemonClient>) -> Self {
        self.daemon = daemon;
        self
    }

    pub fn repo(&self) -> Option<&RepoManifest> {
        self.repo.as_ref()
    }

    /// Resolve every key a request names.
    pub async fn get(&mut self, req: &GrantRequest) -> Result<Vec<Attempt>> {
        let wanted = resolve::wanted(req, self.repo.as_ref())?;

        let exact: Vec<String> = wanted
            .iter()
            .filter_map(|w| match w {
                Wanted::Exact(slug) => Some(slug.to_string()),
                Wanted::Search { .. } => None,
            })
            .collect();
        let mut cached = self.cached(&exact).await?;
        debug!(requested = wanted.len(), cached = cached.len(), "resolving grants");

        let mut attempts = Vec::with_capacity(wanted.len());
        for w in wanted {
            let attempt = match w {
                Wanted::Exact(slug) => match cached.remove(&slug.to_string()) {
                    Some(grant) => firewall::screen(grant, req.allow_dangerous),
                    None => self.resolve_exact(&slug, req.allow_dangerous).await?,
                },
                Wanted::Search { name, env, org } => {
                    self.resolve_search(&name, env, org.as_deref(), req.allow_dangerous)
                        .await?
                }
            };
            debug!(slug = %attempt.slug(), status = attempt.status(), "resolved");
            attempts.push(attempt);
        }
        Ok(attempts)
    }

    async fn resolve_exact(&mut self, slug: &Slug, allow_dangerous: bool) -> Result<Attempt> {
        let config = resolve::lookup(&self.hosts.open()?.table, slug).cloned();
        match config {
            None => match resolve::sudo_config(slug) {
                Some(config) => Ok(match self.resolve_config(&config, false, allow_dangerous).await? {
                    Attempt::Invalid { slug: label, .. } => Attempt::Locked {
                        fix: resolve::sudo_fix(slug, &self.owner),
                        slug: label,
                    },
                    attempt => attempt,
                }),
                None => Ok(Attempt::Absent {
                    slug: slug.to_string(),
                    fix: resolve::set_fix(slug.name(), slug.env(), Some(slug.org()), &self.owner),
                }),
            },
            Some(config) => {
                let recheck = config.slug != *slug;
                self.resolve_config(&config, recheck, allow_dangerous).await
            }
        }
    }

    async fn resolve_search(
        &mut self,
        name: &str,
        env: Env,
        org: Option<&str>,
        allow_dangerous: bool,
    ) -> Result<Attempt> {
        let matches: Vec<KeyHostConfig> = resolve::search(&self.hosts.open()?.table, name, env, org)
            .into_iter()
            .cloned()
            .collect();

        match matches.as_slice() {
            [] => Ok(Attempt::Absent {
                slug: resolve::search_label(name, env, org),
                fix: resolve::set_fix(name, env, org, &self.owner),
            }),
            [config] => self.resolve_config(config, true, allow_dangerous).await,
            many => {
                let refs: Vec<&KeyHostConfig> = many.iter().collect();
                Ok(Attempt::Absent {
                    slug: resolve::search_label(name, env, org),
                    fix: resolve::ambiguous_fix(name, &refs),
                })
            }
        }
    }

    /// Firewall, then cache (when not already consulted), then the adapter.
    async fn resolve_config(
        &self,
        config: &KeyHostConfig,
        check_cache: bool,
        allow_dangerous: bool,
    ) -> Result<Attempt> {
        let slug = config.slug.to_string();

        let reasons = firewall::mechanism_reasons(config.mechanism);
        if !reasons.is_empty() && !allow_dangerous {
            return Ok(Attempt::Blocked { slug, reasons });
        }

        if check_cache {
            if let Some(grant) = self.cached(std::slice::from_ref(&slug)).await?.remove(&slug) {
                return Ok(firewall::screen(grant, allow_dangerous));
            }
        }

        let adapter = self.vaults.get(config.vault)?;
        let outcome = adapter.get(config).await.unwrap_or_else(|e| {
            warn!(slug = %slug, error = %e, "vault lookup failed");
            VaultOutcome::invalid(e.to_string())
        });
        Ok(match outcome {
            VaultOutcome::Granted(grant) => firewall::screen(grant, allow_dangerous),
            VaultOutcome::RequiresUnlock => Attempt::Locked {
                fix: resolve::unlock_fix(&config.slug, &self.owner),
                slug,
            },
            VaultOutcome::Invalid { message } => Attempt::Invalid { slug, message },
        })
    }

    /// Cached grants by slug. An unreachable daemon is an empty cache.
    async fn cached(&self, slugs: &[String]) -> Result<HashMap<String, KeyGrant>> {
        let Some(daemon) = &self.daemon else {
            return Ok(HashMap::new());
        };
        match daemon.get(slugs).await {
            Ok(grants) => Ok(grants
                .into_iter()
                .map(|g| (g.slug.to_string(), g))
                .collect()),
            Err(Error::Daemon(DaemonError::Unreachable(socket))) => {
                debug!(socket = %socket.display(), "daemon unreachable, treating as cache miss");
                Ok(HashMap::new())
            }
            Err(e) => Err(e),
        }
    }
}
