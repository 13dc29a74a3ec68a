//! Unlock and relock flows.
//!
//! Unlock resolves keys through their vault's interactive path and pushes
//! the resulting grants into the daemon. Relock purges them again.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use super::resolve::{self, GrantRequest, Target, Wanted};
use super::{firewall, GrantEngine};
use crate::core::daemon::DaemonClient;
use crate::core::domain::{Attempt, Env, KeyGrant, KeyHostConfig, Slug, ORG_ALL, ORG_THIS};
use crate::core::manifest::RepoManifest;
use crate::core::ttl;
use crate::core::vault::{UnlockContext, VaultOutcome};
use crate::error::Result;

/// An unlock request.
#[derive(Debug, Clone, Default)]
pub struct UnlockRequest {
    /// Slug or raw name; every matching configured key when absent.
    pub key: Option<String>,
    pub env: Option<Env>,
    pub org: Option<String>,
    /// Requested lifetime; capped by each key's `max_duration`.
    pub duration: Option<Duration>,
    pub allow_dangerous: bool,
}

impl GrantEngine {
    /// Unlock keys and cache the grants in `daemon`.
    ///
    /// Bulk unlocks (no `key`) skip `sudo` keys unless `env` is `sudo`.
    /// An unconfigured `sudo` key is unlocked from the caller's env var.
    pub async fn unlock(&mut self, req: &UnlockRequest, daemon: &DaemonClient) -> Result<Vec<Attempt>> {
        let (configs, mut attempts) = self.unlock_targets(req)?;
        debug!(keys = configs.len(), "unlocking");

        let identity = self.hosts.open()?.identity.as_ref();
        let ctx = UnlockContext { identity };
        let now = Utc::now();

        let mut grants: Vec<KeyGrant> = Vec::new();
        for config in &configs {
            let slug = config.slug.to_string();

            let reasons = firewall::mechanism_reasons(config.mechanism);
            if !reasons.is_empty() && !req.allow_dangerous {
                attempts.push(Attempt::Blocked { slug, reasons });
                continue;
            }

            let adapter = self.vaults.get(config.vault)?;
            let outcome = adapter.unlock(config, ctx).await.unwrap_or_else(|e| {
                warn!(slug = %config.slug, error = %e, "vault unlock failed");
                VaultOutcome::invalid(e.to_string())
            });
            let attempt = match outcome {
                VaultOutcome::Granted(grant) => {
                    let lifetime = lifetime(config, req.duration)?;
                    let expires_at = chrono::Duration::from_std(lifetime)
                        .ok()
                        .and_then(|d| now.checked_add_signed(d));
                    let grant = match expires_at {
                        Some(at) => grant.with_expiry(at),
                        None => grant,
                    };
                    firewall::screen(grant, req.allow_dangerous)
                }
                VaultOutcome::RequiresUnlock => Attempt::Locked {
                    fix: format!(
                        "complete the {} login, then rerun: {}",
                        config.vault,
                        resolve::unlock_fix(&config.slug, &self.owner)
                    ),
                    slug,
                },
                VaultOutcome::Invalid { message } => Attempt::Invalid { slug, message },
            };

            if let Some(grant) = attempt.grant() {
                grants.push(grant.clone());
            }
            attempts.push(attempt);
        }

        if !grants.is_empty() {
            let unlocked = daemon.unlock(grants, req.duration).await?;
            debug!(unlocked = unlocked.len(), "grants cached");
        }
        Ok(attempts)
    }

    /// Configs to unlock, plus `absent` attempts for keys that are not
    /// configured.
    fn unlock_targets(&mut self, req: &UnlockRequest) -> Result<(Vec<KeyHostConfig>, Vec<Attempt>)> {
        let repo = self.repo.clone();
        let owner = self.owner.clone();
        let table = &self.hosts.open()?.table;
        let mut configs = Vec::new();
        let mut absent = Vec::new();

        match &req.key {
            Some(key) => {
                let grant_req = GrantRequest {
                    target: Target::Key(key.clone()),
                    env: req.env,
                    org: req.org.clone(),
                    allow_dangerous: req.allow_dangerous,
                };
                for wanted in resolve::wanted(&grant_req, repo.as_ref())? {
                    match wanted {
                        Wanted::Exact(slug) => match resolve::lookup(table, &slug)
                            .cloned()
                            .or_else(|| resolve::sudo_config(&slug))
                        {
                            Some(config) => configs.push(config),
                            None => absent.push(Attempt::Absent {
                                slug: slug.to_string(),
                                fix: resolve::set_fix(slug.name(), slug.env(), Some(slug.org()), &owner),
                            }),
                        },
                        Wanted::Search { name, env, org } => {
                            let org = org.as_deref();
                            match resolve::search(table, &name, env, org).as_slice() {
                                [config] => configs.push((*config).clone()),
                                [] => absent.push(Attempt::Absent {
                                    slug: resolve::search_label(&name, env, org),
                                    fix: resolve::set_fix(&name, env, org, &owner),
                                }),
                                many => absent.push(Attempt::Absent {
                                    slug: resolve::search_label(&name, env, org),
                                    fix: resolve::ambiguous_fix(&name, many),
                                }),
                            }
                        }
                    }
                }
            }
            None => {
                let env = req.env.unwrap_or(Env::All);
                let bulk = |stored: Env| env.selects(stored) && (stored != Env::Sudo || env == Env::Sudo);

                match (&repo, &req.org) {
                    (Some(repo), None) => {
                        for slug in repo.slugs(env)?.into_iter().filter(|s| bulk(s.env())) {
                            match resolve::lookup(table, &slug)
                                .cloned()
                                .or_else(|| resolve::sudo_config(&slug))
                            {
                                Some(config) => configs.push(config),
                                None => absent.push(Attempt::Absent {
                                    fix: resolve::set_fix(slug.name(), slug.env(), Some(slug.org()), &owner),
                                    slug: slug.to_string(),
                                }),
                            }
                        }
                    }
                    _ => {
                        let org = resolve::org_context(req.org.as_deref(), repo.as_ref())?;
                        configs.extend(
                            table
                                .iter()
                                .filter(|c| bulk(c.env))
                                .filter(|c| org.as_deref().map_or(true, |o| c.org == o || c.org == ORG_ALL))
                                .cloned(),
                        );
                    }
                }
            }
        }

        Ok((configs, absent))
    }

    /// Purge grants from the daemon and end any vault sessions behind them.
    ///
    /// With a `key`, only matching slugs are purged; otherwise everything
    /// selected by `env` (or everything).
    pub async fn relock(
        &self,
        key: Option<&str>,
        env: Option<Env>,
        daemon: &DaemonClient,
    ) -> Result<Vec<String>> {
        let status = daemon.status().await?;

        let selected: Vec<String> = status
            .iter()
            .filter(|entry| env.map_or(true, |e| e.selects(entry.env)))
            .filter(|entry| match key {
                None => true,
                Some(k) if Slug::is_qualified(k) => entry.slug == expand(k, self.repo.as_ref()),
                Some(k) => entry.slug.splitn(3, '.').nth(2) == Some(k),
            })
            .map(|entry| entry.slug.clone())
            .collect();

        if selected.is_empty() {
            return Ok(Vec::new());
        }

        let grants = daemon.get(&selected).await?;
        let relocked = match key {
            Some(_) => daemon.relock(Some(selected), None).await?,
            None => daemon.relock(None, env).await?,
        };

        for grant in grants.iter().filter(|g| relocked.contains(&g.slug.to_string())) {
            let adapter = self.vaults.get(grant.source.vault)?;
            if let Err(e) = adapter.relock(grant).await {
                warn!(slug = %grant.slug, error = %e, "vault relock failed");
            }
        }
        Ok(relocked)
    }
}

/// Unlock lifetime for `config`: requested or env default, capped by the
/// configured maximum.
fn lifetime(config: &KeyHostConfig, requested: Option<Duration>) -> Result<Duration> {
    let wanted = requested.unwrap_or_else(|| ttl::default_for(config.env));
    Ok(match config.max_duration()? {
        Some(max) if max < wanted => max,
        _ => wanted,
    })
}

/// `@this.<env>.<name>` with the repo org substituted.
fn expand(key: &str, repo: Option<&RepoManifest>) -> String {
    match (key.split_once('.'), repo) {
        (Some((ORG_THIS, rest)), Some(repo)) => format!("{}.{}", repo.org(), rest),
        _ => key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{HostSpec, VaultKind};

    fn config(slug: &str, max: Option<&str>) -> KeyHostConfig {
        HostSpec {
            slug: slug.parse().unwrap(),
            mechanism: None,
            vault: VaultKind::OsDirect,
            exid: None,
            vault_recipient: None,
            max_duration: max.map(str::to_string),
        }
        .into_config(Utc::now())
    }

    #[test]
    fn test_lifetime_defaults_and_caps() {
        let prod = config("acme.prod.A", None);
        assert_eq!(lifetime(&prod, None).unwrap(), Duration::from_secs(9 * 3600));

        let sudo = config("acme.sudo.A", None);
        assert_eq!(lifetime(&sudo, None).unwrap(), Duration::from_secs(30 * 60));

        let capped = config("acme.prod.A", Some("1h"));
        assert_eq!(
            lifetime(&capped, Some(Duration::from_secs(12 * 3600))).unwrap(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            lifetime(&capped, Some(Duration::from_secs(60))).unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_expand_this() {
        let repo = RepoManifest::parse("org = \"acme\"\n").unwrap();
        assert_eq!(expand("@this.prod.A", Some(&repo)), "acme.prod.A");
        assert_eq!(expand("globex.prod.A", Some(&repo)), "globex.prod.A");
    }
}
