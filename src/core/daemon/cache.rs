//! In-memory grant cache.
//!
//! Entries expire lazily: every read drops what has expired before
//! answering. All operations take `now` so expiry is deterministic in tests.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::protocol::StatusEntry;
use crate::core::domain::{Env, KeyGrant};
use crate::core::ttl;
use crate::error::{ConfigError, DaemonError, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
    grant: KeyGrant,
    expires_at: DateTime<Utc>,
}

/// Unlocked grants keyed by slug.
#[derive(Debug, Default)]
pub struct GrantCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl GrantCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store grants, replacing any existing entry for the same slug.
    /// A grant's `env` and `org` are taken from its slug.
    ///
    /// Each entry lives for `ttl` (or the env default) and never past the
    /// grant's own `expires_at`.
    ///
    /// # Errors
    ///
    /// Rejects the whole batch if any grant is for the `all` selector env.
    pub fn unlock(
        &mut self,
        grants: Vec<KeyGrant>,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        if grants.iter().any(|g| !g.slug.env().is_concrete()) {
            return Err(ConfigError::EnvNotConcrete.into());
        }

        let mut unlocked = Vec::with_capacity(grants.len());
        for mut grant in grants {
            let lifetime = ttl.unwrap_or_else(|| ttl::default_for(grant.slug.env()));
            let lifetime = chrono::Duration::from_std(lifetime)
                .map_err(|_| DaemonError::Rejected("ttl out of range".to_string()))?;
            let by_ttl = now
                .checked_add_signed(lifetime)
                .ok_or_else(|| DaemonError::Rejected("ttl out of range".to_string()))?;

            let expires_at = match grant.expires_at {
                Some(own) if own < by_ttl => own,
                _ => by_ttl,
            };
            grant.expires_at = Some(expires_at);
            grant.env = grant.slug.env();
            grant.org = grant.slug.org().to_string();

            let slug = grant.slug.to_string();
            self.entries.insert(slug.clone(), CacheEntry { grant, expires_at });
            unlocked.push(slug);
        }
        Ok(unlocked)
    }

    /// Unexpired grants for `slugs`; missing slugs are silently omitted.
    pub fn get(&mut self, slugs: &[String], now: DateTime<Utc>) -> Vec<KeyGrant> {
        self.purge(now);
        slugs
            .iter()
            .filter_map(|slug| self.entries.get(slug))
            .map(|entry| entry.grant.clone())
            .collect()
    }

    /// Every unexpired entry, without secrets.
    pub fn status(&mut self, now: DateTime<Utc>) -> Vec<StatusEntry> {
        self.purge(now);
        self.entries
            .iter()
            .map(|(slug, entry)| StatusEntry {
                slug: slug.clone(),
                env: entry.grant.env,
                org: entry.grant.org.clone(),
                source: entry.grant.source,
                expires_at: entry.expires_at,
                ttl_left_ms: (entry.expires_at - now).num_milliseconds().max(0) as u64,
            })
            .collect()
    }

    /// Remove entries by slug list, else by env, else everything.
    ///
    /// Expired entries are dropped first and never reported. Each slug is
    /// reported once.
    pub fn relock(
        &mut self,
        slugs: Option<&[String]>,
        env: Option<Env>,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        self.purge(now);
        match (slugs, env) {
            (Some(slugs), _) => slugs
                .iter()
                .filter(|slug| self.entries.remove(*slug).is_some())
                .cloned()
                .collect(),
            (None, Some(env)) => {
                let doomed: Vec<String> = self
                    .entries
                    .iter()
                    .filter(|(_, entry)| env.selects(entry.grant.env))
                    .map(|(slug, _)| slug.clone())
                    .collect();
                for slug in &doomed {
                    self.entries.remove(slug);
                }
                doomed
            }
            (None, None) => std::mem::take(&mut self.entries).into_keys().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| now < entry.expires_at);
    }
}
