//! Turning a request into slugs.
//!
//! Whatever can be resolved without the host table becomes an exact slug
//! (and can be answered from the daemon cache); the rest is a search that
//! needs the decrypted host table.

use chrono::Utc;

use crate::core::domain::{
    Env, HostSpec, KeyHostConfig, Owner, OrgSelector, Slug, VaultKind, ORG_ALL, ORG_THIS,
};
use crate::core::manifest::{HostTable, RepoManifest};
use crate::error::{ConfigError, ManifestError, Result};

/// What a grant request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A slug or raw key name.
    Key(String),
    /// Every key the repo manifest declares.
    Repo,
}

/// A grant request.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub target: Target,
    pub env: Option<Env>,
    /// Literal org, `@this` or `@all`. Defaults to the repo org.
    pub org: Option<String>,
    pub allow_dangerous: bool,
}

impl GrantRequest {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            target: Target::Key(key.into()),
            env: None,
            org: None,
            allow_dangerous: false,
        }
    }

    pub fn repo() -> Self {
        Self {
            target: Target::Repo,
            env: None,
            org: None,
            allow_dangerous: false,
        }
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    pub fn allow_dangerous(mut self, allow: bool) -> Self {
        self.allow_dangerous = allow;
        self
    }
}

/// One requested key, as far as it can be resolved without the host table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Wanted {
    Exact(Slug),
    Search {
        name: String,
        env: Env,
        org: Option<String>,
    },
}

/// Resolve the org context: explicit flag, else the repo org, else none.
pub(crate) fn org_context(org: Option<&str>, repo: Option<&RepoManifest>) -> Result<Option<String>> {
    let repo_org = repo.map(RepoManifest::org);
    match org {
        Some(raw) => Ok(Some(raw.parse::<OrgSelector>()?.resolve(repo_org)?)),
        None => Ok(repo_org.map(str::to_string)),
    }
}

pub(crate) fn wanted(req: &GrantRequest, repo: Option<&RepoManifest>) -> Result<Vec<Wanted>> {
    match &req.target {
        Target::Repo => {
            let repo = repo.ok_or_else(|| {
                ManifestError::InvalidRepo(
                    "no keyrack.toml in the current directory (needed for --repo)".to_string(),
                )
            })?;
            if let Some(requested) = org_context(req.org.as_deref(), Some(repo))? {
                if requested != repo.org() {
                    return Err(ConfigError::OrgMismatch {
                        requested,
                        declared: repo.org().to_string(),
                    }
                    .into());
                }
            }
            let env = req.env.unwrap_or(Env::All);
            Ok(repo.slugs(env)?.into_iter().map(Wanted::Exact).collect())
        }
        Target::Key(raw) => Ok(vec![wanted_key(raw, req, repo)?]),
    }
}

fn wanted_key(raw: &str, req: &GrantRequest, repo: Option<&RepoManifest>) -> Result<Wanted> {
    if Slug::is_qualified(raw) {
        let slug = expand_this(raw, repo)?.parse::<Slug>()?;
        return Ok(if slug.env().is_concrete() {
            Wanted::Exact(slug)
        } else {
            Wanted::Search {
                name: slug.name().to_string(),
                env: Env::All,
                org: Some(slug.org().to_string()),
            }
        });
    }

    // validates the name before anything else happens
    Slug::new(ORG_ALL, Env::All, raw)?;

    let env = req.env.unwrap_or(Env::All);
    let org = org_context(req.org.as_deref(), repo)?;
    Ok(match (&org, env.is_concrete()) {
        (Some(org), true) => Wanted::Exact(Slug::new(org.as_str(), env, raw)?),
        _ => Wanted::Search {
            name: raw.to_string(),
            env,
            org,
        },
    })
}

fn expand_this(raw: &str, repo: Option<&RepoManifest>) -> Result<String> {
    match raw.split_once('.') {
        Some((ORG_THIS, rest)) => {
            let org = repo.ok_or(ConfigError::NoRepoOrg)?.org();
            Ok(format!("{}.{}", org, rest))
        }
        _ => Ok(raw.to_string()),
    }
}

/// Config for an exact slug, falling back to the host-wide `@all` org.
pub(crate) fn lookup<'a>(table: &'a HostTable, slug: &Slug) -> Option<&'a KeyHostConfig> {
    table.get(slug).or_else(|| {
        Slug::new(ORG_ALL, slug.env(), slug.name())
            .ok()
            .and_then(|all| table.get(&all))
    })
}

/// Implicit config for an unconfigured `sudo` key: the value comes from the
/// caller's env var of the same name. `None` for every other env.
pub(crate) fn sudo_config(slug: &Slug) -> Option<KeyHostConfig> {
    if slug.env() != Env::Sudo {
        return None;
    }
    let spec = HostSpec {
        slug: slug.clone(),
        mechanism: None,
        vault: VaultKind::OsEnvvar,
        exid: None,
        vault_recipient: None,
        max_duration: None,
    };
    Some(spec.into_config(Utc::now()))
}

/// Configs matching a search. Org-specific configs shadow `@all` ones for
/// the same env.
pub(crate) fn search<'a>(
    table: &'a HostTable,
    name: &str,
    env: Env,
    org: Option<&str>,
) -> Vec<&'a KeyHostConfig> {
    let candidates: Vec<&KeyHostConfig> = table
        .iter()
        .filter(|c| c.slug.name() == name && env.selects(c.env))
        .filter(|c| org.map_or(true, |o| c.org == o || c.org == ORG_ALL))
        .collect();

    candidates
        .iter()
        .copied()
        .filter(|c| {
            c.org != ORG_ALL
                || org.is_none()
                || !candidates
                    .iter()
                    .any(|other| other.org != ORG_ALL && other.env == c.env)
        })
        .collect()
}

/// Display form of a search, e.g. `acme.all.API_KEY` or `*.prod.API_KEY`.
pub(crate) fn search_label(name: &str, env: Env, org: Option<&str>) -> String {
    format!("{}.{}.{}", org.unwrap_or("*"), env, name)
}

/// `keyrack set` command that would configure the missing key.
pub(crate) fn set_fix(name: &str, env: Env, org: Option<&str>, owner: &Owner) -> String {
    let vault = VaultKind::infer_for(name);
    let env = if env.is_concrete() {
        env.to_string()
    } else {
        "<sudo|prod|prep|test>".to_string()
    };
    let org = org.map(|o| format!(" --org {}", o)).unwrap_or_default();
    let exid = match vault.exid_hint() {
        Some(_) if vault == VaultKind::AwsIamSso => " --exid <profile>",
        Some(_) => " --exid <ref>",
        None => "",
    };
    format!(
        "keyrack set --key {} --env {}{} --vault {}{}{}",
        name,
        env,
        org,
        vault,
        exid,
        owner.flag()
    )
}

/// `keyrack unlock` command for a locked key.
pub(crate) fn unlock_fix(slug: &Slug, owner: &Owner) -> String {
    format!(
        "keyrack unlock --env {} --key {}{}",
        slug.env(),
        slug,
        owner.flag()
    )
}

/// Fix for an unconfigured `sudo` key whose env var is unset.
pub(crate) fn sudo_fix(slug: &Slug, owner: &Owner) -> String {
    format!(
        "export {} in this shell, then run: {}",
        slug.name(),
        unlock_fix(slug, owner)
    )
}

/// Hint for a raw name configured under several slugs.
pub(crate) fn ambiguous_fix(name: &str, matches: &[&KeyHostConfig]) -> String {
    let slugs: Vec<String> = matches.iter().map(|c| c.slug.to_string()).collect();
    let example = matches
        .first()
        .map(|c| c.env.to_string())
        .unwrap_or_else(|| "prod".to_string());
    format!(
        "ambiguous: {} is configured as {}; pass --env (e.g. --key {} --env {}) or the full slug",
        name,
        slugs.join(", "),
        name,
        example
    )
}
