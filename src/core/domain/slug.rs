//! Slug type.
//!
//! A slug is the canonical key identifier `{org}.{env}.{name}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Org token that resolves to the org declared in the repo manifest.
pub const ORG_THIS: &str = "@this";

/// Org token for host-wide, organization-agnostic keys.
pub const ORG_ALL: &str = "@all";

/// Deployment env a key belongs to.
///
/// `All` is a fan-out selector: it matches every concrete env and is never
/// used as a storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Sudo,
    Prod,
    Prep,
    Test,
    All,
}

impl Env {
    /// Every env that can hold keys.
    pub const CONCRETE: [Env; 4] = [Env::Sudo, Env::Prod, Env::Prep, Env::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sudo => "sudo",
            Self::Prod => "prod",
            Self::Prep => "prep",
            Self::Test => "test",
            Self::All => "all",
        }
    }

    /// Whether this env can hold keys (everything but `all`).
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::All)
    }

    /// Whether a key stored under `stored` is selected by this env.
    pub fn selects(&self, stored: Env) -> bool {
        match self {
            Self::All => true,
            env => *env == stored,
        }
    }

    /// Reject the `all` selector where a concrete env is required.
    pub fn require_concrete(self) -> Result<Self> {
        if self.is_concrete() {
            Ok(self)
        } else {
            Err(ConfigError::EnvNotConcrete.into())
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Env {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sudo" => Ok(Self::Sudo),
            "prod" => Ok(Self::Prod),
            "prep" => Ok(Self::Prep),
            "test" => Ok(Self::Test),
            "all" => Ok(Self::All),
            other => Err(ConfigError::InvalidEnv(other.to_string()).into()),
        }
    }
}

/// Org as written by a caller, before `@this` is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgSelector {
    Named(String),
    This,
    All,
}

impl OrgSelector {
    /// Resolve to a concrete org string (`@all` stays literal).
    ///
    /// `repo_org` is the org declared in the repo manifest, if one is loaded.
    pub fn resolve(&self, repo_org: Option<&str>) -> Result<String> {
        match self {
            Self::All => Ok(ORG_ALL.to_string()),
            Self::This => repo_org
                .map(str::to_string)
                .ok_or_else(|| ConfigError::NoRepoOrg.into()),
            Self::Named(name) => Ok(name.clone()),
        }
    }
}

impl FromStr for OrgSelector {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ORG_THIS => Ok(Self::This),
            ORG_ALL => Ok(Self::All),
            name => {
                validate_org(name)?;
                Ok(Self::Named(name.to_string()))
            }
        }
    }
}

/// Canonical key identifier: `{org}.{env}.{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug {
    org: String,
    env: Env,
    name: String,
}

impl Slug {
    /// Build a slug from resolved parts.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSlug` if the org or name is malformed.
    pub fn new(org: impl Into<String>, env: Env, name: impl Into<String>) -> Result<Self> {
        let org = org.into();
        let name = name.into();
        if org != ORG_ALL {
            validate_org(&org)?;
        }
        validate_name(&name)?;
        Ok(Self { org, env, name })
    }

    /// Whether `s` has the `{org}.{env}.{name}` shape.
    pub fn is_qualified(s: &str) -> bool {
        let mut parts = s.splitn(3, '.');
        matches!(
            (parts.next(), parts.next().map(Env::from_str), parts.next()),
            (Some(org), Some(Ok(_)), Some(name)) if !org.is_empty() && !name.is_empty()
        )
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn env(&self) -> Env {
        self.env
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.org, self.env, self.name)
    }
}

impl FromStr for Slug {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| ConfigError::InvalidSlug {
            slug: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.splitn(3, '.');
        let (Some(org), Some(env), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected {org}.{env}.{name}").into());
        };
        let env = env
            .parse::<Env>()
            .map_err(|_| invalid("env must be one of sudo, prod, prep, test, all"))?;

        Self::new(org, env, name)
    }
}

impl TryFrom<String> for Slug {
    type Error = crate::error::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.to_string()
    }
}

fn validate_org(org: &str) -> Result<()> {
    let ok = !org.is_empty()
        && org
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidSlug {
            slug: org.to_string(),
            reason: "org may only contain letters, digits, '-' and '_'".to_string(),
        }
        .into())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::InvalidSlug {
            slug: name.to_string(),
            reason: "key name cannot be empty".to_string(),
        }
        .into());
    }

    if let Some((i, ch)) = name
        .chars()
        .enumerate()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(ConfigError::InvalidSlug {
            slug: name.to_string(),
            reason: format!("invalid character '{}' at position {}", ch, i + 1),
        }
        .into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_display() {
        let slug: Slug = "acme.prod.AWS_PROFILE".parse().unwrap();
        assert_eq!(slug.org(), "acme");
        assert_eq!(slug.env(), Env::Prod);
        assert_eq!(slug.name(), "AWS_PROFILE");
        assert_eq!(slug.to_string(), "acme.prod.AWS_PROFILE");
    }

    #[test]
    fn test_name_may_contain_dots() {
        let slug: Slug = "@all.test.db.url".parse().unwrap();
        assert_eq!(slug.org(), ORG_ALL);
        assert_eq!(slug.name(), "db.url");
    }

    #[test]
    fn test_rejects_bad_env() {
        assert!("acme.staging.KEY".parse::<Slug>().is_err());
        assert!("acme.KEY".parse::<Slug>().is_err());
        assert!("acme.prod.".parse::<Slug>().is_err());
    }

    #[test]
    fn test_is_qualified() {
        assert!(Slug::is_qualified("acme.prod.KEY"));
        assert!(!Slug::is_qualified("KEY"));
        assert!(!Slug::is_qualified("acme.KEY"));
        assert!(!Slug::is_qualified("acme.nope.KEY"));
    }

    #[test]
    fn test_env_selects() {
        assert!(Env::All.selects(Env::Prod));
        assert!(Env::Prep.selects(Env::Prep));
        assert!(!Env::Prep.selects(Env::Prod));
        assert!(Env::All.require_concrete().is_err());
    }

    #[test]
    fn test_org_selector() {
        let this: OrgSelector = "@this".parse().unwrap();
        assert_eq!(this.resolve(Some("acme")).unwrap(), "acme");
        assert!(this.resolve(None).is_err());

        let all: OrgSelector = "@all".parse().unwrap();
        assert_eq!(all.resolve(None).unwrap(), "@all");

        assert!("bad.org".parse::<OrgSelector>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let slug: Slug = "acme.prep.TOKEN".parse().unwrap();
        let json = serde_json::to_string(&slug).unwrap();
        assert_eq!(json, "\"acme.prep.TOKEN\"");
        let back: Slug = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slug);
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(
            org in "[a-z][a-z0-9_-]{0,12}",
            env in prop::sample::select(vec![Env::Sudo, Env::Prod, Env::Prep, Env::Test]),
            name in "[A-Z][A-Z0-9_.]{0,20}",
        ) {
            let slug = Slug::new(org, env, name).unwrap();
            let parsed: Slug = slug.to_string().parse().unwrap();
            prop_assert_eq!(parsed, slug);
        }
    }
}
