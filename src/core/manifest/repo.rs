//! Repo manifest (`keyrack.toml`).
//!
//! ```toml
//! org = "acme"
//!
//! [env]
//! prod = ["AWS_PROFILE", "STRIPE_KEY"]
//! prep = ["AWS_PROFILE"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::core::constants;
use crate::core::domain::{Env, OrgSelector, Slug};
use crate::error::{ManifestError, Result};

#[derive(Debug, Deserialize)]
struct RawRepoManifest {
    org: String,
    #[serde(default)]
    env: BTreeMap<String, Vec<String>>,
}

/// Keys a repository declares, per env.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoManifest {
    org: String,
    env: BTreeMap<Env, Vec<String>>,
}

impl RepoManifest {
    /// Load `keyrack.toml` from `dir`, if present.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidRepo` if the file exists but declares a
    /// non-concrete env, a reserved org or an unparsable key name.
    pub fn find(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(constants::REPO_MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading repo manifest");

        let contents = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&contents).map(Some)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let raw: RawRepoManifest = toml::from_str(contents)?;

        match raw.org.parse::<OrgSelector>() {
            Ok(OrgSelector::Named(_)) => {}
            _ => {
                return Err(ManifestError::InvalidRepo(format!(
                    "org '{}' must be a literal organization id",
                    raw.org
                ))
                .into())
            }
        }

        let mut env = BTreeMap::new();
        for (name, keys) in raw.env {
            let parsed: Env = name
                .parse()
                .map_err(|_| ManifestError::InvalidRepo(format!("unknown env '{}'", name)))?;
            if !parsed.is_concrete() {
                return Err(ManifestError::InvalidRepo(
                    "env 'all' cannot declare keys; list them under each env".to_string(),
                )
                .into());
            }
            for key in &keys {
                Slug::new(raw.org.as_str(), parsed, key.as_str())
                    .map_err(|e| ManifestError::InvalidRepo(e.to_string()))?;
            }
            env.insert(parsed, keys);
        }

        Ok(Self { org: raw.org, env })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Slugs declared for envs selected by `env`.
    pub fn slugs(&self, env: Env) -> Result<Vec<Slug>> {
        let mut out = Vec::new();
        for (declared, keys) in &self.env {
            if !env.selects(*declared) {
                continue;
            }
            for key in keys {
                out.push(Slug::new(self.org.as_str(), *declared, key.as_str())?);
            }
        }
        Ok(out)
    }
}
