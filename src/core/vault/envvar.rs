//! `os.envvar`: passthrough from the process environment.

use async_trait::async_trait;

use super::{grant_for, UnlockContext, VaultAdapter, VaultOutcome};
use crate::core::domain::{KeyHostConfig, VaultKind};
use crate::error::{Result, VaultError};

/// Reads the env var named after the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVarVault;

#[async_trait]
impl VaultAdapter for EnvVarVault {
    fn kind(&self) -> VaultKind {
        VaultKind::OsEnvvar
    }

    async fn get(&self, config: &KeyHostConfig) -> Result<VaultOutcome> {
        let name = config.slug.name();
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(VaultOutcome::Granted(grant_for(config, value))),
            _ => Ok(VaultOutcome::invalid(
                VaultError::EnvVarMissing(name.to_string()).to_string(),
            )),
        }
    }

    async fn unlock(&self, config: &KeyHostConfig, _ctx: UnlockContext<'_>) -> Result<VaultOutcome> {
        self.get(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{HostSpec, Mechanism};
    use chrono::Utc;

    fn config(name: &str) -> KeyHostConfig {
        HostSpec {
            slug: format!("acme.test.{}", name).parse().unwrap(),
            mechanism: None,
            vault: VaultKind::OsEnvvar,
            exid: None,
            vault_recipient: None,
            max_duration: None,
        }
        .into_config(Utc::now())
    }

    #[tokio::test]
    async fn test_reads_process_env() {
        // PATH is always present in the test environment
        let outcome = EnvVarVault.get(&config("PATH")).await.unwrap();
        match outcome {
            VaultOutcome::Granted(grant) => {
                assert!(!grant.key.secret().is_empty());
                assert_eq!(grant.source.mechanism, Mechanism::PermanentViaReplica);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_var_is_invalid() {
        let outcome = EnvVarVault
            .get(&config("KEYRACK_TEST_SURELY_UNSET_VAR"))
            .await
            .unwrap();
        assert!(matches!(outcome, VaultOutcome::Invalid { .. }));
    }
}
