//! Command-line interface.

pub mod completions;
pub mod daemon;
pub mod get;
pub mod init;
pub mod output;
pub mod recipient;
pub mod relock;
pub mod set;
pub mod status;
pub mod unlock;

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::core::config::Settings;
use crate::core::constants::env;
use crate::core::domain::{Env, Mechanism, VaultKind};
use crate::core::engine::GrantRequest;
use crate::error::Result;

/// Keyrack - unlock once, grant everywhere.
#[derive(Parser)]
#[command(
    name = "keyrack",
    about = "Session-scoped credential broker: declare keys per repo, unlock once per login session",
    version
)]
pub struct Cli {
    /// Owner namespace (isolated manifests, vaults and daemon)
    #[arg(long, global = true, env = env::OWNER)]
    pub owner: Option<String>,

    /// Private key used to decrypt the host manifest
    #[arg(long, global = true, env = env::PRIKEY)]
    pub prikey: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create the host manifest for this owner
    Init {
        /// ssh-ed25519 or age public key (path or literal); defaults to ~/.ssh/id_ed25519.pub
        #[arg(long)]
        pubkey: Option<String>,
        /// Recipient label (defaults to your username)
        #[arg(long)]
        label: Option<String>,
    },

    /// Manage who can decrypt the host manifest
    Recipient {
        #[command(subcommand)]
        action: RecipientAction,
    },

    /// Configure how a key is obtained on this host
    Set {
        /// Raw key name (e.g. STRIPE_KEY)
        #[arg(long)]
        key: String,
        /// Storage env: sudo, prod, prep or test
        #[arg(long)]
        env: Env,
        /// Org (literal, @this or @all); defaults to the repo org
        #[arg(long)]
        org: Option<String>,
        /// Vault: os.envvar, os.direct, os.secure, aws.iam.sso, 1password
        #[arg(long)]
        vault: VaultKind,
        /// Grant mechanism (defaults per vault)
        #[arg(long)]
        mechanism: Option<Mechanism>,
        /// External id: aws profile or op:// reference
        #[arg(long)]
        exid: Option<String>,
        /// Upper bound on unlock lifetime (e.g. 1h)
        #[arg(long)]
        max_duration: Option<String>,
    },

    /// Remove a key configuration
    Del {
        /// Full slug (org.env.name)
        #[arg(long)]
        key: String,
    },

    /// Resolve keys and print their values or how to obtain them
    #[command(group(ArgGroup::new("target").required(true).args(["key", "repo"])))]
    Get {
        /// Slug or raw key name
        #[arg(long)]
        key: Option<String>,
        /// Every key declared in ./keyrack.toml
        #[arg(long)]
        repo: bool,
        /// Env selector: sudo, prod, prep, test or all
        #[arg(long)]
        env: Option<Env>,
        /// Org (literal, @this or @all)
        #[arg(long)]
        org: Option<String>,
        /// Grant long-lived credentials the firewall would block
        #[arg(long)]
        allow_dangerous: bool,
        /// Print the attempts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Unlock keys into this login session's daemon
    Unlock {
        /// Slug or raw key name; every configured key when omitted
        #[arg(long)]
        key: Option<String>,
        /// Env selector: sudo, prod, prep, test or all
        #[arg(long)]
        env: Option<Env>,
        /// Org (literal, @this or @all)
        #[arg(long)]
        org: Option<String>,
        /// Grant lifetime (e.g. 30m, 9h)
        #[arg(long)]
        duration: Option<String>,
        /// Unlock long-lived credentials the firewall would block
        #[arg(long)]
        allow_dangerous: bool,
    },

    /// Purge keys from this login session's daemon
    Relock {
        /// Slug or raw key name; everything when omitted
        #[arg(long)]
        key: Option<String>,
        /// Only keys in this env
        #[arg(long)]
        env: Option<Env>,
    },

    /// List keys cached in this login session
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stop this login session's daemon
    Kill,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Daemon entry point
    #[command(hide = true)]
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

/// Recipient subcommands.
#[derive(Subcommand)]
pub enum RecipientAction {
    /// Add or replace a recipient
    Set {
        #[arg(long)]
        label: String,
        /// ssh-ed25519 or age public key (path or literal)
        #[arg(long)]
        pubkey: String,
    },

    /// Remove a recipient
    Del {
        #[arg(long)]
        label: String,
    },

    /// List recipients
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Daemon subcommands.
#[derive(Subcommand)]
pub enum DaemonAction {
    /// Serve in the foreground
    Serve,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Execute a command, returning the process exit code.
pub async fn execute(cli: Cli) -> Result<i32> {
    use Command::*;

    if let Completions { shell } = &cli.command {
        completions::execute(shell.clone())?;
        return Ok(0);
    }

    let settings = Settings::resolve(cli.owner.as_deref(), cli.prikey)?;

    match cli.command {
        Init { pubkey, label } => init::execute(&settings, pubkey.as_deref(), label).map(|_| 0),
        Recipient { action } => {
            match action {
                RecipientAction::Set { label, pubkey } => recipient::set(&settings, &label, &pubkey)?,
                RecipientAction::Del { label } => recipient::del(&settings, &label)?,
                RecipientAction::List { json } => recipient::list(&settings, json)?,
            }
            Ok(0)
        }
        Set {
            key,
            env,
            org,
            vault,
            mechanism,
            exid,
            max_duration,
        } => set::set(
            &settings,
            set::SetArgs {
                key,
                env,
                org,
                vault,
                mechanism,
                exid,
                max_duration,
            },
        )
        .await
        .map(|_| 0),
        Del { key } => set::del(&settings, &key).await.map(|_| 0),
        Get {
            key,
            repo,
            env,
            org,
            allow_dangerous,
            json,
        } => {
            let mut req = match key {
                Some(key) if !repo => GrantRequest::key(key),
                _ => GrantRequest::repo(),
            };
            req.env = env;
            req.org = org;
            req.allow_dangerous = allow_dangerous;
            get::execute(&settings, &req, json).await
        }
        Unlock {
            key,
            env,
            org,
            duration,
            allow_dangerous,
        } => {
            unlock::execute(
                &settings,
                key,
                env,
                org,
                duration.as_deref(),
                allow_dangerous,
            )
            .await
        }
        Relock { key, env } => relock::execute(&settings, key.as_deref(), env).await.map(|_| 0),
        Status { json } => status::execute(&settings, json).await.map(|_| 0),
        Kill => daemon::kill(&settings).await.map(|_| 0),
        Daemon {
            action: DaemonAction::Serve,
        } => daemon::serve(&settings).await.map(|_| 0),
        Completions { .. } => Ok(0),
    }
}
