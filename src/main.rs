//! Keyrack - a session-scoped credential broker.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keyrack::cli::output;
use keyrack::cli::{execute, Cli};
use keyrack::core::constants;
use keyrack::error::{DaemonError, Error, IdentityError, ManifestError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env(constants::env::LOG).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("keyrack=debug")
        } else {
            EnvFilter::new("keyrack=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .init();

    match execute(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            output::error(&e.to_string());
            if let Some(hint) = hint(&e) {
                output::hint(&hint);
            }
            std::process::exit(1);
        }
    }
}

fn hint(e: &Error) -> Option<String> {
    match e {
        Error::Manifest(ManifestError::NotInitialized { command, .. }) => Some(format!("run: {}", command)),
        Error::Identity(IdentityError::NotFound) => {
            Some("pass --prikey ~/.ssh/id_ed25519 (or set KEYRACK_PRIKEY)".to_string())
        }
        Error::Daemon(DaemonError::SpawnTimeout { .. }) => {
            Some("run `keyrack daemon serve` in the foreground to see why it fails".to_string())
        }
        Error::Daemon(DaemonError::AlreadyRunning(_)) => Some("run: keyrack kill".to_string()),
        _ => None,
    }
}
