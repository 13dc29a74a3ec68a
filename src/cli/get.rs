//! Get command - resolve keys into attempts.
//!
//! Never spawns the daemon: a daemon that is not running is a cache miss.

use tracing::debug;

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::domain::Attempt;
use crate::core::engine::{GrantEngine, GrantRequest};
use crate::core::session;
use crate::error::Result;

/// Exit code when at least one key was not granted.
pub const NOT_GRANTED: i32 = 2;

/// Resolve `req` and print the attempts.
///
/// Granted secrets go to stdout, one per line (bare when a single key was
/// requested, `slug=value` otherwise); everything else goes to stderr with
/// its fix.
pub async fn execute(settings: &Settings, req: &GrantRequest, json: bool) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let resolver = session::default_resolver();
    let daemon = settings.registry(resolver.as_ref())?.client();

    let mut engine = GrantEngine::from_settings(settings, &cwd)?.with_daemon(Some(daemon));
    let attempts = engine.get(req).await?;
    debug!(attempts = attempts.len(), "get finished");

    if json {
        output::data(&serde_json::to_string_pretty(&attempts)?);
    } else {
        print(&attempts);
    }

    Ok(if attempts.iter().all(Attempt::is_granted) {
        0
    } else {
        NOT_GRANTED
    })
}

fn print(attempts: &[Attempt]) {
    let bare = attempts.len() == 1;
    for attempt in attempts {
        match attempt {
            Attempt::Granted { grant } if bare => output::data(grant.key.secret()),
            Attempt::Granted { grant } => {
                output::data(&format!("{}={}", grant.slug, grant.key.secret()))
            }
            Attempt::Locked { slug, fix } | Attempt::Absent { slug, fix } => {
                eprintln!("{} {}", output::status(attempt.status()), output::slug(slug));
                output::hint(fix);
            }
            Attempt::Blocked { slug, reasons } => {
                eprintln!("{} {}", output::status(attempt.status()), output::slug(slug));
                for reason in reasons {
                    output::list_item(reason);
                }
                output::hint("pass --allow-dangerous to grant it anyway");
            }
            Attempt::Invalid { slug, message } => {
                eprintln!("{} {}", output::status(attempt.status()), output::slug(slug));
                output::hint(message);
            }
        }
    }
}
