//! Unlock command - unlock keys into the session daemon.

use chrono::Local;
use tracing::debug;

use crate::cli::{get, output};
use crate::core::config::Settings;
use crate::core::domain::{Attempt, Env};
use crate::core::engine::{GrantEngine, UnlockRequest};
use crate::core::{session, ttl};
use crate::error::Result;

/// Unlock keys, spawning the daemon if none is running.
pub async fn execute(
    settings: &Settings,
    key: Option<String>,
    env: Option<Env>,
    org: Option<String>,
    duration: Option<&str>,
    allow_dangerous: bool,
) -> Result<i32> {
    let req = UnlockRequest {
        key,
        env,
        org,
        duration: duration.map(ttl::parse).transpose()?,
        allow_dangerous,
    };

    let cwd = std::env::current_dir()?;
    let mut engine = GrantEngine::from_settings(settings, &cwd)?;

    let resolver = session::default_resolver();
    let daemon = settings.registry(resolver.as_ref())?.find_or_spawn().await?;
    debug!(socket = %daemon.socket().display(), "daemon ready");

    let attempts = engine.unlock(&req, &daemon).await?;
    if attempts.is_empty() {
        output::warn("no keys configured for this selection");
        return Ok(0);
    }

    for attempt in &attempts {
        match attempt {
            Attempt::Granted { grant } => {
                let until = grant
                    .expires_at
                    .map(|at| format!(" until {}", at.with_timezone(&Local).format("%H:%M")))
                    .unwrap_or_default();
                let slug = output::slug(&grant.slug.to_string());
                output::success(&format!("{} unlocked{}", slug, until));
            }
            Attempt::Locked { slug, fix } | Attempt::Absent { slug, fix } => {
                output::warn(&format!("{} {}", output::slug(slug), attempt.status()));
                output::hint(fix);
            }
            Attempt::Blocked { slug, reasons } => {
                output::error(&format!("{} blocked", output::slug(slug)));
                for reason in reasons {
                    output::list_item(reason);
                }
                output::hint("pass --allow-dangerous to unlock it anyway");
            }
            Attempt::Invalid { slug, message } => {
                output::error(&format!("{} invalid", output::slug(slug)));
                output::hint(message);
            }
        }
    }

    Ok(if attempts.iter().all(Attempt::is_granted) {
        0
    } else {
        get::NOT_GRANTED
    })
}
