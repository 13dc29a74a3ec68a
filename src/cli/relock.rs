//! Relock command - purge keys from the session daemon.

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::domain::Env;
use crate::core::engine::GrantEngine;
use crate::core::session;
use crate::error::Result;

/// Relock keys. Reports when no daemon is running instead of spawning one.
pub async fn execute(settings: &Settings, key: Option<&str>, env: Option<Env>) -> Result<()> {
    let resolver = session::default_resolver();
    let Some(daemon) = settings.registry(resolver.as_ref())?.find().await else {
        output::dimmed("no daemon running");
        return Ok(());
    };

    let cwd = std::env::current_dir()?;
    let engine = GrantEngine::from_settings(settings, &cwd)?;
    let relocked = engine.relock(key, env, &daemon).await?;

    if relocked.is_empty() {
        output::dimmed("nothing to relock");
    }
    for slug in &relocked {
        output::success(&format!("{} relocked", output::slug(slug)));
    }
    Ok(())
}
