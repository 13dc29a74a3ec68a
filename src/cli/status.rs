//! Status command - list keys cached in this login session.

use crate::cli::output;
use crate::core::config::Settings;
use std::time::Duration;

use crate::core::session;
use crate::error::Result;

/// Show cached keys. Never spawns the daemon.
pub async fn execute(settings: &Settings, json: bool) -> Result<()> {
    let resolver = session::default_resolver();
    let registry = settings.registry(resolver.as_ref())?;

    let Some(daemon) = registry.find().await else {
        if json {
            output::data("[]");
        } else {
            output::dimmed("no daemon running");
        }
        return Ok(());
    };

    let mut entries = daemon.status().await?;
    entries.sort_by(|a, b| a.slug.cmp(&b.slug));

    if json {
        output::data(&serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    output::section(&format!("Unlocked ({})", settings.owner));
    if entries.is_empty() {
        output::dimmed("no keys unlocked");
    }
    for entry in &entries {
        let left = remaining(Duration::from_millis(entry.ttl_left_ms));
        output::kv(
            &output::slug(&entry.slug),
            format!("{} via {} ({} left)", entry.source.mechanism, entry.source.vault, left),
        );
    }
    output::rule();
    output::kv("socket", output::path(registry.socket_path().display()));
    Ok(())
}

/// `8h59m`, `12m30s` or `45s`.
fn remaining(left: Duration) -> String {
    let secs = left.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, s) => format!("{}m{:02}s", m, s),
        (h, m, _) => format!("{}h{:02}m", h, m),
    }
}
