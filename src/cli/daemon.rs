//! Daemon commands.

use tracing::info;

use crate::cli::output;
use crate::core::config::Settings;
use crate::core::daemon::DaemonServer;
use crate::core::session;
use crate::error::Result;

/// Serve this owner's daemon in the foreground until signalled.
pub async fn serve(settings: &Settings) -> Result<()> {
    let resolver = session::default_resolver();
    let registry = settings.registry(resolver.as_ref())?;

    let server = DaemonServer::bind(&registry.socket_path(), &registry.pid_path(), resolver).await?;
    server.serve().await?;
    info!("daemon exited");
    Ok(())
}

/// Stop this owner's daemon. Succeeds when none is running.
pub async fn kill(settings: &Settings) -> Result<()> {
    let resolver = session::default_resolver();
    if settings.registry(resolver.as_ref())?.kill().await? {
        output::success("daemon stopped");
    } else {
        output::dimmed("no daemon running");
    }
    Ok(())
}
