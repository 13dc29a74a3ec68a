//! Daemon process registry.
//!
//! One daemon per (login session, owner), addressed by a socket path
//! derived from both. Spawns lazily and tears down by pid.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::client::DaemonClient;
use super::server;
use crate::core::constants;
use crate::core::domain::Owner;
use crate::error::{DaemonError, Result};

/// Locates, spawns and kills the daemon for one (session, owner) pair.
#[derive(Debug, Clone)]
pub struct DaemonRegistry {
    runtime_dir: PathBuf,
    session_id: String,
    owner: Owner,
}

impl DaemonRegistry {
    pub fn new(runtime_dir: impl Into<PathBuf>, session_id: impl Into<String>, owner: Owner) -> Self {
        Self {
            runtime_dir: runtime_dir.into(),
            session_id: session_id.into(),
            owner,
        }
    }

    fn base(&self) -> String {
        self.owner
            .qualify(&format!("{}.{}", constants::FILE_PREFIX, self.session_id))
    }

    /// `<runtime>/keyrack.<session>[.<owner>].sock`
    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.sock", self.base()))
    }

    /// `<runtime>/keyrack.<session>[.<owner>].pid`
    pub fn pid_path(&self) -> PathBuf {
        self.runtime_dir.join(format!("{}.pid", self.base()))
    }

    pub fn client(&self) -> DaemonClient {
        DaemonClient::new(self.socket_path())
    }

    /// Client for a daemon that is already running, if any.
    pub async fn find(&self) -> Option<DaemonClient> {
        let client = self.client();
        if client.ping().await {
            Some(client)
        } else {
            None
        }
    }

    /// Client for the running daemon, spawning one if needed.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::SpawnTimeout` if the spawned daemon does not
    /// answer within the spawn timeout.
    pub async fn find_or_spawn(&self) -> Result<DaemonClient> {
        self.find_or_spawn_with(
            || self.spawn_detached(),
            constants::SPAWN_TIMEOUT,
            constants::SPAWN_POLL_INTERVAL,
        )
        .await
    }

    /// [`find_or_spawn`](Self::find_or_spawn) with an explicit spawner and
    /// polling schedule.
    pub async fn find_or_spawn_with<F>(
        &self,
        spawn: F,
        timeout: Duration,
        interval: Duration,
    ) -> Result<DaemonClient>
    where
        F: FnOnce() -> Result<()>,
    {
        if let Some(client) = self.find().await {
            debug!(socket = %client.socket().display(), "daemon already running");
            return Ok(client);
        }

        server::ensure_private_dir(&self.runtime_dir)?;
        spawn()?;

        let deadline = Instant::now() + timeout;
        let client = self.client();
        loop {
            if client.ping().await {
                info!(socket = %client.socket().display(), "daemon started");
                return Ok(client);
            }
            if Instant::now() >= deadline {
                return Err(DaemonError::SpawnTimeout {
                    socket: self.socket_path(),
                    timeout,
                }
                .into());
            }
            sleep(interval).await;
        }
    }

    fn spawn_detached(&self) -> Result<()> {
        let exe = std::env::current_exe()
            .map_err(|e| DaemonError::SpawnFailed(format!("cannot locate keyrack binary: {}", e)))?;

        let mut cmd = Command::new(exe);
        cmd.arg("daemon")
            .arg("serve")
            .env(constants::env::RUNTIME_DIR, &self.runtime_dir)
            .env(constants::env::OWNER, self.owner.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .map_err(|e| DaemonError::SpawnFailed(e.to_string()))?;
        debug!(pid = child.id(), "spawned daemon");
        Ok(())
    }

    /// Stop the daemon and remove its socket and pid files.
    ///
    /// Only the process listening on the socket is signalled, and only when
    /// the pid file names it. A stale pid file may point at a recycled pid.
    /// Returns whether a running daemon was signalled. Safe to call when no
    /// daemon exists.
    pub async fn kill(&self) -> Result<bool> {
        let pid_path = self.pid_path();
        let signalled = match (read_pid(&pid_path), self.listener_pid().await) {
            (Some(pid), Some(listening)) if pid == listening => signal_term(pid),
            (Some(pid), listening) => {
                debug!(pid, ?listening, "pid file does not name the listening daemon");
                false
            }
            (None, _) => false,
        };

        for path in [self.socket_path(), pid_path] {
            remove_if_present(&path)?;
        }

        if signalled {
            info!(socket = %self.socket_path().display(), "daemon stopped");
        }
        Ok(signalled)
    }
}

impl DaemonRegistry {
    /// Pid of the process accepting connections on the socket.
    async fn listener_pid(&self) -> Option<i32> {
        let stream = UnixStream::connect(self.socket_path()).await.ok()?;
        stream.peer_cred().ok()?.pid()
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn signal_term(pid: i32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            debug!(pid, error = %e, "daemon pid not signalled");
            false
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
