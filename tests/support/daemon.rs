//! In-process daemons for library tests.

use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use keyrack::core::daemon::{DaemonClient, DaemonRegistry, DaemonServer};
use keyrack::core::session::SessionResolver;
use keyrack::error::Result;

/// Resolver reporting fixed ids for the daemon and for every peer.
pub struct FixedSession {
    pub current: String,
    pub peer: String,
}

impl FixedSession {
    /// Daemon and peers share `id`.
    pub fn same(id: &str) -> Arc<dyn SessionResolver> {
        Arc::new(Self {
            current: id.to_string(),
            peer: id.to_string(),
        })
    }

    /// Every peer claims a different session from the daemon's.
    pub fn mismatched(daemon: &str, peer: &str) -> Arc<dyn SessionResolver> {
        Arc::new(Self {
            current: daemon.to_string(),
            peer: peer.to_string(),
        })
    }
}

impl SessionResolver for FixedSession {
    fn current_session_id(&self) -> Result<String> {
        Ok(self.current.clone())
    }

    fn peer_session_id(&self, _stream: &UnixStream) -> Result<String> {
        Ok(self.peer.clone())
    }
}

/// A daemon serving on a background task until stopped.
pub struct RunningDaemon {
    pub client: DaemonClient,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl RunningDaemon {
    /// Bind `<dir>/<name>.sock` and start serving.
    pub async fn start(dir: &Path, name: &str, resolver: Arc<dyn SessionResolver>) -> Self {
        let socket = dir.join(format!("{}.sock", name));
        let pid = dir.join(format!("{}.pid", name));
        Self::start_at(&socket, &pid, resolver).await
    }

    /// Serve on the paths a registry would use.
    pub async fn start_for(registry: &DaemonRegistry, resolver: Arc<dyn SessionResolver>) -> Self {
        Self::start_at(&registry.socket_path(), &registry.pid_path(), resolver).await
    }

    async fn start_at(socket: &Path, pid: &Path, resolver: Arc<dyn SessionResolver>) -> Self {
        let server = DaemonServer::bind(socket, pid, resolver)
            .await
            .expect("failed to bind daemon");

        let (shutdown, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_until(async move {
            let _ = rx.await;
        }));

        Self {
            client: DaemonClient::new(socket.to_path_buf()),
            shutdown,
            task,
        }
    }

    /// Stop serving and wait for cleanup.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task
            .await
            .expect("daemon task panicked")
            .expect("daemon failed");
    }
}
