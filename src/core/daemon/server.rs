//! Daemon server.
//!
//! Serves one request per connection. Every connection's peer login session
//! is checked against the daemon's own before the request is read.

use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::GrantCache;
use super::protocol::{
    GetData, RawRequest, RelockData, Request, Response, StatusData, UnlockData,
};
use crate::core::constants;
use crate::core::session::SessionResolver;
use crate::error::{DaemonError, Result, SessionError};

/// A bound daemon, ready to serve.
pub struct DaemonServer {
    listener: UnixListener,
    socket: PathBuf,
    pid_file: PathBuf,
    session_id: String,
    resolver: Arc<dyn SessionResolver>,
    cache: Arc<Mutex<GrantCache>>,
}

impl DaemonServer {
    /// Bind `socket` and record our pid in `pid_file`.
    ///
    /// A stale socket (no listener) is removed first.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::AlreadyRunning` if a live daemon answers on
    /// `socket`.
    pub async fn bind(
        socket: &Path,
        pid_file: &Path,
        resolver: Arc<dyn SessionResolver>,
    ) -> Result<Self> {
        let session_id = resolver.current_session_id()?;

        if resolver.is_fallback() {
            warn!(
                "kernel login sessions unavailable; falling back to uid-only isolation \
                 in a 0700 runtime directory"
            );
        }

        if let Some(dir) = socket.parent() {
            ensure_private_dir(dir)?;
        }

        if socket.exists() {
            if UnixStream::connect(socket).await.is_ok() {
                return Err(DaemonError::AlreadyRunning(socket.to_path_buf()).into());
            }
            debug!(socket = %socket.display(), "removing stale socket");
            fs::remove_file(socket)?;
        }

        let listener = UnixListener::bind(socket)?;
        restrict(socket, 0o600)?;
        fs::write(pid_file, std::process::id().to_string())?;

        info!(
            socket = %socket.display(),
            session = %session_id,
            "daemon listening"
        );

        Ok(Self {
            listener,
            socket: socket.to_path_buf(),
            pid_file: pid_file.to_path_buf(),
            session_id,
            resolver,
            cache: Arc::new(Mutex::new(GrantCache::new())),
        })
    }

    /// Serve until SIGTERM or SIGINT, then remove the socket and pid file.
    pub async fn serve(self) -> Result<()> {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        self.serve_until(async move {
            tokio::select! {
                _ = term.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        })
        .await
    }

    /// Serve until `shutdown` completes, then clean up.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    let (stream, _) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let session_id = self.session_id.clone();
                    let resolver = Arc::clone(&self.resolver);
                    let cache = Arc::clone(&self.cache);
                    tokio::spawn(async move {
                        if let Err(e) = handle(stream, &session_id, resolver.as_ref(), &cache).await {
                            debug!(error = %e, "connection ended with error");
                        }
                    });
                }
            }
        }

        info!("daemon shutting down");
        self.cleanup();
        Ok(())
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    fn cleanup(&self) {
        for path in [&self.socket, &self.pid_file] {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "cleanup failed");
                }
            }
        }
    }
}

async fn handle(
    mut stream: UnixStream,
    session_id: &str,
    resolver: &dyn SessionResolver,
    cache: &Mutex<GrantCache>,
) -> Result<()> {
    let response = match resolver.peer_session_id(&stream) {
        Ok(peer) if peer == session_id => match read_request(&mut stream).await {
            Ok(raw) => dispatch(raw, cache).await,
            Err(e) => Response::err(e),
        },
        Ok(peer) => {
            warn!(peer = %peer, "rejected connection from another login session");
            drain(&mut stream).await;
            Response::err(SessionError::Mismatch {
                daemon: session_id.to_string(),
                caller: peer,
            })
        }
        Err(e) => {
            warn!(error = %e, "rejected connection with unknown login session");
            drain(&mut stream).await;
            Response::err(e)
        }
    };

    let body = serde_json::to_vec(&response)?;
    stream.write_all(&body).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn read_request(stream: &mut UnixStream) -> Result<RawRequest> {
    let mut body = Vec::new();
    let limit = constants::MAX_REQUEST_BYTES as u64;
    (&mut *stream).take(limit + 1).read_to_end(&mut body).await?;
    if body.len() as u64 > limit {
        return Err(DaemonError::RequestTooLarge(constants::MAX_REQUEST_BYTES).into());
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Consume a rejected request unread. Closing a Unix socket with unread
/// input resets it, and the caller would never see the rejection.
async fn drain(stream: &mut UnixStream) {
    let limit = constants::MAX_REQUEST_BYTES as u64 + 1;
    let mut sink = tokio::io::sink();
    if let Err(e) = tokio::io::copy(&mut (&mut *stream).take(limit), &mut sink).await {
        debug!(error = %e, "draining rejected request failed");
    }
}

/// Interpret and run one request against the cache.
pub(crate) async fn dispatch(raw: RawRequest, cache: &Mutex<GrantCache>) -> Response {
    let request = match Request::from_raw(raw) {
        Ok(request) => request,
        Err(e) => return Response::err(e),
    };
    let now = Utc::now();
    let mut cache = cache.lock().await;

    match request {
        Request::Unlock(payload) => {
            debug!(keys = payload.keys.len(), "UNLOCK");
            let ttl = payload.ttl_ms.map(Duration::from_millis);
            match cache.unlock(payload.keys, ttl, now) {
                Ok(unlocked) => Response::ok(&UnlockData { unlocked }),
                Err(e) => Response::err(e),
            }
        }
        Request::Get(payload) => {
            let keys = cache.get(&payload.slugs, now);
            debug!(requested = payload.slugs.len(), hits = keys.len(), "GET");
            Response::ok(&GetData { keys })
        }
        Request::Status => {
            let keys = cache.status(now);
            debug!(entries = keys.len(), "STATUS");
            Response::ok(&StatusData { keys })
        }
        Request::Relock(payload) => {
            let relocked = cache.relock(payload.slugs.as_deref(), payload.env, now);
            debug!(relocked = relocked.len(), "RELOCK");
            Response::ok(&RelockData { relocked })
        }
    }
}

/// Create `dir` as 0700, or check that an existing one is private.
pub(super) fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        restrict(dir, 0o700)?;
    }
    verify_private_dir(dir)
}

/// Fails unless `dir` is owned by the current uid and closed to group and
/// other.
#[cfg(unix)]
pub(super) fn verify_private_dir(dir: &Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    let meta = fs::metadata(dir)?;
    let uid = nix::unistd::getuid().as_raw();
    let insecure = |reason: String| DaemonError::InsecureRuntimeDir {
        dir: dir.to_path_buf(),
        reason,
    };

    if meta.uid() != uid {
        return Err(insecure(format!("owned by uid {}, not {}", meta.uid(), uid)).into());
    }
    let mode = meta.mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(insecure(format!("mode {:o} is open to group or other", mode)).into());
    }
    Ok(())
}

#[cfg(not(unix))]
pub(super) fn verify_private_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn restrict(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
