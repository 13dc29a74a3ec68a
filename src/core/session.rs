//! Login-session resolution.
//!
//! The daemon only serves callers from its own kernel login session. The
//! session id of a connected peer is always derived from the socket's peer
//! credentials, never from anything the peer sends.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, SessionError};

/// Value the kernel reports for processes outside any audit login session.
const UNSET_SESSION: &str = "4294967295";

/// Looks up kernel login-session ids.
pub trait SessionResolver: Send + Sync {
    /// Session id of the current process.
    fn current_session_id(&self) -> Result<String>;

    /// Session id of the process on the other end of `stream`.
    fn peer_session_id(&self, stream: &UnixStream) -> Result<String>;

    /// Whether this resolver is the weaker uid-only fallback.
    fn is_fallback(&self) -> bool {
        false
    }
}

/// Reads `/proc/<pid>/sessionid`, the audit login session of a process.
#[derive(Debug, Clone)]
pub struct ProcSessionResolver {
    proc_root: PathBuf,
}

impl ProcSessionResolver {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Whether the running kernel exposes a usable login session for us.
    pub fn available(&self) -> bool {
        self.read(std::process::id() as i32).is_ok()
    }

    fn read(&self, pid: i32) -> Result<String> {
        let path = self.proc_root.join(pid.to_string()).join("sessionid");
        let raw = fs::read_to_string(&path).map_err(|e| SessionError::Lookup {
            pid,
            reason: e.to_string(),
        })?;

        let id = raw.trim();
        if id.is_empty() || id == UNSET_SESSION {
            return Err(SessionError::Lookup {
                pid,
                reason: "process has no login session".to_string(),
            }
            .into());
        }
        Ok(id.to_string())
    }
}

impl Default for ProcSessionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionResolver for ProcSessionResolver {
    fn current_session_id(&self) -> Result<String> {
        self.read(std::process::id() as i32)
    }

    fn peer_session_id(&self, stream: &UnixStream) -> Result<String> {
        let cred = stream
            .peer_cred()
            .map_err(|e| SessionError::PeerCredentials(e.to_string()))?;
        let pid = cred
            .pid()
            .ok_or_else(|| SessionError::PeerCredentials("peer pid unavailable".to_string()))?;
        self.read(pid)
    }
}

/// Uid-only boundary for hosts without audit login sessions.
///
/// The peer must run as the daemon's uid, and the socket must live in a
/// `0700` runtime directory. Weaker than a real login session: every
/// session of the same user shares one daemon.
#[derive(Debug, Clone, Default)]
pub struct UidSessionResolver;

impl SessionResolver for UidSessionResolver {
    fn current_session_id(&self) -> Result<String> {
        Ok(format!("uid{}", nix::unistd::getuid().as_raw()))
    }

    fn peer_session_id(&self, stream: &UnixStream) -> Result<String> {
        let cred = stream
            .peer_cred()
            .map_err(|e| SessionError::PeerCredentials(e.to_string()))?;
        Ok(format!("uid{}", cred.uid()))
    }

    fn is_fallback(&self) -> bool {
        true
    }
}

/// Best resolver the host supports.
pub fn default_resolver() -> Arc<dyn SessionResolver> {
    let proc = ProcSessionResolver::new();
    if proc.available() {
        debug!("using audit login session ids");
        Arc::new(proc)
    } else {
        debug!("audit login session unavailable, using uid boundary");
        Arc::new(UidSessionResolver)
    }
}
