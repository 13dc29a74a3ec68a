//! Daemon client.
//!
//! Each call opens a fresh connection, sends one request, half-closes its
//! write side and reads the single response.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::trace;

use super::protocol::{
    GetData, GetPayload, RelockData, RelockPayload, Request, Response, StatusData, StatusEntry,
    UnlockData, UnlockPayload,
};
use super::server::verify_private_dir;
use crate::core::domain::{Env, KeyGrant};
use crate::error::{DaemonError, Result};

/// Handle to a daemon socket.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Whether a daemon answers on the socket.
    ///
    /// A daemon that refuses our session still counts as running: spawning
    /// another one next to it could never bind.
    pub async fn ping(&self) -> bool {
        self.send(Request::Status).await.is_ok()
    }

    pub async fn unlock(&self, keys: Vec<KeyGrant>, ttl: Option<Duration>) -> Result<Vec<String>> {
        let payload = UnlockPayload {
            keys,
            ttl_ms: ttl.map(|d| d.as_millis() as u64),
        };
        let data: UnlockData = self.send(Request::Unlock(payload)).await?.into_data()?;
        Ok(data.unlocked)
    }

    /// Cached, unexpired grants for `slugs`. Misses are omitted.
    pub async fn get(&self, slugs: &[String]) -> Result<Vec<KeyGrant>> {
        if slugs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = GetPayload {
            slugs: slugs.to_vec(),
        };
        let data: GetData = self.send(Request::Get(payload)).await?.into_data()?;
        Ok(data.keys)
    }

    pub async fn status(&self) -> Result<Vec<StatusEntry>> {
        let data: StatusData = self.send(Request::Status).await?.into_data()?;
        Ok(data.keys)
    }

    pub async fn relock(&self, slugs: Option<Vec<String>>, env: Option<Env>) -> Result<Vec<String>> {
        let data: RelockData = self
            .send(Request::Relock(RelockPayload { slugs, env }))
            .await?
            .into_data()?;
        Ok(data.relocked)
    }

    async fn send(&self, request: Request) -> Result<Response> {
        // a missing dir fails the connect below as unreachable
        if let Some(dir) = self.socket.parent().filter(|d| d.exists()) {
            verify_private_dir(dir)?;
        }

        let mut stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|_| DaemonError::Unreachable(self.socket.clone()))?;

        let body = serde_json::to_vec(&request.to_raw()?)?;
        trace!(command = request.command(), bytes = body.len(), "sending");
        // a failed write may still be followed by a readable rejection
        let sent = match stream.write_all(&body).await {
            Ok(()) => stream.shutdown().await,
            Err(e) => Err(e),
        };

        let mut reply = Vec::new();
        stream.read_to_end(&mut reply).await?;
        if reply.is_empty() {
            sent?;
        }

        serde_json::from_slice(&reply)
            .map_err(|e| DaemonError::MalformedResponse(e.to_string()).into())
    }
}
