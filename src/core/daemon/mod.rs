//! Session daemon.
//!
//! A per-(login session, owner) background process holding unlocked grants
//! in memory behind a Unix socket. Nothing it holds is ever written to disk.

mod cache;
mod client;
pub mod protocol;
mod registry;
mod server;

pub use cache::GrantCache;
pub use client::DaemonClient;
pub use protocol::StatusEntry;
pub use registry::DaemonRegistry;
pub use server::DaemonServer;
