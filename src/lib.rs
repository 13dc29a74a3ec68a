//! Keyrack - a session-scoped credential broker.
//!
//! Repos declare the keys they need, a developer unlocks them once per login
//! session, and every process in that session is granted them until they
//! expire or are relocked.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── init          # Create the host manifest
//! │   ├── recipient     # Manage who can decrypt the host manifest
//! │   ├── set           # Configure (or delete) a key
//! │   ├── get           # Resolve keys into attempts
//! │   ├── unlock        # Unlock keys into the session daemon
//! │   ├── relock        # Purge keys from the session daemon
//! │   ├── status        # List cached keys
//! │   ├── daemon        # Daemon entry point and kill
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── domain/       # Slugs, configs, grants, attempts
//!     ├── manifest/     # Host and repo manifests
//!     ├── identity/     # ssh-ed25519 to age bridge
//!     ├── cipher/       # age encryption
//!     ├── vault/        # Vault adapters and registry
//!     ├── session       # Login-session resolver
//!     ├── daemon/       # Cache daemon, client and registry
//!     └── engine/       # Grant resolution, unlock and relock
//! ```

pub mod cli;
pub mod core;
pub mod error;
