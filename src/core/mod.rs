//! Core library components.
//!
//! Everything below the command line: the domain model, manifests, the
//! identity bridge, vault adapters, the session daemon and the grant
//! resolution engine.

pub mod cipher;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod domain;
pub mod engine;
pub mod identity;
pub mod manifest;
pub mod session;
pub mod ttl;
pub mod vault;
