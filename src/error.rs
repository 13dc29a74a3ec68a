//! Error types.
//!
//! Each subsystem owns a focused error enum; [`Error`] wraps them so the
//! library can return one `Result` type while callers still match on the
//! specific failure.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error for all keyrack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Daemon(#[from] DaemonError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("toml serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Invalid input rejected before any I/O happens.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid env '{0}': expected one of sudo, prod, prep, test, all")]
    InvalidEnv(String),

    #[error("env 'all' is a selector, not a storage bucket: pass --env sudo|prod|prep|test")]
    EnvNotConcrete,

    #[error("invalid vault '{0}': expected one of os.envvar, os.direct, os.secure, aws.iam.sso, 1password")]
    InvalidVault(String),

    #[error("invalid mechanism '{0}': expected one of PERMANENT_VIA_REPLICA, PERMANENT_VIA_REFERENCE, PERMANENT_VIA_ACCESS_KEY, EPHEMERAL_VIA_SESSION, EPHEMERAL_VIA_OIDC")]
    InvalidMechanism(String),

    #[error("invalid slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    #[error("invalid owner '{0}': use lowercase letters, digits, '-' or '_'")]
    InvalidOwner(String),

    #[error("invalid duration '{0}': use <n>s, <n>m, <n>h or <n>d (e.g. 30m)")]
    InvalidDuration(String),

    #[error("org mismatch: requested '{requested}' but keyrack.toml declares '{declared}' (pass --org {declared})")]
    OrgMismatch { requested: String, declared: String },

    #[error("org '@this' requires a keyrack.toml in the current directory (or pass --org <org>)")]
    NoRepoOrg,

    #[error("vault '{vault}' requires --exid ({hint})")]
    MissingExid { vault: String, hint: &'static str },

    #[error("unable to determine home directory")]
    NoHomeDir,
}

/// Failures reading or writing host/repo manifests.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("no host manifest for owner '{owner}': run `{command}`")]
    NotInitialized { owner: String, command: String },

    #[error("host manifest already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("host manifest has no recipients: run `keyrack recipient set --label <name> --pubkey <key>`")]
    NoRecipients,

    #[error("refusing to remove the last recipient '{0}': add another recipient first")]
    LastRecipient(String),

    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("key not configured: {0}")]
    HostNotFound(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid repo manifest: {0}")]
    InvalidRepo(String),
}

/// Daemon transport and lifecycle failures.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("daemon not reachable at {0}")]
    Unreachable(PathBuf),

    #[error("daemon did not become reachable within {timeout:?} at {socket}")]
    SpawnTimeout { socket: PathBuf, timeout: Duration },

    #[error("failed to spawn daemon: {0}")]
    SpawnFailed(String),

    #[error("daemon already running at {0}")]
    AlreadyRunning(PathBuf),

    #[error("malformed daemon response: {0}")]
    MalformedResponse(String),

    #[error("daemon rejected request: {0}")]
    Rejected(String),

    #[error("unknown daemon command '{0}'")]
    UnknownCommand(String),

    #[error("daemon request exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("insecure runtime directory {dir}: {reason}")]
    InsecureRuntimeDir { dir: PathBuf, reason: String },
}

/// Login-session lookup failures.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("login session mismatch: daemon session {daemon}, caller session {caller}")]
    Mismatch { daemon: String, caller: String },

    #[error("unable to read login session of pid {pid}: {reason}")]
    Lookup { pid: i32, reason: String },

    #[error("peer credentials unavailable: {0}")]
    PeerCredentials(String),
}

/// Vault adapter failures (as opposed to resolution outcomes).
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("vault '{0}' is not registered")]
    NotRegistered(String),

    #[error("vault '{0}' does not store secrets; the secret lives in the external system")]
    NotStorable(String),

    #[error("no secret stored for {slug} in {vault}")]
    SecretNotFound { vault: String, slug: String },

    #[error("`{cli}` not found on PATH: {install}")]
    CliMissing { cli: String, install: &'static str },

    #[error("`{cli}` failed: {stderr}")]
    CliFailed { cli: String, stderr: String },

    #[error("env var {0} is not set")]
    EnvVarMissing(String),

    #[error("empty secret for {0}: pipe the value on stdin or enter it at the prompt")]
    EmptySecret(String),
}

/// Identity bridge failures.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid ssh public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid ssh private key {path}: {reason}")]
    InvalidPrivateKey { path: PathBuf, reason: String },

    #[error("unsupported key type '{0}': only ssh-ed25519 keys can be bridged")]
    UnsupportedKeyType(String),

    #[error("{path} is passphrase protected and no age CLI was found: install `age` (https://age-encryption.org) or `rage`, or use an unencrypted key")]
    DelegateUnavailable { path: PathBuf },

    #[error("no private key matches the host manifest recipients: pass --prikey <path> or set KEYRACK_PRIKEY")]
    NotFound,

    #[error("bech32 encoding failed: {0}")]
    Encoding(String),
}

/// Encryption and decryption failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("armor failed: {0}")]
    ArmorFailed(String),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

pub type Result<T> = std::result::Result<T, Error>;
