//! The `MssqeError` kind table (spec §7).
//!
//! Every fallible operation in the engine returns this single enum so callers
//! can distinguish error kinds without downcasting. Lower-level errors from
//! the IMAP/SMTP/serialization crates are folded in via `#[from]` so internal
//! `?` propagation stays ergonomic, the way the teacher's `ProviderError`
//! wraps provider-specific failures into one closed set.

use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, MssqeError>;

/// The closed set of error kinds a caller of the engine must distinguish.
#[derive(Debug, Error)]
pub enum MssqeError {
    /// Credential store absent (§7 `NoConfig`).
    #[error("no credential store found; run setup first")]
    NoConfig,

    /// IMAP/SMTP auth rejected by the server. Final; no retry.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// TCP/TLS dial failed.
    #[error("connection failed: {0}")]
    ConnectError(String),

    /// A network deadline was exceeded.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Malformed or unexpected server response.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// UIDVALIDITY changed mid-operation; the folder cache was invalidated.
    #[error("UIDVALIDITY changed for folder {folder}: invalidating and retrying")]
    UidInvalid {
        /// The folder whose UIDVALIDITY changed.
        folder: String,
    },

    /// An advisory per-account lock is already held by another process.
    #[error("sync already in progress for account {0}")]
    SyncBusy(String),

    /// A provider key is absent from the Provider Registry.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// None of a provider's special-folder candidates (Drafts, Sent, ...)
    /// could be selected.
    #[error("no {kind} folder found; tried: {candidates}")]
    NoDraftsFolder {
        /// Which special folder was being resolved, e.g. `"drafts"` or `"sent"`.
        kind: String,
        /// The candidate names that were tried, joined for display.
        candidates: String,
    },

    /// No account matches an exact or wildcard-domain lookup.
    #[error("no account matches: {0}")]
    NoMatchingAccount(String),

    /// A draft's frontmatter was malformed or its recipients unparseable.
    #[error("invalid draft {path}: {reason}")]
    InvalidDraft {
        /// Path to the offending draft file.
        path: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The license gate rejected a mutating operation.
    #[error("license invalid: {0}")]
    LicenseInvalid(String),

    /// A batch operation completed with one or more per-item failures.
    #[error("{succeeded} succeeded, {failed} failed")]
    PartialFailure {
        /// Number of items that succeeded.
        succeeded: usize,
        /// Number of items that failed.
        failed: usize,
    },

    /// Generic I/O failure reading or writing persisted state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a persisted document.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML frontmatter in a draft file.
    #[error("malformed YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Underlying async-imap failure not otherwise classified above.
    #[error("IMAP error: {0}")]
    Imap(#[from] async_imap::error::Error),

    /// Underlying lettre message-building failure.
    #[error("message build error: {0}")]
    Lettre(#[from] lettre::error::Error),

    /// Underlying SMTP transport failure.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Mailbox address failed to parse.
    #[error("invalid address: {0}")]
    AddressParse(String),
}

impl MssqeError {
    /// The exit code a CLI wrapper should use for this error (spec §6).
    pub fn exit_code(&self) -> i32 {
        match self {
            MssqeError::AuthError(_) => 3,
            MssqeError::ConnectError(_) | MssqeError::Timeout(_) => 4,
            MssqeError::LicenseInvalid(_) => 5,
            MssqeError::InvalidDraft { .. }
            | MssqeError::UnknownProvider(_)
            | MssqeError::NoMatchingAccount(_) => 2,
            _ => 1,
        }
    }
}
