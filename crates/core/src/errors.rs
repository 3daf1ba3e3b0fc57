//! Error types for the dbscript-guard core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.
//!
//! A filename that does not look like a migration script is *not* an error:
//! the parser returns `None` for it and the name is simply left out of the
//! comparison. Only decoding one from serialized data fails, with
//! [`NotAMigrationScript`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    RepositoryAccess(#[from] RepositoryAccessError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Repository access errors
// ---------------------------------------------------------------------------

/// Errors raised while reading trees out of the repository store.
///
/// Every variant is fatal to the validation request that hit it: the guard
/// rejects the change instead of assuming there is no collision.
#[derive(Debug, Error)]
pub enum RepositoryAccessError {
    /// The project id did not map to an openable git repository.
    #[error("git repository not found for project '{project}' (looked in '{path}'): {detail}")]
    RepositoryNotFound {
        project: String,
        path: String,
        detail: String,
    },

    /// A revision (branch, tag, SHA, patch ref) could not be resolved.
    #[error("git reference '{reference}' could not be resolved: {detail}")]
    ReferenceNotFound { reference: String, detail: String },

    /// The reference resolved, but not to something that has a tree.
    #[error("git reference '{reference}' does not point to a tree: {detail}")]
    NotATree { reference: String, detail: String },

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Filename errors
// ---------------------------------------------------------------------------

/// A serialized migration filename that does not match the script pattern.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a migration script filename")]
pub struct NotAMigrationScript(pub String);

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading or writing the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
