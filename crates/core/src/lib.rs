//! dbscript-guard core library.
//!
//! Detects database migration scripts that claim an ordinal already taken
//! in the repository: filename parsing, reading added and existing script
//! sets out of git trees, collision detection, and the validation entry
//! points a host (code review server or git hook) calls.

pub mod config;
pub mod dbscript;
pub mod errors;
pub mod git;
pub mod guard;
pub mod hook;

// Re-exports for convenience.
pub use config::GuardConfig;
pub use dbscript::{CollisionDetector, CollisionVerdict, MigrationFilename};
pub use guard::{DbscriptGuard, ValidationOutcome};
