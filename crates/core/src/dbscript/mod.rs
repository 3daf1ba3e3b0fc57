//! Migration script collision checking.
//!
//! 1. **Parsing** -- recognising `NN_NN_NNNN_<description>.<ext>` names.
//! 2. **Set building** -- reading added and existing script names out of a
//!    repository.
//! 3. **Detection** -- comparing ordinal keys and producing a verdict.

pub mod builder;
pub mod detector;
pub mod filename;

pub use builder::{ChangeContext, DbscriptSetBuilder};
pub use detector::{CollisionDetector, CollisionSource, CollisionVerdict};
pub use filename::{collect_scripts, ordinal_usage, FileSet, MigrationFilename, ScriptExtension};
