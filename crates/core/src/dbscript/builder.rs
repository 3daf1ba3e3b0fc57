//! Builds the "added" and "existing" migration script sets for a change.

use tracing::{debug, instrument};

use crate::dbscript::filename::{collect_scripts, FileSet};
use crate::errors::RepositoryAccessError;
use crate::git::accessor::RepositoryHandle;

/// Inputs for one validation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeContext {
    /// Repository folder holding migration scripts.
    pub watched_folder: String,
    /// The comparison point, typically the target branch tip.
    pub base_reference: String,
    /// Tree, commit or ref introduced by the proposed change.
    pub incoming_tree: String,
}

impl ChangeContext {
    pub fn new(
        watched_folder: impl Into<String>,
        base_reference: impl Into<String>,
        incoming_tree: impl Into<String>,
    ) -> Self {
        Self {
            watched_folder: watched_folder.into(),
            base_reference: base_reference.into(),
            incoming_tree: incoming_tree.into(),
        }
    }
}

/// Reads migration script names out of an open repository.
pub struct DbscriptSetBuilder<'h, H: RepositoryHandle> {
    handle: &'h H,
}

impl<'h, H: RepositoryHandle> DbscriptSetBuilder<'h, H> {
    pub fn new(handle: &'h H) -> Self {
        Self { handle }
    }

    /// Scripts the incoming tree adds relative to the base reference.
    ///
    /// Only "added" deltas count. Without rename detection a renamed script
    /// appears as a delete plus an add, so its new name is checked too.
    #[instrument(skip(self, context), fields(base = %context.base_reference, incoming = %context.incoming_tree))]
    pub fn added_scripts(&self, context: &ChangeContext) -> Result<FileSet, RepositoryAccessError> {
        let base = self.handle.resolve_tree(&context.base_reference)?;
        let incoming = self.handle.resolve_tree(&context.incoming_tree)?;
        let paths = self
            .handle
            .diff_added(&base, &incoming, &context.watched_folder)?;
        let scripts = collect_scripts(&paths);
        debug!(paths = paths.len(), scripts = scripts.len(), "collected added scripts");
        Ok(scripts)
    }

    /// Every script present under the watched folder at the base reference.
    #[instrument(skip(self, context), fields(base = %context.base_reference))]
    pub fn existing_scripts(&self, context: &ChangeContext) -> Result<FileSet, RepositoryAccessError> {
        let base = self.handle.resolve_tree(&context.base_reference)?;
        let paths = self.handle.list_files(&base, &context.watched_folder)?;
        let scripts = collect_scripts(&paths);
        debug!(paths = paths.len(), scripts = scripts.len(), "collected existing scripts");
        Ok(scripts)
    }
}
