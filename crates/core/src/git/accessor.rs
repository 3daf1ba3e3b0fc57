//! Abstract read access to repository trees.
//!
//! The guard never owns repository storage. It opens a handle per
//! validation request, reads two trees through it, and drops it before the
//! verdict is returned.

use crate::errors::RepositoryAccessError;

/// Opens repositories by project id.
pub trait TreeAccessor {
    type Handle: RepositoryHandle;

    /// Open the repository for `project`. The handle is released when
    /// dropped.
    fn open_repository(&self, project: &str) -> Result<Self::Handle, RepositoryAccessError>;
}

/// Read-only view of one opened repository.
pub trait RepositoryHandle {
    /// Identifier of a resolved tree.
    type Tree: Clone + std::fmt::Debug;

    /// Resolve a revision (branch, tag, SHA, patch ref, tree id) to the
    /// tree it points at.
    fn resolve_tree(&self, reference: &str) -> Result<Self::Tree, RepositoryAccessError>;

    /// Paths added between `old` and `new`, limited to entries under
    /// `prefix`, in path order.
    fn diff_added(
        &self,
        old: &Self::Tree,
        new: &Self::Tree,
        prefix: &str,
    ) -> Result<Vec<String>, RepositoryAccessError>;

    /// Every file under `prefix` in `tree`, recursively. A missing folder
    /// yields an empty list.
    fn list_files(&self, tree: &Self::Tree, prefix: &str)
        -> Result<Vec<String>, RepositoryAccessError>;
}

/// Whether the `/`-separated `path` lies inside `folder`.
///
/// Matching is by whole path components, so `db/upgrade_old/x.sql` is not
/// under `db/upgrade`.
pub fn is_under(path: &str, folder: &str) -> bool {
    let folder = folder.trim_end_matches('/');
    path.strip_prefix(folder)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}
