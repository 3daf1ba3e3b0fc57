//! Repository tree access via `git2`.

use std::path::{Path, PathBuf};

use git2::{
    Delta, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Tree, TreeWalkMode, TreeWalkResult,
};
use tracing::{debug, info, instrument};

use crate::errors::RepositoryAccessError;
use crate::git::accessor::{is_under, RepositoryHandle, TreeAccessor};

/// Well-known id of the tree with no entries. Resolving it never touches
/// the object database, so a branch's first push can be compared against
/// "nothing".
pub const EMPTY_TREE_ID: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// How a project id turns into a repository.
#[derive(Debug, Clone, Default)]
enum Location {
    /// The id is a path; discovery walks up from it like `git` does.
    #[default]
    Discover,
    /// The id names `<id>.git` or `<id>` under a base directory.
    BasePath(PathBuf),
    /// `GIT_DIR` and friends from the environment, ignoring the id. Inside
    /// a `pre-receive` hook this is the only way to see quarantined objects.
    Environment,
}

/// Opens `git2` repositories by project id.
#[derive(Debug, Clone, Default)]
pub struct GitTreeAccessor {
    location: Location,
}

impl GitTreeAccessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path<P: Into<PathBuf>>(base_path: P) -> Self {
        Self {
            location: Location::BasePath(base_path.into()),
        }
    }

    pub fn from_env() -> Self {
        Self {
            location: Location::Environment,
        }
    }

    fn locate(base: &Path, project: &str) -> Result<PathBuf, RepositoryAccessError> {
        let not_found = |path: &Path| RepositoryAccessError::RepositoryNotFound {
            project: project.to_string(),
            path: path.display().to_string(),
            detail: "no such repository directory".to_string(),
        };

        if project.is_empty()
            || project.starts_with('/')
            || project.split('/').any(|c| c == ".." || c == ".")
        {
            return Err(not_found(base));
        }

        let bare = base.join(format!("{}.git", project));
        if bare.is_dir() {
            return Ok(bare);
        }
        let plain = base.join(project);
        if plain.is_dir() {
            return Ok(plain);
        }
        Err(not_found(&bare))
    }
}

impl TreeAccessor for GitTreeAccessor {
    type Handle = GitRepositoryHandle;

    #[instrument(skip(self))]
    fn open_repository(&self, project: &str) -> Result<GitRepositoryHandle, RepositoryAccessError> {
        let (opened, looked_in) = match &self.location {
            Location::Discover => (Repository::discover(project), project.to_string()),
            Location::BasePath(base) => {
                let path = Self::locate(base, project)?;
                (Repository::open(&path), path.display().to_string())
            }
            Location::Environment => (Repository::open_from_env(), "$GIT_DIR".to_string()),
        };
        let repo = opened.map_err(|e| RepositoryAccessError::RepositoryNotFound {
            project: project.to_string(),
            path: looked_in,
            detail: e.message().to_string(),
        })?;
        info!(path = %repo.path().display(), "opened git repository");
        Ok(GitRepositoryHandle {
            repo,
            project: project.to_string(),
        })
    }
}

/// An open `git2::Repository`, released on drop.
pub struct GitRepositoryHandle {
    repo: Repository,
    project: String,
}

impl GitRepositoryHandle {
    /// `None` for the empty tree, which may not exist as an object.
    fn find_tree(&self, id: Oid) -> Result<Option<Tree<'_>>, RepositoryAccessError> {
        if id == empty_tree_oid() {
            return Ok(None);
        }
        Ok(Some(self.repo.find_tree(id)?))
    }
}

impl Drop for GitRepositoryHandle {
    fn drop(&mut self) {
        debug!(project = %self.project, "released git repository");
    }
}

impl RepositoryHandle for GitRepositoryHandle {
    type Tree = Oid;

    fn resolve_tree(&self, reference: &str) -> Result<Oid, RepositoryAccessError> {
        if reference == EMPTY_TREE_ID {
            return Ok(empty_tree_oid());
        }
        let object = self
            .repo
            .revparse_single(reference)
            .map_err(|e| RepositoryAccessError::ReferenceNotFound {
                reference: reference.to_string(),
                detail: e.message().to_string(),
            })?;
        let tree = object
            .peel_to_tree()
            .map_err(|e| RepositoryAccessError::NotATree {
                reference: reference.to_string(),
                detail: e.message().to_string(),
            })?;
        debug!(reference, tree = %tree.id(), "resolved tree");
        Ok(tree.id())
    }

    fn diff_added(
        &self,
        old: &Oid,
        new: &Oid,
        prefix: &str,
    ) -> Result<Vec<String>, RepositoryAccessError> {
        let old_tree = self.find_tree(*old)?;
        let new_tree = self.find_tree(*new)?;

        let mut opts = DiffOptions::new();
        opts.pathspec(prefix).skip_binary_check(true);
        let diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), Some(&mut opts))?;

        let mut added = Vec::new();
        for delta in diff.deltas() {
            if delta.status() != Delta::Added {
                continue;
            }
            match delta.new_file().path().and_then(Path::to_str) {
                Some(path) if is_under(path, prefix) => added.push(path.to_string()),
                Some(_) => {}
                None => debug!("skipping added path that is not UTF-8"),
            }
        }
        added.sort();
        Ok(added)
    }

    fn list_files(&self, tree: &Oid, prefix: &str) -> Result<Vec<String>, RepositoryAccessError> {
        let Some(root) = self.find_tree(*tree)? else {
            return Ok(Vec::new());
        };
        let prefix = prefix.trim_end_matches('/');

        let entry = match root.get_path(Path::new(prefix)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(prefix, "watched folder absent from tree");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Tree) {
            return Ok(Vec::new());
        }
        let folder = self.repo.find_tree(entry.id())?;

        let mut files = Vec::new();
        folder.walk(TreeWalkMode::PreOrder, |dir, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            match entry.name() {
                Some(name) => files.push(format!("{}/{}{}", prefix, dir, name)),
                None => debug!(dir, "skipping entry that is not UTF-8"),
            }
            TreeWalkResult::Ok
        })?;
        files.sort();
        Ok(files)
    }
}

fn empty_tree_oid() -> Oid {
    Oid::from_str(EMPTY_TREE_ID).expect("empty tree id is valid hex")
}
