//! Throwaway bare repositories for unit tests.

use std::path::Path;

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    /// A bare repository whose `HEAD` points at the unborn `main` branch.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Self::init_bare(dir.path());
        Self { dir, repo }
    }

    pub fn init_bare(path: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.bare(true).initial_head("main");
        Repository::init_opts(path, &opts).unwrap()
    }

    pub fn path_str(&self) -> &str {
        self.dir.path().to_str().unwrap()
    }

    /// Commit a snapshot containing exactly `paths` (content = path) on top
    /// of `branch`.
    pub fn commit(&self, branch: &str, paths: &[&str]) -> Oid {
        let files: Vec<(&str, &str)> = paths.iter().map(|p| (*p, *p)).collect();
        self.commit_with(branch, &files)
    }

    /// Commit a snapshot containing exactly `files` on top of `branch`.
    pub fn commit_with(&self, branch: &str, files: &[(&str, &str)]) -> Oid {
        let refname = format!("refs/heads/{}", branch);
        let parent = self
            .repo
            .find_reference(&refname)
            .ok()
            .map(|r| r.peel_to_commit().unwrap());
        let tree = self.write_tree(files);
        let sig = Self::signature();
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some(&refname), &sig, &sig, "test commit", &tree, &parents)
            .unwrap()
    }

    /// Commit a snapshot whose parent is `parent_rev` without moving any ref,
    /// the way a pushed commit sits in the object store before its ref is
    /// updated.
    pub fn commit_detached(&self, parent_rev: Option<&str>, paths: &[&str]) -> Oid {
        let files: Vec<(&str, &str)> = paths.iter().map(|p| (*p, *p)).collect();
        let parent = parent_rev.map(|rev| {
            self.repo
                .revparse_single(rev)
                .unwrap()
                .peel_to_commit()
                .unwrap()
        });
        let tree = self.write_tree(&files);
        let sig = Self::signature();
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(None, &sig, &sig, "detached commit", &tree, &parents)
            .unwrap()
    }

    /// Point `refname` at `target`.
    pub fn set_ref(&self, refname: &str, target: Oid) {
        self.repo.reference(refname, target, true, "test").unwrap();
    }

    pub fn tree_of(&self, rev: &str) -> Oid {
        self.repo
            .revparse_single(rev)
            .unwrap()
            .peel_to_tree()
            .unwrap()
            .id()
    }

    pub fn blob_id(&self, rev: &str, path: &str) -> Oid {
        self.repo
            .revparse_single(&format!("{}:{}", rev, path))
            .unwrap()
            .id()
    }

    fn write_tree<'r>(&'r self, files: &[(&str, &str)]) -> git2::Tree<'r> {
        let mut index = Index::new().unwrap();
        for (path, content) in files {
            let id = self.repo.blob(content.as_bytes()).unwrap();
            index.add(&index_entry(path, id)).unwrap();
        }
        let tree_id = index.write_tree_to(&self.repo).unwrap();
        self.repo.find_tree(tree_id).unwrap()
    }

    fn signature() -> Signature<'static> {
        Signature::now("Test", "test@example.com").unwrap()
    }
}

fn index_entry(path: &str, id: Oid) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: 0,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}
