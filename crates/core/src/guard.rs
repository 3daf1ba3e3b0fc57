//! Host-facing validation entry points.
//!
//! Every call-site (a received commit, a published patch, a pre-merge check,
//! a git hook ref update) reduces to the same question: does the incoming
//! tree add a migration script whose ordinal is already taken relative to a
//! base reference? [`DbscriptGuard::check`] answers it; the `on_*` methods
//! map their event onto it and turn the verdict into a [`ValidationOutcome`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::GuardConfig;
use crate::dbscript::{
    ChangeContext, CollisionDetector, CollisionSource, CollisionVerdict, DbscriptSetBuilder,
};
use crate::errors::{CoreError, RepositoryAccessError};
use crate::git::{RepositoryHandle, TreeAccessor, EMPTY_TREE_ID};
use crate::hook::RefUpdate;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A commit pushed for review or directly to a branch.
#[derive(Debug, Clone)]
pub struct CommitReceived {
    pub project: String,
    /// Branch the commit targets (`main` or `refs/heads/main`).
    pub target_branch: String,
    pub commit: String,
}

/// A patch made visible for review, identified by its ref
/// (e.g. `refs/changes/34/1234/2`).
#[derive(Debug, Clone)]
pub struct PatchPublished {
    pub project: String,
    pub target_branch: String,
    pub patch_ref: String,
}

/// A merge candidate about to land on its destination branch.
#[derive(Debug, Clone)]
pub struct PreMerge {
    pub project: String,
    pub destination_branch: String,
    pub commit: String,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a change was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// An added script reuses a taken ordinal.
    Collision {
        ordinal_key: String,
        conflicting: String,
        prior: String,
        source: CollisionSource,
    },
    /// The repository could not be read, so the check could not run.
    RepositoryAccess { detail: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collision {
                ordinal_key,
                conflicting,
                prior,
                source: CollisionSource::Existing,
            } => write!(
                f,
                "{} collides with existing file {} (added {})",
                ordinal_key, prior, conflicting
            ),
            Self::Collision {
                ordinal_key,
                conflicting,
                prior,
                source: CollisionSource::SameChange,
            } => write!(
                f,
                "{} collides with file {} added in the same change (added {})",
                ordinal_key, prior, conflicting
            ),
            Self::RepositoryAccess { detail } => write!(
                f,
                "dbscript collision check could not read the repository: {}",
                detail
            ),
        }
    }
}

/// What the host should do with the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Accept,
    Reject { reason: RejectReason },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Rejection message, `None` when accepted.
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Accept => None,
            Self::Reject { reason } => Some(reason.to_string()),
        }
    }

    fn from_check(result: Result<CollisionVerdict, CoreError>) -> Self {
        let reason = match result {
            Ok(CollisionVerdict::Clean) => return Self::Accept,
            Ok(CollisionVerdict::Collision {
                conflicting,
                ordinal_key,
                prior,
                source,
            }) => RejectReason::Collision {
                ordinal_key,
                conflicting: conflicting.filename().to_string(),
                prior: prior.filename().to_string(),
                source,
            },
            Err(e) => RejectReason::RepositoryAccess {
                detail: e.to_string(),
            },
        };
        Self::Reject { reason }
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// Runs the collision check against repositories opened through `A`.
pub struct DbscriptGuard<A: TreeAccessor> {
    config: GuardConfig,
    accessor: A,
}

impl<A: TreeAccessor> DbscriptGuard<A> {
    pub fn new(config: GuardConfig, accessor: A) -> Self {
        Self { config, accessor }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Compare `incoming` against `base_reference` in `project`.
    ///
    /// The repository is opened for this call only and released before the
    /// verdict is returned, whichever way the call ends.
    #[instrument(skip(self))]
    pub fn check(
        &self,
        project: &str,
        base_reference: &str,
        incoming: &str,
    ) -> Result<CollisionVerdict, CoreError> {
        let context = ChangeContext::new(
            self.config.guard.watched_folder.as_str(),
            base_reference,
            incoming,
        );

        let verdict = {
            let handle = self.accessor.open_repository(project)?;
            let builder = DbscriptSetBuilder::new(&handle);
            let added = builder.added_scripts(&context)?;
            let existing = builder.existing_scripts(&context)?;
            CollisionDetector::detect(&added, &existing)
        };

        Ok(verdict)
    }

    /// Run [`check`](Self::check) if the project has the guard enabled and
    /// turn the result into an outcome. Access failures reject.
    pub fn validate(&self, project: &str, base_reference: &str, incoming: &str) -> ValidationOutcome {
        if !self.config.is_enabled_for(project) {
            debug!(project, "dbscript collision check disabled for project");
            return ValidationOutcome::Accept;
        }

        info!(project, base_reference, incoming, "validating change");
        let outcome = ValidationOutcome::from_check(self.check(project, base_reference, incoming));
        match &outcome {
            ValidationOutcome::Accept => info!(project, "change accepted"),
            ValidationOutcome::Reject { reason } => warn!(project, %reason, "change rejected"),
        }
        outcome
    }

    pub fn on_commit_received(&self, event: &CommitReceived) -> ValidationOutcome {
        self.validate(
            &event.project,
            &branch_ref(&event.target_branch),
            &event.commit,
        )
    }

    pub fn on_patch_published(&self, event: &PatchPublished) -> ValidationOutcome {
        self.validate(
            &event.project,
            &branch_ref(&event.target_branch),
            &event.patch_ref,
        )
    }

    pub fn on_pre_merge(&self, event: &PreMerge) -> ValidationOutcome {
        self.validate(
            &event.project,
            &branch_ref(&event.destination_branch),
            &event.commit,
        )
    }

    /// Check one ref update received by a git hook.
    ///
    /// Deletions and non-branch refs pass. A new branch is compared against
    /// `HEAD`, or against nothing when `HEAD` is unborn.
    pub fn on_ref_update(&self, project: &str, update: &RefUpdate) -> ValidationOutcome {
        if update.is_delete() || !update.is_branch() {
            debug!(refname = %update.refname, "ref update not checked");
            return ValidationOutcome::Accept;
        }
        if !update.is_create() {
            return self.validate(project, &update.old, &update.new);
        }
        if !self.config.is_enabled_for(project) {
            return ValidationOutcome::Accept;
        }

        match self.head_is_born(project) {
            Ok(true) => self.validate(project, "HEAD", &update.new),
            Ok(false) => self.validate(project, EMPTY_TREE_ID, &update.new),
            Err(e) => ValidationOutcome::from_check(Err(e.into())),
        }
    }

    fn head_is_born(&self, project: &str) -> Result<bool, RepositoryAccessError> {
        let handle = self.accessor.open_repository(project)?;
        match handle.resolve_tree("HEAD") {
            Ok(_) => Ok(true),
            Err(RepositoryAccessError::ReferenceNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// `main` → `refs/heads/main`; full ref names pass through.
fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::git::fixtures::TestRepo;
    use crate::git::GitTreeAccessor;

    const ZERO: &str = "0000000000000000000000000000000000000000";

    fn guard() -> DbscriptGuard<GitTreeAccessor> {
        let mut config = GuardConfig::default();
        config.guard.watched_folder = "db/upgrade".into();
        DbscriptGuard::new(config, GitTreeAccessor::new())
    }

    #[test]
    fn test_branch_ref() {
        assert_eq!(branch_ref("main"), "refs/heads/main");
        assert_eq!(branch_ref("refs/heads/ovirt-4.1"), "refs/heads/ovirt-4.1");
    }

    #[test]
    fn test_commit_received_collision_message() {
        let repo = TestRepo::new();
        repo.commit("main", &["db/upgrade/04_00_0100_init.sql"]);
        let commit = repo.commit_detached(
            Some("main"),
            &["db/upgrade/04_00_0100_init.sql", "db/upgrade/04_00_0100_other.sql"],
        );

        let outcome = guard().on_commit_received(&CommitReceived {
            project: repo.path_str().to_string(),
            target_branch: "main".into(),
            commit: commit.to_string(),
        });
        assert_eq!(
            outcome.message().as_deref(),
            Some("04_00_0100 collides with existing file 04_00_0100_init.sql (added 04_00_0100_other.sql)")
        );
    }

    #[test]
    fn test_patch_published_clean() {
        let repo = TestRepo::new();
        repo.commit("main", &["db/upgrade/04_00_0100_init.sql"]);
        let patch = repo.commit_detached(
            Some("main"),
            &["db/upgrade/04_00_0100_init.sql", "db/upgrade/04_00_0200_next.sql"],
        );
        repo.set_ref("refs/changes/34/1234/2", patch);

        let outcome = guard().on_patch_published(&PatchPublished {
            project: repo.path_str().to_string(),
            target_branch: "main".into(),
            patch_ref: "refs/changes/34/1234/2".into(),
        });
        assert!(outcome.is_accepted());
    }

    #[test]
    fn test_pre_merge_same_change_collision() {
        let repo = TestRepo::new();
        repo.commit("main", &["README"]);
        let commit = repo.commit_detached(
            Some("main"),
            &["README", "db/upgrade/04_00_0100_a.sql", "db/upgrade/04_00_0100_b.sql"],
        );

        let outcome = guard().on_pre_merge(&PreMerge {
            project: repo.path_str().to_string(),
            destination_branch: "refs/heads/main".into(),
            commit: commit.to_string(),
        });
        match outcome {
            ValidationOutcome::Reject {
                reason: RejectReason::Collision { source, ref conflicting, .. },
            } => {
                assert_eq!(source, CollisionSource::SameChange);
                assert_eq!(conflicting, "04_00_0100_a.sql");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_access_error_rejects_with_distinct_message() {
        let repo = TestRepo::new();
        repo.commit("main", &["README"]);

        let outcome = guard().on_commit_received(&CommitReceived {
            project: repo.path_str().to_string(),
            target_branch: "main".into(),
            commit: "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef".into(),
        });
        assert!(matches!(
            outcome,
            ValidationOutcome::Reject {
                reason: RejectReason::RepositoryAccess { .. }
            }
        ));
        let message = outcome.message().unwrap();
        assert!(message.starts_with("dbscript collision check could not read the repository"));
        assert!(!message.contains("collides"));
    }

    #[test]
    fn test_missing_repository_rejects() {
        let outcome = guard().validate("/nonexistent/repository", "main", "HEAD");
        assert!(!outcome.is_accepted());
    }

    #[test]
    fn test_disabled_project_is_accepted_without_access() {
        let mut guard = guard();
        guard.config.projects.insert(
            "/nonexistent/repository".into(),
            ProjectConfig {
                enabled: Some(false),
            },
        );
        assert!(guard
            .validate("/nonexistent/repository", "main", "HEAD")
            .is_accepted());
    }

    #[test]
    fn test_ref_update_on_existing_branch() {
        let repo = TestRepo::new();
        let old = repo.commit("main", &["db/upgrade/04_00_0100_init.sql"]);
        let new = repo.commit_detached(
            Some("main"),
            &["db/upgrade/04_00_0100_init.sql", "db/upgrade/04_00_0100_again.sql"],
        );

        let update = RefUpdate::new(old.to_string(), new.to_string(), "refs/heads/main");
        let outcome = guard().on_ref_update(repo.path_str(), &update);
        assert!(!outcome.is_accepted());
    }

    #[test]
    fn test_ref_update_new_branch_compares_against_head() {
        let repo = TestRepo::new();
        repo.commit("main", &["db/upgrade/04_00_0100_init.sql"]);
        let new = repo.commit_detached(None, &["db/upgrade/04_00_0100_fork.sql"]);

        let update = RefUpdate::new(ZERO, new.to_string(), "refs/heads/topic");
        let outcome = guard().on_ref_update(repo.path_str(), &update);
        assert!(!outcome.is_accepted());
    }

    #[test]
    fn test_ref_update_into_empty_repository() {
        let repo = TestRepo::new();
        let clean = repo.commit_detached(None, &["db/upgrade/04_00_0100_a.sql"]);
        let dup = repo.commit_detached(
            None,
            &["db/upgrade/04_00_0100_a.sql", "db/upgrade/04_00_0100_b.sql"],
        );

        let guard = guard();
        let update = RefUpdate::new(ZERO, clean.to_string(), "refs/heads/main");
        assert!(guard.on_ref_update(repo.path_str(), &update).is_accepted());

        let update = RefUpdate::new(ZERO, dup.to_string(), "refs/heads/main");
        assert!(!guard.on_ref_update(repo.path_str(), &update).is_accepted());
    }

    #[test]
    fn test_ref_update_deletes_and_tags_pass() {
        let guard = guard();
        let delete = RefUpdate::new("1111111111111111111111111111111111111111", ZERO, "refs/heads/x");
        assert!(guard.on_ref_update("/nonexistent", &delete).is_accepted());
        let tag = RefUpdate::new(ZERO, "1111111111111111111111111111111111111111", "refs/tags/v1");
        assert!(guard.on_ref_update("/nonexistent", &tag).is_accepted());
    }
}
