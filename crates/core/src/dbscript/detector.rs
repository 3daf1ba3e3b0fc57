//! Ordinal collision detection.
//!
//! Given the scripts a change adds and the scripts already present at the
//! base reference, the detector finds an added script whose ordinal key is
//! already claimed by a different script.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dbscript::filename::{FileSet, MigrationFilename};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where the script an added script collided with came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CollisionSource {
    /// Already present at the base reference.
    Existing,
    /// Added by the same change.
    SameChange,
}

impl fmt::Display for CollisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::SameChange => write!(f, "same_change"),
        }
    }
}

/// Outcome of comparing one change against history.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CollisionVerdict {
    Clean,
    Collision {
        /// The added script that reuses an ordinal.
        conflicting: MigrationFilename,
        /// The ordinal key both scripts claim.
        ordinal_key: String,
        /// The script that already holds that ordinal.
        prior: MigrationFilename,
        source: CollisionSource,
    },
}

impl CollisionVerdict {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Stateless detector comparing two script sets.
pub struct CollisionDetector;

impl CollisionDetector {
    /// Report the first ordinal collision, or `Clean`.
    ///
    /// Added scripts are visited in filename order and the first one with a
    /// match wins. Its match is the smallest existing filename sharing the
    /// ordinal key; when history has none, the smallest other added filename
    /// sharing it. Identical filenames are the same script, not a collision.
    pub fn detect(added: &FileSet, existing: &FileSet) -> CollisionVerdict {
        info!(
            added_count = added.len(),
            existing_count = existing.len(),
            "detecting ordinal collisions"
        );

        for candidate in added {
            let prior = first_match(candidate, existing)
                .map(|p| (p, CollisionSource::Existing))
                .or_else(|| first_match(candidate, added).map(|p| (p, CollisionSource::SameChange)));

            if let Some((prior, source)) = prior {
                debug!(
                    conflicting = %candidate,
                    prior = %prior,
                    ordinal = candidate.ordinal_key(),
                    %source,
                    "ordinal collision detected"
                );
                return CollisionVerdict::Collision {
                    conflicting: candidate.clone(),
                    ordinal_key: candidate.ordinal_key().to_string(),
                    prior: prior.clone(),
                    source,
                };
            }
        }

        info!("no ordinal collisions");
        CollisionVerdict::Clean
    }
}

/// Smallest script in `pool` with the same ordinal key and a different name.
fn first_match<'a>(
    candidate: &MigrationFilename,
    pool: &'a FileSet,
) -> Option<&'a MigrationFilename> {
    pool.iter().find(|other| {
        other.ordinal_key() == candidate.ordinal_key() && other.filename() != candidate.filename()
    })
}
