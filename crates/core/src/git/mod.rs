//! Repository tree access for dbscript-guard.

pub mod accessor;
pub mod client;

#[cfg(test)]
pub(crate) mod fixtures;

pub use accessor::{RepositoryHandle, TreeAccessor};
pub use client::{GitRepositoryHandle, GitTreeAccessor, EMPTY_TREE_ID};
