// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Before-change hooks applied to records on create and update.

pub mod media;
pub mod ownership;

pub use media::{compute_storage, FolderKey, MediaDraft, StorageOptions, StorageOutcome};
pub use ownership::assert_frozen_relation;

/// Which write a hook is running for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOperation {
    Create,
    Update,
}

/// A hook rejected the change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("{0}")]
    Frozen(String),

    #[error("Unable to resolve owner for media upload")]
    MissingOwner,

    #[error("Unable to resolve folder key for media upload")]
    MissingFolderKey,

    #[error("Unable to resolve filename for media upload")]
    MissingFilename,
}
