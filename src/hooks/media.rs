// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage path derivation for media records.
//!
//! Uploaded files are stored at `{prefix}/{owner}/{key}/{base}` where `owner`
//! is the owning record's ID, `key` is a per-file folder key and `base` is
//! the last segment of the uploaded filename. The record's `filename` is set
//! to the same path without the prefix.

use sha2::{Digest, Sha256};

use super::{ChangeOperation, HookError};
use crate::db::RecordId;

/// Owner segment used for hashing when a collection has no owner.
const UNOWNED_SEGMENT: &str = "platform";

/// Where the per-file folder key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKey {
    /// The record ID.
    DocId,
    /// A caller-provided field (see [`MediaDraft::key_field`]).
    Field,
    /// A short hash of owner, filename and size.
    Hash,
}

/// Per-collection settings.
#[derive(Debug, Clone, Copy)]
pub struct StorageOptions {
    pub key: FolderKey,
    pub prefix: &'static str,
    pub owner_required: bool,
}

/// Values visible to the hook, with incoming values taking precedence over
/// the stored record.
#[derive(Debug, Clone, Default)]
pub struct MediaDraft<'a> {
    /// Filename from the incoming change, if any
    pub filename: Option<&'a str>,
    /// Filename on the stored record
    pub previous_filename: Option<&'a str>,
    /// Storage path on the stored record
    pub previous_storage_path: Option<&'a str>,
    pub owner: Option<RecordId>,
    pub doc_id: Option<RecordId>,
    pub key_field: Option<&'a str>,
    pub file_size: Option<u64>,
}

/// Derived fields. `None` means leave the stored value unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOutcome {
    pub filename: Option<String>,
    pub storage_path: Option<String>,
}

/// Replace path separators so a value is safe as a single path segment.
pub fn sanitize_segment(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace(['/', '\\'], "_"))
}

/// Last path segment of a filename.
pub fn base_filename(filename: &str) -> Option<&str> {
    filename
        .trim_start_matches('/')
        .rsplit('/')
        .next()
        .filter(|base| !base.is_empty())
}

fn short_hash(owner: Option<&str>, base: Option<&str>, file_size: Option<u64>) -> String {
    let mut raw = format!(
        "{}:{}",
        owner.unwrap_or(UNOWNED_SEGMENT),
        base.unwrap_or("unknown")
    );
    if let Some(size) = file_size.filter(|s| *s > 0) {
        raw.push_str(&format!(":{size}"));
    }
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)[..10].to_string()
}

fn join_segments(segments: &[Option<&str>]) -> String {
    segments
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the nested filename and storage path for a media change.
///
/// On create every segment must resolve. On update the previous storage
/// path is kept when one cannot, and the filename is only rewritten when
/// the change carries a new one.
pub fn compute_storage(
    operation: ChangeOperation,
    draft: &MediaDraft<'_>,
    options: &StorageOptions,
) -> Result<StorageOutcome, HookError> {
    let owner = draft.owner.map(|id| id.to_string());
    let base = draft
        .filename
        .or(draft.previous_filename)
        .and_then(base_filename);

    let mut folder_key = match options.key {
        FolderKey::DocId => draft.doc_id.map(|id| id.to_string()),
        FolderKey::Field => draft.key_field.and_then(sanitize_segment),
        FolderKey::Hash => Some(short_hash(owner.as_deref(), base, draft.file_size)),
    };

    if folder_key.is_none() && operation == ChangeOperation::Create {
        folder_key = Some(short_hash(owner.as_deref(), base, draft.file_size));
    }

    let owner_missing = options.owner_required && owner.is_none();
    let (Some(key), Some(base), false) = (folder_key.as_deref(), base, owner_missing) else {
        if operation == ChangeOperation::Create {
            return Err(if owner_missing {
                HookError::MissingOwner
            } else if folder_key.is_none() {
                HookError::MissingFolderKey
            } else {
                HookError::MissingFilename
            });
        }
        return Ok(StorageOutcome {
            filename: None,
            storage_path: draft.previous_storage_path.map(str::to_string),
        });
    };

    let nested = join_segments(&[owner.as_deref(), Some(key), Some(base)]);
    let storage_path = join_segments(&[Some(options.prefix), Some(nested.as_str())]);

    tracing::debug!(
        prefix = options.prefix,
        owner = owner.as_deref(),
        folder_key = key,
        nested_filename = %nested,
        storage_path = %storage_path,
        "Derived media storage path"
    );

    let rewrite_filename = operation == ChangeOperation::Create || draft.filename.is_some();
    Ok(StorageOutcome {
        filename: rewrite_filename.then_some(nested),
        storage_path: Some(storage_path),
    })
}
