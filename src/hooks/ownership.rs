//! Freeze-on-update guard for ownership relations.

use super::{ChangeOperation, HookError};
use crate::db::RecordId;

/// Reject an update that moves a relation to a different record.
///
/// Only applies to updates where both the incoming and the stored value are
/// known. Clearing or first setting the relation is left to the caller.
pub fn assert_frozen_relation(
    operation: ChangeOperation,
    incoming: Option<RecordId>,
    existing: Option<RecordId>,
    field: &str,
    message: Option<&str>,
) -> Result<(), HookError> {
    if operation != ChangeOperation::Update {
        return Ok(());
    }

    match (incoming, existing) {
        (Some(next), Some(prev)) if next != prev => Err(HookError::Frozen(
            message
                .map(str::to_string)
                .unwrap_or_else(|| format!("{field} cannot be changed once set")),
        )),
        _ => Ok(()),
    }
}
