//! Clinic-owned media metadata.

use serde::{Deserialize, Serialize};

use crate::db::{collections, Record, RecordId, UniqueKey};

/// Media file uploaded by or for a clinic.
///
/// `filename` and `storage_path` are derived from the owning clinic and the
/// record id when the record is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicMedia {
    #[serde(default)]
    pub id: RecordId,
    /// Owning clinic; frozen after creation
    pub clinic: RecordId,
    /// Alternative text for screen readers
    pub alt: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// Uploading BasicUser (auto-set)
    pub created_by: RecordId,
    pub filename: String,
    pub storage_path: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record for ClinicMedia {
    const COLLECTION: &'static str = collections::CLINIC_MEDIA;

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        Vec::new()
    }
}
