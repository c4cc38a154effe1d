//! Record store (Firestore, or in-memory for local development and tests).
//!
//! Every collection is keyed by a numeric [`RecordId`] stored as the document
//! ID. Uniqueness constraints (email, identity ID, profile-to-user links) are
//! enforced with guard documents in [`collections::UNIQUE_KEYS`]: a guard is
//! claimed with a create-only write before the record is stored, and released
//! when the record is deleted or the keyed value changes.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Numeric record identifier.
pub type RecordId = u64;

/// Collection names as constants.
pub mod collections {
    pub const BASIC_USERS: &str = "basic_users";
    pub const PATIENTS: &str = "patients";
    pub const CLINIC_STAFF: &str = "clinic_staff";
    pub const PLATFORM_STAFF: &str = "platform_staff";
    pub const CLINIC_MEDIA: &str = "clinic_media";
    pub const CLINIC_APPLICATIONS: &str = "clinic_applications";
    /// Uniqueness guards, keyed by `{collection}:{field}:{value}`
    pub const UNIQUE_KEYS: &str = "unique_keys";
}

/// A value that must be unique across one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub field: &'static str,
    pub value: String,
}

impl UniqueKey {
    pub fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }

    /// Emails compare case-insensitively.
    pub fn email(value: &str) -> Self {
        Self {
            field: "email",
            value: value.trim().to_lowercase(),
        }
    }

    fn doc_id(&self, collection: &str) -> String {
        format!(
            "{}:{}:{}",
            collection,
            self.field,
            urlencoding::encode(&self.value)
        )
    }
}

/// A stored record type.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> RecordId;
    fn set_id(&mut self, id: RecordId);

    /// Values that must not repeat within the collection.
    fn unique_keys(&self) -> Vec<UniqueKey>;
}

/// Value side of an equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Id(RecordId),
    Text(String),
}

/// Equality filter on a top-level field.
///
/// Also used by access rules to scope reads to the caller's own records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: &'static str,
    pub value: FieldValue,
}

impl Filter {
    pub fn id(field: &'static str, value: RecordId) -> Self {
        Self {
            field,
            value: FieldValue::Id(value),
        }
    }

    pub fn text(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: FieldValue::Text(value.into()),
        }
    }

    /// True if the serialized record satisfies this filter.
    pub fn matches(&self, doc: &serde_json::Value) -> bool {
        let Some(field) = doc.get(self.field) else {
            return false;
        };
        match &self.value {
            FieldValue::Id(id) => field.as_u64() == Some(*id),
            FieldValue::Text(text) => field.as_str() == Some(text.as_str()),
        }
    }

    /// True if `record` satisfies this filter.
    pub fn matches_record<R: Record>(&self, record: &R) -> bool {
        serde_json::to_value(record)
            .map(|doc| self.matches(&doc))
            .unwrap_or(false)
    }
}

/// Guard document body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniqueGuard {
    pub collection: String,
    pub record_id: RecordId,
}

#[derive(Clone)]
enum Backend {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

/// Typed record store shared by services and handlers.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
}

impl Db {
    pub fn firestore(db: FirestoreDb) -> Self {
        Self {
            backend: Backend::Firestore(db),
        }
    }

    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryDb::new()),
        }
    }

    /// Allocate an ID for a record that has not been stored yet.
    ///
    /// Used when derived fields (such as media storage paths) depend on the ID.
    pub fn reserve_id(&self) -> Result<RecordId, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.allocate_id(),
            Backend::Memory(db) => Ok(db.allocate_id()),
        }
    }

    async fn insert_doc<T>(&self, collection: &str, doc_id: &str, obj: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        match &self.backend {
            Backend::Firestore(db) => db.insert(collection, doc_id, obj).await,
            Backend::Memory(db) => db.insert(collection, doc_id, obj),
        }
    }

    async fn upsert_doc<T>(&self, collection: &str, doc_id: &str, obj: &T) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        match &self.backend {
            Backend::Firestore(db) => db.upsert(collection, doc_id, obj).await,
            Backend::Memory(db) => db.upsert(collection, doc_id, obj),
        }
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.delete(collection, doc_id).await,
            Backend::Memory(db) => {
                db.delete(collection, doc_id);
                Ok(())
            }
        }
    }

    // ─── Unique Guards ───────────────────────────────────────────

    async fn claim_keys(
        &self,
        collection: &'static str,
        id: RecordId,
        keys: &[UniqueKey],
    ) -> Result<(), AppError> {
        let guard = UniqueGuard {
            collection: collection.to_string(),
            record_id: id,
        };

        for (i, key) in keys.iter().enumerate() {
            let doc_id = key.doc_id(collection);
            if let Err(e) = self
                .insert_doc(collections::UNIQUE_KEYS, &doc_id, &guard)
                .await
            {
                self.release_keys(collection, &keys[..i]).await;
                if e.is_conflict() {
                    return Err(AppError::Conflict(format!(
                        "{} with this {} already exists",
                        collection, key.field
                    )));
                }
                return Err(e);
            }
        }

        Ok(())
    }

    async fn release_keys(&self, collection: &'static str, keys: &[UniqueKey]) {
        for key in keys {
            let doc_id = key.doc_id(collection);
            if let Err(e) = self.delete_doc(collections::UNIQUE_KEYS, &doc_id).await {
                tracing::warn!(
                    collection,
                    field = key.field,
                    error = %e,
                    "Failed to release unique guard"
                );
            }
        }
    }

    // ─── Record Operations ───────────────────────────────────────

    /// Store a new record, assigning an ID if it has none.
    ///
    /// Fails with [`AppError::Conflict`] if a unique value is already taken.
    pub async fn create<R: Record>(&self, mut record: R) -> Result<R, AppError> {
        if record.id() == 0 {
            record.set_id(self.reserve_id()?);
        }
        let id = record.id();
        let keys = record.unique_keys();

        self.claim_keys(R::COLLECTION, id, &keys).await?;

        if let Err(e) = self
            .insert_doc(R::COLLECTION, &id.to_string(), &record)
            .await
        {
            self.release_keys(R::COLLECTION, &keys).await;
            return Err(e);
        }

        tracing::debug!(collection = R::COLLECTION, id, "Record created");
        Ok(record)
    }

    pub async fn find_by_id<R: Record>(&self, id: RecordId) -> Result<Option<R>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.get(R::COLLECTION, &id.to_string()).await,
            Backend::Memory(db) => db.get(R::COLLECTION, &id.to_string()),
        }
    }

    /// Records matching all `filters`, at most `limit` of them.
    pub async fn find<R: Record>(
        &self,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<R>, AppError> {
        match &self.backend {
            Backend::Firestore(db) => db.query(R::COLLECTION, filters, limit).await,
            Backend::Memory(db) => db.query(R::COLLECTION, filters, limit),
        }
    }

    pub async fn find_one<R: Record>(&self, filters: &[Filter]) -> Result<Option<R>, AppError> {
        Ok(self.find(filters, 1).await?.into_iter().next())
    }

    /// Replace a stored record.
    pub async fn update<R: Record>(&self, record: &R) -> Result<(), AppError> {
        let id = record.id();
        let existing: R = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", R::COLLECTION, id)))?;

        let old_keys = existing.unique_keys();
        let new_keys = record.unique_keys();
        let added: Vec<UniqueKey> = new_keys
            .iter()
            .filter(|k| !old_keys.contains(k))
            .cloned()
            .collect();
        let stale: Vec<UniqueKey> = old_keys
            .into_iter()
            .filter(|k| !new_keys.contains(k))
            .collect();

        self.claim_keys(R::COLLECTION, id, &added).await?;

        if let Err(e) = self
            .upsert_doc(R::COLLECTION, &id.to_string(), record)
            .await
        {
            self.release_keys(R::COLLECTION, &added).await;
            return Err(e);
        }

        self.release_keys(R::COLLECTION, &stale).await;
        Ok(())
    }

    /// Delete a record, returning it if it existed.
    pub async fn delete<R: Record>(&self, id: RecordId) -> Result<Option<R>, AppError> {
        let Some(existing) = self.find_by_id::<R>(id).await? else {
            return Ok(None);
        };

        self.delete_doc(R::COLLECTION, &id.to_string()).await?;
        self.release_keys(R::COLLECTION, &existing.unique_keys())
            .await;

        tracing::debug!(collection = R::COLLECTION, id, "Record deleted");
        Ok(Some(existing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BasicUser, ClinicStaff, ClinicStaffStatus, StaffType};

    fn basic_user(email: &str, supabase_user_id: Option<&str>) -> BasicUser {
        BasicUser {
            id: 0,
            email: email.to_string(),
            supabase_user_id: supabase_user_id.map(str::to_string),
            user_type: StaffType::Clinic,
            first_name: None,
            last_name: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_finds_by_filter() {
        let db = Db::memory();
        let created = db
            .create(basic_user("a@example.com", Some("sb-1")))
            .await
            .unwrap();
        assert_ne!(created.id, 0);

        let found: Option<BasicUser> = db
            .find_one(&[Filter::text("supabase_user_id", "sb-1")])
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_case_insensitively() {
        let db = Db::memory();
        db.create(basic_user("a@example.com", Some("sb-1")))
            .await
            .unwrap();

        let err = db
            .create(basic_user("A@Example.com", Some("sb-2")))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // The failed create must not leave its identity guard behind.
        db.create(basic_user("b@example.com", Some("sb-2")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_releases_unique_keys() {
        let db = Db::memory();
        let created = db
            .create(basic_user("a@example.com", Some("sb-1")))
            .await
            .unwrap();

        let deleted: Option<BasicUser> = db.delete(created.id).await.unwrap();
        assert!(deleted.is_some());
        let again: Option<BasicUser> = db.delete(created.id).await.unwrap();
        assert!(again.is_none());

        db.create(basic_user("a@example.com", Some("sb-1")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_one_profile_per_user() {
        let db = Db::memory();
        let staff = ClinicStaff {
            id: 0,
            user: 7,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            status: ClinicStaffStatus::Pending,
            clinic: None,
            created_at: String::new(),
            updated_at: String::new(),
        };

        db.create(staff.clone()).await.unwrap();
        assert!(db.create(staff).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_update_moves_unique_keys() {
        let db = Db::memory();
        let mut user = db
            .create(basic_user("old@example.com", None))
            .await
            .unwrap();

        user.email = "new@example.com".to_string();
        db.update(&user).await.unwrap();

        // Old email is free again, new one is taken.
        db.create(basic_user("old@example.com", None))
            .await
            .unwrap();
        assert!(db
            .create(basic_user("new@example.com", None))
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[test]
    fn test_filter_matches_json() {
        let doc = serde_json::json!({ "user": 5, "status": "approved" });
        assert!(Filter::id("user", 5).matches(&doc));
        assert!(Filter::text("status", "approved").matches(&doc));
        assert!(!Filter::id("user", 6).matches(&doc));
        assert!(!Filter::id("clinic", 5).matches(&doc));
    }
}
