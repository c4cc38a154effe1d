// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process record store.
//!
//! Documents are kept as JSON values so that filters behave the same way they
//! do against Firestore fields.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{Filter, RecordId};
use crate::error::AppError;

#[derive(Clone)]
pub struct MemoryDb {
    collections: Arc<DashMap<String, BTreeMap<String, serde_json::Value>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn allocate_id(&self) -> RecordId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn to_value<T: Serialize>(obj: &T) -> Result<serde_json::Value, AppError> {
        serde_json::to_value(obj).map_err(|e| AppError::Database(e.to_string()))
    }

    fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, AppError> {
        serde_json::from_value(value).map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create-only write; fails with a conflict if the document exists.
    pub fn insert<T: Serialize>(
        &self,
        collection: &str,
        doc_id: &str,
        obj: &T,
    ) -> Result<(), AppError> {
        let value = Self::to_value(obj)?;
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(doc_id) {
            return Err(AppError::Conflict(format!("{collection}/{doc_id}")));
        }
        docs.insert(doc_id.to_string(), value);
        Ok(())
    }

    pub fn upsert<T: Serialize>(
        &self,
        collection: &str,
        doc_id: &str,
        obj: &T,
    ) -> Result<(), AppError> {
        let value = Self::to_value(obj)?;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc_id.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> Result<Option<T>, AppError> {
        let value = self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(doc_id).cloned());
        value.map(Self::from_value).transpose()
    }

    pub fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: u32,
    ) -> Result<Vec<T>, AppError> {
        let matching: Vec<serde_json::Value> = match self.collections.get(collection) {
            Some(docs) => docs
                .values()
                .filter(|doc| filters.iter().all(|f| f.matches(doc)))
                .take(limit as usize)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        matching.into_iter().map(Self::from_value).collect()
    }

    pub fn delete(&self, collection: &str, doc_id: &str) {
        if let Some(mut docs) = self.collections.get_mut(collection) {
            docs.remove(doc_id);
        }
    }
}
