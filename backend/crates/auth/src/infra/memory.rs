//! In-Memory Document Store
//!
//! Process-local [`DocumentStore`] for tests, demos and single-node
//! deployments. Every write takes the collection lock, so the uniqueness check
//! and the insert happen as one step.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use platform::crypto::random_alphanumeric;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::repository::{Document, DocumentStore, Filter, StoredDocument};
use crate::error::StoreError;

/// Length of store-assigned keys
const GENERATED_KEY_LENGTH: usize = 20;

type Collection = BTreeMap<String, Document>;

/// In-memory document store; clones share the same data
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    unique_fields: Arc<HashMap<String, Vec<String>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would give two documents of `collection` the same
    /// value for `field`
    pub fn with_unique_field(mut self, collection: &str, field: &str) -> Self {
        Arc::make_mut(&mut self.unique_fields)
            .entry(collection.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |docs| docs.len())
    }

    fn check_unique(
        &self,
        collection: &str,
        docs: &Collection,
        key: &str,
        body: &Document,
    ) -> Result<(), StoreError> {
        let Some(fields) = self.unique_fields.get(collection) else {
            return Ok(());
        };

        for field in fields {
            let Some(value) = body.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = docs
                .iter()
                .any(|(other_key, other)| other_key != key && other.get(field) == Some(value));
            if taken {
                return Err(StoreError::UniqueViolation {
                    collection: collection.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn get_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.find_matching(collection, &Filter::eq(field, value.clone()))
            .await
    }

    async fn get_by_key(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|body| StoredDocument {
                key: key.to_string(),
                body: body.clone(),
            }))
    }

    async fn insert(&self, collection: &str, body: Document) -> Result<String, StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let key = loop {
            let candidate = random_alphanumeric(GENERATED_KEY_LENGTH);
            if !docs.contains_key(&candidate) {
                break candidate;
            }
        };

        self.check_unique(collection, docs, &key, &body)?;
        docs.insert(key.clone(), body);
        Ok(key)
    }

    async fn insert_at(
        &self,
        collection: &str,
        key: &str,
        body: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.contains_key(key) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        self.check_unique(collection, docs, key, &body)?;
        docs.insert(key.to_string(), body);
        Ok(())
    }

    async fn merge_update(
        &self,
        collection: &str,
        key: &str,
        partial: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            key: key.to_string(),
        };
        let docs = collections.get_mut(collection).ok_or_else(not_found)?;

        let mut merged = docs.get(key).cloned().ok_or_else(not_found)?;
        merged.extend(partial);

        self.check_unique(collection, docs, key, &merged)?;
        docs.insert(key.to_string(), merged);
        Ok(())
    }

    async fn delete_by_key(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        if let Some(docs) = self.collections.write().await.get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }

    async fn delete_all_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|_, body| !filter.matches(body));
        Ok((before - docs.len()) as u64)
    }

    async fn find_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| filter.matches(body))
                    .map(|(key, body)| StoredDocument {
                        key: key.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
