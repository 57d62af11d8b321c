//! Record storage.
//!
//! Records are JSON objects grouped in named collections. Every record gets
//! a UUID v7 `id` plus `createdAt`/`updatedAt` timestamps on insert.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use hermes_core::{BoxFuture, DispatchError, JsonMap};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// One stored record.
pub type Record = JsonMap;

/// Store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// Field holding the record id.
pub const ID: &str = "id";

const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Storage failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A unique field collided with another record.
    #[error("{collection}.{field} already exists")]
    Duplicate {
        /// Collection.
        collection: String,
        /// Unique field.
        field: String,
    },

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for DispatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field, .. } => {
                DispatchError::conflict(format!("{field} already exists"))
            }
            StoreError::Backend(_) => DispatchError::internal(err.to_string()),
        }
    }
}

/// Asynchronous record storage.
pub trait RecordStore: Send + Sync + 'static {
    /// Inserts a record and returns it with its id and timestamps.
    fn create<'a>(&'a self, collection: &'a str, record: Record) -> BoxFuture<'a, StoreResult<Record>>;

    /// A record by id.
    fn find_by_id<'a>(&'a self, collection: &'a str, id: &'a str)
        -> BoxFuture<'a, StoreResult<Option<Record>>>;

    /// Records whose fields equal every entry of `filter`, in insertion
    /// order. An empty filter matches everything.
    fn find_where<'a>(&'a self, collection: &'a str, filter: Record) -> BoxFuture<'a, StoreResult<Vec<Record>>>;

    /// Merges `patch` into a record. `null` values remove fields; `id` and
    /// `createdAt` are never overwritten. Returns the updated record.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        patch: Record,
    ) -> BoxFuture<'a, StoreResult<Option<Record>>>;

    /// Removes a record and returns it.
    fn delete<'a>(&'a self, collection: &'a str, id: &'a str)
        -> BoxFuture<'a, StoreResult<Option<Record>>>;
}

type Collection = IndexMap<String, Record>;

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    unique: Vec<(String, String)>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unique field.
    #[must_use]
    pub fn with_unique(mut self, collection: impl Into<String>, field: impl Into<String>) -> Self {
        self.unique.push((collection.into(), field.into()));
        self
    }

    /// Number of records in a collection.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, IndexMap::len)
    }

    fn check_unique(&self, collection: &str, records: &Collection, record: &Record) -> StoreResult<()> {
        let id = record.get(ID).and_then(Value::as_str);
        for (_, field) in self.unique.iter().filter(|(c, _)| c == collection) {
            let Some(value) = record.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = records
                .iter()
                .any(|(other_id, other)| Some(other_id.as_str()) != id && other.get(field) == Some(value));
            if taken {
                return Err(StoreError::Duplicate {
                    collection: collection.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn insert_now(&self, collection: &str, mut record: Record) -> StoreResult<Record> {
        let id = Uuid::now_v7().to_string();
        let now = timestamp();
        record.insert(ID.to_string(), Value::String(id.clone()));
        record.insert(CREATED_AT.to_string(), Value::String(now.clone()));
        record.insert(UPDATED_AT.to_string(), Value::String(now));

        let mut collections = self.collections.write();
        let records = collections.entry(collection.to_string()).or_default();
        self.check_unique(collection, records, &record)?;
        records.insert(id, record.clone());
        Ok(record)
    }

    fn update_now(&self, collection: &str, id: &str, patch: Record) -> StoreResult<Option<Record>> {
        let mut collections = self.collections.write();
        let Some(records) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(current) = records.get(id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        for (key, value) in patch {
            if key == ID || key == CREATED_AT {
                continue;
            }
            if value.is_null() {
                updated.remove(&key);
            } else {
                updated.insert(key, value);
            }
        }
        updated.insert(UPDATED_AT.to_string(), Value::String(timestamp()));

        self.check_unique(collection, records, &updated)?;
        records.insert(id.to_string(), updated.clone());
        Ok(Some(updated))
    }
}

impl RecordStore for MemoryStore {
    fn create<'a>(&'a self, collection: &'a str, record: Record) -> BoxFuture<'a, StoreResult<Record>> {
        Box::pin(std::future::ready(self.insert_now(collection, record)))
    }

    fn find_by_id<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Record>>> {
        let found = self
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned();
        Box::pin(std::future::ready(Ok(found)))
    }

    fn find_where<'a>(&'a self, collection: &'a str, filter: Record) -> BoxFuture<'a, StoreResult<Vec<Record>>> {
        let found = self
            .collections
            .read()
            .get(collection)
            .map(|records| {
                records
                    .values()
                    .filter(|record| filter.iter().all(|(k, v)| record.get(k) == Some(v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Box::pin(std::future::ready(Ok(found)))
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        patch: Record,
    ) -> BoxFuture<'a, StoreResult<Option<Record>>> {
        Box::pin(std::future::ready(self.update_now(collection, id, patch)))
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<Record>>> {
        let removed = self
            .collections
            .write()
            .get_mut(collection)
            .and_then(|records| records.shift_remove(id));
        Box::pin(std::future::ready(Ok(removed)))
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
