//! Record persistence seam.
//!
//! The runner talks to storage only through [`RecordStore`]. [`MemoryStore`]
//! keeps everything in memory and can import/export a JSON array of records,
//! which is what the CLI uses.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::error::{LifecycleError, Result};
use crate::lifecycle::Record;

/// Query, load and mutate records of one entity type at a time.
pub trait RecordStore {
    /// Every record id of `entity_type`.
    fn query_ids(&mut self, entity_type: &str) -> Result<Vec<String>>;

    /// Loads the given ids in one call. Ids that no longer exist are left out.
    fn load_batch(&mut self, entity_type: &str, ids: &[String]) -> Result<Vec<Record>>;

    fn save(&mut self, record: &Record) -> Result<()>;

    fn delete(&mut self, record: &Record) -> Result<()>;

    /// Drops whatever the store keeps around for these ids after a load.
    fn release_cache(&mut self, entity_type: &str, ids: &[String]);
}

type Key = (String, String);

/// In-memory [`RecordStore`] with an explicit load cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: BTreeMap<Key, Record>,
    cache: HashMap<Key, Record>,
    queries: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Reads a JSON array of records.
    pub fn load_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<Record> = serde_json::from_str(&contents)?;
        Ok(Self::from_records(records))
    }

    /// Writes all records back as a pretty-printed JSON array.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let records: Vec<&Record> = self.records.values().collect();
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn insert(&mut self, record: Record) {
        let key = (record.entity_type.clone(), record.id.clone());
        self.records.insert(key, record);
    }

    pub fn get(&self, entity_type: &str, id: &str) -> Option<&Record> {
        self.records.get(&(entity_type.to_string(), id.to_string()))
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records currently held in the load cache.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Number of `query_ids` calls served.
    pub fn query_count(&self) -> usize {
        self.queries
    }
}

impl RecordStore for MemoryStore {
    fn query_ids(&mut self, entity_type: &str) -> Result<Vec<String>> {
        self.queries += 1;
        Ok(self
            .records
            .keys()
            .filter(|(t, _)| t == entity_type)
            .map(|(_, id)| id.clone())
            .collect())
    }

    fn load_batch(&mut self, entity_type: &str, ids: &[String]) -> Result<Vec<Record>> {
        let mut loaded = Vec::with_capacity(ids.len());
        for id in ids {
            let key = (entity_type.to_string(), id.clone());
            if let Some(record) = self.records.get(&key) {
                self.cache.insert(key, record.clone());
                loaded.push(record.clone());
            }
        }
        debug!(entity_type, requested = ids.len(), loaded = loaded.len(), "batch loaded");
        Ok(loaded)
    }

    fn save(&mut self, record: &Record) -> Result<()> {
        let key = (record.entity_type.clone(), record.id.clone());
        if !self.records.contains_key(&key) {
            return Err(LifecycleError::RecordNotFound {
                entity_type: record.entity_type.clone(),
                id: record.id.clone(),
            });
        }
        let mut stored = record.clone();
        stored.is_new = false;
        self.cache.insert(key.clone(), stored.clone());
        self.records.insert(key, stored);
        Ok(())
    }

    fn delete(&mut self, record: &Record) -> Result<()> {
        let key = (record.entity_type.clone(), record.id.clone());
        self.cache.remove(&key);
        match self.records.remove(&key) {
            Some(_) => Ok(()),
            None => Err(LifecycleError::RecordNotFound {
                entity_type: record.entity_type.clone(),
                id: record.id.clone(),
            }),
        }
    }

    fn release_cache(&mut self, entity_type: &str, ids: &[String]) {
        for id in ids {
            self.cache.remove(&(entity_type.to_string(), id.clone()));
        }
    }
}
