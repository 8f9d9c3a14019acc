use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::store::schema::{Collection, Key};

const FILE_PREFIX: &str = "volunteerhub_";

/// Fallback backend: a flat namespace of JSON files, one array per
/// collection, mirrored in memory. Lookups that the primary backend serves
/// from an index degenerate to linear scans here, with identical results.
pub struct FlatFileBackend {
    dir: PathBuf,
    cache: RwLock<HashMap<Collection, Vec<Value>>>,
}

impl FlatFileBackend {
    pub fn open(dir: &Path) -> Result<FlatFileBackend, AppError> {
        std::fs::create_dir_all(dir)
            .map_err(|err| AppError::Storage(format!("cannot create data dir: {err}")))?;

        let mut cache = HashMap::new();
        for collection in Collection::ALL {
            let path = file_path(dir, collection);
            let records = match std::fs::read_to_string(&path) {
                Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                    AppError::Storage(format!("corrupt collection file {path:?}: {err}"))
                })?,
                Err(_) => Vec::new(),
            };
            cache.insert(collection, records);
        }

        info!("[store] flat-file backend initialized at {:?}", dir);
        Ok(FlatFileBackend {
            dir: dir.to_path_buf(),
            cache: RwLock::new(cache),
        })
    }

    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&collection).cloned().unwrap_or_default())
    }

    pub async fn get(&self, collection: Collection, key: &Key) -> Result<Option<Value>, AppError> {
        let cache = self.cache.read().await;
        let records = cache.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(records
            .iter()
            .find(|record| key.matches(record, collection.key_path()))
            .cloned())
    }

    pub async fn get_by_index(
        &self,
        collection: Collection,
        index_name: &str,
        value: &Value,
    ) -> Result<Vec<Value>, AppError> {
        let index = collection.index(index_name).ok_or_else(|| {
            AppError::Storage(format!(
                "no index '{index_name}' on collection '{}'",
                collection.name()
            ))
        })?;
        let cache = self.cache.read().await;
        let records = cache.get(&collection).map(Vec::as_slice).unwrap_or(&[]);
        Ok(records
            .iter()
            .filter(|record| record.get(index.key_path) == Some(value))
            .cloned()
            .collect())
    }

    pub async fn add(&self, collection: Collection, record: &Value) -> Result<Key, AppError> {
        let key = record_key(collection, record)?;
        let mut cache = self.cache.write().await;
        let records = cache.entry(collection).or_default();

        if records
            .iter()
            .any(|existing| key.matches(existing, collection.key_path()))
        {
            return Err(AppError::Conflict);
        }
        for index in collection.indexes().iter().filter(|idx| idx.unique) {
            let value = record.get(index.key_path);
            if value.is_some() && records.iter().any(|e| e.get(index.key_path) == value) {
                return Err(AppError::Conflict);
            }
        }

        records.push(record.clone());
        self.persist(collection, records)?;
        Ok(key)
    }

    pub async fn put(&self, collection: Collection, record: &Value) -> Result<Key, AppError> {
        let key = record_key(collection, record)?;
        let mut cache = self.cache.write().await;
        let records = cache.entry(collection).or_default();

        // an upsert may not take a unique-indexed value held by another record
        for index in collection.indexes().iter().filter(|idx| idx.unique) {
            let value = record.get(index.key_path);
            if value.is_some()
                && records.iter().any(|e| {
                    e.get(index.key_path) == value && !key.matches(e, collection.key_path())
                })
            {
                return Err(AppError::Conflict);
            }
        }

        match records
            .iter()
            .position(|existing| key.matches(existing, collection.key_path()))
        {
            Some(pos) => records[pos] = record.clone(),
            None => records.push(record.clone()),
        }
        self.persist(collection, records)?;
        Ok(key)
    }

    pub async fn delete(&self, collection: Collection, key: &Key) -> Result<(), AppError> {
        let mut cache = self.cache.write().await;
        let records = cache.entry(collection).or_default();
        records.retain(|record| !key.matches(record, collection.key_path()));
        self.persist(collection, records)
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), AppError> {
        let mut cache = self.cache.write().await;
        let records = cache.entry(collection).or_default();
        records.clear();
        self.persist(collection, records)
    }

    pub async fn count(&self, collection: Collection) -> Result<u64, AppError> {
        let cache = self.cache.read().await;
        Ok(cache.get(&collection).map(Vec::len).unwrap_or(0) as u64)
    }

    fn persist(&self, collection: Collection, records: &[Value]) -> Result<(), AppError> {
        let path = file_path(&self.dir, collection);
        let raw = serde_json::to_string(records)
            .map_err(|err| AppError::Storage(format!("cannot encode collection: {err}")))?;
        std::fs::write(&path, raw)
            .map_err(|err| AppError::Storage(format!("cannot write {path:?}: {err}")))
    }
}

fn file_path(dir: &Path, collection: Collection) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{}.json", collection.name()))
}

fn record_key(collection: Collection, record: &Value) -> Result<Key, AppError> {
    Key::from_record(record, collection.key_path()).ok_or_else(|| {
        AppError::Storage(format!(
            "record for '{}' is missing its '{}' key",
            collection.name(),
            collection.key_path()
        ))
    })
}
