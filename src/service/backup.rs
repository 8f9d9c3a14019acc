use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;
use crate::store::{Collection, Store};

pub const BACKUP_VERSION: u32 = 1;
pub const DATABASE_NAME: &str = "VolunteerHubDB";

/// Portable snapshot of every collection. The layout is what external
/// tooling expects, so field names are stable.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub export_date: DateTime<Utc>,
    pub version: u32,
    pub database_name: String,
    pub stores: BTreeMap<String, Vec<Value>>,
    pub statistics: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub total: usize,
    pub imported: usize,
    pub failed: usize,
}

pub async fn export(store: &Store) -> Result<Backup, AppError> {
    let mut stores = BTreeMap::new();
    let mut statistics = BTreeMap::new();
    for collection in Collection::ALL {
        let records = store.raw_all(collection).await?;
        statistics.insert(collection.name().to_string(), records.len());
        stores.insert(collection.name().to_string(), records);
    }
    info!(
        "[backup] exported {} collections",
        Collection::ALL.len()
    );
    Ok(Backup {
        export_date: Utc::now(),
        version: BACKUP_VERSION,
        database_name: DATABASE_NAME.to_string(),
        stores,
        statistics,
    })
}

/// Restores a snapshot. Each present collection is cleared first; absent
/// collections are left untouched. A record that fails to insert is counted
/// and skipped rather than aborting the whole import.
pub async fn import(store: &Store, backup: &Backup) -> Result<ImportStats, AppError> {
    let mut stats = ImportStats::default();
    for (name, records) in &backup.stores {
        let collection = match Collection::by_name(name) {
            Some(collection) => collection,
            None => {
                warn!("[backup] skipping unknown collection '{name}'");
                continue;
            }
        };
        store.clear(collection).await?;
        for record in records {
            stats.total += 1;
            match store.raw_add(collection, record).await {
                Ok(()) => stats.imported += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!("[backup] skipped record in '{name}': {err}");
                }
            }
        }
    }
    info!(
        "[backup] import finished: {}/{} records, {} failed",
        stats.imported, stats.total, stats.failed
    );
    Ok(stats)
}
