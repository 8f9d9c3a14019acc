use log::info;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};

use crate::errors::AppError;
use crate::store::schema::{Collection, Key};

type SqlitePool = Pool<Sqlite>;

/// Primary indexed backend. Each collection is a table of
/// `(k TEXT PRIMARY KEY, v TEXT)` rows holding the record as JSON, with
/// secondary indexes declared as SQLite expression indexes over
/// `json_extract` so indexed lookups hit the same fields the schema names.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn open(database_url: &str) -> Result<SqliteBackend, sqlx::Error> {
        let pool: SqlitePool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        for collection in Collection::ALL {
            let table = collection.name();
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (k TEXT PRIMARY KEY, v TEXT NOT NULL)"
            ))
            .execute(&pool)
            .await?;

            for index in collection.indexes() {
                let unique = if index.unique { "UNIQUE " } else { "" };
                sqlx::query(&format!(
                    "CREATE {unique}INDEX IF NOT EXISTS {table}_{} \
                     ON {table} (json_extract(v, '$.{}'))",
                    index.name, index.key_path
                ))
                .execute(&pool)
                .await?;
            }
        }

        info!("[store] sqlite backend initialized at {}", database_url);
        Ok(SqliteBackend { pool })
    }

    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        let sql = format!("SELECT v FROM {}", collection.name());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(decode_row).collect()
    }

    pub async fn get(&self, collection: Collection, key: &Key) -> Result<Option<Value>, AppError> {
        let sql = format!("SELECT v FROM {} WHERE k = ?", collection.name());
        let row = sqlx::query(&sql)
            .bind(key.as_text())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(decode_row).transpose()
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
        let sql = format!(
            "SELECT v FROM {} WHERE json_extract(v, '$.{}') = ?",
            collection.name(),
            index.key_path
        );
        let rows = bind_index_value(sqlx::query(&sql), value)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(decode_row).collect()
    }

    pub async fn add(&self, collection: Collection, record: &Value) -> Result<Key, AppError> {
        let key = record_key(collection, record)?;
        let sql = format!("INSERT INTO {} (k, v) VALUES (?, ?)", collection.name());
        let res = sqlx::query(&sql)
            .bind(key.as_text())
            .bind(record.to_string())
            .execute(&self.pool)
            .await;
        match res {
            Ok(_) => Ok(key),
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict),
            Err(err) => Err(storage_err(err)),
        }
    }

    pub async fn put(&self, collection: Collection, record: &Value) -> Result<Key, AppError> {
        let key = record_key(collection, record)?;
        let sql = format!(
            "INSERT INTO {} (k, v) VALUES (?, ?) \
             ON CONFLICT(k) DO UPDATE SET v = excluded.v",
            collection.name()
        );
        let res = sqlx::query(&sql)
            .bind(key.as_text())
            .bind(record.to_string())
            .execute(&self.pool)
            .await;
        match res {
            Ok(_) => Ok(key),
            // A put may still trip a unique secondary index (e.g. stealing
            // another user's email).
            Err(err) if is_unique_violation(&err) => Err(AppError::Conflict),
            Err(err) => Err(storage_err(err)),
        }
    }

    pub async fn delete(&self, collection: Collection, key: &Key) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {} WHERE k = ?", collection.name());
        sqlx::query(&sql)
            .bind(key.as_text())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), AppError> {
        let sql = format!("DELETE FROM {}", collection.name());
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn count(&self, collection: Collection) -> Result<u64, AppError> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", collection.name());
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        let n: i64 = row.try_get("n").map_err(storage_err)?;
        Ok(n as u64)
    }
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

fn decode_row(row: sqlx::sqlite::SqliteRow) -> Result<Value, AppError> {
    let raw: String = row.try_get("v").map_err(storage_err)?;
    serde_json::from_str(&raw).map_err(|err| AppError::Storage(format!("corrupt record: {err}")))
}

fn storage_err(err: impl std::fmt::Display) -> AppError {
    AppError::Storage(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Binds a JSON scalar the way `json_extract` surfaces it: booleans come
/// back as 0/1 integers, numbers as INTEGER or REAL, strings as TEXT.
fn bind_index_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s.as_str()),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        other => query.bind(other.to_string()),
    }
}
