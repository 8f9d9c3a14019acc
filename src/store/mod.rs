pub mod flatfile;
pub mod schema;
pub mod sqlite;

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::{Comment, Event, Notification, Post, Registration, User};
use flatfile::FlatFileBackend;
use schema::Key;
use sqlite::SqliteBackend;

pub use schema::{next_id, Collection};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub data_dir: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> StoreConfig {
        StoreConfig {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://volunteerhub.db?mode=rwc".to_string()),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Sqlite,
    FlatFile,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => f.write_str("sqlite"),
            BackendKind::FlatFile => f.write_str("flat_file"),
        }
    }
}

/// The two interchangeable storage engines behind one contract. Selected
/// once at startup; nothing outside this module branches on the variant.
enum Backend {
    Sqlite(SqliteBackend),
    FlatFile(FlatFileBackend),
}

impl Backend {
    async fn get_all(&self, c: Collection) -> Result<Vec<Value>, AppError> {
        match self {
            Backend::Sqlite(b) => b.get_all(c).await,
            Backend::FlatFile(b) => b.get_all(c).await,
        }
    }

    async fn get(&self, c: Collection, key: &Key) -> Result<Option<Value>, AppError> {
        match self {
            Backend::Sqlite(b) => b.get(c, key).await,
            Backend::FlatFile(b) => b.get(c, key).await,
        }
    }

    async fn get_by_index(
        &self,
        c: Collection,
        index: &str,
        value: &Value,
    ) -> Result<Vec<Value>, AppError> {
        match self {
            Backend::Sqlite(b) => b.get_by_index(c, index, value).await,
            Backend::FlatFile(b) => b.get_by_index(c, index, value).await,
        }
    }

    async fn add(&self, c: Collection, record: &Value) -> Result<Key, AppError> {
        match self {
            Backend::Sqlite(b) => b.add(c, record).await,
            Backend::FlatFile(b) => b.add(c, record).await,
        }
    }

    async fn put(&self, c: Collection, record: &Value) -> Result<Key, AppError> {
        match self {
            Backend::Sqlite(b) => b.put(c, record).await,
            Backend::FlatFile(b) => b.put(c, record).await,
        }
    }

    async fn delete(&self, c: Collection, key: &Key) -> Result<(), AppError> {
        match self {
            Backend::Sqlite(b) => b.delete(c, key).await,
            Backend::FlatFile(b) => b.delete(c, key).await,
        }
    }

    async fn clear(&self, c: Collection) -> Result<(), AppError> {
        match self {
            Backend::Sqlite(b) => b.clear(c).await,
            Backend::FlatFile(b) => b.clear(c).await,
        }
    }

    async fn count(&self, c: Collection) -> Result<u64, AppError> {
        match self {
            Backend::Sqlite(b) => b.count(c).await,
            Backend::FlatFile(b) => b.count(c).await,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StoreStats {
    pub backend: BackendKind,
    pub collections: BTreeMap<&'static str, u64>,
}

/// Single entry point for all entity persistence. Construct once with
/// [`Store::open`] and share by reference; there is no global instance.
pub struct Store {
    backend: Backend,
    kind: BackendKind,
}

impl Store {
    /// Opens the primary indexed backend, falling back to flat files when
    /// it is unavailable. The substitution is logged, not surfaced.
    pub async fn open(config: &StoreConfig) -> Result<Store, AppError> {
        match SqliteBackend::open(&config.database_url).await {
            Ok(backend) => Ok(Store {
                backend: Backend::Sqlite(backend),
                kind: BackendKind::Sqlite,
            }),
            Err(err) => {
                warn!("[store] sqlite backend unavailable ({err}), using flat-file fallback");
                let backend = FlatFileBackend::open(&config.data_dir)?;
                Ok(Store {
                    backend: Backend::FlatFile(backend),
                    kind: BackendKind::FlatFile,
                })
            }
        }
    }

    /// Read-only diagnostic; the only place callers may learn which
    /// backend is active.
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    // ---- users ----

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        decode_opt(self.backend.get(Collection::Users, &Key::Int(id)).await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let matches = self
            .backend
            .get_by_index(Collection::Users, "email", &json!(email))
            .await?;
        decode_opt(matches.into_iter().next())
    }

    pub async fn all_users(&self) -> Result<Vec<User>, AppError> {
        decode_all(self.backend.get_all(Collection::Users).await?)
    }

    pub async fn add_user(&self, user: &User) -> Result<(), AppError> {
        self.backend.add(Collection::Users, &encode(user)?).await?;
        Ok(())
    }

    pub async fn update_user(&self, user: &User) -> Result<(), AppError> {
        self.backend.put(Collection::Users, &encode(user)?).await?;
        Ok(())
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), AppError> {
        self.backend.delete(Collection::Users, &Key::Int(id)).await
    }

    // ---- events ----

    pub async fn get_event(&self, id: i64) -> Result<Option<Event>, AppError> {
        decode_opt(self.backend.get(Collection::Events, &Key::Int(id)).await?)
    }

    pub async fn all_events(&self) -> Result<Vec<Event>, AppError> {
        decode_all(self.backend.get_all(Collection::Events).await?)
    }

    pub async fn add_event(&self, event: &Event) -> Result<(), AppError> {
        self.backend.add(Collection::Events, &encode(event)?).await?;
        Ok(())
    }

    pub async fn update_event(&self, event: &Event) -> Result<(), AppError> {
        self.backend.put(Collection::Events, &encode(event)?).await?;
        Ok(())
    }

    pub async fn delete_event(&self, id: i64) -> Result<(), AppError> {
        self.backend.delete(Collection::Events, &Key::Int(id)).await
    }

    // ---- registrations ----

    pub async fn get_registration(&self, id: i64) -> Result<Option<Registration>, AppError> {
        decode_opt(
            self.backend
                .get(Collection::Registrations, &Key::Int(id))
                .await?,
        )
    }

    pub async fn all_registrations(&self) -> Result<Vec<Registration>, AppError> {
        decode_all(self.backend.get_all(Collection::Registrations).await?)
    }

    pub async fn registrations_by_user(&self, user_id: i64) -> Result<Vec<Registration>, AppError> {
        decode_all(
            self.backend
                .get_by_index(Collection::Registrations, "userId", &json!(user_id))
                .await?,
        )
    }

    pub async fn registrations_by_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<Registration>, AppError> {
        decode_all(
            self.backend
                .get_by_index(Collection::Registrations, "eventId", &json!(event_id))
                .await?,
        )
    }

    /// First registration for the (user, event) pair in any status.
    pub async fn registration_for_pair(
        &self,
        user_id: i64,
        event_id: i64,
    ) -> Result<Option<Registration>, AppError> {
        let regs = self.registrations_by_event(event_id).await?;
        Ok(regs.into_iter().find(|r| r.user_id == user_id))
    }

    pub async fn add_registration(&self, registration: &Registration) -> Result<(), AppError> {
        self.backend
            .add(Collection::Registrations, &encode(registration)?)
            .await?;
        Ok(())
    }

    pub async fn update_registration(&self, registration: &Registration) -> Result<(), AppError> {
        self.backend
            .put(Collection::Registrations, &encode(registration)?)
            .await?;
        Ok(())
    }

    pub async fn delete_registration(&self, id: i64) -> Result<(), AppError> {
        self.backend
            .delete(Collection::Registrations, &Key::Int(id))
            .await
    }

    // ---- notifications ----

    pub async fn get_notification(&self, id: i64) -> Result<Option<Notification>, AppError> {
        decode_opt(
            self.backend
                .get(Collection::Notifications, &Key::Int(id))
                .await?,
        )
    }

    pub async fn notifications_by_user(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        decode_all(
            self.backend
                .get_by_index(Collection::Notifications, "userId", &json!(user_id))
                .await?,
        )
    }

    pub async fn unread_notifications(&self, user_id: i64) -> Result<Vec<Notification>, AppError> {
        let unread: Vec<Notification> = decode_all(
            self.backend
                .get_by_index(Collection::Notifications, "read", &json!(false))
                .await?,
        )?;
        Ok(unread.into_iter().filter(|n| n.user_id == user_id).collect())
    }

    pub async fn add_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.backend
            .add(Collection::Notifications, &encode(notification)?)
            .await?;
        Ok(())
    }

    pub async fn update_notification(&self, notification: &Notification) -> Result<(), AppError> {
        self.backend
            .put(Collection::Notifications, &encode(notification)?)
            .await?;
        Ok(())
    }

    // ---- password hashes ----

    pub async fn get_password_hash(&self, email: &str) -> Result<Option<String>, AppError> {
        let record = self
            .backend
            .get(Collection::PasswordHashes, &Key::from(email))
            .await?;
        Ok(record
            .and_then(|r| r.get("hash").and_then(Value::as_str).map(str::to_string)))
    }

    pub async fn set_password_hash(&self, email: &str, hash: &str) -> Result<(), AppError> {
        self.backend
            .put(
                Collection::PasswordHashes,
                &json!({ "email": email, "hash": hash }),
            )
            .await?;
        Ok(())
    }

    pub async fn delete_password_hash(&self, email: &str) -> Result<(), AppError> {
        self.backend
            .delete(Collection::PasswordHashes, &Key::from(email))
            .await
    }

    // ---- posts / comments ----

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        decode_opt(self.backend.get(Collection::Posts, &Key::Int(id)).await?)
    }

    pub async fn all_posts(&self) -> Result<Vec<Post>, AppError> {
        decode_all(self.backend.get_all(Collection::Posts).await?)
    }

    pub async fn posts_by_event(&self, event_id: i64) -> Result<Vec<Post>, AppError> {
        decode_all(
            self.backend
                .get_by_index(Collection::Posts, "eventId", &json!(event_id))
                .await?,
        )
    }

    pub async fn add_post(&self, post: &Post) -> Result<(), AppError> {
        self.backend.add(Collection::Posts, &encode(post)?).await?;
        Ok(())
    }

    pub async fn update_post(&self, post: &Post) -> Result<(), AppError> {
        self.backend.put(Collection::Posts, &encode(post)?).await?;
        Ok(())
    }

    pub async fn delete_post(&self, id: i64) -> Result<(), AppError> {
        self.backend.delete(Collection::Posts, &Key::Int(id)).await
    }

    pub async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        decode_opt(self.backend.get(Collection::Comments, &Key::Int(id)).await?)
    }

    pub async fn comments_by_post(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        decode_all(
            self.backend
                .get_by_index(Collection::Comments, "postId", &json!(post_id))
                .await?,
        )
    }

    pub async fn add_comment(&self, comment: &Comment) -> Result<(), AppError> {
        self.backend
            .add(Collection::Comments, &encode(comment)?)
            .await?;
        Ok(())
    }

    pub async fn delete_comment(&self, id: i64) -> Result<(), AppError> {
        self.backend
            .delete(Collection::Comments, &Key::Int(id))
            .await
    }

    // ---- raw collection access (backup/restore) ----

    pub(crate) async fn raw_all(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        self.backend.get_all(collection).await
    }

    pub(crate) async fn raw_add(
        &self,
        collection: Collection,
        record: &Value,
    ) -> Result<(), AppError> {
        self.backend.add(collection, record).await?;
        Ok(())
    }

    pub(crate) async fn clear(&self, collection: Collection) -> Result<(), AppError> {
        self.backend.clear(collection).await
    }

    // ---- utility ----

    pub async fn clear_all(&self) -> Result<(), AppError> {
        for collection in Collection::ALL {
            self.backend.clear(collection).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<StoreStats, AppError> {
        let mut collections = BTreeMap::new();
        for collection in Collection::ALL {
            collections.insert(collection.name(), self.backend.count(collection).await?);
        }
        Ok(StoreStats {
            backend: self.kind,
            collections,
        })
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Value, AppError> {
    serde_json::to_value(record)
        .map_err(|err| AppError::Storage(format!("cannot encode record: {err}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|err| AppError::Storage(format!("cannot decode record: {err}")))
}

fn decode_opt<T: DeserializeOwned>(value: Option<Value>) -> Result<Option<T>, AppError> {
    value.map(decode).transpose()
}

fn decode_all<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>, AppError> {
    values.into_iter().map(decode).collect()
}
