use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde_json::Value;

/// The named collections the store manages. Every collection holds JSON
/// records keyed by the field named in [`Collection::key_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Events,
    Registrations,
    Notifications,
    PasswordHashes,
    Posts,
    Comments,
}

/// A secondary index over a non-primary-key field.
pub struct IndexDef {
    pub name: &'static str,
    pub key_path: &'static str,
    pub unique: bool,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Users,
        Collection::Events,
        Collection::Registrations,
        Collection::Notifications,
        Collection::PasswordHashes,
        Collection::Posts,
        Collection::Comments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Events => "events",
            Collection::Registrations => "registrations",
            Collection::Notifications => "notifications",
            Collection::PasswordHashes => "password_hashes",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }

    pub fn by_name(name: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Field holding the primary key. Everything is keyed by `id` except
    /// password hash records, which are keyed by email so credential data
    /// has a lifecycle independent of the user record.
    pub fn key_path(self) -> &'static str {
        match self {
            Collection::PasswordHashes => "email",
            _ => "id",
        }
    }

    pub fn indexes(self) -> &'static [IndexDef] {
        match self {
            Collection::Users => &[IndexDef {
                name: "email",
                key_path: "email",
                unique: true,
            }],
            Collection::Events => &[
                IndexDef {
                    name: "status",
                    key_path: "status",
                    unique: false,
                },
                IndexDef {
                    name: "date",
                    key_path: "startDate",
                    unique: false,
                },
            ],
            Collection::Registrations => &[
                IndexDef {
                    name: "userId",
                    key_path: "userId",
                    unique: false,
                },
                IndexDef {
                    name: "eventId",
                    key_path: "eventId",
                    unique: false,
                },
            ],
            Collection::Notifications => &[
                IndexDef {
                    name: "userId",
                    key_path: "userId",
                    unique: false,
                },
                IndexDef {
                    name: "read",
                    key_path: "isRead",
                    unique: false,
                },
            ],
            Collection::PasswordHashes => &[],
            Collection::Posts => &[IndexDef {
                name: "eventId",
                key_path: "eventId",
                unique: false,
            }],
            Collection::Comments => &[IndexDef {
                name: "postId",
                key_path: "postId",
                unique: false,
            }],
        }
    }

    pub fn index(self, name: &str) -> Option<&'static IndexDef> {
        self.indexes().iter().find(|idx| idx.name == name)
    }
}

/// Primary key of a record: integer ids for most collections, the email
/// string for password hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    /// Extracts the primary key from a record per the collection schema.
    pub fn from_record(record: &Value, key_path: &str) -> Option<Key> {
        match record.get(key_path)? {
            Value::Number(n) => n.as_i64().map(Key::Int),
            Value::String(s) => Some(Key::Text(s.clone())),
            _ => None,
        }
    }

    /// Canonical text form, used as the storage key in both backends.
    pub fn as_text(&self) -> String {
        match self {
            Key::Int(i) => i.to_string(),
            Key::Text(s) => s.clone(),
        }
    }

    pub fn matches(&self, record: &Value, key_path: &str) -> bool {
        Key::from_record(record, key_path).as_ref() == Some(self)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Int(id)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

static LAST_ID: AtomicI64 = AtomicI64::new(0);

/// Generates a new record id from the current epoch milliseconds, with a
/// monotonic guard so two generations in the same millisecond still yield
/// distinct ids.
pub fn next_id() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = if now > prev { now } else { prev + 1 };
        match LAST_ID.compare_exchange(prev, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(actual) => prev = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_id_is_strictly_increasing() {
        let a = next_id();
        let b = next_id();
        let c = next_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn key_extraction_follows_the_schema() {
        let user = json!({ "id": 42, "email": "a@b.c" });
        assert_eq!(
            Key::from_record(&user, Collection::Users.key_path()),
            Some(Key::Int(42))
        );

        let hash = json!({ "email": "a@b.c", "hash": "xyz" });
        assert_eq!(
            Key::from_record(&hash, Collection::PasswordHashes.key_path()),
            Some(Key::Text("a@b.c".to_string()))
        );
    }

    #[test]
    fn collection_lookup_by_name_round_trips() {
        for c in Collection::ALL {
            assert_eq!(Collection::by_name(c.name()), Some(c));
        }
        assert_eq!(Collection::by_name("nope"), None);
    }
}
