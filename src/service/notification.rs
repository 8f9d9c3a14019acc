use std::env;

use chrono::Utc;
use log::info;

use crate::errors::AppError;
use crate::models::{Notification, NotificationKind};
use crate::store::{next_id, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    Default,
}

/// Seam for user-facing notification delivery. Emission is fire-and-forget:
/// a failing notifier must never affect the state that triggered it.
pub trait Notifier: Send + Sync {
    fn permission(&self) -> NotificationPermission;
    fn notify(&self, title: &str, body: &str);
}

/// Production notifier: permission comes from the environment, delivery is
/// a log line. Actual push delivery is outside this crate.
pub struct LogNotifier {
    permission: NotificationPermission,
}

impl LogNotifier {
    pub fn from_env() -> LogNotifier {
        let permission = match env::var("NOTIFICATIONS_ENABLED").as_deref() {
            Ok("true") | Ok("1") => NotificationPermission::Granted,
            Ok(_) => NotificationPermission::Denied,
            Err(_) => NotificationPermission::Default,
        };
        LogNotifier { permission }
    }
}

impl Notifier for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn notify(&self, title: &str, body: &str) {
        info!("[notify] {title}: {body}");
    }
}

pub async fn for_user(store: &Store, user_id: i64) -> Result<Vec<Notification>, AppError> {
    let mut notifications = store.notifications_by_user(user_id).await?;
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(notifications)
}

pub async fn unread_count(store: &Store, user_id: i64) -> Result<usize, AppError> {
    Ok(store.unread_notifications(user_id).await?.len())
}

pub async fn mark_read(store: &Store, id: i64) -> Result<Notification, AppError> {
    let mut notification = store.get_notification(id).await?.ok_or(AppError::NotFound)?;
    notification.is_read = true;
    store.update_notification(&notification).await?;
    Ok(notification)
}

pub async fn create(
    store: &Store,
    user_id: i64,
    message: String,
    kind: NotificationKind,
) -> Result<Notification, AppError> {
    let notification = Notification {
        id: next_id(),
        user_id,
        message,
        is_read: false,
        created_at: Utc::now(),
        kind,
    };
    store.add_notification(&notification).await?;
    Ok(notification)
}

#[cfg(test)]
pub(crate) mod testsupport {
    use std::sync::Mutex;

    use super::{NotificationPermission, Notifier};

    /// Test notifier that records emissions instead of delivering them.
    pub struct RecordingNotifier {
        permission: NotificationPermission,
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        pub fn new(permission: NotificationPermission) -> RecordingNotifier {
            RecordingNotifier {
                permission,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn permission(&self) -> NotificationPermission {
            self.permission
        }

        fn notify(&self, title: &str, body: &str) {
            self.sent
                .lock()
                .expect("notifier lock")
                .push((title.to_string(), body.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use tempfile::TempDir;

    #[tokio::test]
    async fn unread_count_tracks_mark_read() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;

        let first = create(&store, 7, "one".into(), NotificationKind::System)
            .await
            .unwrap();
        create(&store, 7, "two".into(), NotificationKind::System)
            .await
            .unwrap();
        create(&store, 8, "other user".into(), NotificationKind::System)
            .await
            .unwrap();

        assert_eq!(unread_count(&store, 7).await.unwrap(), 2);
        mark_read(&store, first.id).await.unwrap();
        assert_eq!(unread_count(&store, 7).await.unwrap(), 1);
        assert_eq!(for_user(&store, 7).await.unwrap().len(), 2);
    }
}
