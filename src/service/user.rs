use chrono::Utc;

use crate::errors::AppError;
use crate::models::{User, UserStatus};
use crate::store::Store;

pub async fn get_all(store: &Store) -> Result<Vec<User>, AppError> {
    store.all_users().await
}

pub async fn get_by_id(store: &Store, id: i64) -> Result<User, AppError> {
    store.get_user(id).await?.ok_or(AppError::NotFound)
}

/// Admin lock/unlock toggle.
pub async fn update_status(store: &Store, id: i64, status: UserStatus) -> Result<User, AppError> {
    let mut user = store.get_user(id).await?.ok_or(AppError::NotFound)?;
    user.status = status;
    user.updated_at = Utc::now();
    store.update_user(&user).await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lock_toggle_updates_status_and_timestamp() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        store
            .add_user(&testutil::user(1, "v@example.org"))
            .await
            .unwrap();

        let locked = update_status(&store, 1, UserStatus::Locked).await.unwrap();
        assert_eq!(locked.status, UserStatus::Locked);
        assert_eq!(get_by_id(&store, 1).await.unwrap().status, UserStatus::Locked);

        assert_eq!(
            update_status(&store, 99, UserStatus::Locked).await.unwrap_err(),
            AppError::NotFound
        );
    }
}
