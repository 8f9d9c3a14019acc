use chrono::Utc;
use log::info;

use crate::errors::AppError;
use crate::models::{Comment, EventStatus, Post};
use crate::store::{next_id, Store};

pub const DEFAULT_RECENT_LIMIT: usize = 5;

pub async fn posts_for_event(store: &Store, event_id: i64) -> Result<Vec<Post>, AppError> {
    let mut posts = store.posts_by_event(event_id).await?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

/// Latest posts across all events, for the dashboard feed.
pub async fn recent_posts(store: &Store, limit: Option<usize>) -> Result<Vec<Post>, AppError> {
    let mut posts = store.all_posts().await?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    posts.truncate(limit.unwrap_or(DEFAULT_RECENT_LIMIT));
    Ok(posts)
}

/// Posting is only open on approved events. Author details are denormalized
/// onto the record at write time.
pub async fn create_post(
    store: &Store,
    user_id: i64,
    event_id: i64,
    content: String,
    image_url: Option<String>,
) -> Result<Post, AppError> {
    let event = store.get_event(event_id).await?.ok_or(AppError::NotFound)?;
    if event.status != EventStatus::Approved {
        return Err(AppError::Validation(
            "posts are only allowed on approved events".to_string(),
        ));
    }
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation("post content is required".to_string()));
    }

    let author = store.get_user(user_id).await?;
    let now = Utc::now();
    let post = Post {
        id: next_id(),
        event_id,
        user_id,
        content,
        image_url,
        created_at: now,
        updated_at: now,
        author_name: author
            .as_ref()
            .map(|u| u.full_name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        author_avatar: author.and_then(|u| u.avatar_url),
        comment_count: 0,
        like_count: 0,
        is_liked_by_current_user: false,
    };
    store.add_post(&post).await?;
    info!("[post] user {} posted on event {}", user_id, event_id);
    Ok(post)
}

/// Deletes a post and every comment attached to it.
pub async fn delete_post(store: &Store, id: i64) -> Result<(), AppError> {
    if store.get_post(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    for comment in store.comments_by_post(id).await? {
        store.delete_comment(comment.id).await?;
    }
    store.delete_post(id).await?;
    Ok(())
}

/// Flips the caller's like flag and keeps the counter in step. The counter
/// never goes below zero even if the flag and count have drifted apart.
pub async fn toggle_like(store: &Store, id: i64) -> Result<Post, AppError> {
    let mut post = store.get_post(id).await?.ok_or(AppError::NotFound)?;
    if post.is_liked_by_current_user {
        post.is_liked_by_current_user = false;
        post.like_count = (post.like_count - 1).max(0);
    } else {
        post.is_liked_by_current_user = true;
        post.like_count += 1;
    }
    store.update_post(&post).await?;
    Ok(post)
}

pub async fn comments_for_post(store: &Store, post_id: i64) -> Result<Vec<Comment>, AppError> {
    let mut comments = store.comments_by_post(post_id).await?;
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(comments)
}

pub async fn create_comment(
    store: &Store,
    user_id: i64,
    post_id: i64,
    content: String,
) -> Result<Comment, AppError> {
    let mut post = store.get_post(post_id).await?.ok_or(AppError::NotFound)?;
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::Validation(
            "comment content is required".to_string(),
        ));
    }

    let author = store.get_user(user_id).await?;
    let now = Utc::now();
    let comment = Comment {
        id: next_id(),
        post_id,
        user_id,
        content,
        created_at: now,
        updated_at: now,
        author_name: author
            .as_ref()
            .map(|u| u.full_name.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        author_avatar: author.and_then(|u| u.avatar_url),
    };
    store.add_comment(&comment).await?;

    post.comment_count += 1;
    store.update_post(&post).await?;
    Ok(comment)
}

pub async fn delete_comment(store: &Store, id: i64) -> Result<(), AppError> {
    let comment = store.get_comment(id).await?.ok_or(AppError::NotFound)?;
    store.delete_comment(id).await?;

    if let Some(mut post) = store.get_post(comment.post_id).await? {
        post.comment_count = (post.comment_count - 1).max(0);
        store.update_post(&post).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use tempfile::TempDir;

    async fn store_with_event(dir: &TempDir) -> Store {
        let store = testutil::sqlite_store(dir).await;
        store
            .add_user(&testutil::user(1, "author@example.org"))
            .await
            .unwrap();
        store
            .add_event(&testutil::event(10, "Beach Cleanup", EventStatus::Approved, 1))
            .await
            .unwrap();
        store
            .add_event(&testutil::event(11, "Pending Event", EventStatus::Pending, 1))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn posting_requires_an_approved_event() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;

        let post = create_post(&store, 1, 10, "Great turnout today!".into(), None)
            .await
            .unwrap();
        assert_eq!(post.author_name, "User 1");
        assert_eq!(post.comment_count, 0);

        let err = create_post(&store, 1, 11, "too early".into(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            create_post(&store, 1, 999, "no event".into(), None)
                .await
                .unwrap_err(),
            AppError::NotFound
        );
    }

    #[tokio::test]
    async fn unknown_authors_fall_back_to_a_placeholder_name() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;

        let post = create_post(&store, 999, 10, "drive-by post".into(), None)
            .await
            .unwrap();
        assert_eq!(post.author_name, "Unknown");
        assert_eq!(post.author_avatar, None);
    }

    #[tokio::test]
    async fn comment_counter_follows_creates_and_deletes() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;
        let post = create_post(&store, 1, 10, "hello".into(), None).await.unwrap();

        let comment = create_comment(&store, 1, post.id, "first!".into())
            .await
            .unwrap();
        create_comment(&store, 1, post.id, "second".into()).await.unwrap();
        assert_eq!(store.get_post(post.id).await.unwrap().unwrap().comment_count, 2);

        delete_comment(&store, comment.id).await.unwrap();
        assert_eq!(store.get_post(post.id).await.unwrap().unwrap().comment_count, 1);

        let remaining = comments_for_post(&store, post.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "second");
    }

    #[tokio::test]
    async fn like_toggle_round_trips_and_never_goes_negative() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;
        let post = create_post(&store, 1, 10, "like me".into(), None).await.unwrap();

        let liked = toggle_like(&store, post.id).await.unwrap();
        assert!(liked.is_liked_by_current_user);
        assert_eq!(liked.like_count, 1);

        let unliked = toggle_like(&store, post.id).await.unwrap();
        assert!(!unliked.is_liked_by_current_user);
        assert_eq!(unliked.like_count, 0);

        let again = toggle_like(&store, post.id).await.unwrap();
        assert_eq!(again.like_count, 1);
    }

    #[tokio::test]
    async fn deleting_a_post_removes_its_comments() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;
        let post = create_post(&store, 1, 10, "soon gone".into(), None).await.unwrap();
        create_comment(&store, 1, post.id, "me too".into()).await.unwrap();

        delete_post(&store, post.id).await.unwrap();
        assert!(store.get_post(post.id).await.unwrap().is_none());
        assert!(store.comments_by_post(post.id).await.unwrap().is_empty());
        assert_eq!(delete_post(&store, post.id).await.unwrap_err(), AppError::NotFound);
    }

    #[tokio::test]
    async fn recent_posts_are_newest_first_and_limited() {
        let dir = TempDir::new().unwrap();
        let store = store_with_event(&dir).await;
        for i in 0..7 {
            create_post(&store, 1, 10, format!("post {i}"), None).await.unwrap();
        }

        let recent = recent_posts(&store, None).await.unwrap();
        assert_eq!(recent.len(), DEFAULT_RECENT_LIMIT);
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let two = recent_posts(&store, Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].content, "post 6");
    }
}
