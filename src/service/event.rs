use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::dto::{NewEventDto, PaginatedResponse, UpdateEventDto};
use crate::errors::AppError;
use crate::models::{Event, EventStatus, Registration, RegistrationStatus, UserRole};
use crate::store::{next_id, Store};

pub const DEFAULT_PAGE_SIZE: usize = 6;
const HIGHLIGHT_LIMIT: usize = 5;

#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    /// Case-insensitive substring over title and location.
    pub search: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    pub new_events: Vec<Event>,
    pub trending_events: Vec<Event>,
    pub active_events: Vec<Event>,
}

pub async fn create(
    store: &Store,
    created_by: i64,
    dto: NewEventDto,
) -> Result<Event, AppError> {
    validate(&dto)?;
    let now = Utc::now();
    let event = Event {
        id: next_id(),
        title: dto.title,
        description: dto.description,
        location: dto.location,
        category: dto.category,
        start_date: dto.start_date,
        end_date: dto.end_date,
        status: EventStatus::Pending,
        created_by,
        image_url: dto.image_url,
        created_at: now,
        updated_at: now,
        organizer_name: None,
        participant_count: None,
    };
    store.add_event(&event).await?;
    info!("[event] created event {} '{}'", event.id, event.title);
    Ok(event)
}

pub async fn get_by_id(store: &Store, id: i64) -> Result<Event, AppError> {
    let event = store.get_event(id).await?.ok_or(AppError::NotFound)?;
    let registrations = store.registrations_by_event(id).await?;
    let mut event = with_participant_count(event, &registrations);
    event.organizer_name = store
        .get_user(event.created_by)
        .await?
        .map(|user| user.full_name);
    Ok(event)
}

/// Paginated listing of approved events. The reported total is the full
/// filtered-set size, independent of the requested page.
pub async fn list(
    store: &Store,
    page: usize,
    page_size: usize,
    filter: &EventFilter,
) -> Result<PaginatedResponse<Event>, AppError> {
    let mut filtered: Vec<Event> = store
        .all_events()
        .await?
        .into_iter()
        .filter(|event| event.status == EventStatus::Approved)
        .collect();

    if let Some(term) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        let term = term.to_lowercase();
        filtered.retain(|event| {
            event.title.to_lowercase().contains(&term)
                || event.location.to_lowercase().contains(&term)
        });
    }
    if let Some(category) = filter.category.as_deref().filter(|s| !s.is_empty()) {
        filtered.retain(|event| event.category == category);
    }
    if let Some(min_start) = filter.start_date {
        filtered.retain(|event| event.start_date >= min_start);
    }

    let registrations = store.all_registrations().await?;
    let with_counts: Vec<Event> = filtered
        .into_iter()
        .map(|event| with_participant_count(event, &registrations))
        .collect();

    let total = with_counts.len();
    let page = page.max(1);
    let page_size = page_size.max(1);
    let items = with_counts
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(PaginatedResponse {
        items,
        total,
        page,
        page_size,
    })
}

/// Dashboard rankings over approved events: newest, most confirmed
/// registrations, most recently updated. Sorts are stable, so ties keep
/// input order.
pub async fn highlights(store: &Store) -> Result<Highlights, AppError> {
    let registrations = store.all_registrations().await?;
    let approved: Vec<Event> = store
        .all_events()
        .await?
        .into_iter()
        .filter(|event| event.status == EventStatus::Approved)
        .map(|event| with_participant_count(event, &registrations))
        .collect();

    let mut new_events = approved.clone();
    new_events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    new_events.truncate(HIGHLIGHT_LIMIT);

    let mut trending_events = approved.clone();
    trending_events.sort_by(|a, b| {
        b.participant_count
            .unwrap_or(0)
            .cmp(&a.participant_count.unwrap_or(0))
    });
    trending_events.truncate(HIGHLIGHT_LIMIT);

    let mut active_events = approved;
    active_events.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    active_events.truncate(HIGHLIGHT_LIMIT);

    Ok(Highlights {
        new_events,
        trending_events,
        active_events,
    })
}

/// Manager view: events created by one user, any status.
pub async fn by_creator(store: &Store, user_id: i64) -> Result<Vec<Event>, AppError> {
    let registrations = store.all_registrations().await?;
    Ok(store
        .all_events()
        .await?
        .into_iter()
        .filter(|event| event.created_by == user_id)
        .map(|event| with_participant_count(event, &registrations))
        .collect())
}

/// Partial update, allowed for the creator and for admins.
pub async fn update(
    store: &Store,
    id: i64,
    fields: UpdateEventDto,
    actor_id: i64,
    actor_role: UserRole,
) -> Result<Event, AppError> {
    let mut event = store.get_event(id).await?.ok_or(AppError::NotFound)?;
    if actor_id != event.created_by && actor_role != UserRole::Admin {
        return Err(AppError::Unauthorized);
    }
    fields.apply(&mut event);
    event.updated_at = Utc::now();
    event.clear_derived();
    store.update_event(&event).await?;
    Ok(event)
}

/// Admin approval flow (approve/reject/complete/cancel).
pub async fn set_status(store: &Store, id: i64, status: EventStatus) -> Result<Event, AppError> {
    let mut event = store.get_event(id).await?.ok_or(AppError::NotFound)?;
    event.status = status;
    event.updated_at = Utc::now();
    event.clear_derived();
    store.update_event(&event).await?;
    info!("[event] event {} status set to {:?}", id, status);
    Ok(event)
}

/// Deletes an event and, first, every registration attached to it. The
/// ordering is enforced here; the store has no cascading deletes.
pub async fn delete(store: &Store, id: i64) -> Result<(), AppError> {
    if store.get_event(id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    for registration in store.registrations_by_event(id).await? {
        store.delete_registration(registration.id).await?;
    }
    store.delete_event(id).await?;
    info!("[event] deleted event {} and its registrations", id);
    Ok(())
}

fn with_participant_count(mut event: Event, registrations: &[Registration]) -> Event {
    event.participant_count = Some(
        registrations
            .iter()
            .filter(|r| r.event_id == event.id && r.status == RegistrationStatus::Confirmed)
            .count() as i64,
    );
    event
}

fn validate(dto: &NewEventDto) -> Result<(), AppError> {
    let mut errors: Vec<&str> = Vec::new();
    if dto.title.trim().chars().count() < 3 {
        errors.push("title must be at least 3 characters");
    }
    if dto.description.trim().chars().count() < 10 {
        errors.push("description must be at least 10 characters");
    }
    if dto.location.trim().is_empty() {
        errors.push("location is required");
    }
    if dto.category.trim().is_empty() {
        errors.push("category is required");
    }
    if dto.end_date < dto.start_date {
        errors.push("end date must not be before start date");
    }
    if let Some(url) = dto.image_url.as_deref() {
        if !url.trim().is_empty() && !url.starts_with("http") {
            errors.push("image URL must be a valid URL");
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationStatus;
    use crate::store::next_id;
    use crate::testutil;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn seed_events(store: &Store) {
        store
            .add_user(&testutil::user(1, "manager@example.org"))
            .await
            .unwrap();
        for (id, title, status) in [
            (10, "Beach Cleanup", EventStatus::Approved),
            (11, "Park Restoration", EventStatus::Approved),
            (12, "Food Drive", EventStatus::Pending),
            (13, "River Cleanup", EventStatus::Approved),
        ] {
            store
                .add_event(&testutil::event(id, title, status, 1))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn participant_count_only_counts_confirmed() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        seed_events(&store).await;

        for (user_id, status) in [
            (2, RegistrationStatus::Confirmed),
            (3, RegistrationStatus::Confirmed),
            (4, RegistrationStatus::Pending),
            (5, RegistrationStatus::Cancelled),
        ] {
            store
                .add_registration(&testutil::registration(next_id(), user_id, 10, status))
                .await
                .unwrap();
        }

        let event = get_by_id(&store, 10).await.unwrap();
        assert_eq!(event.participant_count, Some(2));
        assert_eq!(event.organizer_name.as_deref(), Some("User 1"));
    }

    #[tokio::test]
    async fn pagination_reports_the_full_filtered_total() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        seed_events(&store).await;

        let page = list(&store, 1, 2, &EventFilter::default()).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3); // pending event excluded
        assert!(page.items.iter().all(|e| e.status == EventStatus::Approved));

        let page = list(&store, 2, 2, &EventFilter::default()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);

        let filter = EventFilter {
            search: Some("cleanup".to_string()),
            ..EventFilter::default()
        };
        let page = list(&store, 1, 10, &filter).await.unwrap();
        assert_eq!(page.total, 2);

        let filter = EventFilter {
            category: Some("Nope".to_string()),
            ..EventFilter::default()
        };
        let page = list(&store, 1, 10, &filter).await.unwrap();
        assert_eq!(page.total, 0);

        let filter = EventFilter {
            start_date: Some(Utc::now() + Duration::days(30)),
            ..EventFilter::default()
        };
        let page = list(&store, 1, 10, &filter).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn highlights_rank_approved_events_only() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        seed_events(&store).await;

        // event 13 gets the most confirmed registrations
        for user_id in [2, 3, 4] {
            store
                .add_registration(&testutil::registration(
                    next_id(),
                    user_id,
                    13,
                    RegistrationStatus::Confirmed,
                ))
                .await
                .unwrap();
        }

        let highlights = highlights(&store).await.unwrap();
        assert_eq!(highlights.new_events.len(), 3);
        assert_eq!(highlights.trending_events[0].id, 13);
        assert_eq!(highlights.trending_events[0].participant_count, Some(3));
        assert!(highlights
            .active_events
            .iter()
            .all(|e| e.status == EventStatus::Approved));
    }

    #[tokio::test]
    async fn create_validates_input_fields() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        let now = Utc::now();
        let dto = NewEventDto {
            title: "ab".to_string(),
            description: "too short".to_string(),
            location: String::new(),
            category: "Community".to_string(),
            start_date: now,
            end_date: now - Duration::hours(1),
            image_url: Some("not-a-url".to_string()),
        };
        match create(&store, 1, dto).await.unwrap_err() {
            AppError::Validation(message) => {
                assert!(message.contains("title must be at least 3 characters"));
                assert!(message.contains("description must be at least 10 characters"));
                assert!(message.contains("location is required"));
                assert!(message.contains("end date must not be before start date"));
                assert!(message.contains("image URL must be a valid URL"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_cascades_registrations() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        seed_events(&store).await;
        for user_id in [2, 3] {
            store
                .add_registration(&testutil::registration(
                    next_id(),
                    user_id,
                    10,
                    RegistrationStatus::Confirmed,
                ))
                .await
                .unwrap();
        }

        delete(&store, 10).await.unwrap();
        assert!(store.get_event(10).await.unwrap().is_none());
        assert!(store.registrations_by_event(10).await.unwrap().is_empty());
        assert_eq!(delete(&store, 10).await.unwrap_err(), AppError::NotFound);
    }

    #[tokio::test]
    async fn update_is_restricted_to_creator_or_admin() {
        let dir = TempDir::new().unwrap();
        let store = testutil::sqlite_store(&dir).await;
        seed_events(&store).await;

        let fields = UpdateEventDto {
            title: Some("Renamed".to_string()),
            ..UpdateEventDto::default()
        };
        let err = update(&store, 10, fields.clone(), 99, UserRole::Volunteer)
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Unauthorized);

        let updated = update(&store, 10, fields, 1, UserRole::Manager).await.unwrap();
        assert_eq!(updated.title, "Renamed");

        // derived fields are never persisted
        let raw = store.get_event(10).await.unwrap().unwrap();
        assert_eq!(raw.participant_count, None);
        assert_eq!(raw.organizer_name, None);
    }
}
