use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use log::{info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::errors::AppError;
use crate::models::{NotificationKind, Registration, RegistrationStatus, UserRole};
use crate::service::notification::{self, NotificationPermission, Notifier};
use crate::service::{event, AppContext};
use crate::store::{next_id, Store};

const DEFAULT_CONFIRMATION_DELAY_MS: u64 = 5000;

/// Tracks the pending confirmation timer per registration so a cancel (or a
/// re-registration) can abort a timer that has not fired yet. Entries carry
/// a ticket so a finished timer only drops its own entry, never one a later
/// reissue put in its place.
pub struct ConfirmationScheduler {
    delay: Duration,
    seq: AtomicU64,
    tokens: Mutex<HashMap<i64, (u64, CancellationToken)>>,
}

impl ConfirmationScheduler {
    pub fn new(delay: Duration) -> ConfirmationScheduler {
        ConfirmationScheduler {
            delay,
            seq: AtomicU64::new(0),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_env() -> ConfirmationScheduler {
        let millis = env::var("CONFIRMATION_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CONFIRMATION_DELAY_MS);
        ConfirmationScheduler::new(Duration::from_millis(millis))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Registers a fresh timer token, cancelling any previous one for the
    /// same registration.
    fn issue(&self, registration_id: i64) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let ticket = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut tokens = self.tokens.lock().expect("scheduler lock");
        if let Some((_, old)) = tokens.insert(registration_id, (ticket, token.clone())) {
            old.cancel();
        }
        (ticket, token)
    }

    /// Drops a finished timer's entry, but only if it is still the one the
    /// ticket was issued for.
    fn release(&self, registration_id: i64, ticket: u64) {
        let mut tokens = self.tokens.lock().expect("scheduler lock");
        if tokens.get(&registration_id).map(|(t, _)| *t) == Some(ticket) {
            tokens.remove(&registration_id);
        }
    }

    pub fn invalidate(&self, registration_id: i64) {
        if let Some((_, token)) = self
            .tokens
            .lock()
            .expect("scheduler lock")
            .remove(&registration_id)
        {
            token.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.tokens.lock().expect("scheduler lock").len()
    }
}

/// Registers a user for an event. A cancelled registration for the same
/// pair is revived under its original id; any other existing registration
/// is a duplicate. Either way a confirmation timer is (re)started.
pub async fn register(
    ctx: &AppContext,
    user_id: i64,
    event_id: i64,
) -> Result<Registration, AppError> {
    let event = ctx
        .store
        .get_event(event_id)
        .await?
        .ok_or(AppError::NotFound)?;

    // Check-then-insert without a transaction: two concurrent registrations
    // for the same pair can both pass the lookup. Single-writer callers per
    // user make this acceptable.
    let registration = match ctx.store.registration_for_pair(user_id, event_id).await? {
        Some(mut existing) => {
            if existing.status != RegistrationStatus::Cancelled {
                return Err(AppError::DuplicateRegistration);
            }
            existing.status = RegistrationStatus::Pending;
            existing.registered_at = Utc::now();
            existing.updated_at = existing.registered_at;
            ctx.store.update_registration(&existing).await?;
            info!(
                "[registration] revived registration {} for user {} on event {}",
                existing.id, user_id, event_id
            );
            existing
        }
        None => {
            let now = Utc::now();
            let registration = Registration {
                id: next_id(),
                user_id,
                event_id,
                status: RegistrationStatus::Pending,
                registered_at: now,
                updated_at: now,
                user: None,
                event: None,
            };
            ctx.store.add_registration(&registration).await?;
            info!(
                "[registration] user {} registered for event {} as {}",
                user_id, event_id, registration.id
            );
            registration
        }
    };

    schedule_confirmation(ctx, registration.id, event.title);
    Ok(registration)
}

/// Spawns the delayed pending -> confirmed transition. The timer is always
/// started; the notification permission only gates the user-facing emission,
/// never the state change.
fn schedule_confirmation(ctx: &AppContext, registration_id: i64, event_title: String) {
    let (ticket, token) = ctx.scheduler.issue(registration_id);
    let delay = ctx.scheduler.delay();
    let scheduler = Arc::clone(&ctx.scheduler);
    let store = Arc::clone(&ctx.store);
    let notifier = Arc::clone(&ctx.notifier);
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = sleep(delay) => {
                confirm_if_pending(&store, notifier.as_ref(), registration_id, &event_title).await;
            }
        }
        scheduler.release(registration_id, ticket);
    });
}

async fn confirm_if_pending(
    store: &Store,
    notifier: &dyn Notifier,
    registration_id: i64,
    event_title: &str,
) {
    let registration = match store.get_registration(registration_id).await {
        Ok(Some(registration)) => registration,
        Ok(None) => return,
        Err(err) => {
            warn!("[registration] confirmation lookup failed: {err}");
            return;
        }
    };
    // The registration may have been cancelled or completed while the timer
    // was running.
    if registration.status != RegistrationStatus::Pending {
        return;
    }

    let mut confirmed = registration;
    confirmed.status = RegistrationStatus::Confirmed;
    confirmed.updated_at = Utc::now();
    if let Err(err) = store.update_registration(&confirmed).await {
        warn!("[registration] failed to confirm {registration_id}: {err}");
        return;
    }
    info!("[registration] confirmed registration {registration_id}");

    if notifier.permission() == NotificationPermission::Granted {
        let message = format!("Your registration for '{event_title}' has been confirmed");
        notifier.notify("Registration confirmed", &message);
        if let Err(err) = notification::create(
            store,
            confirmed.user_id,
            message,
            NotificationKind::RegistrationUpdate,
        )
        .await
        {
            warn!("[registration] failed to persist notification: {err}");
        }
    }
}

/// Volunteer-initiated cancellation. Completed registrations are final.
pub async fn cancel(
    ctx: &AppContext,
    id: i64,
    actor_id: i64,
    actor_role: UserRole,
) -> Result<Registration, AppError> {
    let mut registration = ctx
        .store
        .get_registration(id)
        .await?
        .ok_or(AppError::NotFound)?;
    if registration.user_id != actor_id && actor_role != UserRole::Admin {
        return Err(AppError::Unauthorized);
    }
    if registration.status == RegistrationStatus::Completed {
        return Err(AppError::InvalidStateTransition);
    }
    registration.status = RegistrationStatus::Cancelled;
    registration.updated_at = Utc::now();
    ctx.store.update_registration(&registration).await?;
    ctx.scheduler.invalidate(id);
    info!("[registration] cancelled registration {id}");
    Ok(registration)
}

/// Manager override. Accepts any target status; a pending timer for the
/// registration is dropped.
pub async fn update_status(
    ctx: &AppContext,
    id: i64,
    status: RegistrationStatus,
) -> Result<Registration, AppError> {
    let mut registration = ctx
        .store
        .get_registration(id)
        .await?
        .ok_or(AppError::NotFound)?;
    registration.status = status;
    registration.updated_at = Utc::now();
    ctx.store.update_registration(&registration).await?;
    ctx.scheduler.invalidate(id);
    Ok(registration)
}

/// The user's live registration for an event, if any. A cancelled record
/// does not count as registered.
pub async fn for_pair(
    store: &Store,
    user_id: i64,
    event_id: i64,
) -> Result<Option<Registration>, AppError> {
    Ok(store
        .registration_for_pair(user_id, event_id)
        .await?
        .filter(|r| r.status != RegistrationStatus::Cancelled))
}

/// A user's own registrations, cancelled ones hidden, newest first, with
/// the event joined in for display.
pub async fn by_user(store: &Store, user_id: i64) -> Result<Vec<Registration>, AppError> {
    let mut registrations: Vec<Registration> = store
        .registrations_by_user(user_id)
        .await?
        .into_iter()
        .filter(|r| r.status != RegistrationStatus::Cancelled)
        .collect();

    let events = join_all(
        registrations
            .iter()
            .map(|r| event::get_by_id(store, r.event_id)),
    )
    .await;
    for (registration, event) in registrations.iter_mut().zip(events) {
        registration.event = event.ok();
    }

    registrations.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
    Ok(registrations)
}

/// Roster for an event, every status included, with the user joined in.
pub async fn by_event(store: &Store, event_id: i64) -> Result<Vec<Registration>, AppError> {
    let mut registrations = store.registrations_by_event(event_id).await?;

    let users = join_all(registrations.iter().map(|r| store.get_user(r.user_id))).await;
    for (registration, user) in registrations.iter_mut().zip(users) {
        registration.user = user.ok().flatten();
    }

    registrations.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
    Ok(registrations)
}
