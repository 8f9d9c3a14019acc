pub mod auth;
pub mod backup;
pub mod crypto;
pub mod event;
pub mod log;
pub mod notification;
pub mod post;
pub mod registration;
pub mod user;

use std::sync::Arc;

use crate::store::Store;
use notification::Notifier;
use registration::ConfirmationScheduler;

/// Shared service dependencies, constructed once at startup and passed by
/// reference instead of living behind module-level singletons.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<Store>,
    pub scheduler: Arc<ConfirmationScheduler>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    pub fn new(
        store: Arc<Store>,
        scheduler: Arc<ConfirmationScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> AppContext {
        AppContext {
            store,
            scheduler,
            notifier,
        }
    }
}
