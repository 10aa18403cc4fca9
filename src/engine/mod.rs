mod availability;
mod conflict;
mod confirm;
mod error;
mod hours;
mod pricing;
mod quotes;
mod slots;

pub use availability::{Availability, Unavailable, check_opening_hours};
pub use conflict::first_conflict;
pub use confirm::{ConfirmationOutcome, cascade_targets};
pub use error::{EngineError, ErrorKind};
pub use hours::OpeningHours;
pub use pricing::{PriceBreakdown, PricingRequest, night_surcharge};
pub use quotes::{QuoteDecision, QuoteRequest};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::calendar::Calendar;
use crate::config::EngineConfig;
use crate::model::{MINUTES_PER_HOUR, Minute};
use crate::notify::{Dispatcher, Notifier, NotifyHub};
use crate::store::Store;

/// Availability, pricing and confirmation over a persistence port.
///
/// Holds no domain state of its own: everything is read from and written to
/// the store. The only mutable member is the table of per-space
/// confirmation locks.
pub struct Engine {
    pub(super) store: Arc<dyn Store>,
    pub(super) dispatcher: Dispatcher,
    pub notify: Arc<NotifyHub>,
    pub(super) config: EngineConfig,
    pub(super) calendar: Calendar,
    /// Serializes confirmations per space.
    confirm_locks: DashMap<Ulid, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>, config: EngineConfig) -> Self {
        Self::with_hub(store, notifier, Arc::new(NotifyHub::new()), config)
    }

    pub fn with_hub(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        notify: Arc<NotifyHub>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            dispatcher: Dispatcher::new(notifier, config.notify_timeout()),
            notify,
            calendar: Calendar::new(config.timezone),
            config,
            confirm_locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub(super) fn space_lock(&self, space_id: Ulid) -> Arc<Mutex<()>> {
        self.confirm_locks.entry(space_id).or_default().value().clone()
    }

    /// Drop the space's lock once no confirmation holds or awaits it.
    pub(super) fn release_space_lock(&self, space_id: Ulid) {
        self.confirm_locks
            .remove_if(&space_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Whole hours as minutes, refusing counts that do not fit the minute line.
pub(crate) fn hours(h: u32) -> Result<Minute, EngineError> {
    Minute::try_from(h)
        .ok()
        .and_then(|h| h.checked_mul(MINUTES_PER_HOUR))
        .ok_or_else(|| EngineError::Validation(format!("{h} hours is out of range")))
}
