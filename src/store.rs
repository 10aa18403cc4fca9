use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("already exists: {0}")]
    AlreadyExists(Ulid),
    #[error("quote {0} is no longer pending")]
    StaleQuote(Ulid),
    #[error("block overlaps existing block {existing} ({window})")]
    BlockOverlap { existing: Ulid, window: TimeWindow },
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A pending quote to be rejected in the same commit as a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub quote_id: Ulid,
    pub note: String,
}

/// Every write of one confirmation. Applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationCommit {
    pub quote_id: Ulid,
    pub confirmed_at: DateTime<Utc>,
    pub block: CalendarBlock,
    pub rejections: Vec<Rejection>,
}

/// Quotes as they stand after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub confirmed: Quote,
    pub rejected: Vec<Quote>,
}

/// Persistence port consumed by the engine.
#[async_trait]
pub trait Store: Send + Sync {
    async fn schedule(&self, weekday: u8) -> Result<Option<OperatingSchedule>, StoreError>;

    async fn space_buffers(&self, space_id: Ulid) -> Result<Option<SpaceBuffers>, StoreError>;

    async fn rate_card(&self, config_id: Ulid, client_type: ClientType) -> Result<Option<RateCard>, StoreError>;

    /// The rate whose attendee range contains `attendees`.
    async fn additional_hour_rate(
        &self,
        config_id: Ulid,
        client_type: ClientType,
        base_hours: u32,
        attendees: u32,
    ) -> Result<Option<AdditionalHourRate>, StoreError>;

    /// Services with the given ids; unknown ids are skipped.
    async fn add_ons(&self, ids: &[Ulid]) -> Result<Vec<AddOnService>, StoreError>;

    /// Blocks of one space and date, ordered by start.
    async fn blocks_on(&self, space_id: Ulid, date: NaiveDate) -> Result<Vec<CalendarBlock>, StoreError>;

    async fn quote(&self, id: Ulid) -> Result<Option<Quote>, StoreError>;

    async fn pending_quotes_on(&self, space_id: Ulid, date: NaiveDate) -> Result<Vec<Quote>, StoreError>;

    /// Monotonic sequence for human-readable quote numbers.
    async fn next_quote_sequence(&self) -> Result<u64, StoreError>;

    async fn insert_quote(&self, quote: Quote) -> Result<(), StoreError>;

    /// Confirm, block and cascade atomically. Fails without writing anything
    /// when a touched quote is no longer pending or the block would overlap
    /// another block on the same space and date.
    async fn commit_confirmation(&self, commit: ConfirmationCommit) -> Result<CommitReceipt, StoreError>;
}

// ── In-memory adapter ────────────────────────────────────────────

#[derive(Debug, Default)]
struct SpaceCalendar {
    buffers: Option<SpaceBuffers>,
    /// Per date, sorted by `window.start`.
    blocks: BTreeMap<NaiveDate, Vec<CalendarBlock>>,
    quotes: HashMap<Ulid, Quote>,
}

impl SpaceCalendar {
    fn overlapping_block(&self, candidate: &CalendarBlock) -> Option<&CalendarBlock> {
        self.blocks
            .get(&candidate.date)?
            .iter()
            .find(|b| b.window.overlaps(&candidate.window))
    }

    /// Insert maintaining sort order by window start.
    fn insert_block(&mut self, block: CalendarBlock) {
        let day = self.blocks.entry(block.date).or_default();
        let pos = day
            .binary_search_by_key(&block.window.start, |b| b.window.start)
            .unwrap_or_else(|e| e);
        day.insert(pos, block);
    }
}

type SharedSpace = Arc<RwLock<SpaceCalendar>>;

/// `Store` kept in process memory. Each space's calendar sits behind its own
/// lock, so a commit holding the write lock is atomic for that space.
pub struct InMemoryStore {
    spaces: DashMap<Ulid, SharedSpace>,
    /// Reverse lookup: quote id → space id
    quote_to_space: DashMap<Ulid, Ulid>,
    schedules: DashMap<u8, OperatingSchedule>,
    rate_cards: DashMap<(Ulid, ClientType), RateCard>,
    additional_rates: DashMap<(Ulid, ClientType), Vec<AdditionalHourRate>>,
    add_ons: DashMap<Ulid, AddOnService>,
    quote_seq: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            spaces: DashMap::new(),
            quote_to_space: DashMap::new(),
            schedules: DashMap::new(),
            rate_cards: DashMap::new(),
            additional_rates: DashMap::new(),
            add_ons: DashMap::new(),
            quote_seq: AtomicU64::new(0),
        }
    }

    fn space(&self, id: Ulid) -> SharedSpace {
        self.spaces.entry(id).or_default().value().clone()
    }

    fn existing_space(&self, id: &Ulid) -> Option<SharedSpace> {
        self.spaces.get(id).map(|e| e.value().clone())
    }

    // ── Seeding ──────────────────────────────────────────────

    pub fn put_schedule(&self, schedule: OperatingSchedule) {
        self.schedules.insert(schedule.weekday, schedule);
    }

    pub async fn put_buffers(&self, buffers: SpaceBuffers) {
        self.space(buffers.space_id).write().await.buffers = Some(buffers);
    }

    pub fn put_rate_card(&self, card: RateCard) {
        self.rate_cards.insert((card.config_id, card.client_type), card);
    }

    pub fn put_additional_rate(&self, rate: AdditionalHourRate) {
        self.additional_rates
            .entry((rate.config_id, rate.client_type))
            .or_default()
            .push(rate);
    }

    pub fn put_add_on(&self, service: AddOnService) {
        self.add_ons.insert(service.id, service);
    }

    /// Record a block entered outside the quotation flow.
    pub async fn put_block(&self, block: CalendarBlock) -> Result<(), StoreError> {
        let space = self.space(block.space_id);
        let mut guard = space.write().await;
        if let Some(existing) = guard.overlapping_block(&block) {
            return Err(StoreError::BlockOverlap {
                existing: existing.id,
                window: existing.window,
            });
        }
        guard.insert_block(block);
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn schedule(&self, weekday: u8) -> Result<Option<OperatingSchedule>, StoreError> {
        Ok(self.schedules.get(&weekday).map(|e| e.value().clone()))
    }

    async fn space_buffers(&self, space_id: Ulid) -> Result<Option<SpaceBuffers>, StoreError> {
        match self.existing_space(&space_id) {
            Some(space) => Ok(space.read().await.buffers),
            None => Ok(None),
        }
    }

    async fn rate_card(&self, config_id: Ulid, client_type: ClientType) -> Result<Option<RateCard>, StoreError> {
        Ok(self
            .rate_cards
            .get(&(config_id, client_type))
            .map(|e| e.value().clone()))
    }

    async fn additional_hour_rate(
        &self,
        config_id: Ulid,
        client_type: ClientType,
        base_hours: u32,
        attendees: u32,
    ) -> Result<Option<AdditionalHourRate>, StoreError> {
        Ok(self
            .additional_rates
            .get(&(config_id, client_type))
            .and_then(|rates| {
                rates
                    .iter()
                    .find(|r| r.base_hours == base_hours && r.covers(attendees))
                    .cloned()
            }))
    }

    async fn add_ons(&self, ids: &[Ulid]) -> Result<Vec<AddOnService>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.add_ons.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn blocks_on(&self, space_id: Ulid, date: NaiveDate) -> Result<Vec<CalendarBlock>, StoreError> {
        let Some(space) = self.existing_space(&space_id) else {
            return Ok(Vec::new());
        };
        let guard = space.read().await;
        Ok(guard.blocks.get(&date).cloned().unwrap_or_default())
    }

    async fn quote(&self, id: Ulid) -> Result<Option<Quote>, StoreError> {
        let Some(space_id) = self.quote_to_space.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let space = self.existing_space(&space_id).ok_or(StoreError::NotFound(space_id))?;
        let guard = space.read().await;
        Ok(guard.quotes.get(&id).cloned())
    }

    async fn pending_quotes_on(&self, space_id: Ulid, date: NaiveDate) -> Result<Vec<Quote>, StoreError> {
        let Some(space) = self.existing_space(&space_id) else {
            return Ok(Vec::new());
        };
        let guard = space.read().await;
        let mut pending: Vec<Quote> = guard
            .quotes
            .values()
            .filter(|q| q.date == date && q.status == QuoteStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|q| q.id);
        Ok(pending)
    }

    async fn next_quote_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.quote_seq.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn insert_quote(&self, quote: Quote) -> Result<(), StoreError> {
        if self.quote_to_space.contains_key(&quote.id) {
            return Err(StoreError::AlreadyExists(quote.id));
        }
        let space = self.space(quote.space_id);
        let mut guard = space.write().await;
        self.quote_to_space.insert(quote.id, quote.space_id);
        guard.quotes.insert(quote.id, quote);
        Ok(())
    }

    async fn commit_confirmation(&self, commit: ConfirmationCommit) -> Result<CommitReceipt, StoreError> {
        let space_id = self
            .quote_to_space
            .get(&commit.quote_id)
            .map(|e| *e.value())
            .ok_or(StoreError::NotFound(commit.quote_id))?;
        let space = self.existing_space(&space_id).ok_or(StoreError::NotFound(space_id))?;
        let mut guard = space.write().await;

        // Phase 1: validate everything against current state.
        let touched = std::iter::once(commit.quote_id).chain(commit.rejections.iter().map(|r| r.quote_id));
        for id in touched {
            match guard.quotes.get(&id) {
                Some(q) if q.status == QuoteStatus::Pending => {}
                Some(_) => return Err(StoreError::StaleQuote(id)),
                None => return Err(StoreError::NotFound(id)),
            }
        }
        if let Some(existing) = guard.overlapping_block(&commit.block) {
            return Err(StoreError::BlockOverlap {
                existing: existing.id,
                window: existing.window,
            });
        }

        // Phase 2: apply.
        let mut rejected = Vec::with_capacity(commit.rejections.len());
        for rejection in &commit.rejections {
            if let Some(q) = guard.quotes.get_mut(&rejection.quote_id) {
                q.status = QuoteStatus::Rejected;
                q.append_observation(&rejection.note);
                rejected.push(q.clone());
            }
        }
        let confirmed = match guard.quotes.get_mut(&commit.quote_id) {
            Some(q) => {
                q.status = QuoteStatus::Confirmed;
                q.payment_status = PaymentStatus::DepositPending;
                q.confirmed_at = Some(commit.confirmed_at);
                q.clone()
            }
            None => return Err(StoreError::NotFound(commit.quote_id)),
        };
        guard.insert_block(commit.block);

        Ok(CommitReceipt { confirmed, rejected })
    }
}
