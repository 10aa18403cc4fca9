use std::time::Instant;

use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;
use crate::store::{ConfirmationCommit, Rejection};

use super::conflict::first_conflict;
use super::{Engine, EngineError, ErrorKind};

/// Result of a successful confirmation.
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub quote: Quote,
    pub block: CalendarBlock,
    /// Pending quotes rejected because they overlapped the confirmed one.
    pub cancelled: Vec<Quote>,
}

/// Pending quotes that lose their slot once `confirmed` is booked.
///
/// Compares unbuffered event times only: setup and teardown around the
/// confirmed event do not push neighbours out. Quotes that merely touch the
/// confirmed window at an edge survive.
pub fn cascade_targets<'a>(confirmed: &Quote, candidates: &'a [Quote]) -> Vec<&'a Quote> {
    let window = confirmed.window();
    candidates
        .iter()
        .filter(|q| {
            q.id != confirmed.id
                && q.space_id == confirmed.space_id
                && q.date == confirmed.date
                && q.status == QuoteStatus::Pending
                && q.window().overlaps(&window)
        })
        .collect()
}

fn block_reason(quote: &Quote) -> String {
    format!(
        "Confirmed reservation {} ({}, {} attendees)",
        quote.number, quote.event_type, quote.attendees
    )
}

fn rejection_note(winner: &Quote) -> String {
    format!(
        "Automatically rejected: the time slot was taken by confirmed quote {} ({} {}).",
        winner.number,
        winner.date,
        winner.window()
    )
}

impl Engine {
    /// Confirm a pending quote, block its buffered time and reject every
    /// pending quote it overlaps, all in one store commit.
    pub async fn confirm(&self, quote_id: Ulid) -> Result<ConfirmationOutcome, EngineError> {
        let result = self.confirm_inner(quote_id).await;
        let outcome = match &result {
            Ok(_) => "confirmed",
            Err(e) => match e.kind() {
                ErrorKind::Unavailable => "conflict",
                ErrorKind::State => "invalid_state",
                ErrorKind::NotFound => "not_found",
                _ => "error",
            },
        };
        metrics::counter!(observability::CONFIRMATIONS_TOTAL, "outcome" => outcome).increment(1);
        if let Err(e) = &result {
            warn!(%quote_id, "confirmation failed: {e}");
        }
        result
    }

    async fn confirm_inner(&self, quote_id: Ulid) -> Result<ConfirmationOutcome, EngineError> {
        let space_id = self
            .store
            .quote(quote_id)
            .await?
            .ok_or(EngineError::QuoteNotFound(quote_id))?
            .space_id;

        let result = self.confirm_in_space(space_id, quote_id).await;
        self.release_space_lock(space_id);
        result
    }

    async fn confirm_in_space(&self, space_id: Ulid, quote_id: Ulid) -> Result<ConfirmationOutcome, EngineError> {
        let lock = self.space_lock(space_id);
        let guard = lock.lock().await;
        let held = Instant::now();

        // Reload under the lock; another confirmation may have cascaded it.
        let quote = self
            .store
            .quote(quote_id)
            .await?
            .ok_or(EngineError::QuoteNotFound(quote_id))?;
        if quote.status != QuoteStatus::Pending {
            return Err(EngineError::InvalidState {
                id: quote.id,
                status: quote.status,
            });
        }

        let buffers = self.buffers_for(space_id).await?;
        let buffered = buffers.around(&quote.window());
        let blocks = self.blocks_around(space_id, quote.date).await?;
        if let Some(block) = first_conflict(&buffered, &blocks) {
            return Err(EngineError::Conflict {
                block_id: block.id,
                window: block.window,
            });
        }

        let pending = self.store.pending_quotes_on(space_id, quote.date).await?;
        let note = rejection_note(&quote);
        let rejections: Vec<Rejection> = cascade_targets(&quote, &pending)
            .into_iter()
            .map(|q| Rejection {
                quote_id: q.id,
                note: note.clone(),
            })
            .collect();

        let block = CalendarBlock {
            id: Ulid::new(),
            space_id,
            date: quote.date,
            window: buffered,
            quote_id: Some(quote.id),
            block_type: BlockType::ConfirmedReservation,
            reason: block_reason(&quote),
        };

        let receipt = self
            .store
            .commit_confirmation(ConfirmationCommit {
                quote_id,
                confirmed_at: self.calendar.now(),
                block: block.clone(),
                rejections,
            })
            .await?;
        metrics::histogram!(observability::CONFIRM_DURATION_SECONDS).record(held.elapsed().as_secs_f64());
        drop(guard);

        info!(
            quote = %receipt.confirmed.number,
            %space_id,
            date = %block.date,
            block = %block.window,
            cancelled = receipt.rejected.len(),
            "quote confirmed"
        );
        metrics::counter!(observability::CASCADE_REJECTIONS_TOTAL).increment(receipt.rejected.len() as u64);

        self.notify.send(&Event::QuoteConfirmed {
            quote_id,
            space_id,
            block_id: block.id,
        });
        self.notify.send(&Event::BlockCreated {
            block_id: block.id,
            space_id,
            date: block.date,
            window: block.window,
        });
        let mut cancellations = Vec::with_capacity(receipt.rejected.len());
        for rejected in &receipt.rejected {
            info!(quote = %rejected.number, by = %receipt.confirmed.number, "pending quote rejected");
            self.notify.send(&Event::QuoteRejected {
                quote_id: rejected.id,
                space_id,
                superseded_by: quote_id,
            });
            cancellations.push(Cancellation {
                quote: rejected.clone(),
                reason: note.clone(),
            });
        }
        self.dispatcher.batch_cancellation(cancellations);

        Ok(ConfirmationOutcome {
            quote: receipt.confirmed,
            block,
            cancelled: receipt.rejected,
        })
    }
}
