use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::{Availability, Engine, EngineError, PricingRequest, Unavailable};

/// Everything needed to check, price and record a quotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub space_id: Ulid,
    pub config_id: Ulid,
    pub date: NaiveDate,
    pub start_time: ClockTime,
    pub duration_hours: u32,
    pub attendees: u32,
    pub event_type: String,
    pub client_type: ClientType,
    #[serde(default)]
    pub add_on_ids: Vec<Ulid>,
    #[serde(default)]
    pub observations: Option<String>,
}

impl QuoteRequest {
    fn check(&self) -> Result<(), EngineError> {
        let event_type = self.event_type.trim();
        if event_type.is_empty() {
            return Err(EngineError::Validation("event type is required".into()));
        }
        if event_type.chars().count() > MAX_EVENT_TYPE_LEN {
            return Err(EngineError::Validation(format!(
                "event type longer than {MAX_EVENT_TYPE_LEN} characters"
            )));
        }
        if !(1..=MAX_ATTENDEES).contains(&self.attendees) {
            return Err(EngineError::Validation(format!(
                "attendees must be between 1 and {MAX_ATTENDEES}, got {}",
                self.attendees
            )));
        }
        if self.add_on_ids.len() > MAX_ADD_ONS_PER_QUOTE {
            return Err(EngineError::Validation(format!(
                "at most {MAX_ADD_ONS_PER_QUOTE} add-ons per quote"
            )));
        }
        Ok(())
    }

    fn pricing(&self) -> PricingRequest {
        PricingRequest {
            config_id: self.config_id,
            client_type: self.client_type,
            start_time: self.start_time,
            duration_hours: self.duration_hours,
            attendees: self.attendees,
            add_on_ids: self.add_on_ids.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum QuoteDecision {
    /// Priced and stored as pending.
    Quoted(Quote),
    /// Not bookable as requested; nothing was stored.
    Unavailable(Availability),
}

impl Engine {
    /// Validate, price and persist a pending quote.
    pub async fn request_quote(&self, req: QuoteRequest) -> Result<QuoteDecision, EngineError> {
        let result = self.request_quote_inner(req).await;
        let outcome = match &result {
            Ok(QuoteDecision::Quoted(_)) => "quoted",
            Ok(QuoteDecision::Unavailable(_)) => "unavailable",
            Err(_) => "error",
        };
        metrics::counter!(observability::QUOTES_TOTAL, "outcome" => outcome).increment(1);
        result
    }

    async fn request_quote_inner(&self, req: QuoteRequest) -> Result<QuoteDecision, EngineError> {
        req.check()?;

        let availability = self
            .validate(req.space_id, req.date, req.start_time, req.duration_hours, &req.event_type)
            .await?;
        match &availability.reason {
            None => {}
            Some(Unavailable::DurationOutOfRange { .. }) => {
                return Err(EngineError::Validation(availability.message));
            }
            Some(reason) => {
                info!(space_id = %req.space_id, date = %req.date, "quote refused: {reason}");
                return Ok(QuoteDecision::Unavailable(availability));
            }
        }

        let breakdown = self.price(&req.pricing()).await?;
        let seq = self.store.next_quote_sequence().await?;
        let created_at = self.calendar.now();
        let number = format!(
            "{}-{}-{seq:05}",
            self.config.quote_prefix,
            self.calendar.date_of(created_at).format("%Y%m%d")
        );

        let quote = Quote {
            id: Ulid::new(),
            number,
            space_id: req.space_id,
            config_id: req.config_id,
            date: req.date,
            start_time: req.start_time,
            duration_hours: req.duration_hours,
            attendees: req.attendees,
            event_type: req.event_type.trim().to_string(),
            client_type: req.client_type,
            deposit_amount: breakdown.total.percent_bps(self.config.deposit_bps),
            total: breakdown.total,
            line_items: breakdown.line_items,
            status: QuoteStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            observations: req.observations.unwrap_or_default(),
            created_at,
            confirmed_at: None,
        };
        self.store.insert_quote(quote.clone()).await?;

        info!(
            quote = %quote.number,
            space_id = %quote.space_id,
            date = %quote.date,
            window = %quote.window(),
            total = %quote.total,
            "quote created"
        );
        self.notify.send(&Event::QuoteCreated {
            quote_id: quote.id,
            space_id: quote.space_id,
            date: quote.date,
        });
        self.dispatcher.quote_ready(quote.clone());

        Ok(QuoteDecision::Quoted(quote))
    }
}
