use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::money::Money;

use super::{Engine, EngineError, hours};

/// Inputs to pricing. Availability is not re-checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub config_id: Ulid,
    pub client_type: ClientType,
    pub start_time: ClockTime,
    pub duration_hours: u32,
    pub attendees: u32,
    #[serde(default)]
    pub add_on_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub line_items: Vec<LineItem>,
    pub total: Money,
}

impl PriceBreakdown {
    fn new(line_items: Vec<LineItem>) -> Self {
        let total = line_items.iter().map(|i| i.line_total).sum();
        Self { line_items, total }
    }
}

/// Pick the base line from the rate card tiers.
fn base_item(card: &RateCard, duration_hours: u32) -> Result<LineItem, EngineError> {
    let tier = match (card.price_4h, card.price_8h) {
        (Some(p4), _) if duration_hours <= SHORT_TIER_HOURS => Some((SHORT_TIER_HOURS, p4)),
        (_, Some(p8)) => Some((LONG_TIER_HOURS, p8)),
        _ => None,
    };
    let (tier_hours, price) = tier.ok_or(EngineError::NoApplicableRate { duration_hours })?;
    Ok(LineItem::new(
        LineItemKind::Base,
        format!("Space rental, up to {tier_hours} hours"),
        1,
        price,
    ))
}

/// Surcharge line for events ending after `cutoff` or running past midnight,
/// priced as `bps` of every line already on the quote.
pub fn night_surcharge(items: &[LineItem], event: &TimeWindow, cutoff: ClockTime, bps: u32) -> Option<LineItem> {
    if event.end <= cutoff.minutes() && !event.wraps() {
        return None;
    }
    let subtotal: Money = items.iter().map(|i| i.line_total).sum();
    Some(LineItem::new(
        LineItemKind::NightSurcharge,
        format!("Night surcharge ({}% after {cutoff})", bps / 100),
        1,
        subtotal.percent_bps(bps),
    ))
}

impl Engine {
    /// Itemized price for a request. Lines come out in a fixed order: base,
    /// additional hours, night surcharge, then add-ons in request order.
    pub async fn price(&self, req: &PricingRequest) -> Result<PriceBreakdown, EngineError> {
        if !(1..=MAX_PRICED_DURATION_HOURS).contains(&req.duration_hours) {
            return Err(EngineError::Validation(format!(
                "priced duration must be between 1 and {MAX_PRICED_DURATION_HOURS} hours, got {}",
                req.duration_hours
            )));
        }
        let event = TimeWindow::starting_at(req.start_time.minutes(), hours(req.duration_hours)?);

        let card = self
            .store
            .rate_card(req.config_id, req.client_type)
            .await?
            .ok_or(EngineError::RateNotFound {
                config_id: req.config_id,
                client_type: req.client_type,
            })?;

        let mut items = vec![base_item(&card, req.duration_hours)?];

        if req.duration_hours > ADDITIONAL_HOUR_BASE_HOURS {
            let extra = req.duration_hours - ADDITIONAL_HOUR_BASE_HOURS;
            let rate = self
                .store
                .additional_hour_rate(req.config_id, req.client_type, ADDITIONAL_HOUR_BASE_HOURS, req.attendees)
                .await?;
            match rate {
                Some(rate) => items.push(LineItem::new(
                    LineItemKind::AdditionalHours,
                    format!("Additional hours beyond {ADDITIONAL_HOUR_BASE_HOURS}"),
                    extra,
                    rate.price_per_hour,
                )),
                None => debug!(
                    config_id = %req.config_id,
                    attendees = req.attendees,
                    "no additional-hour rate, {extra}h left unpriced"
                ),
            }
        }

        if let Some(line) = night_surcharge(
            &items,
            &event,
            self.config.night_cutoff,
            self.config.night_surcharge_bps,
        ) {
            items.push(line);
        }

        // a repeated id is a repeated line
        let services = self.store.add_ons(&req.add_on_ids).await?;
        for id in &req.add_on_ids {
            let Some(service) = services.iter().find(|s| s.id == *id) else {
                continue;
            };
            if service.active && service.client_type == req.client_type {
                items.push(LineItem::new(LineItemKind::AddOn, service.name.clone(), 1, service.price));
            }
        }

        Ok(PriceBreakdown::new(items))
    }
}
