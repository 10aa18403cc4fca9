//! Quotation and reservation engine for bookable event spaces.
//!
//! [`Engine`] checks requests against weekly opening hours and the space
//! calendar, prices them from rate cards, and confirms quotes by blocking
//! the calendar and rejecting every pending quote that lost its slot.
//! Persistence and outbound messaging sit behind the [`Store`] and
//! [`Notifier`] ports.

pub mod calendar;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod money;
pub mod notify;
pub mod observability;
pub mod store;

pub use calendar::Calendar;
pub use config::EngineConfig;
pub use engine::{
    Availability, ConfirmationOutcome, Engine, EngineError, ErrorKind, PriceBreakdown, PricingRequest, QuoteDecision,
    QuoteRequest, Unavailable,
};
pub use money::Money;
pub use notify::{LoggingNotifier, Notifier, NotifyHub, QuoteRenderer};
pub use store::{InMemoryStore, Store, StoreError};
