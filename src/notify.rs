use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::model::{Cancellation, Event, Quote};
use crate::observability;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("delivery failed: {0}")]
    Delivery(String),
    #[error("rendering failed: {0}")]
    Render(String),
}

/// Outbound messaging (email, WhatsApp, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_quote_ready(&self, quote: &Quote) -> Result<(), CollaboratorError>;

    async fn notify_batch_cancellation(&self, cancellations: &[Cancellation]) -> Result<(), CollaboratorError>;
}

/// Produces the quote document attached to outbound messages.
#[async_trait]
pub trait QuoteRenderer: Send + Sync {
    async fn render_quote_pdf(&self, quote: &Quote) -> Result<Vec<u8>, CollaboratorError>;
}

/// Notifier that only logs. Renders the quote document when a renderer is set.
#[derive(Default)]
pub struct LoggingNotifier {
    renderer: Option<Arc<dyn QuoteRenderer>>,
}

impl LoggingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(renderer: Arc<dyn QuoteRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
        }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify_quote_ready(&self, quote: &Quote) -> Result<(), CollaboratorError> {
        let attachment = match &self.renderer {
            Some(renderer) => renderer.render_quote_pdf(quote).await?.len(),
            None => 0,
        };
        info!(
            quote = %quote.number,
            total = %quote.total,
            attachment_bytes = attachment,
            "quote ready"
        );
        Ok(())
    }

    async fn notify_batch_cancellation(&self, cancellations: &[Cancellation]) -> Result<(), CollaboratorError> {
        for c in cancellations {
            info!(quote = %c.quote.number, reason = %c.reason, "quote cancelled");
        }
        Ok(())
    }
}

/// Runs notifications off the caller's path: one spawned attempt per
/// message, bounded by a timeout, failures logged and counted only.
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    pub fn quote_ready(&self, quote: Quote) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, notifier.notify_quote_ready(&quote))
                .await
                .unwrap_or(Err(CollaboratorError::Timeout(timeout)));
            record("quote_ready", &quote.number, result);
        })
    }

    /// No task is spawned for an empty batch.
    pub fn batch_cancellation(&self, cancellations: Vec<Cancellation>) -> Option<JoinHandle<()>> {
        if cancellations.is_empty() {
            return None;
        }
        let notifier = self.notifier.clone();
        let timeout = self.timeout;
        Some(tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, notifier.notify_batch_cancellation(&cancellations))
                .await
                .unwrap_or(Err(CollaboratorError::Timeout(timeout)));
            let subject = format!("{} quote(s)", cancellations.len());
            record("batch_cancellation", &subject, result);
        }))
    }
}

fn record(kind: &'static str, subject: &str, result: Result<(), CollaboratorError>) {
    match result {
        Ok(()) => {
            debug!("{kind} notification delivered for {subject}");
            metrics::counter!(observability::NOTIFICATIONS_TOTAL, "kind" => kind, "status" => "ok").increment(1);
        }
        Err(e) => {
            warn!("{kind} notification for {subject} failed: {e}");
            metrics::counter!(observability::NOTIFICATIONS_TOTAL, "kind" => kind, "status" => "error").increment(1);
        }
    }
}

/// Broadcast hub for calendar changes, one channel per space.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes for a space. Creates the channel if needed.
    pub fn subscribe(&self, space_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(space_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.space_id()) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn remove(&self, space_id: &Ulid) {
        self.channels.remove(space_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::model::*;
    use crate::money::Money;

    fn quote() -> Quote {
        Quote {
            id: Ulid::new(),
            number: "Q-20260509-00001".into(),
            space_id: Ulid::new(),
            config_id: Ulid::new(),
            date: NaiveDate::from_ymd_opt(2026, 5, 9).unwrap(),
            start_time: ClockTime::from_hm(18, 0).unwrap(),
            duration_hours: 4,
            attendees: 80,
            event_type: "birthday".into(),
            client_type: ClientType::NonMember,
            line_items: Vec::new(),
            total: Money::from_major(3000),
            deposit_amount: Money::from_major(1500),
            status: QuoteStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            observations: String::new(),
            created_at: Utc::now(),
            confirmed_at: None,
        }
    }

    struct CountingRenderer(AtomicUsize);

    #[async_trait]
    impl QuoteRenderer for CountingRenderer {
        async fn render_quote_pdf(&self, _quote: &Quote) -> Result<Vec<u8>, CollaboratorError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(b"%PDF-1.7".to_vec())
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl QuoteRenderer for BrokenRenderer {
        async fn render_quote_pdf(&self, _quote: &Quote) -> Result<Vec<u8>, CollaboratorError> {
            Err(CollaboratorError::Render("font missing".into()))
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl Notifier for SlowNotifier {
        async fn notify_quote_ready(&self, _quote: &Quote) -> Result<(), CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }

        async fn notify_batch_cancellation(&self, _c: &[Cancellation]) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Delivery("smtp down".into()))
        }
    }

    #[tokio::test]
    async fn logging_notifier_renders_through_port() {
        let renderer = Arc::new(CountingRenderer(AtomicUsize::new(0)));
        let notifier = LoggingNotifier::with_renderer(renderer.clone());
        notifier.notify_quote_ready(&quote()).await.unwrap();
        assert_eq!(renderer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn render_failure_surfaces_to_dispatcher_only() {
        let notifier = LoggingNotifier::with_renderer(Arc::new(BrokenRenderer));
        let err = notifier.notify_quote_ready(&quote()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Render(_)));

        let dispatcher = Dispatcher::new(Arc::new(notifier), Duration::from_secs(1));
        // The task swallows the failure.
        dispatcher.quote_ready(quote()).await.unwrap();
    }

    #[tokio::test]
    async fn slow_channel_times_out_without_panicking() {
        let dispatcher = Dispatcher::new(Arc::new(SlowNotifier), Duration::from_millis(50));
        dispatcher.quote_ready(quote()).await.unwrap();
        dispatcher
            .batch_cancellation(vec![Cancellation {
                quote: quote(),
                reason: "slot taken".into(),
            }])
            .unwrap()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_batch_spawns_nothing() {
        let dispatcher = Dispatcher::new(Arc::new(LoggingNotifier::new()), Duration::from_secs(1));
        assert!(dispatcher.batch_cancellation(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let space_id = Ulid::new();
        let mut rx = hub.subscribe(space_id);

        let event = Event::QuoteCreated {
            quote_id: Ulid::new(),
            space_id,
            date: NaiveDate::from_ymd_opt(2026, 5, 9).unwrap(),
        };
        hub.send(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let space_id = Ulid::new();
        hub.send(&Event::QuoteRejected {
            quote_id: Ulid::new(),
            space_id,
            superseded_by: Ulid::new(),
        });
        hub.remove(&space_id);
    }
}
