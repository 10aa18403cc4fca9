use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};
use ulid::Ulid;

use venuebook::model::*;
use venuebook::notify::CollaboratorError;
use venuebook::{
    Engine, EngineConfig, ErrorKind, InMemoryStore, LoggingNotifier, Money, QuoteDecision, QuoteRenderer,
    QuoteRequest, Store, Unavailable,
};

// ── Test infrastructure ──────────────────────────────────────

struct FakePdf;

#[async_trait]
impl QuoteRenderer for FakePdf {
    async fn render_quote_pdf(&self, quote: &Quote) -> Result<Vec<u8>, CollaboratorError> {
        Ok(format!("%PDF {}", quote.number).into_bytes())
    }
}

/// A venue in Mexico City: open 09:00-23:00 Monday to Saturday, closed Sunday.
fn venue() -> (Engine, Arc<InMemoryStore>, Ulid, Ulid) {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("VENUEBOOK_TZ", "America/Mexico_City"),
        ("VENUEBOOK_QUOTE_PREFIX", "COT"),
        ("VENUEBOOK_DEPOSIT_BPS", "3000"),
    ]);
    let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

    let store = Arc::new(InMemoryStore::new());
    for weekday in 1..7 {
        store.put_schedule(OperatingSchedule {
            weekday,
            active: true,
            open: "09:00".parse().unwrap(),
            close: "23:00".parse().unwrap(),
        });
    }
    store.put_schedule(OperatingSchedule {
        weekday: 0,
        active: false,
        open: "09:00".parse().unwrap(),
        close: "23:00".parse().unwrap(),
    });

    let config_id = Ulid::new();
    store.put_rate_card(RateCard {
        config_id,
        client_type: ClientType::NonMember,
        price_4h: Some(Money::from_major(4000)),
        price_8h: Some(Money::from_major(7000)),
    });

    let notifier = Arc::new(LoggingNotifier::with_renderer(Arc::new(FakePdf)));
    let engine = Engine::new(store.clone(), notifier, config);
    (engine, store, Ulid::new(), config_id)
}

fn request(engine: &Engine, space_id: Ulid, config_id: Ulid, date: &str, start: &str, hours: u32) -> QuoteRequest {
    QuoteRequest {
        space_id,
        config_id,
        date: engine.calendar().parse_date(date).unwrap(),
        start_time: start.parse().unwrap(),
        duration_hours: hours,
        attendees: 120,
        event_type: "quinceañera".into(),
        client_type: ClientType::NonMember,
        add_on_ids: Vec::new(),
        observations: None,
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn quote_confirm_and_cascade() {
    let (engine, store, space, config) = venue();
    let mut feed = engine.notify.subscribe(space);

    let evening = assert_ok!(
        engine
            .request_quote(request(&engine, space, config, "2026-11-14", "18:00", 5))
            .await
    );
    let QuoteDecision::Quoted(evening) = evening else {
        panic!("evening slot should be free");
    };
    // 23:00 end passes the 22:00 cutoff: 7000 + 15%
    assert_eq!(evening.total, Money::from_major(8050));
    assert_eq!(evening.deposit_amount, Money::from_major(2415));
    assert!(evening.number.starts_with("COT-"));

    let rival = assert_ok!(
        engine
            .request_quote(request(&engine, space, config, "2026-11-14", "17:00", 4))
            .await
    );
    let QuoteDecision::Quoted(rival) = rival else {
        panic!("rival slot should be free before confirmation");
    };

    let outcome = assert_ok!(engine.confirm(evening.id).await);
    assert_eq!(outcome.cancelled.len(), 1);
    assert_eq!(outcome.cancelled[0].id, rival.id);
    assert_eq!(
        store.quote(rival.id).await.unwrap().unwrap().status,
        QuoteStatus::Rejected
    );

    // the calendar now refuses the afternoon
    let again = assert_ok!(
        engine
            .request_quote(request(&engine, space, config, "2026-11-14", "13:00", 4))
            .await
    );
    match again {
        QuoteDecision::Unavailable(a) => {
            assert!(matches!(a.reason, Some(Unavailable::Conflict { .. })), "{}", a.message)
        }
        QuoteDecision::Quoted(q) => panic!("double booked {}", q.number),
    }

    let created = tokio::time::timeout(Duration::from_secs(1), feed.recv()).await;
    assert!(matches!(created, Ok(Ok(Event::QuoteCreated { .. }))));
}

#[tokio::test]
async fn sunday_is_closed_and_slots_are_empty() {
    let (engine, _store, space, config) = venue();
    let decision = assert_ok!(
        engine
            .request_quote(request(&engine, space, config, "2026-11-15", "12:00", 4))
            .await
    );
    let QuoteDecision::Unavailable(a) = decision else {
        panic!("Sunday should be closed");
    };
    assert!(a.message.contains("Sunday"));

    let date = engine.calendar().parse_date("2026-11-15").unwrap();
    let slots = assert_ok!(engine.list_available_starts(space, date, 4).await);
    assert!(slots.is_empty());
}

#[tokio::test]
async fn late_utc_instant_resolves_to_local_date() {
    let (engine, _store, space, config) = venue();
    // 03:00 UTC Sunday is still Saturday evening in Mexico City
    let req = request(&engine, space, config, "2026-11-15T03:00:00Z", "10:00", 4);
    assert_eq!(req.date.to_string(), "2026-11-14");
    let decision = assert_ok!(engine.request_quote(req).await);
    assert!(matches!(decision, QuoteDecision::Quoted(_)));
}

#[tokio::test]
async fn bad_input_is_rejected_up_front() {
    let (engine, _store, space, config) = venue();
    let mut req = request(&engine, space, config, "2026-11-14", "10:00", 4);
    req.event_type = String::new();
    let err = assert_err!(engine.request_quote(req).await);
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = assert_err!(
        engine
            .request_quote(request(&engine, space, config, "2026-11-14", "10:00", 10))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = assert_err!(
        engine
            .request_quote(request(&engine, space, Ulid::new(), "2026-11-14", "10:00", 4))
            .await
    );
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
