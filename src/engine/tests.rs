use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Timelike};
use chrono_tz::Tz;
use ulid::Ulid;

use super::*;
use crate::calendar::{local_instant, now_ms, parse_instant, to_utc};
use crate::catalog::{StaticCatalog, default_setups};
use crate::model::*;
use crate::notify::{NotifyError, NotifyHub};
use crate::reference::is_well_formed;
use crate::store::{BookingFilter, InMemoryStore, StoreError, WalStore};

const H: Ms = 3_600_000; // 1 hour in ms
const PARIS: Tz = chrono_tz::Europe::Paris;
/// A Tuesday, CET (UTC+1).
const DAY: &str = "2031-03-11";

struct Harness {
    engine: Arc<Engine>,
    store: Arc<InMemoryStore>,
    hub: Arc<NotifyHub>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(NotifyHub::new());
    let engine = Engine::new(
        store.clone(),
        Arc::new(StaticCatalog::with_default_setups()),
        hub.clone(),
        PARIS,
    );
    Harness {
        engine: Arc::new(engine),
        store,
        hub,
    }
}

fn day() -> NaiveDate {
    NaiveDate::parse_from_str(DAY, "%Y-%m-%d").unwrap()
}

/// `DAY` at `hour:00` Paris time.
fn at(hour: u32) -> Ms {
    local_instant(day(), hour, PARIS).unwrap()
}

fn local(hour: u32) -> String {
    format!("{DAY}T{hour:02}:00:00")
}

fn request(start_hour: u32, end_hour: u32) -> BookingRequest {
    BookingRequest {
        space_id: "setup-s".into(),
        start_date: local(start_hour),
        end_date: local(end_hour),
        number_of_people: 4,
        first_name: "Camille".into(),
        last_name: "Durand".into(),
        email: "camille@example.com".into(),
        phone: Some("+33 6 12 34 56 78".into()),
        company: None,
        notes: None,
        total_price: 20.0,
        locale: None,
    }
}

fn new_booking(reference: &str, range: TimeRange, status: BookingStatus) -> NewBooking {
    NewBooking {
        reference_id: reference.into(),
        space_id: "setup-m".into(),
        range,
        number_of_people: 12,
        first_name: "Louis".into(),
        last_name: "Petit".into(),
        email: "louis@example.com".into(),
        phone: None,
        company: Some("Acme".into()),
        notes: None,
        total_price: 30.0,
        status,
        locale: Locale::En,
    }
}

/// Offset-less strings are Paris wall-clock time.
fn paris(s: &str) -> Ms {
    parse_instant(s, PARIS).unwrap()
}

// ── Pure overlap scenarios ───────────────────────────────

#[test]
fn overlap_at_start() {
    let candidate = TimeRange::new(paris("2026-01-27T10:00:00"), paris("2026-01-27T12:00:00"));
    let existing = TimeRange::new(paris("2026-01-27T09:00:00"), paris("2026-01-27T11:00:00"));
    assert!(candidate.overlaps(&existing));
}

#[test]
fn touching_boundary_is_free() {
    let candidate = TimeRange::new(paris("2026-01-27T10:00:00"), paris("2026-01-27T12:00:00"));
    let existing = TimeRange::new(paris("2026-01-27T12:00:00"), paris("2026-01-27T14:00:00"));
    assert!(!candidate.overlaps(&existing));
}

#[test]
fn overlap_across_midnight() {
    let night = TimeRange::new(paris("2026-01-27T22:00:00"), paris("2026-01-28T02:00:00"));
    let early = TimeRange::new(paris("2026-01-28T01:00:00"), paris("2026-01-28T03:00:00"));
    assert!(night.overlaps(&early));
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn empty_room_is_available() {
    let h = harness();
    let a = h
        .engine
        .check_availability(TimeRange::new(at(10), at(12)))
        .await
        .unwrap();
    assert!(a.available);
    assert!(a.conflicts.is_empty());
}

#[tokio::test]
async fn check_reports_overlap_at_start() {
    let h = harness();
    h.engine.create_booking(request(9, 11)).await.unwrap();

    let a = h
        .engine
        .check_availability(TimeRange::new(at(10), at(12)))
        .await
        .unwrap();
    assert!(!a.available);
    assert_eq!(a.conflicts.len(), 1);
    let c = &a.conflicts[0];
    assert_eq!(c.range, TimeRange::new(at(9), at(11)));
    assert_eq!(c.customer_name, "Camille Durand");
    assert_eq!(c.space_name, "Setup S (1-10 people)");
}

#[tokio::test]
async fn check_allows_back_to_back() {
    let h = harness();
    h.engine.create_booking(request(12, 14)).await.unwrap();
    let a = h
        .engine
        .check_availability(TimeRange::new(at(10), at(12)))
        .await
        .unwrap();
    assert!(a.available);
}

#[tokio::test]
async fn check_lists_exactly_the_overlapping_active_bookings() {
    let h = harness();
    let base = at(0);
    let query = TimeRange::new(base + 2 * H, base + 12 * H);
    let mut expected = Vec::new();
    for (i, (s, e, status)) in [
        (1, 3, BookingStatus::Confirmed),
        (3, 5, BookingStatus::Pending),
        (5, 7, BookingStatus::Confirmed),
        (8, 9, BookingStatus::Confirmed),
        (10, 11, BookingStatus::Cancelled),
        (11, 12, BookingStatus::Completed),
        (12, 13, BookingStatus::Confirmed),
    ]
    .into_iter()
    .enumerate()
    {
        let b = h
            .store
            .insert(new_booking(
                &format!("WS-SEED000{i}-0000"),
                TimeRange::new(base + s * H, base + e * H),
                status,
            ))
            .await
            .unwrap();
        if status.is_active() && b.range.overlaps(&query) {
            expected.push(b.id);
        }
    }

    let a = h.engine.check_availability(query).await.unwrap();
    let ids: Vec<Ulid> = a.conflicts.iter().map(|c| c.id).collect();
    assert_eq!(ids, expected);
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn check_is_idempotent() {
    let h = harness();
    h.engine.create_booking(request(10, 13)).await.unwrap();
    let range = TimeRange::new(at(9), at(18));
    let first = h.engine.check_availability(range).await.unwrap();
    let second = h.engine.check_availability(range).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn check_rejects_inverted_range() {
    let h = harness();
    let inverted = TimeRange {
        start: at(12),
        end: at(10),
    };
    assert!(matches!(
        h.engine.check_availability(inverted).await,
        Err(EngineError::InvalidRange)
    ));
}

#[tokio::test]
async fn conflict_with_unknown_space_falls_back_to_id() {
    let h = harness();
    let mut new = new_booking("WS-LEGACY00-0000", TimeRange::new(at(10), at(11)), BookingStatus::Confirmed);
    new.space_id = "retired-setup".into();
    h.store.insert(new).await.unwrap();
    let a = h
        .engine
        .check_availability(TimeRange::new(at(10), at(11)))
        .await
        .unwrap();
    assert_eq!(a.conflicts[0].space_name, "retired-setup");
}

// ── Admission ────────────────────────────────────────────

#[tokio::test]
async fn admitted_booking_blocks_every_overlapping_query() {
    let h = harness();
    let booking = h.engine.create_booking(request(10, 14)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert!(is_well_formed(&booking.reference_id));

    for (s, e) in [(9, 11), (13, 15), (11, 12), (8, 20)] {
        let a = h
            .engine
            .check_availability(TimeRange::new(at(s), at(e)))
            .await
            .unwrap();
        assert!(!a.available, "[{s}, {e}) should conflict");
        assert_eq!(a.conflicts[0].id, booking.id);
    }
}

#[tokio::test]
async fn second_overlapping_booking_conflicts() {
    let h = harness();
    h.engine.create_booking(request(10, 12)).await.unwrap();
    let err = h.engine.create_booking(request(11, 13)).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict));
    assert_eq!(
        err.to_string(),
        "The space is not available for the selected period"
    );
}

#[tokio::test]
async fn setups_share_one_room() {
    let h = harness();
    h.engine.create_booking(request(10, 12)).await.unwrap();
    let mut other = request(10, 12);
    other.space_id = "setup-xl".into();
    assert!(matches!(
        h.engine.create_booking(other).await,
        Err(EngineError::Conflict)
    ));
}

#[tokio::test]
async fn cancelled_booking_does_not_block() {
    let h = harness();
    let first = h.engine.create_booking(request(10, 12)).await.unwrap();
    h.engine.cancel_booking(&first.reference_id).await.unwrap();
    let second = h.engine.create_booking(request(10, 12)).await.unwrap();
    assert_ne!(first.reference_id, second.reference_id);
}

#[tokio::test]
async fn past_start_is_rejected() {
    let h = harness();
    let mut req = request(10, 12);
    req.start_date = "2020-01-01T10:00:00Z".into();
    req.end_date = "2020-01-01T12:00:00Z".into();
    let err = h.engine.create_booking(req).await.unwrap_err();
    assert!(matches!(err, EngineError::PastDate));
    assert_eq!(err.to_string(), "Start date cannot be in the past");
}

#[tokio::test]
async fn capacity_is_enforced() {
    let h = harness();
    let mut req = request(10, 12);
    req.number_of_people = 15;
    let err = h.engine.create_booking(req).await.unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded(10)));
    assert!(err.to_string().to_lowercase().contains("capacity exceeded"));
    assert!(err.to_string().contains("10"));
}

#[tokio::test]
async fn range_order_is_checked_before_past_date() {
    let h = harness();
    let mut req = request(10, 12);
    req.start_date = "2020-01-01T12:00:00Z".into();
    req.end_date = "2020-01-01T10:00:00Z".into();
    let err = h.engine.create_booking(req).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRange));
    assert_eq!(err.to_string(), "End date must be after start date");
}

#[tokio::test]
async fn equal_start_and_end_is_invalid_range() {
    let h = harness();
    assert!(matches!(
        h.engine.create_booking(request(10, 10)).await,
        Err(EngineError::InvalidRange)
    ));
}

#[tokio::test]
async fn unknown_space_is_checked_before_capacity() {
    let h = harness();
    let mut req = request(10, 12);
    req.space_id = "setup-xxl".into();
    req.number_of_people = 500;
    let err = h.engine.create_booking(req).await.unwrap_err();
    assert!(matches!(err, EngineError::SpaceNotFound(_)));
    assert_eq!(err.to_string(), "Space not found");
}

#[tokio::test]
async fn unavailable_space_is_rejected() {
    let mut spaces = default_setups();
    spaces[0].available = false;
    let engine = Engine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(StaticCatalog::new(spaces)),
        Arc::new(NotifyHub::new()),
        PARIS,
    );
    let err = engine.create_booking(request(10, 12)).await.unwrap_err();
    assert!(matches!(err, EngineError::SpaceUnavailable(_)));
    assert_eq!(err.to_string(), "Space is not available");
    assert!(engine.spaces().iter().all(|s| s.id != "setup-s"));
}

#[tokio::test]
async fn structural_errors_come_first() {
    let h = harness();
    let cases: Vec<Box<dyn Fn(&mut BookingRequest)>> = vec![
        Box::new(|r: &mut BookingRequest| r.email = "not-an-email".into()),
        Box::new(|r: &mut BookingRequest| r.first_name = "  ".into()),
        Box::new(|r: &mut BookingRequest| r.last_name = String::new()),
        Box::new(|r: &mut BookingRequest| r.space_id = String::new()),
        Box::new(|r: &mut BookingRequest| r.number_of_people = 0),
        Box::new(|r: &mut BookingRequest| r.number_of_people = -3),
        Box::new(|r: &mut BookingRequest| r.start_date = "next tuesday".into()),
        Box::new(|r: &mut BookingRequest| r.end_date = "2031-02-30T10:00:00".into()),
        Box::new(|r: &mut BookingRequest| r.total_price = f64::NAN),
        Box::new(|r: &mut BookingRequest| r.notes = Some("x".repeat(crate::limits::MAX_NOTES_LEN + 1))),
    ];
    for mutate in cases {
        let mut req = request(10, 12);
        // Also past-dated, so a validation error proves ordering.
        req.start_date = "2020-01-01T10:00:00Z".into();
        mutate(&mut req);
        let err = h.engine.create_booking(req).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "{err:?}");
    }
}

#[tokio::test]
async fn overlong_booking_is_rejected() {
    let h = harness();
    let mut req = request(10, 12);
    req.end_date = "2031-05-11T10:00:00".into();
    assert!(matches!(
        h.engine.create_booking(req).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn contact_fields_are_trimmed_and_kept() {
    let h = harness();
    let mut req = request(10, 12);
    req.first_name = "  Camille ".into();
    req.company = Some("   ".into());
    req.notes = Some("Projector please".into());
    req.locale = Some(Locale::En);
    let booking = h.engine.create_booking(req).await.unwrap();
    assert_eq!(booking.first_name, "Camille");
    assert_eq!(booking.company, None);
    assert_eq!(booking.notes.as_deref(), Some("Projector please"));
    assert_eq!(booking.locale, Locale::En);
    assert_eq!(booking.number_of_people, 4);
    assert_eq!(booking.range, TimeRange::new(at(10), at(12)));

    let stored = h.engine.find_booking(&booking.reference_id).await.unwrap();
    assert_eq!(stored, booking);
}

#[tokio::test]
async fn references_are_unique_across_bookings() {
    let h = harness();
    let mut seen = std::collections::HashSet::new();
    for hour in 9..20 {
        let b = h.engine.create_booking(request(hour, hour + 1)).await.unwrap();
        assert!(is_well_formed(&b.reference_id));
        assert!(seen.insert(b.reference_id));
    }
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test]
async fn two_concurrent_overlapping_bookings_one_wins() {
    let h = harness();
    let (a, b) = tokio::join!(
        h.engine.create_booking(request(10, 12)),
        h.engine.create_booking(request(11, 13)),
    );
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|r| matches!(r, Err(EngineError::Conflict)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_requests_never_double_book() {
    let h = harness();
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let engine = h.engine.clone();
            // Overlapping two-hour windows, one every 30 minutes.
            let start = at(9) + i * H / 2;
            let req = BookingRequest {
                start_date: to_utc(start).to_rfc3339(),
                end_date: to_utc(start + 2 * H).to_rfc3339(),
                ..request(9, 11)
            };
            tokio::spawn(async move { engine.create_booking(req).await })
        })
        .collect();

    for r in futures::future::join_all(handles).await {
        match r.unwrap() {
            Ok(_) | Err(EngineError::Conflict) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let active = h
        .store
        .find_many(&BookingFilter::active())
        .await
        .unwrap();
    assert!(!active.is_empty());
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            assert!(!a.range.overlaps(&b.range), "{a:?} overlaps {b:?}");
        }
    }
}

/// Reports a free room no matter what, so only the store's own exclusion
/// stands between two writers.
struct BlindPrecheck(InMemoryStore);

#[async_trait]
impl BookingStore for BlindPrecheck {
    async fn find_active_overlapping(&self, _: TimeRange) -> Result<Vec<Booking>, StoreError> {
        Ok(Vec::new())
    }
    async fn insert(&self, new: NewBooking) -> Result<Booking, StoreError> {
        self.0.insert(new).await
    }
    async fn find_many(&self, f: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        self.0.find_many(f).await
    }
    async fn find_by_reference(&self, r: &str) -> Result<Option<Booking>, StoreError> {
        self.0.find_by_reference(r).await
    }
    async fn transition(
        &self,
        id: Ulid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Booking, StoreError> {
        self.0.transition(id, from, to).await
    }
}

#[tokio::test]
async fn write_time_overlap_is_reported_as_conflict() {
    let engine = Engine::new(
        Arc::new(BlindPrecheck(InMemoryStore::new())),
        Arc::new(StaticCatalog::with_default_setups()),
        Arc::new(NotifyHub::new()),
        PARIS,
    );
    engine.create_booking(request(10, 12)).await.unwrap();
    let err = engine.create_booking(request(11, 12)).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict));
    assert_eq!(
        err.to_string(),
        "The space is not available for the selected period"
    );
}

struct DownStore;

#[async_trait]
impl BookingStore for DownStore {
    async fn find_active_overlapping(&self, _: TimeRange) -> Result<Vec<Booking>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn insert(&self, _: NewBooking) -> Result<Booking, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn find_many(&self, _: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn find_by_reference(&self, _: &str) -> Result<Option<Booking>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn transition(
        &self,
        _: Ulid,
        _: &[BookingStatus],
        _: BookingStatus,
    ) -> Result<Booking, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn store_outage_is_transient() {
    let engine = Engine::new(
        Arc::new(DownStore),
        Arc::new(StaticCatalog::with_default_setups()),
        Arc::new(NotifyHub::new()),
        PARIS,
    );
    let err = engine.create_booking(request(10, 12)).await.unwrap_err();
    assert!(matches!(err, EngineError::TransientStore(_)));
    assert!(matches!(
        engine.check_availability(TimeRange::new(at(10), at(12))).await,
        Err(EngineError::TransientStore(_))
    ));
}

// ── Notification ─────────────────────────────────────────

#[tokio::test]
async fn confirmation_is_localized() {
    let h = harness();
    let mut rx = h.hub.subscribe();
    let booking = h.engine.create_booking(request(10, 12)).await.unwrap();

    let sent = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.reference_id, booking.reference_id);
    assert_eq!(sent.locale, Locale::Fr);
    assert_eq!(sent.space_name, "Configuration S (1-10 personnes)");
    assert_eq!(sent.customer_name, "Camille Durand");
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify_booking_confirmed(&self, _: &BookingConfirmation) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp timeout".into()))
    }
}

#[tokio::test]
async fn notification_failure_does_not_fail_booking() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::new(
        store.clone(),
        Arc::new(StaticCatalog::with_default_setups()),
        Arc::new(FailingNotifier),
        PARIS,
    );
    let booking = engine.create_booking(request(10, 12)).await.unwrap();
    tokio::task::yield_now().await;
    let stored = store.find_by_reference(&booking.reference_id).await.unwrap();
    assert_eq!(stored.map(|b| b.status), Some(BookingStatus::Confirmed));
}

// ── Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn approval_flow() {
    let store = Arc::new(InMemoryStore::new());
    let hub = Arc::new(NotifyHub::new());
    let mut rx = hub.subscribe();
    let engine = Engine::new(
        store.clone(),
        Arc::new(StaticCatalog::with_default_setups()),
        hub.clone(),
        PARIS,
    )
    .require_approval(true);

    let pending = engine.create_booking(request(10, 12)).await.unwrap();
    assert_eq!(pending.status, BookingStatus::Pending);
    // Pending already holds the room.
    assert!(matches!(
        engine.create_booking(request(11, 12)).await,
        Err(EngineError::Conflict)
    ));
    // No confirmation until approved.
    assert!(rx.try_recv().is_err());

    let confirmed = engine.confirm_booking(&pending.reference_id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    let sent = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sent.reference_id, pending.reference_id);

    match engine.confirm_booking(&pending.reference_id).await {
        Err(EngineError::InvalidTransition { from, to }) => {
            assert_eq!(from, BookingStatus::Confirmed);
            assert_eq!(to, BookingStatus::Confirmed);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_twice_and_unknown_reference() {
    let h = harness();
    let b = h.engine.create_booking(request(10, 12)).await.unwrap();
    let cancelled = h.engine.cancel_booking(&b.reference_id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    assert!(matches!(
        h.engine.cancel_booking(&b.reference_id).await,
        Err(EngineError::InvalidTransition { .. })
    ));
    assert!(matches!(
        h.engine.cancel_booking("WS-NOPE0000-0000").await,
        Err(EngineError::BookingNotFound(_))
    ));
}

#[tokio::test]
async fn complete_finished_moves_only_confirmed_past_bookings() {
    let h = harness();
    let now = now_ms();
    let past = TimeRange::new(now - 5 * H, now - 3 * H);
    let ended_now = TimeRange::new(now - 2 * H, now);
    let ongoing = TimeRange::new(now, now + 2 * H);

    let done = h
        .store
        .insert(new_booking("WS-PAST0000-0001", past, BookingStatus::Confirmed))
        .await
        .unwrap();
    let edge = h
        .store
        .insert(new_booking("WS-PAST0000-0002", ended_now, BookingStatus::Confirmed))
        .await
        .unwrap();
    let running = h
        .store
        .insert(new_booking("WS-PAST0000-0003", ongoing, BookingStatus::Confirmed))
        .await
        .unwrap();
    let pending = h
        .store
        .insert(new_booking(
            "WS-PAST0000-0004",
            TimeRange::new(now - 9 * H, now - 8 * H),
            BookingStatus::Pending,
        ))
        .await
        .unwrap();

    assert_eq!(h.engine.complete_finished(now).await.unwrap(), 2);
    assert_eq!(h.engine.complete_finished(now).await.unwrap(), 0);

    let status = |id: Ulid| {
        let store = h.store.clone();
        async move {
            store
                .find_many(&BookingFilter::default())
                .await
                .unwrap()
                .into_iter()
                .find(|b| b.id == id)
                .map(|b| b.status)
        }
    };
    assert_eq!(status(done.id).await, Some(BookingStatus::Completed));
    assert_eq!(status(edge.id).await, Some(BookingStatus::Completed));
    assert_eq!(status(running.id).await, Some(BookingStatus::Confirmed));
    assert_eq!(status(pending.id).await, Some(BookingStatus::Pending));
}

#[tokio::test]
async fn find_bookings_filters() {
    let h = harness();
    let a = h.engine.create_booking(request(9, 10)).await.unwrap();
    let mut xl = request(12, 13);
    xl.space_id = "setup-xl".into();
    let b = h.engine.create_booking(xl).await.unwrap();
    h.engine.cancel_booking(&a.reference_id).await.unwrap();

    let all = h.engine.find_bookings(&BookingFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);

    let active = h.engine.find_bookings(&BookingFilter::active()).await.unwrap();
    assert_eq!(active.iter().map(|x| x.id).collect::<Vec<_>>(), vec![b.id]);

    let by_space = BookingFilter {
        space_id: Some("setup-xl".into()),
        ..BookingFilter::default()
    };
    assert_eq!(h.engine.find_bookings(&by_space).await.unwrap().len(), 1);

    let wide = BookingFilter::default().within(TimeRange::new(at(0), at(0) + 500 * 24 * H));
    assert!(matches!(
        h.engine.find_bookings(&wide).await,
        Err(EngineError::LimitExceeded(_))
    ));
}

// ── Calendar month ───────────────────────────────────────

#[tokio::test]
async fn month_view_uses_local_half_open_bounds() {
    let h = harness();
    // Paris: March 2031 is [2031-02-28T23:00Z, 2031-03-31T22:00Z).
    let inside = h
        .store
        .insert(new_booking(
            "WS-MONTH000-0001",
            TimeRange::new(paris("2031-03-15T10:00:00"), paris("2031-03-15T12:00:00")),
            BookingStatus::Confirmed,
        ))
        .await
        .unwrap();
    let straddling = h
        .store
        .insert(new_booking(
            "WS-MONTH000-0002",
            TimeRange::new(paris("2031-03-31T22:00:00"), paris("2031-04-01T02:00:00")),
            BookingStatus::Pending,
        ))
        .await
        .unwrap();
    // Ends exactly when March starts.
    h.store
        .insert(new_booking(
            "WS-MONTH000-0003",
            TimeRange::new(paris("2031-02-28T20:00:00"), paris("2031-03-01T00:00:00")),
            BookingStatus::Confirmed,
        ))
        .await
        .unwrap();
    // Cancelled never shows.
    h.store
        .insert(new_booking(
            "WS-MONTH000-0004",
            TimeRange::new(paris("2031-03-20T10:00:00"), paris("2031-03-20T12:00:00")),
            BookingStatus::Cancelled,
        ))
        .await
        .unwrap();

    let march = h.engine.bookings_for_month(2031, 2).await.unwrap();
    let ids: Vec<Ulid> = march.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![inside.id, straddling.id]);

    let april = h.engine.bookings_for_month(2031, 3).await.unwrap();
    assert_eq!(april.iter().map(|c| c.id).collect::<Vec<_>>(), vec![straddling.id]);

    let february = h.engine.bookings_for_month(2031, 1).await.unwrap();
    assert_eq!(february.len(), 1);
}

#[tokio::test]
async fn month_view_covers_the_whole_year_range() {
    let h = harness();
    // January 2000 starts an hour before the timestamp window in Paris.
    assert!(h.engine.bookings_for_month(2000, 0).await.unwrap().is_empty());
    assert!(h.engine.bookings_for_month(2099, 11).await.unwrap().is_empty());

    let west = Engine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(StaticCatalog::with_default_setups()),
        Arc::new(NotifyHub::new()),
        chrono_tz::America::Los_Angeles,
    );
    // December 2099 ends after the window in Los Angeles.
    assert!(west.bookings_for_month(2099, 11).await.unwrap().is_empty());
}

#[tokio::test]
async fn month_view_rejects_bad_input() {
    let h = harness();
    for (y, m) in [(2031, 12), (1999, 0), (2200, 5)] {
        let err = h.engine.bookings_for_month(y, m).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(err.to_string(), "Invalid year or month");
    }
}

// ── Slots ────────────────────────────────────────────────

#[tokio::test]
async fn empty_day_slots_start_within_business_hours() {
    let h = harness();
    let slots = h.engine.available_time_slots(day(), 2).await.unwrap();
    assert_eq!(slots.len(), 12);
    for slot in &slots {
        let hour = to_utc(slot.start).with_timezone(&PARIS).hour();
        assert!((BUSINESS_START_HOUR..BUSINESS_END_HOUR).contains(&hour), "{hour}");
        assert_eq!(slot.end - slot.start, 2 * H);
    }
    assert_eq!(slots[0].start, at(9));
    assert_eq!(slots[11].start, at(20));
}

#[tokio::test]
async fn slots_skip_booked_hours() {
    let h = harness();
    h.engine.create_booking(request(12, 14)).await.unwrap();
    let slots = h.engine.available_time_slots(day(), 2).await.unwrap();
    let starts: Vec<u32> = slots
        .iter()
        .map(|s| to_utc(s.start).with_timezone(&PARIS).hour())
        .collect();
    assert_eq!(starts, vec![9, 10, 14, 15, 16, 17, 18, 19, 20]);
}

#[tokio::test]
async fn slots_see_bookings_after_midnight() {
    let h = harness();
    let next_morning = at(0) + 25 * H;
    h.store
        .insert(new_booking(
            "WS-NIGHT000-0001",
            TimeRange::new(next_morning, next_morning + H),
            BookingStatus::Confirmed,
        ))
        .await
        .unwrap();
    // A 6-hour slot from 20:00 runs to 02:00 and hits the 01:00 booking.
    let slots = h.engine.available_time_slots(day(), 6).await.unwrap();
    assert_eq!(slots.len(), 11);
    assert_eq!(slots.last().unwrap().start, at(19));
}

#[tokio::test]
async fn full_window_slot_on_empty_day() {
    let h = harness();
    let slots = h.engine.available_time_slots(day(), 12).await.unwrap();
    assert!(!slots.is_empty());
    assert_eq!(slots[0], TimeSlot { start: at(9), end: at(21) });
}

#[tokio::test]
async fn slot_duration_is_bounded() {
    let h = harness();
    for hours in [0, 25] {
        assert!(matches!(
            h.engine.available_time_slots(day(), hours).await,
            Err(EngineError::Validation(_))
        ));
    }
}

#[tokio::test]
async fn slots_are_stateless() {
    let h = harness();
    h.engine.create_booking(request(15, 16)).await.unwrap();
    let a = h.engine.available_time_slots(day(), 1).await.unwrap();
    let b = h.engine.available_time_slots(day(), 1).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 11);
}

// ── Durable store behind the engine ──────────────────────

#[tokio::test]
async fn engine_over_wal_store_survives_restart() {
    let dir = std::env::temp_dir().join("wotespace_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("restart.wal");
    let _ = std::fs::remove_file(&path);

    let reference = {
        let engine = Engine::new(
            Arc::new(WalStore::open(&path).unwrap()),
            Arc::new(StaticCatalog::with_default_setups()),
            Arc::new(NotifyHub::new()),
            PARIS,
        );
        engine.create_booking(request(10, 12)).await.unwrap().reference_id
    };

    let engine = Engine::new(
        Arc::new(WalStore::open(&path).unwrap()),
        Arc::new(StaticCatalog::with_default_setups()),
        Arc::new(NotifyHub::new()),
        PARIS,
    );
    assert_eq!(
        engine.find_booking(&reference).await.unwrap().range,
        TimeRange::new(at(10), at(12))
    );
    assert!(matches!(
        engine.create_booking(request(11, 13)).await,
        Err(EngineError::Conflict)
    ));
    let _ = std::fs::remove_file(&path);
}
