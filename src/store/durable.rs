use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{error, info};
use ulid::Ulid;

use crate::calendar::now_ms;
use crate::model::{Booking, BookingStatus, Event, NewBooking, TimeRange};
use crate::observability;
use crate::wal::Wal;

use super::{BookingFilter, BookingStore, StoreError, Timeline};

// ── WAL writer task ──────────────────────────────────────

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the log and runs one command at a time. Appends are issued under
/// the timeline write lock, so at most one is ever in flight.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let started = Instant::now();
                let result = append_synced(&mut wal, &event);
                metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());
                let _ = response.send(result);
            }
            WalCommand::Compact { events, response } => {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(wal.appends_since_compact());
            }
        }
    }
}

/// Append and fsync one record. On failure the log is cut back to its last
/// synced length, so a record reported as failed never replays.
fn append_synced(wal: &mut Wal, event: &Event) -> io::Result<()> {
    let result = wal.append_buffered(event).and_then(|()| wal.flush_sync());
    if result.is_err()
        && let Err(e) = wal.discard_unsynced()
    {
        error!("booking log rollback failed, refusing further writes: {e}");
    }
    result
}

async fn send_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), StoreError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
        .map_err(|e| StoreError::Unavailable(format!("WAL write failed: {e}")))
}

fn event_booking_id(event: &Event) -> Ulid {
    match event {
        Event::BookingCreated { booking } => booking.id,
        Event::StatusChanged { id, .. } => *id,
    }
}

/// Bookings held in memory and journaled to a write-ahead log.
///
/// Each mutation is fsynced before it becomes visible, while the timeline's
/// write lock is held, so readers never see an uncommitted booking.
pub struct WalStore {
    timeline: Arc<RwLock<Timeline>>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl WalStore {
    /// Replay the log at `path` and start its writer task. Needs a Tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let mut timeline = Timeline::new();
        for event in &events {
            timeline.apply(event);
        }
        info!(
            path = %path.display(),
            events = events.len(),
            bookings = timeline.len(),
            "booking log replayed"
        );

        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            timeline: Arc::new(RwLock::new(timeline)),
            wal_tx,
        })
    }

    /// Plan, log and apply one mutation in a task of its own. The caller only
    /// awaits the outcome: dropping its future cannot leave a record logged
    /// but not applied.
    async fn commit<F>(&self, plan: F) -> Result<Booking, StoreError>
    where
        F: FnOnce(&mut Timeline) -> Result<Event, StoreError> + Send + 'static,
    {
        let timeline = self.timeline.clone();
        let wal_tx = self.wal_tx.clone();
        tokio::spawn(async move {
            let mut tl = timeline.write_owned().await;
            let event = plan(&mut *tl)?;
            send_append(&wal_tx, &event).await?;
            tl.apply(&event);
            let id = event_booking_id(&event);
            tl.get(&id).cloned().ok_or(StoreError::NotFound(id))
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("commit task failed: {e}")))?
    }

    /// Rewrite the log as one record per booking.
    ///
    /// The read lock is held until the swap finishes: writers need the write
    /// lock, so nothing can be appended between the snapshot and the swap.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let tl = self.timeline.read().await;
        let events = tl.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Unavailable(format!("WAL compaction failed: {e}")))?;
        info!(bookings = tl.len(), "booking log compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl BookingStore for WalStore {
    async fn find_active_overlapping(&self, range: TimeRange) -> Result<Vec<Booking>, StoreError> {
        Ok(self.timeline.read().await.active_overlapping(&range))
    }

    async fn insert(&self, new: NewBooking) -> Result<Booking, StoreError> {
        self.commit(move |tl| {
            let booking = tl.admit(new, Ulid::new(), now_ms())?;
            Ok(Event::BookingCreated { booking })
        })
        .await
    }

    async fn find_many(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError> {
        Ok(self.timeline.read().await.filter(filter))
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self.timeline.read().await.find_by_reference(reference).cloned())
    }

    async fn transition(
        &self,
        id: Ulid,
        allowed_from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Booking, StoreError> {
        let allowed_from = allowed_from.to_vec();
        self.commit(move |tl| tl.plan_transition(id, &allowed_from, to)).await
    }
}
