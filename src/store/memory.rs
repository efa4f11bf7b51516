use async_trait::async_trait;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::calendar::now_ms;
use crate::model::{Booking, BookingStatus, Event, NewBooking, TimeRange};

use super::{BookingFilter, BookingStore, StoreError, Timeline};

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryStore {
    timeline: RwLock<Timeline>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_active_overlapping(&self, range: TimeRange) -> Result<Vec<Booking>, StoreError> {
        Ok(self.timeline.read().await.active_overlapping(&range))
    }

    async fn insert(&self, new: NewBooking) -> Result<Booking, StoreError> {
        let mut tl = self.timeline.write().await;
        let booking = tl.admit(new, Ulid::new(), now_ms())?;
        tl.apply(&Event::BookingCreated {
            booking: booking.clone(),
        });
        Ok(booking)
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
        let mut tl = self.timeline.write().await;
        let event = tl.plan_transition(id, allowed_from, to)?;
        tl.apply(&event);
        tl.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }
}
