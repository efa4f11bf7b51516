//! Booking persistence. The engine only sees [`BookingStore`]; which
//! implementation backs it is decided once in `main`.

mod durable;
mod memory;
mod timeline;

pub use durable::WalStore;
pub use memory::InMemoryStore;
pub use timeline::Timeline;

use async_trait::async_trait;
use thiserror::Error;
use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Ms, NewBooking, TimeRange};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The exclusion constraint: an active booking already holds part of the range.
    #[error("range overlaps {} active booking(s)", .0.len())]
    Overlap(Vec<Ulid>),
    #[error("reference {0} already exists")]
    DuplicateReference(String),
    #[error("booking {0} not found")]
    NotFound(Ulid),
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("{0}")]
    Unavailable(String),
}

/// Read filter for [`BookingStore::find_many`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub statuses: Option<Vec<BookingStatus>>,
    /// Bookings overlapping this window.
    pub within: Option<TimeRange>,
    pub space_id: Option<String>,
    /// Bookings whose end is at or before this instant.
    pub ended_by: Option<Ms>,
}

impl BookingFilter {
    pub fn active() -> Self {
        Self {
            statuses: Some(vec![BookingStatus::Pending, BookingStatus::Confirmed]),
            ..Self::default()
        }
    }

    pub fn within(mut self, range: TimeRange) -> Self {
        self.within = Some(range);
        self
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(statuses) = &self.statuses
            && !statuses.contains(&booking.status)
        {
            return false;
        }
        if let Some(window) = &self.within
            && !window.overlaps(&booking.range)
        {
            return false;
        }
        if let Some(space_id) = &self.space_id
            && &booking.space_id != space_id
        {
            return false;
        }
        if let Some(t) = self.ended_by
            && booking.range.end > t
        {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Active bookings overlapping `range`, ordered by start then id.
    async fn find_active_overlapping(&self, range: TimeRange) -> Result<Vec<Booking>, StoreError>;

    /// Assign identity and commit. The overlap check is repeated under the
    /// store's write lock, so two overlapping inserts can never both succeed.
    async fn insert(&self, new: NewBooking) -> Result<Booking, StoreError>;

    async fn find_many(&self, filter: &BookingFilter) -> Result<Vec<Booking>, StoreError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Booking>, StoreError>;

    /// Move `id` to `to` if its current status is one of `allowed_from`.
    async fn transition(
        &self,
        id: Ulid,
        allowed_from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Booking, StoreError>;
}
