use tracing::{debug, info};

use crate::model::*;
use crate::observability;
use crate::store::{BookingFilter, StoreError};

use super::conflict::validate_query_range;
use super::{Engine, EngineError};

impl Engine {
    async fn resolve(&self, reference: &str) -> Result<Booking, EngineError> {
        self.store
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| EngineError::BookingNotFound(reference.to_string()))
    }

    async fn move_to(
        &self,
        booking: &Booking,
        allowed_from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Booking, EngineError> {
        let updated = self.store.transition(booking.id, allowed_from, to).await?;
        metrics::counter!(observability::STATUS_TRANSITIONS_TOTAL, "to" => to.as_str())
            .increment(1);
        info!(reference = %updated.reference_id, from = %booking.status, to = %to, "booking status changed");
        Ok(updated)
    }

    /// Release the room. Pending and confirmed bookings can be cancelled.
    pub async fn cancel_booking(&self, reference: &str) -> Result<Booking, EngineError> {
        let booking = self.resolve(reference).await?;
        self.move_to(
            &booking,
            &[BookingStatus::Pending, BookingStatus::Confirmed],
            BookingStatus::Cancelled,
        )
        .await
    }

    /// Approve a pending booking and send its confirmation.
    pub async fn confirm_booking(&self, reference: &str) -> Result<Booking, EngineError> {
        let booking = self.resolve(reference).await?;
        let updated = self
            .move_to(&booking, &[BookingStatus::Pending], BookingStatus::Confirmed)
            .await?;
        self.dispatch_confirmation(&updated);
        Ok(updated)
    }

    /// Mark confirmed bookings that ended at or before `now` as completed.
    /// Returns how many moved.
    pub async fn complete_finished(&self, now: Ms) -> Result<usize, EngineError> {
        let filter = BookingFilter {
            statuses: Some(vec![BookingStatus::Confirmed]),
            ended_by: Some(now),
            ..BookingFilter::default()
        };
        let finished = self.store.find_many(&filter).await?;
        let mut completed = 0;
        for booking in finished {
            match self
                .store
                .transition(booking.id, &[BookingStatus::Confirmed], BookingStatus::Completed)
                .await
            {
                Ok(_) => completed += 1,
                // Cancelled since the read.
                Err(StoreError::InvalidTransition { .. }) => {
                    debug!(reference = %booking.reference_id, "skip completion");
                }
                Err(e) => return Err(e.into()),
            }
        }
        if completed > 0 {
            metrics::counter!(observability::BOOKINGS_COMPLETED_TOTAL).increment(completed as u64);
            info!(completed, "finished bookings completed");
        }
        Ok(completed)
    }

    pub async fn find_booking(&self, reference: &str) -> Result<Booking, EngineError> {
        self.resolve(reference).await
    }

    /// Bookings matching `filter`, ordered by start.
    pub async fn find_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, EngineError> {
        if let Some(window) = &filter.within {
            validate_query_range(window)?;
        }
        Ok(self.store.find_many(filter).await?)
    }
}
