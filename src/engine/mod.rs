mod admission;
mod availability;
mod conflict;
mod error;
mod lifecycle;
mod slots;
#[cfg(test)]
mod tests;

pub use admission::BookingRequest;
pub use error::EngineError;
pub use slots::{BUSINESS_END_HOUR, BUSINESS_START_HOUR};

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::warn;

use crate::catalog::SpaceCatalog;
use crate::model::{Booking, BookingStatus, Space};
use crate::notify::{BookingConfirmation, Notifier};
use crate::observability;
use crate::reference::ReferenceGenerator;
use crate::store::BookingStore;

/// The booking core of the room: availability, calendar, slots, admission
/// and status changes. All state lives behind the store.
pub struct Engine {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn SpaceCatalog>,
    notifier: Arc<dyn Notifier>,
    references: ReferenceGenerator,
    tz: Tz,
    initial_status: BookingStatus,
}

impl Engine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn SpaceCatalog>,
        notifier: Arc<dyn Notifier>,
        tz: Tz,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            references: ReferenceGenerator::new(),
            tz,
            initial_status: BookingStatus::Confirmed,
        }
    }

    /// Admit new bookings as PENDING until someone confirms them.
    pub fn require_approval(mut self, required: bool) -> Self {
        self.initial_status = if required {
            BookingStatus::Pending
        } else {
            BookingStatus::Confirmed
        };
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Bookable setups, smallest first.
    pub fn spaces(&self) -> Vec<Space> {
        self.catalog
            .list()
            .into_iter()
            .filter(|s| s.available)
            .collect()
    }

    pub fn find_space(&self, id: &str) -> Option<Space> {
        self.catalog.find_by_id(id)
    }

    /// Send the confirmation in the background. Failures are logged and
    /// counted; they never reach the caller.
    fn dispatch_confirmation(&self, booking: &Booking) {
        let Some(space) = self.catalog.find_by_id(&booking.space_id) else {
            warn!(reference = %booking.reference_id, "no space for confirmation");
            return;
        };
        let confirmation = BookingConfirmation::new(booking, &space, booking.locale);
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_booking_confirmed(&confirmation).await {
                metrics::counter!(observability::NOTIFICATION_FAILURES_TOTAL).increment(1);
                warn!(reference = %confirmation.reference_id, "confirmation not sent: {e}");
            }
        });
    }
}
