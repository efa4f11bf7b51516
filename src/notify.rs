use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::model::{Booking, Locale, Space, TimeRange};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no confirmation subscriber attached")]
    NoSubscriber,
    #[error("notification transport failed: {0}")]
    Transport(String),
}

/// What a confirmation message needs, already localized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub reference_id: String,
    pub customer_name: String,
    pub email: String,
    pub space_name: String,
    pub range: TimeRange,
    pub number_of_people: u32,
    pub total_price: f64,
    pub locale: Locale,
}

impl BookingConfirmation {
    pub fn new(booking: &Booking, space: &Space, locale: Locale) -> Self {
        Self {
            reference_id: booking.reference_id.clone(),
            customer_name: booking.customer_name(),
            email: booking.email.clone(),
            space_name: space.localized_name(locale).to_string(),
            range: booking.range,
            number_of_people: booking.number_of_people,
            total_price: booking.total_price,
            locale,
        }
    }
}

/// Outbound confirmation channel. Delivery is best-effort: callers log
/// failures and carry on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_booking_confirmed(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotifyError>;
}

/// Fans confirmations out to in-process subscribers (mail relay, logger).
pub struct NotifyHub {
    sender: broadcast::Sender<BookingConfirmation>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingConfirmation> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    async fn notify_booking_confirmed(
        &self,
        confirmation: &BookingConfirmation,
    ) -> Result<(), NotifyError> {
        self.sender
            .send(confirmation.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscriber)
    }
}

/// Log every confirmation until the hub goes away. A subscriber that falls
/// behind skips what it missed and keeps going. Returns how many it logged.
pub async fn log_confirmations(mut rx: broadcast::Receiver<BookingConfirmation>) -> u64 {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(c) => {
                info!(
                    reference = %c.reference_id,
                    email = %c.email,
                    space = %c.space_name,
                    locale = ?c.locale,
                    "booking confirmation queued"
                );
                logged += 1;
            }
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "confirmation logger fell behind");
            }
            Err(RecvError::Closed) => return logged,
        }
    }
}
