use std::time::Instant;

use serde::Deserialize;
use tracing::{info, warn};

use crate::calendar::{now_ms, parse_instant};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::StoreError;

use super::{Engine, EngineError};

/// Attempts at a fresh reference before giving up on a duplicate.
const REFERENCE_ATTEMPTS: usize = 3;

/// A booking submission as it arrives from a client. Unknown fields are
/// rejected at parse time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BookingRequest {
    pub space_id: String,
    pub start_date: String,
    pub end_date: String,
    pub number_of_people: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub total_price: f64,
    #[serde(default)]
    pub locale: Option<Locale>,
}

/// Fields that passed structural validation.
struct Checked {
    space_id: String,
    start: Ms,
    end: Ms,
    people: u32,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    notes: Option<String>,
    total_price: f64,
    locale: Locale,
}

fn required(value: &str, field: &str, max: usize) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(EngineError::validation(format!("{field} is too long")));
    }
    Ok(value.to_string())
}

fn optional(value: Option<&str>, field: &str, max: usize) -> Result<Option<String>, EngineError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > max => {
            Err(EngineError::validation(format!("{field} is too long")))
        }
        other => Ok(other.map(str::to_string)),
    }
}

/// `local@domain.tld` with no whitespace.
pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

fn check_structure(req: &BookingRequest, tz: chrono_tz::Tz) -> Result<Checked, EngineError> {
    let space_id = required(&req.space_id, "spaceId", MAX_SPACE_ID_LEN)?;
    let start = parse_instant(&req.start_date, tz)
        .ok_or_else(|| EngineError::validation("startDate must be an ISO-8601 date"))?;
    let end = parse_instant(&req.end_date, tz)
        .ok_or_else(|| EngineError::validation("endDate must be an ISO-8601 date"))?;
    if req.number_of_people < 1 {
        return Err(EngineError::validation("numberOfPeople must be positive"));
    }
    let people = u32::try_from(req.number_of_people)
        .ok()
        .filter(|n| *n <= MAX_PEOPLE)
        .ok_or_else(|| EngineError::validation("numberOfPeople is too large"))?;
    let first_name = required(&req.first_name, "firstName", MAX_NAME_LEN)?;
    let last_name = required(&req.last_name, "lastName", MAX_NAME_LEN)?;
    let email = req.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(EngineError::validation("email is invalid"));
    }
    let phone = optional(req.phone.as_deref(), "phone", MAX_PHONE_LEN)?;
    let company = optional(req.company.as_deref(), "company", MAX_COMPANY_LEN)?;
    let notes = optional(req.notes.as_deref(), "notes", MAX_NOTES_LEN)?;
    if !req.total_price.is_finite() || req.total_price < 0.0 {
        return Err(EngineError::validation("totalPrice must be a non-negative number"));
    }
    Ok(Checked {
        space_id,
        start,
        end,
        people,
        first_name,
        last_name,
        email,
        phone,
        company,
        notes,
        total_price: req.total_price,
        locale: req.locale.unwrap_or_default(),
    })
}

impl Engine {
    /// Validate, re-check availability against current data, and commit.
    ///
    /// Checks run in a fixed order and the first failure wins: structure,
    /// range order, past start, space, capacity, conflict. The store repeats
    /// the conflict check under its write lock; a loss there is reported as
    /// the same `Conflict`.
    pub async fn create_booking(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let started = Instant::now();
        let result = self.admit(req).await;
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        match &result {
            Ok(booking) => {
                metrics::counter!(
                    observability::BOOKINGS_CREATED_TOTAL,
                    "status" => booking.status.as_str()
                )
                .increment(1);
                info!(
                    reference = %booking.reference_id,
                    space = %booking.space_id,
                    start = booking.range.start,
                    end = booking.range.end,
                    status = %booking.status,
                    "booking created"
                );
            }
            Err(e) => {
                metrics::counter!(observability::ADMISSION_REJECTED_TOTAL, "code" => e.code())
                    .increment(1);
                if matches!(e, EngineError::Conflict) {
                    warn!("booking rejected: {e}");
                }
            }
        }
        result
    }

    async fn admit(&self, req: BookingRequest) -> Result<Booking, EngineError> {
        let checked = check_structure(&req, self.tz)?;
        let range = TimeRange::try_new(checked.start, checked.end)?;
        if range.start < now_ms() {
            return Err(EngineError::PastDate);
        }
        if range.end > MAX_VALID_TIMESTAMP_MS {
            return Err(EngineError::validation("endDate is too far in the future"));
        }
        if range.duration_ms() > MAX_BOOKING_DURATION_MS {
            return Err(EngineError::validation("booking is too long"));
        }

        let space = self
            .catalog
            .find_by_id(&checked.space_id)
            .ok_or_else(|| EngineError::SpaceNotFound(checked.space_id.clone()))?;
        if !space.available {
            return Err(EngineError::SpaceUnavailable(space.id));
        }
        if checked.people > space.capacity {
            return Err(EngineError::CapacityExceeded(space.capacity));
        }

        // Fresh read; an earlier preview is never trusted.
        if !self.store.find_active_overlapping(range).await?.is_empty() {
            return Err(EngineError::Conflict);
        }

        let mut new = NewBooking {
            reference_id: String::new(),
            space_id: space.id.clone(),
            range,
            number_of_people: checked.people,
            first_name: checked.first_name,
            last_name: checked.last_name,
            email: checked.email,
            phone: checked.phone,
            company: checked.company,
            notes: checked.notes,
            total_price: checked.total_price,
            status: self.initial_status,
            locale: checked.locale,
        };

        let mut attempt = 0;
        let booking = loop {
            attempt += 1;
            new.reference_id = self.references.generate(now_ms());
            match self.store.insert(new.clone()).await {
                Ok(booking) => break booking,
                Err(StoreError::DuplicateReference(r)) if attempt < REFERENCE_ATTEMPTS => {
                    warn!(reference = %r, "reference collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        if booking.status == BookingStatus::Confirmed {
            self.dispatch_confirmation(&booking);
        }
        Ok(booking)
    }
}
