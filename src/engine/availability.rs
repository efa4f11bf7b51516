use tracing::debug;

use crate::calendar::month_range;
use crate::limits::{MAX_VALID_TIMESTAMP_MS, MAX_YEAR, MIN_VALID_TIMESTAMP_MS, MIN_YEAR};
use crate::model::*;
use crate::observability;

use super::conflict::validate_query_range;
use super::{Engine, EngineError};

impl Engine {
    /// Is the room free for `range`, and if not, who holds it.
    ///
    /// Read-only and idempotent; a `true` answer reserves nothing.
    pub async fn check_availability(&self, range: TimeRange) -> Result<Availability, EngineError> {
        validate_query_range(&range)?;
        let active = self.store.find_active_overlapping(range).await?;
        let conflicts = self.project_conflicts(active);
        let available = conflicts.is_empty();
        metrics::counter!(
            observability::AVAILABILITY_CHECKS_TOTAL,
            "available" => if available { "true" } else { "false" }
        )
        .increment(1);
        debug!(
            start = range.start,
            end = range.end,
            conflicts = conflicts.len(),
            "availability checked"
        );
        Ok(Availability {
            available,
            conflicts,
        })
    }

    /// Every active booking intersecting `range`.
    pub async fn bookings_in_range(
        &self,
        range: TimeRange,
    ) -> Result<Vec<BookingConflict>, EngineError> {
        validate_query_range(&range)?;
        let active = self.store.find_active_overlapping(range).await?;
        Ok(self.project_conflicts(active))
    }

    /// Active bookings intersecting a local calendar month. `month0` is
    /// 0-based. For shading a calendar only; admission never relies on it.
    pub async fn bookings_for_month(
        &self,
        year: i32,
        month0: u32,
    ) -> Result<Vec<BookingConflict>, EngineError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) || month0 > 11 {
            return Err(EngineError::validation("Invalid year or month"));
        }
        let month = month_range(year, month0, self.tz)
            .ok_or_else(|| EngineError::validation("Invalid year or month"))?;
        // No booking exists outside the timestamp window, so clamping loses nothing.
        let range = TimeRange::new(
            month.start.max(MIN_VALID_TIMESTAMP_MS),
            month.end.min(MAX_VALID_TIMESTAMP_MS),
        );
        self.bookings_in_range(range).await
    }
}
