use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

/// Bounds every read query: valid order, sane timestamps, bounded width.
pub(crate) fn validate_query_range(range: &TimeRange) -> Result<(), EngineError> {
    TimeRange::try_new(range.start, range.end)?;
    if range.start < MIN_VALID_TIMESTAMP_MS || range.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if range.duration_ms() > MAX_QUERY_SPAN_MS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

impl Engine {
    /// Reduce bookings to what may be shown to another customer, ordered by
    /// start then id.
    pub(super) fn project_conflicts(&self, bookings: Vec<Booking>) -> Vec<BookingConflict> {
        let mut conflicts: Vec<BookingConflict> = bookings
            .into_iter()
            .map(|b| BookingConflict {
                id: b.id,
                range: b.range,
                space_name: self
                    .catalog
                    .find_by_id(&b.space_id)
                    .map(|s| s.name_en)
                    .unwrap_or_else(|| b.space_id.clone()),
                customer_name: b.customer_name(),
            })
            .collect();
        conflicts.sort_by_key(|c| (c.range.start, c.id));
        conflicts
    }
}
