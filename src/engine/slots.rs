use chrono::NaiveDate;
use tracing::debug;

use crate::calendar::local_instant;
use crate::limits::{MAX_SLOT_HOURS, MIN_SLOT_HOURS};
use crate::model::*;

use super::conflict::validate_query_range;
use super::{Engine, EngineError};

/// Opening hour, local time.
pub const BUSINESS_START_HOUR: u32 = 9;
/// Closing hour, local time. Slots start strictly before it.
pub const BUSINESS_END_HOUR: u32 = 21;

/// Hourly candidate starts on `date`, each lasting `hours`. A slot may run
/// past closing time; only its start is bounded.
fn candidate_slots(date: NaiveDate, hours: u32, tz: chrono_tz::Tz) -> Vec<TimeRange> {
    let duration = hours as Ms * HOUR_MS;
    (BUSINESS_START_HOUR..BUSINESS_END_HOUR)
        .filter_map(|h| local_instant(date, h, tz))
        .map(|start| TimeRange::new(start, start + duration))
        .collect()
}

impl Engine {
    /// Free slots of `hours` on a local day, in start order.
    pub async fn available_time_slots(
        &self,
        date: NaiveDate,
        hours: u32,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        if !(MIN_SLOT_HOURS..=MAX_SLOT_HOURS).contains(&hours) {
            return Err(EngineError::validation(format!(
                "duration must be between {MIN_SLOT_HOURS} and {MAX_SLOT_HOURS} hours"
            )));
        }
        let candidates = candidate_slots(date, hours, self.tz);
        let (Some(first), Some(last)) = (candidates.first(), candidates.last()) else {
            return Ok(Vec::new());
        };
        // One query covering every candidate, including slots that run past
        // midnight.
        let envelope = TimeRange::new(first.start, last.end);
        validate_query_range(&envelope)?;
        let busy = self.store.find_active_overlapping(envelope).await?;

        let slots: Vec<TimeSlot> = candidates
            .into_iter()
            .filter(|slot| !busy.iter().any(|b| b.range.overlaps(slot)))
            .map(|slot| TimeSlot {
                start: slot.start,
                end: slot.end,
            })
            .collect();
        debug!(%date, hours, free = slots.len(), "slots computed");
        Ok(slots)
    }
}
