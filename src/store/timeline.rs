use std::collections::HashMap;

use ulid::Ulid;

use crate::model::{Booking, BookingStatus, Event, Ms, NewBooking, TimeRange};

use super::{BookingFilter, StoreError};

/// Every booking of the room, kept sorted by `(start, id)`.
///
/// Cancelled and completed bookings stay in the list; the overlap search
/// filters on status.
#[derive(Debug, Default)]
pub struct Timeline {
    bookings: Vec<Booking>,
    by_reference: HashMap<String, Ulid>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }

    /// Bookings of any status whose range overlaps `query`.
    /// Binary search skips everything starting at or after `query.end`.
    pub fn overlapping(&self, query: &TimeRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.range.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.range.end > query.start)
    }

    pub fn active_overlapping(&self, query: &TimeRange) -> Vec<Booking> {
        self.overlapping(query)
            .filter(|b| b.is_active())
            .cloned()
            .collect()
    }

    pub fn filter(&self, filter: &BookingFilter) -> Vec<Booking> {
        match &filter.within {
            Some(window) => self
                .overlapping(window)
                .filter(|b| filter.matches(b))
                .cloned()
                .collect(),
            None => self
                .bookings
                .iter()
                .filter(|b| filter.matches(b))
                .cloned()
                .collect(),
        }
    }

    pub fn get(&self, id: &Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == *id)
    }

    pub fn find_by_reference(&self, reference: &str) -> Option<&Booking> {
        let id = self.by_reference.get(reference)?;
        self.get(id)
    }

    /// Validate an insert against the current state and build the booking it
    /// would commit. Nothing changes until its `BookingCreated` is applied.
    pub fn admit(&self, new: NewBooking, id: Ulid, created_at: Ms) -> Result<Booking, StoreError> {
        if self.by_reference.contains_key(&new.reference_id) {
            return Err(StoreError::DuplicateReference(new.reference_id));
        }
        if new.status.is_active() {
            let clashes: Vec<Ulid> = self
                .overlapping(&new.range)
                .filter(|b| b.is_active())
                .map(|b| b.id)
                .collect();
            if !clashes.is_empty() {
                return Err(StoreError::Overlap(clashes));
            }
        }
        Ok(Booking::from_new(id, created_at, new))
    }

    /// Validate a status change and build its event.
    pub fn plan_transition(
        &self,
        id: Ulid,
        allowed_from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Event, StoreError> {
        let current = self.get(&id).ok_or(StoreError::NotFound(id))?;
        if !allowed_from.contains(&current.status) {
            return Err(StoreError::InvalidTransition {
                from: current.status,
                to,
            });
        }
        // Reviving a booking must not break exclusivity.
        if to.is_active() && !current.status.is_active() {
            let clashes: Vec<Ulid> = self
                .overlapping(&current.range)
                .filter(|b| b.is_active() && b.id != id)
                .map(|b| b.id)
                .collect();
            if !clashes.is_empty() {
                return Err(StoreError::Overlap(clashes));
            }
        }
        Ok(Event::StatusChanged { id, status: to })
    }

    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::BookingCreated { booking } => {
                let key = (booking.range.start, booking.id);
                let pos = self
                    .bookings
                    .binary_search_by_key(&key, |b| (b.range.start, b.id))
                    .unwrap_or_else(|e| e);
                self.by_reference
                    .insert(booking.reference_id.clone(), booking.id);
                self.bookings.insert(pos, booking.clone());
            }
            Event::StatusChanged { id, status } => {
                if let Some(b) = self.bookings.iter_mut().find(|b| b.id == *id) {
                    b.status = *status;
                }
            }
        }
    }

    /// Minimal event list that rebuilds this timeline: one creation per
    /// booking, current status folded in.
    pub fn snapshot_events(&self) -> Vec<Event> {
        self.bookings
            .iter()
            .map(|b| Event::BookingCreated { booking: b.clone() })
            .collect()
    }
}
