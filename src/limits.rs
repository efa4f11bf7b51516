use crate::model::{HOUR_MS, Ms};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_COMPANY_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 2000;
pub const MAX_SPACE_ID_LEN: usize = 64;

pub const MAX_PEOPLE: u32 = 1000;

/// Longest single booking.
pub const MAX_BOOKING_DURATION_MS: Ms = 31 * 24 * HOUR_MS;

/// Widest window a read query may scan.
pub const MAX_QUERY_SPAN_MS: Ms = 400 * 24 * HOUR_MS;

pub const MIN_SLOT_HOURS: u32 = 1;
pub const MAX_SLOT_HOURS: u32 = 24;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// Calendar years accepted by the month view. Local month bounds that fall
/// outside the timestamp window are clamped to it.
pub const MIN_YEAR: i32 = 2000;
pub const MAX_YEAR: i32 = 2099;
