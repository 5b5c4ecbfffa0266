use crate::model::Ms;
use crate::topology::Floor;

/// Default refresh cadence of the status loop.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

/// Refresh intervals below this are rejected by config.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 100;

/// Default bound on a single source fetch.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// UTC offsets are limited to what real time zones use (±18h).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

/// Floor assigned to a 4-character room id whose second character is `'0'`.
/// Older room tables disagree between basement and ground floor; the campus
/// plans put those rooms below street level.
pub const SECOND_DIGIT_ZERO_FLOOR: Floor = Floor::Basement;

/// Hourly slots offered by the reservation form, counted from the current hour.
pub const RESERVATION_WINDOW_HOURS: u32 = 2;

/// Last hour of the day a reservation slot may end at.
pub const LAST_SLOT_END_HOUR: u32 = 23;

/// Reservations listed in a user's "my reservations" view; the rest are
/// only counted.
pub const MAX_USER_RESERVATIONS_SHOWN: usize = 5;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;
