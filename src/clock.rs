use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike, Weekday};

use crate::limits::DAY_MS;
use crate::model::{Ms, Span};

/// Source of "now" for the engine and the refresh loop.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Ms;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Ms {
        now_ms()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: Ms) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: Ms) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Ms) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Ms {
        self.now.load(Ordering::SeqCst)
    }
}

pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Parse an API timestamp.
///
/// RFC 3339 strings carry their own offset. Naive `YYYY-MM-DDTHH:MM:SS[.f]`
/// strings (what the reservation store writes) are read at `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<Ms> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS.iter().find_map(|fmt| {
        let naive = NaiveDateTime::parse_from_str(raw, fmt).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.timestamp_millis())
    })
}

/// Minutes since local midnight of `t` at `offset`.
pub fn minute_of_day(t: Ms, offset: FixedOffset) -> u32 {
    let local = offset.timestamp_millis_opt(t).single();
    local.map_or(0, |dt| dt.hour() * 60 + dt.minute())
}

/// The local calendar day containing `t`, as `[midnight, next midnight)`.
pub fn day_window(t: Ms, offset: FixedOffset) -> Span {
    let shift = offset.local_minus_utc() as Ms * 1000;
    let local = t + shift;
    let start = local.div_euclid(DAY_MS) * DAY_MS - shift;
    Span::new(start, start + DAY_MS)
}

/// Local calendar date of `t`.
pub fn local_date(t: Ms, offset: FixedOffset) -> Option<NaiveDate> {
    offset.timestamp_millis_opt(t).single().map(|dt| dt.date_naive())
}

/// Lower-case English weekday name of `t`, the key used by per-day schedules.
pub fn weekday_key(t: Ms, offset: FixedOffset) -> &'static str {
    match local_date(t, offset).map(|d| d.weekday()) {
        Some(Weekday::Mon) => "monday",
        Some(Weekday::Tue) => "tuesday",
        Some(Weekday::Wed) => "wednesday",
        Some(Weekday::Thu) => "thursday",
        Some(Weekday::Fri) => "friday",
        Some(Weekday::Sat) => "saturday",
        Some(Weekday::Sun) | None => "sunday",
    }
}

/// `"HH:MM"` (seconds, if present, are ignored) → minutes since midnight.
pub fn parse_clock(raw: &str) -> Option<u32> {
    let mut parts = raw.trim().split(':');
    let h: u32 = parts.next()?.trim().parse().ok()?;
    let m: u32 = parts.next()?.trim().parse().ok()?;
    if h > 24 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// Minutes since midnight → `"HH:MM"`.
pub fn format_clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Local wall-clock label of `t`.
pub fn clock_label(t: Ms, offset: FixedOffset) -> String {
    format_clock(minute_of_day(t, offset))
}
