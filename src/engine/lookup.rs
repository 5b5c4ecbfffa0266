use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::clock::{clock_label, format_clock, parse_clock};
use crate::limits::{LAST_SLOT_END_HOUR, MAX_USER_RESERVATIONS_SHOWN, RESERVATION_WINDOW_HOURS};
use crate::model::*;

/// One course on a single day, with wall-clock `"HH:MM"` bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEvent {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub course: String,
}

/// One-hour slot offered by the reservation form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
    pub available: bool,
    /// The slot containing the current hour.
    pub is_current: bool,
}

/// A row of a room's agenda for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaEntry {
    pub span: Span,
    pub label: String,
    pub is_reservation: bool,
    /// Already started when the agenda was built.
    pub is_current: bool,
}

/// A course of today's weekly schedule that has not ended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayCourse {
    pub event: DayEvent,
    pub is_current: bool,
}

/// A user's reservations that are still running or to come.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserReservations {
    /// Earliest first, at most [`MAX_USER_RESERVATIONS_SHOWN`] entries.
    pub shown: Vec<(Reservation, ReservationPhase)>,
    /// All active and upcoming reservations, shown or not.
    pub active_count: usize,
}

impl UserReservations {
    pub fn hidden(&self) -> usize {
        self.active_count - self.shown.len()
    }
}

/// The course running at `now`, if any.
pub fn current_event(schedule: &[ScheduleEvent], now: Ms) -> Option<&ScheduleEvent> {
    schedule.iter().find(|e| e.span.contains_instant(now))
}

/// The first course in delivery order that starts after `now`.
pub fn next_event(schedule: &[ScheduleEvent], now: Ms) -> Option<&ScheduleEvent> {
    schedule.iter().find(|e| e.span.start > now)
}

/// True if `[slot_start, slot_end)` overlaps any event. All bounds are
/// `"HH:MM"` on the same day. Unreadable slot bounds never overlap and
/// unreadable events are skipped.
pub fn is_slot_occupied(events: &[DayEvent], slot_start: &str, slot_end: &str) -> bool {
    let (Some(start), Some(end)) = (parse_clock(slot_start), parse_clock(slot_end)) else {
        return false;
    };
    events.iter().any(|e| match (parse_clock(&e.start), parse_clock(&e.end)) {
        (Some(event_start), Some(event_end)) => start < event_end && end > event_start,
        _ => false,
    })
}

/// Project the events overlapping `day` onto wall-clock bounds, clipped to
/// `00:00`..`24:00`.
pub fn day_events(schedule: &[ScheduleEvent], day: &Span, offset: FixedOffset) -> Vec<DayEvent> {
    schedule
        .iter()
        .filter(|e| e.span.overlaps(day))
        .map(|e| DayEvent {
            start: if e.span.start <= day.start {
                format_clock(0)
            } else {
                clock_label(e.span.start, offset)
            },
            end: if e.span.end >= day.end {
                format_clock(24 * 60)
            } else {
                clock_label(e.span.end, offset)
            },
            course: e.summary.clone(),
        })
        .collect()
}

/// Hourly slots from the current hour, bounded by the reservation window and
/// by the last bookable hour of the day.
pub fn available_slots(events: &[DayEvent], now_minute: u32) -> Vec<TimeSlot> {
    let current_hour = now_minute / 60;
    let last_hour = (current_hour + RESERVATION_WINDOW_HOURS).min(LAST_SLOT_END_HOUR);
    (current_hour..last_hour)
        .map(|hour| {
            let start = format_clock(hour * 60);
            let end = format_clock((hour + 1) * 60);
            let available = !is_slot_occupied(events, &start, &end);
            TimeSlot {
                start,
                end,
                available,
                is_current: hour == current_hour,
            }
        })
        .collect()
}

/// Courses of one weekday that are still running or to come at
/// `now_minute`. Unreadable bounds are skipped.
pub fn today_courses(events: &[DayEvent], now_minute: u32) -> Vec<TodayCourse> {
    let mut courses: Vec<(u32, TodayCourse)> = events
        .iter()
        .filter_map(|e| {
            let start = parse_clock(&e.start)?;
            let end = parse_clock(&e.end)?;
            (end > now_minute).then(|| {
                let course = TodayCourse {
                    event: e.clone(),
                    is_current: start <= now_minute,
                };
                (start, course)
            })
        })
        .collect();
    courses.sort_by_key(|(start, _)| *start);
    courses.into_iter().map(|(_, c)| c).collect()
}

/// Classify a user's reservations by their own timestamps (the stored
/// server status is ignored) and keep the active and upcoming ones.
pub fn user_reservations(reservations: &[Reservation], now: Ms) -> UserReservations {
    let mut pending: Vec<(Reservation, ReservationPhase)> = reservations
        .iter()
        .map(|r| (r.clone(), r.phase(now)))
        .filter(|(_, phase)| *phase != ReservationPhase::Past)
        .collect();
    pending.sort_by_key(|(r, _)| r.span.start);
    let active_count = pending.len();
    pending.truncate(MAX_USER_RESERVATIONS_SHOWN);
    UserReservations {
        shown: pending,
        active_count,
    }
}

/// Merge a room's courses and reservations for one day, earliest first.
/// Entries that have already ended are dropped.
pub fn today_agenda(
    room: &str,
    schedule: &[ScheduleEvent],
    reservations: &[Reservation],
    day: &Span,
    now: Ms,
) -> Vec<AgendaEntry> {
    let courses = schedule
        .iter()
        .filter(|e| day.contains_instant(e.span.start))
        .map(|e| (e.span, e.summary.clone(), false));
    let booked = reservations
        .iter()
        .filter(|r| r.room == room && day.contains_instant(r.span.start))
        .map(|r| {
            let label = match &r.user_name {
                Some(who) => format!("Reserved by {who}"),
                None => "Reserved".to_string(),
            };
            (r.span, label, true)
        });

    let mut entries: Vec<AgendaEntry> = courses
        .chain(booked)
        .filter(|(span, _, _)| span.end > now)
        .map(|(span, label, is_reservation)| AgendaEntry {
            span,
            label,
            is_reservation,
            is_current: span.start <= now,
        })
        .collect();
    entries.sort_by_key(|e| e.span.start);
    entries
}
