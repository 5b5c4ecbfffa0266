//! JSON shapes of the room/reservation API and their conversion into the
//! engine's model. Timestamps are decoded here, once; malformed entries are
//! dropped with a warning instead of failing the whole payload.

use std::collections::HashMap;

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::{day_window, minute_of_day, parse_timestamp, weekday_key};
use crate::engine::{DayEvent, TimeSlot, TodayCourse, day_events, today_courses};
use crate::model::*;

// ── GET /rooms ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomsResponse {
    #[serde(default)]
    pub rooms_list: Vec<RoomEntry>,
    /// Set when the server leaves status computation to the client.
    #[serde(default)]
    pub client_status_calculation: bool,
    #[serde(default)]
    pub room_schedules: Option<HashMap<RoomId, Vec<WireEvent>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomEntry {
    #[serde(flatten)]
    pub info: RoomInfo,
    /// Server-side status, only meaningful without client computation.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub summary: String,
}

impl RoomsResponse {
    /// True when the payload carries schedules the client must evaluate.
    pub fn is_live(&self) -> bool {
        self.client_status_calculation && self.room_schedules.is_some()
    }

    pub fn rooms(&self) -> Vec<RoomInfo> {
        self.rooms_list.iter().map(|e| e.info.clone()).collect()
    }

    /// Decode the per-room schedules. `None` unless [`Self::is_live`].
    pub fn schedules(&self, offset: FixedOffset) -> Option<ScheduleMap> {
        if !self.is_live() {
            return None;
        }
        let raw = self.room_schedules.as_ref()?;
        Some(
            raw.iter()
                .map(|(room, events)| {
                    let decoded = events
                        .iter()
                        .filter_map(|e| {
                            let event = e.to_event(offset);
                            if event.is_none() {
                                warn!("room {room}: dropping malformed event {e:?}");
                            }
                            event
                        })
                        .collect();
                    (room.clone(), decoded)
                })
                .collect(),
        )
    }

    /// Statuses as computed by the server; a missing status means free.
    pub fn precomputed(&self) -> StatusMap {
        self.rooms_list
            .iter()
            .map(|e| {
                let status = e.status.as_deref().map_or(RoomStatus::Free, RoomStatus::from_label);
                (e.info.number.clone(), status)
            })
            .collect()
    }
}

impl WireEvent {
    pub fn to_event(&self, offset: FixedOffset) -> Option<ScheduleEvent> {
        let start = parse_timestamp(self.start.as_deref()?, offset)?;
        let end = parse_timestamp(self.end.as_deref()?, offset)?;
        (start < end).then(|| ScheduleEvent::new(start, end, self.summary.clone()))
    }
}

// ── GET /reservations/active ─────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveReservationsResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reservations: Vec<WireReservation>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reservation ids are strings in some deployments and integers in others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl std::fmt::Display for WireId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireId::Text(s) => f.write_str(s),
            WireId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireReservation {
    #[serde(default)]
    pub id: Option<WireId>,
    pub room_number: RoomId,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WireReservation {
    pub fn to_reservation(&self, offset: FixedOffset) -> Option<Reservation> {
        let start = parse_timestamp(&self.start_time, offset)?;
        let end = parse_timestamp(&self.end_time, offset)?;
        if start >= end {
            return None;
        }
        Some(Reservation {
            id: self.id.as_ref().map(WireId::to_string),
            room: self.room_number.clone(),
            span: Span::new(start, end),
            user_name: self.user_name.clone(),
            status: self.status.as_deref().and_then(phase_from_label),
        })
    }
}

fn phase_from_label(label: &str) -> Option<ReservationPhase> {
    match label {
        "upcoming" => Some(ReservationPhase::Upcoming),
        "active" => Some(ReservationPhase::Active),
        "past" => Some(ReservationPhase::Past),
        _ => None,
    }
}

/// Decode a reservation list, dropping entries with unreadable times.
pub fn decode_reservations(list: &[WireReservation], offset: FixedOffset) -> Vec<Reservation> {
    list.iter()
        .filter_map(|w| {
            let r = w.to_reservation(offset);
            if r.is_none() {
                warn!("dropping malformed reservation for room {}", w.room_number);
            }
            r
        })
        .collect()
}

// ── GET /rooms/{id}/schedule ─────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomScheduleResponse {
    /// Weekday name (`"monday"`, ...) to that day's courses.
    #[serde(default)]
    pub schedule: HashMap<String, Vec<DayEvent>>,
}

impl RoomScheduleResponse {
    pub fn day(&self, weekday: &str) -> &[DayEvent] {
        self.schedule.get(weekday).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The courses of `now`'s local weekday that have not ended yet.
    pub fn today(&self, now: Ms, offset: FixedOffset) -> Vec<TodayCourse> {
        today_courses(self.day(weekday_key(now, offset)), minute_of_day(now, offset))
    }

    /// Fold a timestamped schedule into the weekday shape, each course under
    /// the local weekday it starts on.
    pub fn from_events(events: &[ScheduleEvent], offset: FixedOffset) -> Self {
        let mut schedule: HashMap<String, Vec<DayEvent>> = HashMap::new();
        for event in events {
            let day = day_window(event.span.start, offset);
            schedule
                .entry(weekday_key(event.span.start, offset).to_string())
                .or_default()
                .extend(day_events(std::slice::from_ref(event), &day, offset));
        }
        Self { schedule }
    }
}

// ── POST /reservations, DELETE /reservations/{id} ───────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub room_number: RoomId,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
}

impl CreateReservationRequest {
    pub fn for_slot(room: &str, date: NaiveDate, slot: &TimeSlot) -> Self {
        Self {
            room_number: room.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            start_time: slot.start.clone(),
            end_time: slot.end.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    /// The caller's own reservations after the mutation.
    #[serde(default)]
    pub reservations: Vec<WireReservation>,
    #[serde(default)]
    pub error: Option<String>,
}

// ── POST /auth/login ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Google ID token.
    pub credential: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
