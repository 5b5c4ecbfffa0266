use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unix milliseconds, the only time type inside the engine.
pub type Ms = i64;

/// Opaque room key as delivered by the API (`"160"`, `"2104"`, ...).
pub type RoomId = String;

/// Derived status of every known room, ordered by room id.
pub type StatusMap = BTreeMap<RoomId, RoomStatus>;

/// Per-room schedules keyed by room id.
pub type ScheduleMap = HashMap<RoomId, Vec<ScheduleEvent>>;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

/// Occupancy of a room at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoomStatus {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "occupied")]
    Occupied,
}

impl RoomStatus {
    /// Lenient decoding of server labels, including the legacy French ones.
    /// Anything that is not an "occupied" spelling counts as free.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "occupied" | "occupé" | "occupe" => RoomStatus::Occupied,
            _ => RoomStatus::Free,
        }
    }

    pub fn is_free(self) -> bool {
        self == RoomStatus::Free
    }

    pub fn label(self) -> &'static str {
        match self {
            RoomStatus::Free => "free",
            RoomStatus::Occupied => "occupied",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fixed course occupying a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEvent {
    pub span: Span,
    pub summary: String,
}

impl ScheduleEvent {
    pub fn new(start: Ms, end: Ms, summary: impl Into<String>) -> Self {
        Self {
            span: Span::new(start, end),
            summary: summary.into(),
        }
    }
}

/// Display classification of a reservation relative to `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationPhase {
    Upcoming,
    Active,
    Past,
}

impl ReservationPhase {
    /// Classify `span` against `now` using `[start, end)`.
    pub fn at(span: &Span, now: Ms) -> Self {
        if now < span.start {
            ReservationPhase::Upcoming
        } else if now < span.end {
            ReservationPhase::Active
        } else {
            ReservationPhase::Past
        }
    }
}

/// An ad-hoc booking made through the reservation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Option<String>,
    pub room: RoomId,
    pub span: Span,
    pub user_name: Option<String>,
    /// Phase as reported by the server. Informational only; the engine
    /// always re-derives it with [`ReservationPhase::at`].
    pub status: Option<ReservationPhase>,
}

impl Reservation {
    pub fn new(room: impl Into<RoomId>, start: Ms, end: Ms) -> Self {
        Self {
            id: None,
            room: room.into(),
            span: Span::new(start, end),
            user_name: None,
            status: None,
        }
    }

    pub fn phase(&self, now: Ms) -> ReservationPhase {
        ReservationPhase::at(&self.span, now)
    }

    pub fn occupies(&self, room: &str, now: Ms) -> bool {
        self.room == room && self.span.contains_instant(now)
    }
}

/// Display metadata of a room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub number: RoomId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub board: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A single room whose status differs from the previous computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub room: RoomId,
    /// `None` when the room had no status before.
    pub from: Option<RoomStatus>,
    pub to: RoomStatus,
}

/// Everything one load hands to the engine. Replaces the board wholesale.
#[derive(Debug, Clone, Default)]
pub struct BoardSnapshot {
    pub rooms: Vec<RoomInfo>,
    /// `Some` when the server delegates status computation to the client.
    pub schedules: Option<ScheduleMap>,
    /// Statuses computed by the server, used when `schedules` is `None`.
    pub precomputed: StatusMap,
    pub reservations: Vec<Reservation>,
}
