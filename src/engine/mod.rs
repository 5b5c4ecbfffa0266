mod error;
mod lookup;
mod status;

pub use error::EngineError;
pub use lookup::{
    AgendaEntry, DayEvent, TimeSlot, TodayCourse, UserReservations, available_slots,
    current_event, day_events, is_slot_occupied, next_event, today_agenda, today_courses,
    user_reservations,
};
pub use status::{changed_rooms, compute_all_statuses, compute_status};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::{day_window, minute_of_day};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;

/// The board as last loaded, plus the statuses derived from it.
#[derive(Debug, Default)]
struct BoardState {
    rooms: BTreeMap<RoomId, RoomInfo>,
    /// `None` until a load delivers schedules (server-side statuses only).
    schedules: Option<ScheduleMap>,
    reservations: Vec<Reservation>,
    statuses: StatusMap,
}

impl BoardState {
    fn knows(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
            || self.statuses.contains_key(room)
            || self.schedules.as_ref().is_some_and(|s| s.contains_key(room))
    }

    fn schedule(&self, room: &str) -> &[ScheduleEvent] {
        self.schedules
            .as_ref()
            .and_then(|s| s.get(room))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Recompute from the loaded schedules and swap the map in if anything
    /// moved. Returns the changed rooms.
    fn recompute(&mut self, now: Ms) -> Vec<StatusChange> {
        let Some(schedules) = &self.schedules else {
            return Vec::new();
        };
        let next = compute_all_statuses(schedules, &self.reservations, now, &self.statuses);
        let changes = changed_rooms(&self.statuses, &next);
        if !changes.is_empty() {
            self.statuses = next;
        }
        changes
    }

    fn occupied(&self) -> usize {
        self.statuses.values().filter(|s| !s.is_free()).count()
    }
}

/// Room-status engine for one board. Instances are independent; tests and
/// multiple boards may run side by side.
pub struct Engine {
    state: RwLock<BoardState>,
    pub notify: Arc<NotifyHub>,
    offset: FixedOffset,
}

impl Engine {
    /// `offset` is the wall-clock offset used for day boundaries and slot labels.
    pub fn new(notify: Arc<NotifyHub>, offset: FixedOffset) -> Self {
        Self {
            state: RwLock::new(BoardState::default()),
            notify,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Replace the board wholesale and compute statuses immediately.
    ///
    /// Listed rooms keep their previous status (new ones start `Free`),
    /// server-provided statuses overlay that, and rooms with a schedule are
    /// then computed locally. Returns the new map if it differs from the
    /// previous one.
    pub async fn load(&self, snapshot: BoardSnapshot, now: Ms) -> Option<StatusMap> {
        let BoardSnapshot {
            rooms,
            schedules,
            precomputed,
            reservations,
        } = snapshot;

        let mut state = self.state.write().await;

        let mut seed: StatusMap = rooms
            .iter()
            .map(|r| {
                let previous = state.statuses.get(&r.number).copied().unwrap_or_default();
                (r.number.clone(), previous)
            })
            .collect();
        seed.extend(precomputed);

        let next = match &schedules {
            Some(schedules) => compute_all_statuses(schedules, &reservations, now, &seed),
            None => seed,
        };

        let changes = changed_rooms(&state.statuses, &next);
        let removed: Vec<RoomId> = state
            .statuses
            .keys()
            .filter(|room| !next.contains_key(*room))
            .cloned()
            .collect();

        state.rooms = rooms.into_iter().map(|r| (r.number.clone(), r)).collect();
        state.schedules = schedules;
        state.reservations = reservations;
        state.statuses = next;

        info!(
            "board loaded: {} rooms, {} reservations, schedules {}",
            state.statuses.len(),
            state.reservations.len(),
            if state.schedules.is_some() { "local" } else { "server-side" },
        );
        metrics::gauge!(observability::ROOMS_OCCUPIED).set(state.occupied() as f64);

        for room in &removed {
            self.notify.remove(room);
        }
        self.publish(&changes);

        (!changes.is_empty() || !removed.is_empty()).then(|| state.statuses.clone())
    }

    /// Swap in a fresh active-reservation list (after a create/cancel) and
    /// recompute. Returns the new map if any status moved.
    pub async fn replace_reservations(
        &self,
        reservations: Vec<Reservation>,
        now: Ms,
    ) -> Option<StatusMap> {
        let mut state = self.state.write().await;
        state.reservations = reservations;
        let changes = state.recompute(now);
        self.finish_recompute(&state, changes)
    }

    /// One refresh step: recompute at `now` and report the full map only if
    /// some room changed. A board without schedules makes this a no-op.
    pub async fn tick(&self, now: Ms) -> Option<StatusMap> {
        metrics::counter!(observability::REFRESH_TICKS_TOTAL).increment(1);
        let mut state = self.state.write().await;
        if state.schedules.is_none() {
            debug!("refresh tick skipped: no schedules loaded");
            return None;
        }
        let changes = state.recompute(now);
        self.finish_recompute(&state, changes)
    }

    fn finish_recompute(&self, state: &BoardState, changes: Vec<StatusChange>) -> Option<StatusMap> {
        if changes.is_empty() {
            debug!("statuses unchanged");
            return None;
        }
        metrics::gauge!(observability::ROOMS_OCCUPIED).set(state.occupied() as f64);
        self.publish(&changes);
        Some(state.statuses.clone())
    }

    fn publish(&self, changes: &[StatusChange]) {
        if changes.is_empty() {
            return;
        }
        metrics::counter!(observability::STATUS_CHANGES_TOTAL).increment(changes.len() as u64);
        for change in changes {
            match change.from {
                Some(from) => info!("room {}: {} -> {}", change.room, from, change.to),
                None => debug!("room {}: {}", change.room, change.to),
            }
            self.notify.send(change);
        }
    }

    // ── Queries ──────────────────────────────────────────────

    pub async fn knows(&self, room: &str) -> bool {
        self.state.read().await.knows(room)
    }

    pub async fn schedules_loaded(&self) -> bool {
        self.state.read().await.schedules.is_some()
    }

    pub async fn statuses(&self) -> StatusMap {
        self.state.read().await.statuses.clone()
    }

    pub async fn status(&self, room: &str) -> Option<RoomStatus> {
        self.state.read().await.statuses.get(room).copied()
    }

    pub async fn room(&self, room: &str) -> Option<RoomInfo> {
        self.state.read().await.rooms.get(room).cloned()
    }

    pub async fn rooms(&self) -> Vec<RoomInfo> {
        self.state.read().await.rooms.values().cloned().collect()
    }

    /// The locally loaded schedule of `room`; `None` when the board carries
    /// no schedule for it.
    pub async fn schedule(&self, room: &str) -> Option<Vec<ScheduleEvent>> {
        let state = self.state.read().await;
        state.schedules.as_ref()?.get(room).cloned()
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.state.read().await.reservations.clone()
    }

    pub async fn reservations_for(&self, room: &str) -> Vec<Reservation> {
        let state = self.state.read().await;
        state
            .reservations
            .iter()
            .filter(|r| r.room == room)
            .cloned()
            .collect()
    }

    pub async fn current_event(&self, room: &str, now: Ms) -> Result<Option<ScheduleEvent>, EngineError> {
        let state = self.state.read().await;
        if !state.knows(room) {
            return Err(EngineError::UnknownRoom(room.to_string()));
        }
        Ok(current_event(state.schedule(room), now).cloned())
    }

    pub async fn next_event(&self, room: &str, now: Ms) -> Result<Option<ScheduleEvent>, EngineError> {
        let state = self.state.read().await;
        if !state.knows(room) {
            return Err(EngineError::UnknownRoom(room.to_string()));
        }
        Ok(next_event(state.schedule(room), now).cloned())
    }

    /// Today's remaining courses and reservations for `room`.
    pub async fn agenda(&self, room: &str, now: Ms) -> Result<Vec<AgendaEntry>, EngineError> {
        let state = self.state.read().await;
        if !state.knows(room) {
            return Err(EngineError::UnknownRoom(room.to_string()));
        }
        let day = day_window(now, self.offset);
        Ok(today_agenda(room, state.schedule(room), &state.reservations, &day, now))
    }

    /// Hourly reservation slots for `room` starting at the current hour.
    /// Courses and existing reservations both make a slot unavailable.
    pub async fn slots(&self, room: &str, now: Ms) -> Result<Vec<TimeSlot>, EngineError> {
        let state = self.state.read().await;
        if !state.knows(room) {
            return Err(EngineError::UnknownRoom(room.to_string()));
        }
        let day = day_window(now, self.offset);
        let booked: Vec<ScheduleEvent> = state
            .reservations
            .iter()
            .filter(|r| r.room == room)
            .map(|r| ScheduleEvent {
                span: r.span,
                summary: r.user_name.clone().unwrap_or_default(),
            })
            .collect();
        let mut events = day_events(state.schedule(room), &day, self.offset);
        events.extend(day_events(&booked, &day, self.offset));
        Ok(available_slots(&events, minute_of_day(now, self.offset)))
    }
}
