use crate::model::*;

// ── Status Algorithm ──────────────────────────────────────────────

/// Occupancy of `room` at `now`.
///
/// Reservations win over the schedule: an ad-hoc booking occupies the room
/// even when the timetable says it is empty. Both scans use `[start, end)`,
/// so an event ending exactly at `now` no longer occupies.
pub fn compute_status(
    room: &str,
    schedule: &[ScheduleEvent],
    reservations: &[Reservation],
    now: Ms,
) -> RoomStatus {
    if reservations.iter().any(|r| r.occupies(room, now)) {
        return RoomStatus::Occupied;
    }
    if schedule.iter().any(|e| e.span.contains_instant(now)) {
        return RoomStatus::Occupied;
    }
    RoomStatus::Free
}

/// Recompute every room that has a schedule.
///
/// Rooms present in `previous` but missing from `schedules` keep their
/// previous value.
pub fn compute_all_statuses(
    schedules: &ScheduleMap,
    reservations: &[Reservation],
    now: Ms,
    previous: &StatusMap,
) -> StatusMap {
    let mut next = previous.clone();
    for (room, schedule) in schedules {
        next.insert(room.clone(), compute_status(room, schedule, reservations, now));
    }
    next
}

/// Rooms whose status differs between `old` and `new`, in room order.
pub fn changed_rooms(old: &StatusMap, new: &StatusMap) -> Vec<StatusChange> {
    new.iter()
        .filter_map(|(room, &to)| {
            let from = old.get(room).copied();
            (from != Some(to)).then(|| StatusChange {
                room: room.clone(),
                from,
                to,
            })
        })
        .collect()
}
