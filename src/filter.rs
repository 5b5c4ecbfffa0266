use std::collections::BTreeSet;

use crate::model::*;
use crate::topology::{Floor, Zone, floor_of, zone_of};

/// Kind assumed for rooms the board has no metadata for.
pub const DEFAULT_KIND: &str = "Salle classique";

/// Facets and free-text search applied to the room board. Every facet must
/// match and the search term, when set, must occur in the room's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub statuses: BTreeSet<RoomStatus>,
    pub kinds: BTreeSet<String>,
    pub zones: BTreeSet<Zone>,
    pub floors: BTreeSet<Floor>,
    search: String,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            statuses: BTreeSet::from([RoomStatus::Free]),
            kinds: BTreeSet::from([DEFAULT_KIND.to_string(), "Amphithéâtre".to_string()]),
            zones: [Zone::Street]
                .into_iter()
                .chain((1..=4).map(Zone::Wing))
                .collect(),
            floors: [Floor::Basement]
                .into_iter()
                .chain((1..=4).map(Floor::Level))
                .collect(),
            search: String::new(),
        }
    }
}

impl FilterState {
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Stored trimmed and lower-cased.
    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_lowercase();
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, room: &str, info: Option<&RoomInfo>, status: RoomStatus) -> bool {
        let kind = info
            .and_then(|i| i.kind.as_deref())
            .unwrap_or(DEFAULT_KIND);
        let zone = zone_of(room);
        let floor = floor_of(room);

        self.statuses.contains(&status)
            && self.kinds.contains(kind)
            && self.zones.contains(&zone)
            && self.floors.contains(&floor)
            && (self.search.is_empty() || searchable_text(room, info, kind, zone, floor, status).contains(&self.search))
    }

    /// Listed rooms passing the filter, in the order of `rooms`. A room
    /// without a status is not shown.
    pub fn visible_rooms(&self, statuses: &StatusMap, rooms: &[RoomInfo]) -> Vec<RoomId> {
        rooms
            .iter()
            .filter_map(|info| {
                let status = *statuses.get(&info.number)?;
                self.matches(&info.number, Some(info), status)
                    .then(|| info.number.clone())
            })
            .collect()
    }
}

fn searchable_text(
    room: &str,
    info: Option<&RoomInfo>,
    kind: &str,
    zone: Zone,
    floor: Floor,
    status: RoomStatus,
) -> String {
    let board = info.and_then(|i| i.board.as_deref()).unwrap_or("");
    let capacity = info
        .and_then(|i| i.capacity)
        .map(|c| c.to_string())
        .unwrap_or_default();
    format!("{room} Salle {room} {kind} {board} {capacity} {zone} {floor} {status}").to_lowercase()
}
