use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::SECOND_DIGIT_ZERO_FLOOR;

/// Building zone a room belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    /// The street-level concourse.
    Street,
    /// Numbered wing, 1 through 7.
    Wing(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Floor {
    Basement,
    Ground,
    Level(u8),
    Unknown,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Street => f.write_str("Street level"),
            Zone::Wing(n) => write!(f, "Zone {n}"),
        }
    }
}

impl fmt::Display for Floor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Floor::Basement => f.write_str("Basement"),
            Floor::Ground => f.write_str("Ground floor"),
            Floor::Level(n) => write!(f, "Floor {n}"),
            Floor::Unknown => f.write_str("Unknown floor"),
        }
    }
}

/// Zone of a room, derived from its identifier.
///
/// Three-character ids all sit on the street concourse. Longer (or shorter)
/// ids encode the zone in their first character.
pub fn zone_of(room: &str) -> Zone {
    if room.chars().count() == 3 {
        return Zone::Street;
    }
    match room.chars().next() {
        Some(c @ '1'..='7') => Zone::Wing(digit(c)),
        _ => Zone::Street,
    }
}

/// Floor of a room, derived from its identifier.
///
/// Three-character ids carry the floor in their first character; every other
/// id carries it in the second one.
pub fn floor_of(room: &str) -> Floor {
    let mut chars = room.chars();
    if room.chars().count() == 3 {
        return match chars.next() {
            Some('2') => Floor::Level(2),
            _ => Floor::Level(1),
        };
    }
    match chars.nth(1) {
        Some('0') => SECOND_DIGIT_ZERO_FLOOR,
        Some(c @ '1'..='4') => Floor::Level(digit(c)),
        _ => Floor::Unknown,
    }
}

fn digit(c: char) -> u8 {
    c.to_digit(10).map_or(0, |d| d as u8)
}
