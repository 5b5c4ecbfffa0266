use crate::model::RoomId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    UnknownRoom(RoomId),
    /// The reservation service refused a create/cancel.
    Rejected(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnknownRoom(room) => write!(f, "unknown room: {room}"),
            EngineError::Rejected(reason) => write!(f, "reservation rejected: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}
