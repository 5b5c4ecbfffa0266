use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::wire::{ActiveReservationsResponse, RoomScheduleResponse, RoomsResponse};

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Decode(serde_json::Error),
    /// The named fetch did not answer within the configured timeout.
    Timeout(&'static str),
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "io error: {e}"),
            SourceError::Decode(e) => write!(f, "malformed payload: {e}"),
            SourceError::Timeout(what) => write!(f, "{what} timed out"),
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Io(e) => Some(e),
            SourceError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Decode(e)
    }
}

/// Where room data comes from. The HTTP client of a deployment implements
/// this; the binary and the tests use [`FileSource`].
#[async_trait]
pub trait RoomSource: Send + Sync {
    async fn fetch_rooms(&self) -> Result<RoomsResponse, SourceError>;
    async fn fetch_active_reservations(&self) -> Result<ActiveReservationsResponse, SourceError>;
    async fn fetch_room_schedule(&self, room: &str) -> Result<RoomScheduleResponse, SourceError>;
}

/// Reads API payloads from a directory:
///
/// ```text
/// <root>/rooms.json
/// <root>/reservations.json
/// <root>/schedules/<room>.json
/// ```
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T, SourceError> {
        let bytes = tokio::fs::read(&path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RoomSource for FileSource {
    async fn fetch_rooms(&self) -> Result<RoomsResponse, SourceError> {
        self.read_json(self.root.join("rooms.json")).await
    }

    async fn fetch_active_reservations(&self) -> Result<ActiveReservationsResponse, SourceError> {
        self.read_json(self.root.join("reservations.json")).await
    }

    async fn fetch_room_schedule(&self, room: &str) -> Result<RoomScheduleResponse, SourceError> {
        // Room ids come from payloads; keep them inside the schedules dir.
        if room.is_empty() || !room.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(SourceError::Unavailable(format!("invalid room id {room:?}")));
        }
        self.read_json(self.root.join("schedules").join(format!("{room}.json")))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("roomwatch_test_source_{}", std::process::id()))
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("schedules")).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_all_payloads() {
        let dir = test_dir("all");
        std::fs::write(
            dir.join("rooms.json"),
            r#"{"rooms_list": [{"number": "101"}], "client_status_calculation": false}"#,
        )
        .unwrap();
        std::fs::write(dir.join("reservations.json"), r#"{"success": true, "reservations": []}"#).unwrap();
        std::fs::write(
            dir.join("schedules/101.json"),
            r#"{"schedule": {"monday": [{"start": "08:00", "end": "09:00", "course": "Algèbre"}]}}"#,
        )
        .unwrap();

        let source = FileSource::new(&dir);
        let rooms = source.fetch_rooms().await.unwrap();
        assert_eq!(rooms.rooms_list.len(), 1);
        assert!(source.fetch_active_reservations().await.unwrap().success);
        let schedule = source.fetch_room_schedule("101").await.unwrap();
        assert_eq!(schedule.day("monday").len(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = test_dir("missing");
        let source = FileSource::new(&dir);
        assert!(matches!(source.fetch_rooms().await, Err(SourceError::Io(_))));
    }

    #[tokio::test]
    async fn malformed_file_is_decode_error() {
        let dir = test_dir("malformed");
        std::fs::write(dir.join("rooms.json"), "{ not json").unwrap();
        let source = FileSource::new(&dir);
        assert!(matches!(source.fetch_rooms().await, Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn rejects_path_like_room_ids() {
        let dir = test_dir("traversal");
        let source = FileSource::new(&dir);
        assert!(matches!(
            source.fetch_room_schedule("../rooms").await,
            Err(SourceError::Unavailable(_))
        ));
    }
}
