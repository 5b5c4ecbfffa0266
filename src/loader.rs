use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::engine::{Engine, EngineError, TodayCourse, UserReservations, user_reservations};
use crate::limits::DEFAULT_FETCH_TIMEOUT_MS;
use crate::model::*;
use crate::observability;
use crate::source::{RoomSource, SourceError};
use crate::wire::{MutationResponse, RoomScheduleResponse, decode_reservations};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Schedules delivered; statuses are computed locally and refreshed.
    Live,
    /// Server-side statuses only.
    Precomputed,
    /// Rooms could not be fetched; the board was left as it was.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct LoadSettings {
    pub fetch_timeout: Duration,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

async fn bounded<T>(
    what: &'static str,
    limit: Duration,
    fut: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(SourceError::Timeout(what)),
    }
}

/// Fetch rooms and active reservations concurrently and load them into the
/// engine. A rooms failure leaves the engine untouched and is returned; a
/// reservations failure only degrades the board to "no reservations".
pub async fn load_board(
    engine: &Engine,
    source: &dyn RoomSource,
    settings: &LoadSettings,
    now: Ms,
) -> Result<LoadOutcome, SourceError> {
    let started = Instant::now();
    let limit = settings.fetch_timeout;
    let (rooms, active) = futures::future::join(
        bounded("rooms fetch", limit, source.fetch_rooms()),
        bounded("reservations fetch", limit, source.fetch_active_reservations()),
    )
    .await;

    let rooms = match rooms {
        Ok(rooms) => rooms,
        Err(e) => {
            warn!("rooms unavailable, keeping current board: {e}");
            record(LoadOutcome::Fallback, started);
            return Err(e);
        }
    };

    let offset = engine.offset();
    let reservations = match active {
        Ok(resp) if resp.success => decode_reservations(&resp.reservations, offset),
        Ok(resp) => {
            warn!(
                "active reservations refused: {}",
                resp.error.as_deref().unwrap_or("no reason given")
            );
            Vec::new()
        }
        Err(e) => {
            warn!("active reservations unavailable: {e}");
            Vec::new()
        }
    };

    let schedules = rooms.schedules(offset);
    let outcome = if schedules.is_some() {
        LoadOutcome::Live
    } else {
        LoadOutcome::Precomputed
    };
    let precomputed = match outcome {
        LoadOutcome::Precomputed => rooms.precomputed(),
        _ => StatusMap::new(),
    };

    engine
        .load(
            BoardSnapshot {
                rooms: rooms.rooms(),
                schedules,
                precomputed,
                reservations,
            },
            now,
        )
        .await;

    info!(
        "load finished: {} in {:.1}ms",
        observability::outcome_label(outcome),
        started.elapsed().as_secs_f64() * 1000.0
    );
    record(outcome, started);
    Ok(outcome)
}

fn record(outcome: LoadOutcome, started: Instant) {
    metrics::counter!(observability::LOADS_TOTAL, "outcome" => observability::outcome_label(outcome))
        .increment(1);
    metrics::histogram!(observability::LOAD_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

#[derive(Debug)]
pub enum MutationError {
    Engine(EngineError),
    Source(SourceError),
}

impl std::fmt::Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationError::Engine(e) => write!(f, "{e}"),
            MutationError::Source(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MutationError {}

impl From<EngineError> for MutationError {
    fn from(e: EngineError) -> Self {
        MutationError::Engine(e)
    }
}

impl From<SourceError> for MutationError {
    fn from(e: SourceError) -> Self {
        MutationError::Source(e)
    }
}

/// What an accepted reservation create/cancel did to the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// The new status map, if any room changed.
    pub statuses: Option<StatusMap>,
    /// The user's own reservations as returned with the answer.
    pub mine: UserReservations,
}

/// Fold the answer to a reservation create/cancel into the board: a refusal
/// is surfaced as [`EngineError::Rejected`] and changes nothing, a success
/// refetches the active reservations and recomputes.
pub async fn apply_mutation(
    engine: &Engine,
    source: &dyn RoomSource,
    settings: &LoadSettings,
    response: MutationResponse,
    now: Ms,
) -> Result<MutationOutcome, MutationError> {
    if !response.success {
        let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
        return Err(EngineError::Rejected(reason).into());
    }
    let active = bounded(
        "reservations fetch",
        settings.fetch_timeout,
        source.fetch_active_reservations(),
    )
    .await?;
    if !active.success {
        let reason = active.error.unwrap_or_else(|| "refused".to_string());
        return Err(SourceError::Unavailable(reason).into());
    }
    let offset = engine.offset();
    let mine = user_reservations(&decode_reservations(&response.reservations, offset), now);
    let reservations = decode_reservations(&active.reservations, offset);
    Ok(MutationOutcome {
        statuses: engine.replace_reservations(reservations, now).await,
        mine,
    })
}

/// Weekly schedule of one room. Answered from the loaded schedules when the
/// board has them, projected onto the weekday of each course; otherwise
/// fetched from the source.
pub async fn room_schedule(
    engine: &Engine,
    source: &dyn RoomSource,
    settings: &LoadSettings,
    room: &str,
) -> Result<RoomScheduleResponse, MutationError> {
    if let Some(events) = engine.schedule(room).await {
        return Ok(RoomScheduleResponse::from_events(&events, engine.offset()));
    }
    if !engine.knows(room).await {
        return Err(EngineError::UnknownRoom(room.to_string()).into());
    }
    Ok(bounded("schedule fetch", settings.fetch_timeout, source.fetch_room_schedule(room)).await?)
}

/// Today's remaining courses of one room from its weekly schedule.
pub async fn room_today(
    engine: &Engine,
    source: &dyn RoomSource,
    settings: &LoadSettings,
    room: &str,
    now: Ms,
) -> Result<Vec<TodayCourse>, MutationError> {
    let week = room_schedule(engine, source, settings, room).await?;
    Ok(week.today(now, engine.offset()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::clock::offset_from_minutes;
    use crate::notify::NotifyHub;
    use crate::wire::*;

    /// 2025-03-10T00:00:00Z, a Monday.
    const DAY0: Ms = 1_741_564_800_000;
    const H: Ms = 3_600_000;

    #[derive(Default)]
    struct MockSource {
        rooms: Option<RoomsResponse>,
        active: Option<ActiveReservationsResponse>,
        hang_rooms: bool,
        schedule_calls: AtomicUsize,
    }

    #[async_trait]
    impl RoomSource for MockSource {
        async fn fetch_rooms(&self) -> Result<RoomsResponse, SourceError> {
            if self.hang_rooms {
                std::future::pending::<()>().await;
            }
            self.rooms
                .clone()
                .ok_or_else(|| SourceError::Unavailable("rooms down".into()))
        }

        async fn fetch_active_reservations(&self) -> Result<ActiveReservationsResponse, SourceError> {
            self.active
                .clone()
                .ok_or_else(|| SourceError::Unavailable("reservations down".into()))
        }

        async fn fetch_room_schedule(&self, _room: &str) -> Result<RoomScheduleResponse, SourceError> {
            self.schedule_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(
                r#"{"schedule": {"monday": [
                    {"start": "08:00", "end": "10:00", "course": "Algèbre"},
                    {"start": "10:00", "end": "12:00", "course": "Réseaux"}
                ]}}"#,
            )
            .unwrap())
        }
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(NotifyHub::new()), offset_from_minutes(0).unwrap())
    }

    fn live_rooms() -> RoomsResponse {
        serde_json::from_str(
            r#"{
                "client_status_calculation": true,
                "rooms_list": [{"number": "101"}, {"number": "102"}],
                "room_schedules": {
                    "101": [{"start": "2025-03-10T08:00:00Z", "end": "2025-03-10T10:00:00Z", "summary": "Algèbre"}],
                    "102": []
                }
            }"#,
        )
        .unwrap()
    }

    fn active(json: &str) -> ActiveReservationsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn live_load_computes_statuses() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(
                r#"{"success": true, "reservations": [
                    {"room_number": "102", "start_time": "2025-03-10T08:30:00", "end_time": "2025-03-10T09:30:00"}
                ]}"#,
            )),
            ..Default::default()
        };
        let outcome = load_board(&engine, &source, &LoadSettings::default(), DAY0 + 9 * H)
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Live);
        assert_eq!(engine.status("101").await, Some(RoomStatus::Occupied));
        assert_eq!(engine.status("102").await, Some(RoomStatus::Occupied));
    }

    #[tokio::test]
    async fn legacy_load_uses_server_statuses() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(
                serde_json::from_str(
                    r#"{"rooms_list": [{"number": "101", "status": "occupé"}, {"number": "102"}]}"#,
                )
                .unwrap(),
            ),
            active: Some(active(r#"{"success": true, "reservations": []}"#)),
            ..Default::default()
        };
        let outcome = load_board(&engine, &source, &LoadSettings::default(), DAY0).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Precomputed);
        assert_eq!(engine.status("101").await, Some(RoomStatus::Occupied));
        assert_eq!(engine.status("102").await, Some(RoomStatus::Free));
        assert!(!engine.schedules_loaded().await);
    }

    #[tokio::test]
    async fn rooms_failure_keeps_board() {
        let engine = engine();
        let good = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        load_board(&engine, &good, &LoadSettings::default(), DAY0 + 9 * H)
            .await
            .unwrap();

        let down = MockSource::default();
        let err = load_board(&engine, &down, &LoadSettings::default(), DAY0 + 9 * H).await;
        assert!(matches!(err, Err(SourceError::Unavailable(_))));
        assert_eq!(engine.status("101").await, Some(RoomStatus::Occupied));
    }

    #[tokio::test]
    async fn reservations_failure_degrades_to_empty() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(r#"{"success": false, "error": "db down"}"#)),
            ..Default::default()
        };
        let outcome = load_board(&engine, &source, &LoadSettings::default(), DAY0 + 9 * H)
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Live);
        assert!(engine.reservations().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hung_rooms_fetch_times_out() {
        let engine = engine();
        let source = MockSource {
            hang_rooms: true,
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        let settings = LoadSettings {
            fetch_timeout: Duration::from_millis(50),
        };
        let err = load_board(&engine, &source, &settings, DAY0).await;
        assert!(matches!(err, Err(SourceError::Timeout("rooms fetch"))));
    }

    #[tokio::test]
    async fn rejected_mutation_changes_nothing() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        load_board(&engine, &source, &LoadSettings::default(), DAY0 + 11 * H)
            .await
            .unwrap();

        let refused: MutationResponse =
            serde_json::from_str(r#"{"success": false, "error": "slot taken"}"#).unwrap();
        let err = apply_mutation(&engine, &source, &LoadSettings::default(), refused, DAY0 + 11 * H).await;
        match err {
            Err(MutationError::Engine(EngineError::Rejected(reason))) => assert_eq!(reason, "slot taken"),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(engine.reservations().await.is_empty());
    }

    #[tokio::test]
    async fn accepted_mutation_refetches_reservations() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(
                r#"{"success": true, "reservations": [
                    {"room_number": "102", "start_time": "2025-03-10T11:00:00", "end_time": "2025-03-10T12:00:00"}
                ]}"#,
            )),
            ..Default::default()
        };
        let settings = LoadSettings::default();
        engine
            .load(
                BoardSnapshot {
                    rooms: live_rooms().rooms(),
                    schedules: live_rooms().schedules(engine.offset()),
                    ..Default::default()
                },
                DAY0 + 11 * H,
            )
            .await;
        assert_eq!(engine.status("102").await, Some(RoomStatus::Free));

        let ok: MutationResponse = serde_json::from_str(
            r#"{"success": true, "reservations": [
                {"id": 7, "room_number": "102", "start_time": "2025-03-10T11:00:00",
                 "end_time": "2025-03-10T12:00:00", "status": "upcoming"},
                {"id": 3, "room_number": "101", "start_time": "2025-03-10T07:00:00",
                 "end_time": "2025-03-10T08:00:00", "status": "active"}
            ]}"#,
        )
        .unwrap();
        let outcome = apply_mutation(&engine, &source, &settings, ok, DAY0 + 11 * H)
            .await
            .unwrap();
        let map = outcome.statuses.unwrap();
        assert_eq!(map.get("102"), Some(&RoomStatus::Occupied));
        assert_eq!(engine.reservations_for("102").await.len(), 1);

        // The booking from 07:00 is over whatever its stored label says.
        assert_eq!(outcome.mine.active_count, 1);
        let (mine, phase) = &outcome.mine.shown[0];
        assert_eq!(mine.id.as_deref(), Some("7"));
        assert_eq!(*phase, ReservationPhase::Active);
    }

    #[tokio::test]
    async fn room_schedule_prefers_loaded_schedules() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(live_rooms()),
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        let settings = LoadSettings::default();
        load_board(&engine, &source, &settings, DAY0).await.unwrap();

        let week = room_schedule(&engine, &source, &settings, "101").await.unwrap();
        assert_eq!(week.day("monday").len(), 1);
        assert_eq!(week.day("monday")[0].start, "08:00");
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 0);

        assert!(matches!(
            room_schedule(&engine, &source, &settings, "999").await,
            Err(MutationError::Engine(EngineError::UnknownRoom(_)))
        ));
    }

    #[tokio::test]
    async fn room_schedule_fetches_without_local_schedules() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(serde_json::from_str(r#"{"rooms_list": [{"number": "101"}]}"#).unwrap()),
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        let settings = LoadSettings::default();
        load_board(&engine, &source, &settings, DAY0).await.unwrap();

        room_schedule(&engine, &source, &settings, "101").await.unwrap();
        assert_eq!(source.schedule_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn room_today_drops_finished_courses() {
        let engine = engine();
        let source = MockSource {
            rooms: Some(serde_json::from_str(r#"{"rooms_list": [{"number": "101"}]}"#).unwrap()),
            active: Some(active(r#"{"success": true}"#)),
            ..Default::default()
        };
        let settings = LoadSettings::default();
        load_board(&engine, &source, &settings, DAY0).await.unwrap();

        let today = room_today(&engine, &source, &settings, "101", DAY0 + 10 * H + 30 * 60_000)
            .await
            .unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].event.course, "Réseaux");
        assert!(today[0].is_current);
    }
}
