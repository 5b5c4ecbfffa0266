use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use roomwatch::clock::{Clock, SystemClock};
use roomwatch::config::Config;
use roomwatch::engine::Engine;
use roomwatch::filter::FilterState;
use roomwatch::loader::load_board;
use roomwatch::model::StatusMap;
use roomwatch::notify::NotifyHub;
use roomwatch::refresh::start_real_time_updates;
use roomwatch::source::FileSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    roomwatch::observability::init(config.metrics_port)?;

    let engine = Arc::new(Engine::new(Arc::new(NotifyHub::new()), config.offset));
    let source = FileSource::new(&config.data_dir);
    let settings = config.load_settings();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    info!("roomwatch starting");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  refresh: every {}ms", config.refresh_interval.as_millis());
    info!("  utc offset: {}", config.offset);
    info!("  reload: {}", config.reload_interval.map_or("disabled".to_string(), |p| format!("every {}s", p.as_secs())));
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Renders run on their own task so they can query room metadata.
    let (tx, mut rx) = mpsc::unbounded_channel::<StatusMap>();
    let render = tokio::spawn({
        let engine = engine.clone();
        async move {
            let filter = FilterState::default();
            while let Some(statuses) = rx.recv().await {
                let rooms = engine.rooms().await;
                let visible = filter.visible_rooms(&statuses, &rooms);
                let free = statuses.values().filter(|s| s.is_free()).count();
                info!(
                    "board: {free}/{} free, showing {}: {}",
                    statuses.len(),
                    visible.len(),
                    visible.join(" ")
                );
            }
        }
    });

    if let Err(e) = load_board(&engine, &source, &settings, clock.now_ms()).await {
        error!("initial load failed: {e}");
    }
    let _ = tx.send(engine.statuses().await);

    let sink_tx = tx.clone();
    let refresh = start_real_time_updates(
        engine.clone(),
        clock.clone(),
        config.refresh_interval,
        Arc::new(move |statuses: &StatusMap| {
            let _ = sink_tx.send(statuses.clone());
        }),
    );

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
    };
    tokio::pin!(shutdown);

    let mut reload = config.reload_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = async {
                match reload.as_mut() {
                    Some(ticker) => { ticker.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                match load_board(&engine, &source, &settings, clock.now_ms()).await {
                    Ok(outcome) => {
                        info!("board reloaded ({outcome:?})");
                        let _ = tx.send(engine.statuses().await);
                    }
                    Err(e) => warn!("reload failed, keeping current board: {e}"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    refresh.stop();
    refresh.join().await;
    drop(tx);
    render.await?;

    info!("roomwatch stopped");
    Ok(())
}
