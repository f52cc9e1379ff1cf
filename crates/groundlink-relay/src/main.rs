//! Relay binary for Groundlink.
//!
//! Wires the QuestDB telemetry source, the switch pipe, the tick loop and
//! the observer server together, then runs until a shutdown signal or a
//! fatal relay error.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`$GROUNDLINK_CONFIG` or `groundlink-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to QuestDB and verify the connection
//! 4. Create the switch state store and discrete input
//! 5. Start the observer server
//! 6. Start the relay loop and the heartbeat
//! 7. Wait for Ctrl-C / SIGTERM or a fatal loop error
//! 8. Stop the loop, drop subscribers, stop the server

mod error;
mod heartbeat;

use std::sync::Arc;
use std::time::Duration;

use groundlink_core::config::{DiscreteKind, GroundlinkConfig, LogFormat, LoggingConfig};
use groundlink_core::control::{RelayControl, RelayEndReason};
use groundlink_core::discrete::{DiscreteEventSource, FifoEventSource, NoDiscreteSource};
use groundlink_core::scheduler::{Scheduler, SnapshotSink, TickLoop, TickSettings};
use groundlink_core::switch_state::SwitchStateStore;
use groundlink_db::{QuestDbConfig, QuestDbPool, QuestDbSource};
use groundlink_observer::{AppState, ServerConfig};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if any startup step fails or the relay loop ends with
/// a fatal error; the process then exits non-zero.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration.
    let (config, config_path) = GroundlinkConfig::load()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("groundlink-relay starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        tick_rate_hz = config.relay.tick_rate_hz,
        discipline = ?config.source.discipline,
        tables = config.source.tables.len(),
        abort_forces_safe = config.interlock.abort_forces_safe,
        "Relay configuration"
    );

    // 3. Connect to QuestDB.
    let pool = QuestDbPool::connect(&QuestDbConfig::from_source(&config.source))?;
    pool.check_connection().await?;
    info!("QuestDB connection verified");
    let source = QuestDbSource::new(&config.source, pool)?;

    // 4. Switch state and discrete input.
    let store = Arc::new(SwitchStateStore::new());
    let discrete: Box<dyn DiscreteEventSource> = match config.discrete.kind {
        DiscreteKind::Fifo => {
            info!(path = %config.discrete.path.display(), "Reading switch events from pipe");
            Box::new(FifoEventSource::new(
                config.discrete.path.clone(),
                config.discrete.read_buffer_bytes,
                config.discrete.max_line_bytes,
            ))
        }
        DiscreteKind::None => {
            info!("No discrete input configured, switches stay at defaults");
            Box::new(NoDiscreteSource)
        }
    };

    // 5. Start the observer server.
    let control = Arc::new(RelayControl::new());
    let app_state = Arc::new(AppState::with_control(
        config.observer.subscriber_queue,
        Arc::clone(&control),
    ));
    let (server_shutdown_tx, server_shutdown_rx) = oneshot::channel::<()>();
    let observer = groundlink_observer::spawn_observer(
        &ServerConfig::from_observer(&config.observer),
        Arc::clone(&app_state),
        async move {
            let _ = server_shutdown_rx.await;
        },
    )
    .await?;
    info!(addr = %observer.addr, "Observer server started");

    // 6. Start the relay loop and the heartbeat.
    let sink: Arc<dyn SnapshotSink> = app_state.broadcaster.clone();
    let tick_loop = TickLoop::new(
        source,
        discrete,
        store,
        sink,
        Arc::clone(&control),
        TickSettings::from_config(&config),
    );
    let mut scheduler = Scheduler::new(tick_loop);
    scheduler.start().await?;
    info!(
        period_us = u64::try_from(config.relay.target_period().as_micros()).unwrap_or(u64::MAX),
        "Relay loop started"
    );

    let heartbeat = heartbeat::spawn_heartbeat(
        Duration::from_secs(config.relay.heartbeat_secs),
        Arc::clone(&control),
        Arc::clone(&app_state.registry),
    );

    // 7. Run until a signal arrives or the loop dies on its own.
    tokio::select! {
        () = shutdown_signal() => info!("Shutdown signal received"),
        reason = control.wait_finished() => {
            if let Some(RelayEndReason::Fatal { reason }) = reason {
                error!(reason = %reason, "Relay loop ended with a fatal error");
            }
        }
    }

    // 8. Tear down in dependency order.
    let result = scheduler.stop().await;
    if let Some(handle) = heartbeat {
        handle.abort();
    }
    let dropped = app_state.registry.clear();
    info!(subscribers = dropped, "Subscribers disconnected");

    let _ = server_shutdown_tx.send(());
    match observer.task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Observer server ended with an error"),
        Err(e) => warn!(error = %e, "Observer server task failed"),
    }

    let stats = control.stats();
    info!(
        ticks = stats.ticks,
        broadcasts = stats.broadcasts,
        skipped = stats.duplicates,
        source_errors = stats.source_errors,
        efficiency_percent = stats.efficiency_percent(),
        "groundlink-relay shutdown complete"
    );

    result?;
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Complete on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
