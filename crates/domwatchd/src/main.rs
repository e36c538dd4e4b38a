// # domwatchd - Domain Monitoring Daemon
//
// ⚠️ ARCHITECTURAL CONSTRAINTS ⚠️
//
// CRITICAL RULES:
// - This is a THIN integration layer ONLY
// - DO NOT add sweep logic, transition detection or delivery logic here
// - All monitoring logic MUST be in domwatch-core
// - Configuration is via environment variables ONLY
//
// The domwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering classifiers and notification sinks
// 4. Building the monitor and starting the daily scheduler
// 5. Translating signals into manual sweeps and graceful shutdown
//
// ## Configuration
//
// ### Classifier
// - `DOMWATCH_CLASSIFIER_URL`: Block-status lookup endpoint
// - `DOMWATCH_CLASSIFIER_TIMEOUT_SECS`: Per-call timeout
// - `DOMWATCH_MIN_CALL_SPACING_MS`: Minimum spacing between classifier calls
// - `DOMWATCH_MAX_RETRIES`: Retries per domain per sweep (0 or 1)
//
// ### Notification Sink
// - `DOMWATCH_SINK_TYPE`: Sink type (telegram, log)
// - `TELEGRAM_BOT_TOKEN`: Bot token (for telegram)
// - `TELEGRAM_PARSE_MODE`: Optional parse mode (for telegram)
//
// ### Store
// - `DOMWATCH_STORE_TYPE`: Store type (file, memory)
// - `DOMWATCH_STORE_PATH`: Path to the store file (for file)
// - `DOMWATCH_MAX_SUBSCRIPTIONS`: Subscriptions allowed per user
//
// ### Schedule
// - `DOMWATCH_SCHEDULE_ENABLED`: Register the daily sweep (default true)
// - `DOMWATCH_SWEEP_TIME`: Daily sweep time, `HH:MM`
// - `DOMWATCH_UTC_OFFSET_MINUTES`: Offset of the sweep clock from UTC
// - `DOMWATCH_SWEEP_ON_START`: Run one sweep right after startup
//
// ### Daemon
// - `DOMWATCH_SHUTDOWN_GRACE_SECS`: Notification drain budget on shutdown
// - `DOMWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Signals
//
// - `SIGUSR1`: Run a manual sweep (ignored while one is running)
// - `SIGINT` / `SIGTERM`: Graceful shutdown
//
// ## Example
//
// ```bash
// export TELEGRAM_BOT_TOKEN=123456:your_token
// export DOMWATCH_STORE_PATH=/var/lib/domwatch/store.json
// export DOMWATCH_SWEEP_TIME=09:00
// export DOMWATCH_UTC_OFFSET_MINUTES=420
//
// domwatchd
// ```

mod config;

use anyhow::{Context, Result};
use config::Config;
use domwatch_core::{
    Classifier, ComponentRegistry, DailySchedule, DomainMonitor, Error, MonitorConfig,
    MonitorEvent, NotificationSink, Scheduler,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time allowed for shutdown on top of the notification drain budget
const SHUTDOWN_SLACK: Duration = Duration::from_secs(20);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DomwatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DomwatchExitCode> for ExitCode {
    fn from(code: DomwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Failure of `run_daemon`, split by exit code
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DomwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DomwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DomwatchExitCode::ConfigError.into();
    }

    info!("Starting domwatchd daemon");
    debug!("Configuration: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DomwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DomwatchExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup error: {:#}", e);
                DomwatchExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                DomwatchExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Build the registry with every compiled-in plugin
fn build_registry() -> ComponentRegistry {
    let registry = ComponentRegistry::with_builtins();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP classifier");
        domwatch_classifier_http::register(&registry);
    }

    #[cfg(feature = "telegram")]
    {
        info!("Registering Telegram sink");
        domwatch_sink_telegram::register(&registry);
    }

    registry
}

/// Create the components from configuration and build the monitor
async fn build_monitor(
    registry: &ComponentRegistry,
    monitor_config: &MonitorConfig,
) -> Result<(Arc<DomainMonitor>, mpsc::Receiver<MonitorEvent>)> {
    let classifier = registry
        .create_classifier(&monitor_config.classifier)
        .context("Failed to create classifier")?;
    let sink = registry
        .create_sink(&monitor_config.sink)
        .context("Failed to create notification sink")?;
    let store = registry
        .create_store(&monitor_config.store, &monitor_config.limits)
        .await
        .context("Failed to open store")?;

    info!(
        "Classifier: {}, sink: {}, store: {}",
        classifier.classifier_name(),
        sink.sink_name(),
        monitor_config.store.type_name()
    );

    let built = DomainMonitor::new(classifier, sink, Arc::from(store), monitor_config.clone())
        .context("Failed to build monitor")?;
    Ok(built)
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let monitor_config = config.to_monitor_config();
    let registry = build_registry();

    let (monitor, events) = build_monitor(&registry, &monitor_config)
        .await
        .map_err(DaemonError::Startup)?;

    let event_logger = tokio::spawn(log_events(events));

    let scheduler = if monitor_config.schedule.enabled {
        let schedule = DailySchedule::from_config(&monitor_config.schedule)
            .map_err(|e| DaemonError::Startup(e.into()))?;
        info!(
            "Daily sweep at {} (UTC{})",
            schedule.time().format("%H:%M"),
            schedule.offset()
        );
        Some(Scheduler::start(monitor.clone(), schedule))
    } else {
        info!("Daily sweep disabled");
        None
    };

    if config.sweep_on_start {
        info!("Running startup sweep");
        spawn_manual_sweep(&monitor);
    }

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown(&monitor)
        .await
        .map_err(DaemonError::Runtime)?;
    info!("Received shutdown signal: {}", signal);

    let grace = monitor_config.engine.shutdown_grace() + SHUTDOWN_SLACK;
    let shutdown = async {
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
        monitor.shutdown().await
    };

    match tokio::time::timeout(grace, shutdown).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            return Err(DaemonError::Runtime(
                anyhow::Error::new(e).context("Shutdown failed"),
            ));
        }
        Err(_) => {
            return Err(DaemonError::Runtime(anyhow::anyhow!(
                "Shutdown timeout after {:?}",
                grace
            )));
        }
    }

    // The monitor's sender goes away with the last Arc; the logger ends then
    drop(monitor);
    if tokio::time::timeout(Duration::from_secs(1), event_logger)
        .await
        .is_err()
    {
        debug!("Event logger still running at exit");
    }

    info!("Shutdown complete");
    Ok(())
}

/// Run a manual sweep in the background and log its outcome
fn spawn_manual_sweep(monitor: &Arc<DomainMonitor>) {
    let monitor = monitor.clone();
    tokio::spawn(async move {
        match monitor.run_sweep_now().await {
            Ok(summary) => info!(
                "Manual sweep finished: {} checked, {} changed, {} failed",
                summary.checked, summary.changed, summary.failed
            ),
            Err(Error::SweepInProgress) => {
                warn!("Manual sweep ignored: a sweep is already running")
            }
            Err(Error::ShuttingDown) => debug!("Manual sweep skipped: shutting down"),
            Err(e) => error!("Manual sweep failed: {}", e),
        }
    });
}

/// Consume monitor events
///
/// The engine logs every decision itself; events only need draining here
/// so the channel never fills.
async fn log_events(mut events: mpsc::Receiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            MonitorEvent::Stopped { reason } => info!("Monitor stopped: {}", reason),
            other => debug!("Monitor event: {:?}", other),
        }
    }
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
///
/// `SIGUSR1` starts a manual sweep and keeps waiting.
///
/// # Returns
///
/// The name of the signal that ended the wait.
#[cfg(unix)]
async fn wait_for_shutdown(monitor: &Arc<DomainMonitor>) -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
    let mut sigusr1 = signal(SignalKind::user_defined1())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGUSR1 handler: {}", e))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => return Ok("SIGTERM"),
            _ = sigint.recv() => return Ok("SIGINT"),
            _ = sigusr1.recv() => {
                info!("SIGUSR1 received, running manual sweep");
                spawn_manual_sweep(monitor);
            }
        }
    }
}

/// Wait for a shutdown signal (SIGINT only)
///
/// Fallback implementation for non-Unix platforms; manual sweeps are not
/// available there.
#[cfg(not(unix))]
async fn wait_for_shutdown(_monitor: &Arc<DomainMonitor>) -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
