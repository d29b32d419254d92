//! `strongman run`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::loader::ConfigLoader;
use crate::config::schema::GameConfig;
use crate::controller::{Controller, ControllerOptions};
use crate::error::{BusError, ConfigError, StrongmanError};
use crate::observability::EventEmitter;
use crate::overlay::compositor::HeadlessCompositor;
use crate::player::LoopClock;

/// Runs the controller until `cancel` fires or the overlay fails.
///
/// The built-in [`LoopClock`] plays the part of the media player and the
/// overlay is drawn through a [`HeadlessCompositor`].
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the bus device
/// cannot be opened, or the controller fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), StrongmanError> {
    if args.loop_period.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: "--loop-period".to_string(),
            value: humantime::format_duration(args.loop_period).to_string(),
            expected: "a non-zero duration".to_string(),
        }
        .into());
    }

    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(args.config.as_deref())?;

    let events = match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };

    let device = args.bus.clone().or_else(|| config.bus.device.clone());
    let bus_label = device
        .as_ref()
        .map_or_else(|| "none".to_string(), |p| p.display().to_string());
    let (bus_in, bus_out) = open_bus(device.as_deref()).await?;

    let controller = Controller::new(ControllerOptions {
        config: Arc::clone(&config),
        compositor: Arc::new(HeadlessCompositor::new()),
        events: Arc::new(events),
        bus_label,
        // Only the inert stand-in bus is finite; a real device idles with
        // empty reads.
        bus_stops_at_eof: device.is_none(),
    });

    let clock = LoopClock::new(args.loop_period).spawn(controller.hooks(), cancel.clone())?;
    let result = controller.run(bus_in, bus_out, cancel.clone()).await;

    // The clock shares the token; make sure it stops even on a render error.
    cancel.cancel();
    match tokio::task::spawn_blocking(move || clock.join()).await {
        Ok(Ok(selector)) => {
            tracing::debug!(switches = selector.switches, "loop clock joined");
        }
        Ok(Err(_)) => tracing::warn!("loop clock thread panicked"),
        Err(e) => tracing::warn!(error = %e, "failed to join loop clock"),
    }

    result.map(|report| {
        tracing::info!(
            bytes = report.reader.bytes,
            packets = report.packets_processed,
            "controller finished"
        );
    })
}

fn load_config(path: Option<&Path>) -> Result<Arc<GameConfig>, StrongmanError> {
    let Some(path) = path else {
        tracing::info!("no configuration file, using defaults");
        return Ok(Arc::new(GameConfig::default()));
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let load_result = ConfigLoader::new().load(path)?;
    for warning in &load_result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(load_result.config)
}

type BusReadHalf = Box<dyn AsyncRead + Unpin + Send>;
type BusWriteHalf = Box<dyn AsyncWrite + Unpin + Send>;

/// Opens the bus device, or an inert bus when none is configured.
async fn open_bus(device: Option<&Path>) -> Result<(BusReadHalf, BusWriteHalf), StrongmanError> {
    let Some(path) = device else {
        tracing::warn!("no bus device configured, running without sensor input");
        return Ok((Box::new(tokio::io::empty()), Box::new(tokio::io::sink())));
    };

    // Separate handles so a pending read never blocks a lamp write.
    let reader = tokio::fs::File::open(path)
        .await
        .map_err(|source| open_error(path, source))?;
    let writer = tokio::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|source| open_error(path, source))?;
    tracing::info!(device = %path.display(), "bus device opened");
    Ok((Box::new(reader), Box::new(writer)))
}

fn open_error(path: &Path, source: std::io::Error) -> StrongmanError {
    BusError::Open {
        path: path.to_path_buf(),
        source,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::ExitCode;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            bus: None,
            loop_period: Duration::from_secs(10),
            metrics_port: None,
            events_file: None,
        }
    }

    #[tokio::test]
    async fn test_zero_loop_period_rejected() {
        let mut args = args();
        args.loop_period = Duration::ZERO;
        let err = run(&args, CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[tokio::test]
    async fn test_missing_bus_device() {
        let mut args = args();
        args.bus = Some(PathBuf::from("/nonexistent/strongman-bus"));
        let err = run(&args, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, StrongmanError::Bus(BusError::Open { .. })));
        assert_eq!(err.exit_code(), ExitCode::BUS_ERROR);
    }

    #[tokio::test]
    async fn test_runs_until_cancelled_without_bus() {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.jsonl");
        let mut args = args();
        args.events_file = Some(events_path.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        run(&args, cancel).await.unwrap();

        let events = std::fs::read_to_string(events_path).unwrap();
        assert!(events.contains("ControllerStarted"));
        assert!(events.contains("ControllerStopped"));
    }
}
