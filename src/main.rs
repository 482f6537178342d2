//! Camera Bridge CLI
//!
//! Drives a camera module over the simulated backend, printing results and
//! failures as the JSON payloads a host runtime would receive.

use camera_bridge::{
    bridge::payload::{self, BridgeFailure},
    device::{DeviceRegistry, FlashMode, SimulatedBackend},
    metrics::MetricsRegistry,
    permission::StaticPermissions,
    BridgeEvent, CameraError, CameraModule, Capability, CaptureOptions, FileConfig,
    PermissionStatus, SessionHandle,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "camera-bridge", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Simulate a user who denied camera access
    #[arg(long, global = true)]
    deny_camera: bool,

    /// Serve Prometheus metrics on this port (overrides the config file)
    #[cfg(feature = "metrics")]
    #[arg(long, global = true)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List available camera devices
    Devices,
    /// Take one or more photos
    Photo {
        #[arg(long, default_value = "back")]
        device: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// off, on or auto
        #[arg(long, value_parser = parse_flash)]
        flash: Option<FlashMode>,
    },
    /// Record a video; Ctrl-C stops early
    Record {
        #[arg(long, default_value = "back")]
        device: String,
        #[arg(long, default_value_t = 3.0)]
        seconds: f64,
    },
}

fn parse_flash(s: &str) -> Result<FlashMode, String> {
    serde_json::from_value(Value::String(s.to_lowercase())).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Camera Bridge v{}", camera_bridge::VERSION);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            match serde_json::to_string(&failure) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{}: {}", failure.code, failure.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BridgeFailure> {
    let file_config = match &cli.config {
        Some(path) => FileConfig::from_file(path).map_err(CameraError::from)?,
        None => FileConfig::default(),
    };
    file_config.session.validate().map_err(CameraError::from)?;

    let backend = SimulatedBackend::with_default_devices();
    let registry = Arc::new(DeviceRegistry::new(Arc::new(backend)).map_err(CameraError::from)?);
    let permissions = if cli.deny_camera {
        StaticPermissions::authorized().with_status(Capability::Camera, PermissionStatus::Denied)
    } else {
        StaticPermissions::authorized()
    };
    let metrics = Arc::new(MetricsRegistry::new().map_err(|e| {
        CameraError::invalid_argument(format!("metrics registry: {e}"))
    })?);

    #[cfg(feature = "metrics")]
    {
        let port = cli.metrics_port.unwrap_or(file_config.metrics.port);
        if port != 0 {
            spawn_metrics_server(port, Arc::clone(&metrics));
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        if file_config.metrics.port != 0 {
            warn!("Metrics port configured but the metrics feature is disabled");
        }
    }

    let module = CameraModule::new(registry, Arc::new(permissions), file_config.session)
        .with_metrics(metrics);
    log_events(&module);

    match cli.command {
        Command::Devices => print_json(&payload::devices_payload(&module.list_devices())?),
        Command::Photo {
            device,
            count,
            flash,
        } => take_photos(&module, &device, count, flash),
        Command::Record { device, seconds } => record(&module, &device, seconds),
    }
}

fn take_photos(
    module: &CameraModule,
    device: &str,
    count: usize,
    flash: Option<FlashMode>,
) -> Result<(), BridgeFailure> {
    let handle = open(module, device)?;
    for i in 0..count {
        let mut options = CaptureOptions::default();
        if let Some(mode) = flash {
            options = options.with_flash(mode);
        }
        let options = options.with_metadata("sequence", i);
        let result = module.capture_photo(&handle, options)?.wait();
        print_json(&payload::settle(result)?)?;
    }
    module.close_session(&handle)?;
    Ok(())
}

fn record(module: &CameraModule, device: &str, seconds: f64) -> Result<(), BridgeFailure> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            warn!(error = %e, "Could not install Ctrl-C handler");
        }
    }

    let handle = open(module, device)?;
    let id = module.start_video_capture(&handle, CaptureOptions::default())?;
    info!(request = %id, seconds, "Recording");

    let until = Instant::now() + Duration::from_secs_f64(seconds.max(0.0));
    while Instant::now() < until && !stop.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(20));
    }

    let result = module.stop_video_capture(&handle, id)?.wait();
    print_json(&payload::settle(result)?)?;
    module.close_session(&handle)?;
    Ok(())
}

fn open(module: &CameraModule, device: &str) -> Result<SessionHandle, BridgeFailure> {
    Ok(module.open_session(device, None)?.wait()?)
}

fn print_json(value: &Value) -> Result<(), BridgeFailure> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CameraError::invalid_argument(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn log_events(module: &CameraModule) {
    let events = module.subscribe();
    let spawned = thread::Builder::new()
        .name("camera-events".into())
        .spawn(move || {
            for event in events {
                if let BridgeEvent::SessionStateChanged { state, .. } = &event {
                    info!(%state, "Session state changed");
                }
                match payload::event_payload(&event) {
                    Ok((name, body)) => debug!(event = name, %body, "Bridge event"),
                    Err(e) => warn!(error = %e.message, "Unserializable event"),
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Event logger not started");
    }
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, registry: Arc<MetricsRegistry>) {
    use camera_bridge::metrics::{MetricsServer, MetricsServerConfig};

    let spawned = thread::Builder::new()
        .name("metrics-server".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!(error = %e, "Metrics runtime not started");
                    return;
                }
            };
            let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
            if let Err(e) = runtime.block_on(server.run()) {
                warn!(error = %e, "Metrics server stopped");
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Metrics server not started");
    }
}
