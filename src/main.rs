use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use handscan::config::Configuration;
use handscan::detection::{RandomDetector, SyntheticFrameSource};
use handscan::error::AppError;
use handscan::session::{ScanCoordinator, ScanEvent};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{Level, error, info, warn};

fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let configuration = Configuration::load(path.as_deref())?;
    init_logging(&configuration.log_level);

    let simulation = configuration.simulation.clone();
    let source = SyntheticFrameSource::new().with_frame_rate(simulation.frame_rate);
    let detector = RandomDetector::new(
        simulation.hand_presence,
        simulation.failure_rate,
        simulation.seed,
    )
    .with_load_delay(Duration::from_millis(simulation.load_delay_ms));

    let mut coordinator = ScanCoordinator::builder(configuration)
        .frame_source(source)
        .detector(Arc::new(detector))
        .build()?;

    coordinator.prepare().await?;
    let mut events = coordinator.events();
    let mut snapshots = WatchStream::new(coordinator.subscribe());
    let session_id = coordinator.begin().await?;
    info!("Scanning hands in session {}", session_id);

    loop {
        tokio::select! {
            Some(snapshot) = snapshots.next() => {
                match serde_json::to_string(&snapshot) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Could not serialize snapshot: {}", e),
                }
            }
            event = events.recv() => match event {
                Ok(ScanEvent::RevealAsset { asset }) => {
                    info!("Prediction ready: {}", asset.display());
                    break;
                }
                Ok(ScanEvent::SessionFailed { message }) => {
                    error!("Scan failed: {}", message);
                    break;
                }
                Ok(event) => info!("{:?}", event),
                Err(e) => {
                    warn!("Event stream closed: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    coordinator.stop().await?;
    let metrics = coordinator.metrics();
    info!(
        "{} frames analyzed, {} failures, avg {}us",
        metrics.frames_analyzed,
        metrics.analysis_failures,
        metrics.average_analysis_us()
    );
    Ok(())
}
