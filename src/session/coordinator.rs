use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::config::Configuration;
use crate::detection::{DetectionPipeline, FrameSource, LandmarkDetector};
use crate::error::{AppError, DetectorError};
use crate::scan::{ScanSnapshot, ScanStateMachine, ScanStep};
use crate::session::event::{ScanEvent, SessionStatus};
use crate::session::metrics::PumpMetrics;
use crate::session::pump::{FramePump, Publishers, RevealSettings, SessionParts};

struct RunningSession {
    id: Uuid,
    session_token: CancellationToken,
    pump_token: CancellationToken,
    pump_task: Option<JoinHandle<SessionParts>>,
}

/// Entry point for the UI and navigation layer.
///
/// Owns the collaborators between sessions and hands the state machine to the
/// frame pump while a scan runs. Display state is published through
/// [`ScanCoordinator::subscribe`], never shared mutably.
pub struct ScanCoordinator {
    configuration: Configuration,
    threshold: NonZeroU32,
    detector: Arc<dyn LandmarkDetector>,
    source: Option<Box<dyn FrameSource>>,
    machine: Option<ScanStateMachine>,
    snapshot_tx: Arc<watch::Sender<ScanSnapshot>>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    event_tx: broadcast::Sender<ScanEvent>,
    session: Option<RunningSession>,
    last_metrics: PumpMetrics,
}

impl ScanCoordinator {
    pub fn builder(configuration: Configuration) -> ScanCoordinatorBuilder {
        ScanCoordinatorBuilder::new(configuration)
    }

    fn new(
        configuration: Configuration,
        source: Box<dyn FrameSource>,
        detector: Arc<dyn LandmarkDetector>,
    ) -> Result<Self, AppError> {
        configuration.validate()?;
        let threshold = configuration.threshold()?;
        let machine = ScanStateMachine::new(threshold);
        let status = if detector.is_ready() {
            SessionStatus::Ready
        } else {
            SessionStatus::NotReady
        };
        let (snapshot_tx, _) = watch::channel(machine.snapshot());
        let (status_tx, _) = watch::channel(status);
        let (event_tx, _) = broadcast::channel(configuration.event_buffer_size);

        Ok(Self {
            configuration,
            threshold,
            detector,
            source: Some(source),
            machine: Some(machine),
            snapshot_tx: Arc::new(snapshot_tx),
            status_tx: Arc::new(status_tx),
            event_tx,
            session: None,
            last_metrics: PumpMetrics::new(),
        })
    }

    /// Loads the landmark detector. Until this completes the coordinator
    /// reports [`SessionStatus::NotReady`] and `begin` is refused.
    pub async fn prepare(&mut self) -> Result<(), AppError> {
        if self.detector.is_ready() {
            self.mark_ready();
            return Ok(());
        }

        info!("Loading {} landmark detector", self.detector.name());
        match self.detector.load().await {
            Ok(()) => {
                info!("Landmark detector ready");
                self.mark_ready();
                Ok(())
            }
            Err(e) => {
                error!("Landmark detector failed to load: {}", e);
                self.status_tx.send_replace(SessionStatus::Failed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    /// Starts the camera and the frame pump, moving the scan to
    /// `AwaitingLeftHand`.
    pub async fn begin(&mut self) -> Result<Uuid, AppError> {
        if !self.detector.is_ready() {
            return Err(DetectorError::NotReady.into());
        }
        if self.is_running() {
            return Err(AppError::AlreadyRunning);
        }
        self.reclaim().await?;

        let step = self.machine_mut().step();
        if step != ScanStep::Idle {
            return Err(AppError::NotIdle(step));
        }

        self.detector.configure(&self.configuration.detector)?;

        let mut source = self
            .source
            .take()
            .ok_or(AppError::MissingComponent("frame source"))?;
        let handle = match source.start(&self.configuration.camera).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Could not start {} frame source: {}", source.name(), e);
                self.source = Some(source);
                self.status_tx.send_replace(SessionStatus::Failed {
                    reason: e.to_string(),
                });
                let _ = self.event_tx.send(ScanEvent::SessionFailed {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let threshold = self.threshold;
        let mut machine = self
            .machine
            .take()
            .unwrap_or_else(|| ScanStateMachine::new(threshold));
        machine.begin();
        self.snapshot_tx.send_replace(machine.snapshot());

        let session_id = Uuid::new_v4();
        let session_token = CancellationToken::new();
        let pump = FramePump::new(
            machine,
            source,
            handle,
            DetectionPipeline::new(self.detector.clone(), self.configuration.analysis_timeout()),
            self.publishers(),
            RevealSettings {
                delay: self.configuration.reveal_delay(),
                asset: self.configuration.reveal_asset.clone(),
            },
            session_token.clone(),
        );
        let pump_token = pump.pump_token();

        self.status_tx.send_replace(SessionStatus::Scanning);
        let _ = self.event_tx.send(ScanEvent::SessionStarted { session_id });
        info!("Scan session {} started", session_id);

        let span = info_span!("scan_session", %session_id);
        let pump_task = tokio::spawn(pump.run().instrument(span));
        self.session = Some(RunningSession {
            id: session_id,
            session_token,
            pump_token,
            pump_task: Some(pump_task),
        });
        Ok(session_id)
    }

    /// Stops the camera and the pump. Observations still in flight are
    /// dropped. Safe to call repeatedly.
    pub async fn stop(&mut self) -> Result<(), AppError> {
        if let Some(session) = &self.session {
            session.pump_token.cancel();
        }
        self.reclaim().await
    }

    /// Returns the scan to `Idle` from any step, stopping a running pump and
    /// cancelling a pending reveal.
    pub async fn reset(&mut self) -> Result<(), AppError> {
        let reclaimed = match self.session.take() {
            Some(mut session) => {
                session.session_token.cancel();
                match session.pump_task.take() {
                    Some(task) => self.join(task).await,
                    None => Ok(()),
                }
            }
            None => Ok(()),
        };

        self.machine_mut().reset();
        let snapshot = self.machine_mut().snapshot();
        self.snapshot_tx.send_replace(snapshot);
        if self.detector.is_ready() {
            self.status_tx.send_replace(SessionStatus::Ready);
        } else {
            self.status_tx.send_replace(SessionStatus::NotReady);
        }
        let _ = self.event_tx.send(ScanEvent::Reset);
        reclaimed
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn current_status(&self) -> SessionStatus {
        self.status_tx.borrow().clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        *self.snapshot_tx.borrow()
    }

    /// Counters from the most recently finished pump.
    pub fn metrics(&self) -> &PumpMetrics {
        &self.last_metrics
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.id)
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|session| session.pump_task.as_ref())
            .is_some_and(|task| !task.is_finished())
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn publishers(&self) -> Publishers {
        Publishers {
            snapshot_tx: self.snapshot_tx.clone(),
            status_tx: self.status_tx.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    fn mark_ready(&self) {
        self.status_tx.send_if_modified(|status| {
            if *status == SessionStatus::NotReady || status.is_failed() {
                *status = SessionStatus::Ready;
                true
            } else {
                false
            }
        });
    }

    fn machine_mut(&mut self) -> &mut ScanStateMachine {
        let threshold = self.threshold;
        self.machine
            .get_or_insert_with(|| ScanStateMachine::new(threshold))
    }

    /// Waits for a finished or cancelled pump and takes its parts back.
    async fn reclaim(&mut self) -> Result<(), AppError> {
        let task = self
            .session
            .as_mut()
            .and_then(|session| session.pump_task.take());
        match task {
            Some(task) => self.join(task).await,
            None => Ok(()),
        }
    }

    async fn join(&mut self, task: JoinHandle<SessionParts>) -> Result<(), AppError> {
        match task.await {
            Ok(parts) => {
                self.machine = Some(parts.machine);
                self.source = Some(parts.source);
                self.last_metrics = parts.metrics;
                Ok(())
            }
            Err(e) => {
                error!("Frame pump task failed: {}", e);
                self.status_tx.send_replace(SessionStatus::Failed {
                    reason: e.to_string(),
                });
                Err(AppError::Pump(e.to_string()))
            }
        }
    }
}

impl Drop for ScanCoordinator {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.session_token.cancel();
        }
    }
}

pub struct ScanCoordinatorBuilder {
    configuration: Configuration,
    source: Option<Box<dyn FrameSource>>,
    detector: Option<Arc<dyn LandmarkDetector>>,
}

impl ScanCoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            source: None,
            detector: None,
        }
    }

    // Overrides the configured detection threshold.
    pub fn detection_threshold(mut self, frames: u32) -> Self {
        self.configuration.detection_threshold = frames;
        self
    }

    // Overrides the delay between completion and the reveal event.
    pub fn reveal_delay(mut self, delay: Duration) -> Self {
        self.configuration.reveal_delay_ms = delay.as_millis() as u64;
        self
    }

    // `None` disables the per-frame analysis timeout.
    pub fn analysis_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.configuration.analysis_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.configuration.event_buffer_size = size;
        self
    }

    pub fn reveal_asset(mut self, asset: impl Into<PathBuf>) -> Self {
        self.configuration.reveal_asset = asset.into();
        self
    }

    pub fn frame_source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn detector<D: LandmarkDetector + 'static>(mut self, detector: Arc<D>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> Result<ScanCoordinator, AppError> {
        let source = self
            .source
            .ok_or(AppError::MissingComponent("frame source"))?;
        let detector = self
            .detector
            .ok_or(AppError::MissingComponent("landmark detector"))?;
        ScanCoordinator::new(self.configuration, source, detector)
    }
}
