use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::detection::{DetectionPipeline, FrameSource, StreamHandle};
use crate::scan::{Observation, ScanSnapshot, ScanStateMachine, ScanStep};
use crate::session::event::{ScanEvent, SessionStatus};
use crate::session::metrics::PumpMetrics;

/// What a finished pump hands back to the coordinator.
pub(crate) struct SessionParts {
    pub machine: ScanStateMachine,
    pub source: Box<dyn FrameSource>,
    pub metrics: PumpMetrics,
}

pub(crate) struct Publishers {
    pub snapshot_tx: Arc<watch::Sender<ScanSnapshot>>,
    pub status_tx: Arc<watch::Sender<SessionStatus>>,
    pub event_tx: broadcast::Sender<ScanEvent>,
}

pub(crate) struct RevealSettings {
    pub delay: Duration,
    pub asset: PathBuf,
}

/// Acquires a frame, analyzes it, applies the observation, repeat.
///
/// Frame N+1 is only requested once frame N's observation has been applied.
/// Owns the state machine for the lifetime of the session.
pub(crate) struct FramePump {
    machine: ScanStateMachine,
    source: Box<dyn FrameSource>,
    handle: Option<StreamHandle>,
    detection: DetectionPipeline,
    publishers: Publishers,
    reveal: RevealSettings,
    pump_token: CancellationToken,
    session_token: CancellationToken,
    metrics: PumpMetrics,
}

impl FramePump {
    /// The pump's own token is a child of `session_token`: cancelling the
    /// session stops the pump, but the pump finishing leaves the session's
    /// pending reveal alone.
    pub fn new(
        machine: ScanStateMachine,
        source: Box<dyn FrameSource>,
        handle: StreamHandle,
        detection: DetectionPipeline,
        publishers: Publishers,
        reveal: RevealSettings,
        session_token: CancellationToken,
    ) -> Self {
        Self {
            machine,
            source,
            handle: Some(handle),
            detection,
            publishers,
            reveal,
            pump_token: session_token.child_token(),
            session_token,
            metrics: PumpMetrics::new(),
        }
    }

    pub fn pump_token(&self) -> CancellationToken {
        self.pump_token.clone()
    }

    pub async fn run(mut self) -> SessionParts {
        info!(
            "Frame pump started on {} source, threshold {}",
            self.source.name(),
            self.machine.threshold()
        );
        let token = self.pump_token.clone();

        loop {
            let frame = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                frame = self.source.next_frame() => frame,
            };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    self.fail(format!("Frame source failed: {}", e));
                    break;
                }
            };
            let sequence = frame.sequence();

            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                outcome = self.detection.analyze(frame) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                self.metrics.analyses_abandoned += 1;
                debug!("Abandoned analysis of frame {} on stop", sequence);
                break;
            };
            if token.is_cancelled() {
                self.metrics.late_results_discarded += 1;
                debug!("Discarded late result for frame {}", sequence);
                break;
            }

            let observation = match outcome {
                Ok(landmarks) => Observation::Hands(landmarks.hands_found()),
                Err(e) => {
                    warn!("Analysis of frame {} failed: {}", sequence, e);
                    let _ = self.publishers.event_tx.send(ScanEvent::AnalysisFailed {
                        message: e.to_string(),
                    });
                    Observation::AnalysisFailed
                }
            };
            self.metrics.record_analysis(started.elapsed(), observation);

            let confirmed = self.machine.observe(observation);
            let snapshot = self.machine.snapshot();
            self.publishers.snapshot_tx.send_replace(snapshot);
            debug!(
                frame = sequence,
                tally = snapshot.tally,
                step = snapshot.step.as_str(),
                "Observation applied"
            );

            if let Some(hand) = confirmed {
                info!("{} hand confirmed", hand.as_str());
                let _ = self.publishers.event_tx.send(ScanEvent::HandConfirmed {
                    hand,
                    step: snapshot.step,
                });
                if snapshot.step == ScanStep::Complete {
                    self.complete();
                    break;
                }
            }
        }

        self.release_source();
        self.publishers.status_tx.send_if_modified(|status| {
            if *status == SessionStatus::Scanning {
                *status = SessionStatus::Stopped;
                true
            } else {
                false
            }
        });
        info!(
            "Frame pump finished: {} frames analyzed, {} with hands, {} failures, avg {}us",
            self.metrics.frames_analyzed,
            self.metrics.frames_with_hands,
            self.metrics.analysis_failures,
            self.metrics.average_analysis_us()
        );

        SessionParts {
            machine: self.machine,
            source: self.source,
            metrics: self.metrics,
        }
    }

    fn complete(&mut self) {
        self.pump_token.cancel();
        self.release_source();
        self.schedule_reveal();
    }

    /// Stops the frame source. Only the first call reaches the source.
    fn release_source(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.source.stop(&handle);
            let _ = self.publishers.event_tx.send(ScanEvent::FrameSourceStopped);
        }
    }

    fn schedule_reveal(&self) {
        let delay = self.reveal.delay;
        let asset = self.reveal.asset.clone();
        let event_tx = self.publishers.event_tx.clone();
        let token = self.session_token.clone();

        tokio::spawn(
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => debug!("Reveal cancelled before it fired"),
                    _ = tokio::time::sleep(delay) => {
                        info!("Revealing {}", asset.display());
                        let _ = event_tx.send(ScanEvent::RevealAsset { asset });
                    }
                }
            }
            .instrument(Span::current()),
        );
    }

    fn fail(&mut self, reason: String) {
        error!("{}", reason);
        self.publishers
            .status_tx
            .send_replace(SessionStatus::Failed {
                reason: reason.clone(),
            });
        let _ = self
            .publishers
            .event_tx
            .send(ScanEvent::SessionFailed { message: reason });
    }
}
