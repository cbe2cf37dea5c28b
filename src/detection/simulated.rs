// Stand-in collaborators for running a scan without a camera or model.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::common::{Frame, HandKeypoints, HandLandmarks};
use crate::detection::detector::{DetectorSettings, LandmarkDetector};
use crate::detection::source::{FrameConstraints, FrameSource, StreamHandle};
use crate::error::{DetectorError, SourceError};

/// Counters shared with a [`SyntheticFrameSource`] after it has been moved
/// into a session.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    starts: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    frames_delivered: Arc<AtomicU64>,
}

impl SourceProbe {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Times a running stream was actually released.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::SeqCst)
    }
}

/// Produces blank frames, optionally paced at a fixed frame rate.
pub struct SyntheticFrameSource {
    frame_rate: Option<u32>,
    permission_granted: bool,
    disconnect_after: Option<u64>,
    stream: Option<StreamHandle>,
    image: Option<Arc<DynamicImage>>,
    ticker: Option<Interval>,
    sequence: u64,
    current: Option<Frame>,
    probe: SourceProbe,
}

impl SyntheticFrameSource {
    pub fn new() -> Self {
        Self {
            frame_rate: None,
            permission_granted: true,
            disconnect_after: None,
            stream: None,
            image: None,
            ticker: None,
            sequence: 0,
            current: None,
            probe: SourceProbe::default(),
        }
    }

    /// Paces frames at `fps`. Without it frames are produced as fast as they
    /// are requested.
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = (fps > 0).then_some(fps);
        self
    }

    /// Makes `start` fail as if the user refused camera access.
    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Makes `next_frame` fail once `frames` frames have been delivered.
    pub fn disconnect_after(mut self, frames: u64) -> Self {
        self.disconnect_after = Some(frames);
        self
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn start(
        &mut self,
        constraints: &FrameConstraints,
    ) -> Result<StreamHandle, SourceError> {
        if !self.permission_granted {
            return Err(SourceError::PermissionDenied(
                "camera permission was not granted".to_string(),
            ));
        }

        let handle = StreamHandle::new();
        self.image = Some(Arc::new(DynamicImage::new_rgb8(
            constraints.width,
            constraints.height,
        )));
        self.ticker = self.frame_rate.map(|fps| {
            let mut ticker = tokio::time::interval(Duration::from_secs(1) / fps);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        self.sequence = 0;
        self.current = None;
        self.stream = Some(handle.clone());
        self.probe.starts.fetch_add(1, Ordering::SeqCst);

        info!(
            "Synthetic camera {:?} started at {}x{}",
            handle.id, constraints.width, constraints.height
        );
        Ok(handle)
    }

    async fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let (stream_id, image) = match (&self.stream, &self.image) {
            (Some(stream), Some(image)) => (stream.id, image.clone()),
            _ => return Err(SourceError::NotStarted),
        };

        if let Some(limit) = self.disconnect_after {
            if self.sequence >= limit {
                return Err(SourceError::Disconnected(format!(
                    "camera went away after {} frames",
                    limit
                )));
            }
        }

        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        let frame = Frame::from_shared(stream_id, self.sequence, image, Utc::now());
        self.sequence += 1;
        self.current = Some(frame.clone());
        self.probe.frames_delivered.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    fn current_frame(&self) -> Option<Frame> {
        self.current.clone()
    }

    fn stop(&mut self, handle: &StreamHandle) {
        match &self.stream {
            Some(stream) if stream.id == handle.id => {
                self.stream = None;
                self.ticker = None;
                self.current = None;
                self.probe.releases.fetch_add(1, Ordering::SeqCst);
                info!(
                    "Synthetic camera {:?} stopped after {} frames",
                    handle.id, self.sequence
                );
            }
            _ => debug!("Synthetic camera {:?} already stopped", handle.id),
        }
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

/// One scripted analysis outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Hands(usize),
    Fail(String),
    /// Never completes, like an analysis still in flight.
    Stall,
}

/// Plays back a fixed list of outcomes, then reports `fallback_hands`.
pub struct ScriptedDetector {
    script: Mutex<VecDeque<ScriptStep>>,
    fallback_hands: usize,
    load_error: Option<String>,
    ready: AtomicBool,
    settings: Mutex<DetectorSettings>,
    analyses: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback_hands: 0,
            load_error: None,
            ready: AtomicBool::new(false),
            settings: Mutex::new(DetectorSettings::default()),
            analyses: AtomicUsize::new(0),
        }
    }

    /// Appends `step` to the script `times` times.
    pub fn then(self, step: ScriptStep, times: usize) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(std::iter::repeat(step).take(times));
        }
        self
    }

    pub fn with_fallback(mut self, hands: usize) -> Self {
        self.fallback_hands = hands;
        self
    }

    pub fn failing_load(mut self, reason: impl Into<String>) -> Self {
        self.load_error = Some(reason.into());
        self
    }

    pub fn analyses(&self) -> usize {
        self.analyses.load(Ordering::SeqCst)
    }

    pub fn settings(&self) -> DetectorSettings {
        self.settings
            .lock()
            .map(|settings| settings.clone())
            .unwrap_or_default()
    }

    fn max_hands(&self) -> usize {
        usize::from(self.settings().max_hands)
    }
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LandmarkDetector for ScriptedDetector {
    async fn load(&self) -> Result<(), DetectorError> {
        if let Some(reason) = &self.load_error {
            return Err(DetectorError::LoadFailed(reason.clone()));
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn configure(&self, settings: &DetectorSettings) -> Result<(), DetectorError> {
        let mut current = self
            .settings
            .lock()
            .map_err(|e| DetectorError::Analysis(e.to_string()))?;
        *current = settings.clone();
        Ok(())
    }

    async fn analyze(&self, _frame: &Frame) -> Result<HandLandmarks, DetectorError> {
        if !self.is_ready() {
            return Err(DetectorError::NotReady);
        }
        self.analyses.fetch_add(1, Ordering::SeqCst);

        let step = self
            .script
            .lock()
            .map_err(|e| DetectorError::Analysis(e.to_string()))?
            .pop_front();

        let hands = match step {
            Some(ScriptStep::Hands(count)) => count,
            Some(ScriptStep::Fail(reason)) => return Err(DetectorError::Analysis(reason)),
            Some(ScriptStep::Stall) => return futures::future::pending().await,
            None => self.fallback_hands,
        };

        let hands = hands.min(self.max_hands());
        Ok(HandLandmarks::new(
            (0..hands)
                .map(|i| HandKeypoints::uniform(0.25 + 0.5 * i as f32, 0.5))
                .collect(),
        ))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Reports hands at random with a fixed probability per frame.
pub struct RandomDetector {
    rng: Mutex<StdRng>,
    hand_presence: f64,
    failure_rate: f64,
    load_delay: Duration,
    ready: AtomicBool,
    max_hands: AtomicUsize,
}

impl RandomDetector {
    pub fn new(hand_presence: f64, failure_rate: f64, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            hand_presence: hand_presence.clamp(0.0, 1.0),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            load_delay: Duration::ZERO,
            ready: AtomicBool::new(false),
            max_hands: AtomicUsize::new(2),
        }
    }

    /// Simulates the time spent fetching and compiling the model.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

#[async_trait]
impl LandmarkDetector for RandomDetector {
    async fn load(&self) -> Result<(), DetectorError> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        self.ready.store(true, Ordering::SeqCst);
        info!("Random landmark detector loaded");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn configure(&self, settings: &DetectorSettings) -> Result<(), DetectorError> {
        self.max_hands
            .store(usize::from(settings.max_hands.max(1)), Ordering::SeqCst);
        Ok(())
    }

    async fn analyze(&self, _frame: &Frame) -> Result<HandLandmarks, DetectorError> {
        if !self.is_ready() {
            return Err(DetectorError::NotReady);
        }

        let mut rng = self
            .rng
            .lock()
            .map_err(|e| DetectorError::Analysis(e.to_string()))?;

        if rng.random_bool(self.failure_rate) {
            return Err(DetectorError::Analysis("simulated inference fault".into()));
        }
        if !rng.random_bool(self.hand_presence) {
            return Ok(HandLandmarks::empty());
        }

        let max_hands = self.max_hands.load(Ordering::SeqCst);
        let count = rng.random_range(1..=max_hands);
        let hands = (0..count)
            .map(|_| HandKeypoints::uniform(rng.random(), rng.random()).with_score(0.9))
            .collect();
        Ok(HandLandmarks::new(hands))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> FrameConstraints {
        FrameConstraints {
            width: 8,
            height: 8,
            ..FrameConstraints::default()
        }
    }

    fn test_frame() -> Frame {
        Frame::new(uuid::Uuid::new_v4(), 0, DynamicImage::new_rgb8(2, 2), Utc::now())
    }

    #[tokio::test]
    async fn denied_permission_fails_start() {
        let mut source = SyntheticFrameSource::new().deny_permission();
        let err = source.start(&small()).await.unwrap_err();
        assert!(matches!(err, SourceError::PermissionDenied(_)));
        assert_eq!(source.probe().starts(), 0);
    }

    #[tokio::test]
    async fn frames_are_sequenced_and_current_frame_tracks_latest() {
        let mut source = SyntheticFrameSource::new();
        assert!(matches!(
            source.next_frame().await,
            Err(SourceError::NotStarted)
        ));

        let handle = source.start(&small()).await.unwrap();
        for expected in 0..3 {
            let frame = source.next_frame().await.unwrap();
            assert_eq!(frame.sequence(), expected);
            assert_eq!(frame.stream_id(), handle.id);
        }
        assert_eq!(source.current_frame().map(|f| f.sequence()), Some(2));
        assert_eq!(source.probe().frames_delivered(), 3);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut source = SyntheticFrameSource::new();
        let probe = source.probe();
        let handle = source.start(&small()).await.unwrap();
        source.stop(&handle);
        source.stop(&handle);
        assert_eq!(probe.releases(), 1);
        assert!(source.current_frame().is_none());
        assert!(source.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn disconnect_after_limit() {
        let mut source = SyntheticFrameSource::new().disconnect_after(2);
        source.start(&small()).await.unwrap();
        assert!(source.next_frame().await.is_ok());
        assert!(source.next_frame().await.is_ok());
        assert!(matches!(
            source.next_frame().await,
            Err(SourceError::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn scripted_detector_plays_back_then_falls_back() {
        let detector = ScriptedDetector::new()
            .then(ScriptStep::Hands(1), 2)
            .then(ScriptStep::Fail("blurry".into()), 1)
            .with_fallback(3);
        let frame = test_frame();

        assert_eq!(
            detector.analyze(&frame).await,
            Err(DetectorError::NotReady)
        );
        detector.load().await.unwrap();

        assert_eq!(detector.analyze(&frame).await.unwrap().hands_found(), 1);
        assert_eq!(detector.analyze(&frame).await.unwrap().hands_found(), 1);
        assert!(detector.analyze(&frame).await.is_err());
        // fallback is capped by max_hands
        assert_eq!(detector.analyze(&frame).await.unwrap().hands_found(), 2);

        detector
            .configure(&DetectorSettings {
                max_hands: 1,
                ..DetectorSettings::default()
            })
            .unwrap();
        assert_eq!(detector.analyze(&frame).await.unwrap().hands_found(), 1);
    }

    #[tokio::test]
    async fn random_detector_is_deterministic_per_seed() {
        let frame = test_frame();
        let a = RandomDetector::new(0.6, 0.1, 7);
        let b = RandomDetector::new(0.6, 0.1, 7);
        a.load().await.unwrap();
        b.load().await.unwrap();

        for _ in 0..50 {
            let left = a.analyze(&frame).await.map(|l| l.hands_found());
            let right = b.analyze(&frame).await.map(|l| l.hands_found());
            assert_eq!(left, right);
            if let Ok(count) = left {
                assert!(count <= 2);
            }
        }
    }
}
