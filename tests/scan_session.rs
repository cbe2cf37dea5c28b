use std::sync::Arc;
use std::time::Duration;

use handscan::config::Configuration;
use handscan::detection::{
    RandomDetector, ScriptStep, ScriptedDetector, SyntheticFrameSource,
};
use handscan::error::{AppError, DetectorError, SourceError};
use handscan::scan::{Hand, ScanSnapshot, ScanStep};
use handscan::session::{ScanCoordinator, ScanEvent, SessionStatus};
use tokio::sync::{broadcast, watch};

fn configuration() -> Configuration {
    let mut configuration = Configuration::default();
    configuration.camera.width = 16;
    configuration.camera.height = 16;
    configuration.reveal_delay_ms = 10;
    configuration
}

async fn wait_for_step(rx: &mut watch::Receiver<ScanSnapshot>, step: ScanStep) {
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| s.step == step))
        .await
        .expect("timed out waiting for step")
        .expect("snapshot channel closed");
}

async fn next_matching(
    events: &mut broadcast::Receiver<ScanEvent>,
    wanted: impl Fn(&ScanEvent) -> bool,
) -> ScanEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if wanted(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn interrupted_streak_needs_a_full_run_at_default_threshold() {
    let detector = Arc::new(
        ScriptedDetector::new()
            .then(ScriptStep::Hands(1), 29)
            .then(ScriptStep::Hands(0), 1)
            .then(ScriptStep::Hands(2), 30)
            .then(ScriptStep::Hands(0), 5),
    );
    let source = SyntheticFrameSource::new();
    let probe = source.probe();
    let mut coordinator = ScanCoordinator::builder(configuration())
        .frame_source(source)
        .detector(detector.clone())
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut events = coordinator.events();

    coordinator.begin().await.unwrap();
    let confirmed = next_matching(&mut events, |e| {
        matches!(e, ScanEvent::HandConfirmed { .. })
    })
    .await;
    assert_eq!(
        confirmed,
        ScanEvent::HandConfirmed {
            hand: Hand::Left,
            step: ScanStep::AwaitingRightHand
        }
    );

    let mut snapshots = coordinator.subscribe();
    snapshots
        .wait_for(|_| detector.analyses() >= 65)
        .await
        .unwrap();
    coordinator.stop().await.unwrap();

    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.step, ScanStep::AwaitingRightHand);
    assert!(snapshot.left_confirmed);
    assert!(!snapshot.right_confirmed);
    assert_eq!(probe.starts(), 1);
    assert_eq!(probe.releases(), 1);
}

#[tokio::test]
async fn simulated_session_completes_once_and_reveals() {
    let source = SyntheticFrameSource::new().with_frame_rate(500);
    let probe = source.probe();
    let mut coordinator = ScanCoordinator::builder(configuration())
        .detection_threshold(4)
        .reveal_asset("assets/result.mp4")
        .frame_source(source)
        .detector(Arc::new(RandomDetector::new(1.0, 0.0, 7)))
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut events = coordinator.events();
    let mut snapshots = coordinator.subscribe();

    let session_id = coordinator.begin().await.unwrap();
    assert_eq!(coordinator.session_id(), Some(session_id));
    assert_eq!(coordinator.current_status(), SessionStatus::Scanning);

    wait_for_step(&mut snapshots, ScanStep::Complete).await;
    let reveal = next_matching(&mut events, |e| {
        matches!(e, ScanEvent::RevealAsset { .. })
    })
    .await;
    assert_eq!(
        reveal,
        ScanEvent::RevealAsset {
            asset: "assets/result.mp4".into()
        }
    );

    coordinator.stop().await.unwrap();
    assert_eq!(probe.releases(), 1);
    assert_eq!(probe.frames_delivered(), 8);
    assert_eq!(coordinator.metrics().frames_analyzed, 8);
    assert_eq!(coordinator.current_status(), SessionStatus::Stopped);

    coordinator.reset().await.unwrap();
    assert_eq!(coordinator.snapshot(), ScanSnapshot::default());
    coordinator.begin().await.unwrap();
    assert_eq!(probe.starts(), 2);
    coordinator.reset().await.unwrap();
    assert_eq!(probe.releases(), 2);
}

#[tokio::test]
async fn analysis_timeout_resets_the_tally() {
    let detector = Arc::new(
        ScriptedDetector::new()
            .then(ScriptStep::Hands(1), 2)
            .then(ScriptStep::Stall, 1)
            .with_fallback(1),
    );
    let mut coordinator = ScanCoordinator::builder(configuration())
        .detection_threshold(3)
        .analysis_timeout(Some(Duration::from_millis(20)))
        .frame_source(SyntheticFrameSource::new())
        .detector(detector.clone())
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut events = coordinator.events();
    let mut snapshots = coordinator.subscribe();

    coordinator.begin().await.unwrap();
    let failed = next_matching(&mut events, |e| {
        matches!(e, ScanEvent::AnalysisFailed { .. })
    })
    .await;
    let ScanEvent::AnalysisFailed { message } = failed else {
        unreachable!();
    };
    assert!(message.contains("timed out"));

    wait_for_step(&mut snapshots, ScanStep::Complete).await;
    coordinator.stop().await.unwrap();

    // 2 counted, 1 timed out, then 3 + 3 uninterrupted frames
    assert_eq!(detector.analyses(), 9);
    assert_eq!(coordinator.metrics().analysis_failures, 1);
    assert_eq!(coordinator.metrics().frames_with_hands, 8);
}

#[tokio::test]
async fn analysis_errors_never_halt_the_scan() {
    let detector = Arc::new(
        ScriptedDetector::new()
            .then(ScriptStep::Fail("bad tensor".into()), 3)
            .with_fallback(1),
    );
    let mut coordinator = ScanCoordinator::builder(configuration())
        .detection_threshold(2)
        .frame_source(SyntheticFrameSource::new())
        .detector(detector)
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut snapshots = coordinator.subscribe();

    coordinator.begin().await.unwrap();
    wait_for_step(&mut snapshots, ScanStep::Complete).await;
    coordinator.stop().await.unwrap();

    assert_eq!(coordinator.metrics().analysis_failures, 3);
    assert_eq!(coordinator.metrics().frames_analyzed, 7);
    assert!(!coordinator.current_status().is_failed());
}

#[tokio::test]
async fn denied_camera_is_reported_without_retry() {
    let source = SyntheticFrameSource::new().deny_permission();
    let probe = source.probe();
    let mut coordinator = ScanCoordinator::builder(configuration())
        .frame_source(source)
        .detector(Arc::new(ScriptedDetector::new()))
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut status = coordinator.status();

    let err = coordinator.begin().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Source(SourceError::PermissionDenied(_))
    ));
    assert!(status.borrow_and_update().is_failed());
    assert_eq!(coordinator.snapshot().step, ScanStep::Idle);
    assert_eq!(probe.starts(), 0);
    assert_eq!(probe.releases(), 0);
    assert!(coordinator.session_id().is_none());
}

#[tokio::test]
async fn begin_requires_a_loaded_detector() {
    let mut coordinator = ScanCoordinator::builder(configuration())
        .frame_source(SyntheticFrameSource::new())
        .detector(Arc::new(
            RandomDetector::new(1.0, 0.0, 1).with_load_delay(Duration::from_millis(5)),
        ))
        .build()
        .unwrap();

    assert!(matches!(
        coordinator.begin().await,
        Err(AppError::Detector(DetectorError::NotReady))
    ));
    coordinator.prepare().await.unwrap();
    assert_eq!(coordinator.current_status(), SessionStatus::Ready);
    coordinator.begin().await.unwrap();
    coordinator.stop().await.unwrap();
}

#[tokio::test]
async fn reset_while_scanning_returns_to_idle() {
    let detector = Arc::new(ScriptedDetector::new().with_fallback(1));
    let source = SyntheticFrameSource::new().with_frame_rate(200);
    let probe = source.probe();
    let mut coordinator = ScanCoordinator::builder(configuration())
        .frame_source(source)
        .detector(detector)
        .build()
        .unwrap();
    coordinator.prepare().await.unwrap();
    let mut snapshots = coordinator.subscribe();

    coordinator.begin().await.unwrap();
    snapshots.wait_for(|s| s.tally >= 2).await.unwrap();
    coordinator.reset().await.unwrap();

    assert_eq!(coordinator.snapshot(), ScanSnapshot::default());
    assert_eq!(coordinator.current_status(), SessionStatus::Ready);
    assert!(!coordinator.is_running());
    assert_eq!(probe.releases(), 1);

    // resetting an idle scan is harmless
    coordinator.reset().await.unwrap();
    assert_eq!(probe.releases(), 1);
}
