use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::util::BoxService;
use tower::{BoxError, Service, ServiceBuilder, ServiceExt};

use crate::common::{Frame, HandLandmarks};
use crate::detection::detector::LandmarkDetector;
use crate::error::DetectorError;

/// Adapts a [`LandmarkDetector`] to a tower service so layers such as a
/// timeout can wrap analysis.
#[derive(Clone)]
pub struct DetectionService {
    inner: Arc<dyn LandmarkDetector>,
}

impl DetectionService {
    pub fn new(inner: Arc<dyn LandmarkDetector>) -> Self {
        Self { inner }
    }
}

impl Service<Frame> for DetectionService {
    type Response = HandLandmarks;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, frame: Frame) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move { inner.analyze(&frame).await.map_err(BoxError::from) })
    }
}

/// The layered detection stack the frame pump calls once per frame.
pub struct DetectionPipeline {
    service: BoxService<Frame, HandLandmarks, BoxError>,
    analysis_timeout: Option<Duration>,
}

impl DetectionPipeline {
    pub fn new(detector: Arc<dyn LandmarkDetector>, analysis_timeout: Option<Duration>) -> Self {
        let service = ServiceBuilder::new()
            .option_layer(analysis_timeout.map(TimeoutLayer::new))
            .service(DetectionService::new(detector));

        Self {
            service: BoxService::new(service),
            analysis_timeout,
        }
    }

    pub async fn analyze(&mut self, frame: Frame) -> Result<HandLandmarks, DetectorError> {
        let result = match self.service.ready().await {
            Ok(service) => service.call(frame).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.classify(e))
    }

    fn classify(&self, error: BoxError) -> DetectorError {
        if error.is::<Elapsed>() {
            return DetectorError::Timeout(self.analysis_timeout.unwrap_or_default());
        }
        match error.downcast::<DetectorError>() {
            Ok(detector_error) => *detector_error,
            Err(other) => DetectorError::Analysis(other.to_string()),
        }
    }
}
