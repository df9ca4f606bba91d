use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use facet_core::{AnalysisOutcome, Analyzer, LandmarkSet};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analysis task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("engine shut down")]
    Closed(#[from] tokio::sync::AcquireError),
}

/// Clone-safe handle that runs analyses on the blocking pool.
///
/// At most `max_concurrent` analyses run at once. A run abandoned by the
/// oracle timeout keeps its slot until it actually finishes.
#[derive(Clone)]
pub struct EngineHandle {
    analyzer: Analyzer,
    oracle_timeout: Duration,
    slots: Arc<Semaphore>,
}

impl EngineHandle {
    pub fn new(analyzer: Analyzer, oracle_timeout: Duration, max_concurrent: usize) -> Self {
        Self { analyzer, oracle_timeout, slots: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Read the image at `image_path` and analyse it.
    ///
    /// When oracles are loaded the run is bounded by the oracle timeout; on
    /// expiry the request is re-run on the heuristic path and that result is
    /// returned. The timed-out task is left to finish in the background.
    pub async fn analyze(
        &self,
        image_path: PathBuf,
        faces: Option<Vec<LandmarkSet>>,
    ) -> Result<AnalysisOutcome, EngineError> {
        let bytes = match tokio::fs::read(&image_path).await {
            Ok(b) => Arc::new(b),
            Err(e) => {
                tracing::warn!(path = %image_path.display(), error = %e, "cannot read image");
                return Ok(AnalysisOutcome::Error {
                    error: format!("internal error: cannot read {}: {e}", image_path.display()),
                });
            }
        };

        if self.analyzer.registry().loaded().is_empty() {
            return Ok(self.spawn(self.analyzer.clone(), bytes, faces).await?.await?);
        }

        // The budget starts once a slot is held, so queueing does not count against it.
        let primary = self.spawn(self.analyzer.clone(), bytes.clone(), faces.clone()).await?;
        match tokio::time::timeout(self.oracle_timeout, primary).await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.oracle_timeout.as_millis() as u64,
                    path = %image_path.display(),
                    "oracle analysis timed out; falling back to heuristics"
                );
                Ok(self.spawn(self.analyzer.without_oracles(), bytes, faces).await?.await?)
            }
        }
    }

    /// Number of analyses that could start right now.
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a slot, then start the analysis on the blocking pool. The
    /// slot is released when the blocking task returns, even if nobody is
    /// waiting on it any more.
    async fn spawn(
        &self,
        analyzer: Analyzer,
        bytes: Arc<Vec<u8>>,
        faces: Option<Vec<LandmarkSet>>,
    ) -> Result<JoinHandle<AnalysisOutcome>, EngineError> {
        let slot = self.slots.clone().acquire_owned().await?;
        Ok(tokio::task::spawn_blocking(move || {
            let _slot = slot;
            analyzer.analyze_upload(&bytes, faces)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_core::oracle::{FaceShapeOracle, ShapePrediction};
    use facet_core::{AnalyzerConfig, FaceShape, Landmark, ModelRegistry, OracleError};
    use image::RgbImage;

    struct SlowShapeOracle(Duration);

    impl FaceShapeOracle for SlowShapeOracle {
        fn predict(&self, _: &RgbImage) -> Result<ShapePrediction, OracleError> {
            std::thread::sleep(self.0);
            Ok(ShapePrediction { shape: FaceShape::Heart, confidence: 0.99 })
        }
    }

    fn write_frame(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("facetd-{name}-{}.png", uuid::Uuid::new_v4()));
        RgbImage::from_pixel(64, 64, image::Rgb([200, 160, 130])).save(&path).unwrap();
        path
    }

    fn flat_face() -> Vec<LandmarkSet> {
        vec![LandmarkSet::new(vec![Landmark::new(0.5, 0.5); 478])]
    }

    fn engine(oracle_delay: Duration, timeout: Duration) -> EngineHandle {
        engine_with_slots(oracle_delay, timeout, 4)
    }

    fn engine_with_slots(oracle_delay: Duration, timeout: Duration, slots: usize) -> EngineHandle {
        let registry = ModelRegistry::empty().with_face_shape(Arc::new(SlowShapeOracle(oracle_delay)));
        EngineHandle::new(Analyzer::new(AnalyzerConfig::default(), registry), timeout, slots)
    }

    #[tokio::test]
    async fn test_oracle_result_within_budget() {
        let path = write_frame("fast");
        let outcome = engine(Duration::ZERO, Duration::from_secs(30)).analyze(path.clone(), Some(flat_face())).await;
        let _ = std::fs::remove_file(&path);
        let report = outcome.unwrap().report().cloned().expect("report");
        assert_eq!(report.face_shape, FaceShape::Heart);
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_heuristics() {
        let path = write_frame("slow");
        let outcome = engine(Duration::from_millis(500), Duration::from_millis(20))
            .analyze(path.clone(), Some(flat_face()))
            .await;
        let _ = std::fs::remove_file(&path);
        let report = outcome.unwrap().report().cloned().expect("report");
        assert_ne!(report.face_shape, FaceShape::Heart);
    }

    #[tokio::test]
    async fn test_timed_out_run_holds_its_slot() {
        let path = write_frame("held");
        let engine = engine_with_slots(Duration::from_millis(400), Duration::from_millis(20), 1);
        let start = std::time::Instant::now();
        let outcome = engine.analyze(path.clone(), Some(flat_face())).await;
        let elapsed = start.elapsed();
        let _ = std::fs::remove_file(&path);

        let report = outcome.unwrap().report().cloned().expect("report");
        assert_ne!(report.face_shape, FaceShape::Heart);
        // The fallback could only start once the abandoned run released the single slot.
        assert!(elapsed >= Duration::from_millis(350), "fallback started after {elapsed:?}");
        assert_eq!(engine.free_slots(), 1);
    }

    #[tokio::test]
    async fn test_zero_slots_still_runs() {
        let path = write_frame("zero");
        let engine = engine_with_slots(Duration::ZERO, Duration::from_secs(30), 0);
        assert_eq!(engine.free_slots(), 1);
        let outcome = engine.analyze(path.clone(), Some(flat_face())).await;
        let _ = std::fs::remove_file(&path);
        assert!(outcome.unwrap().report().is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_error_payload() {
        let outcome = engine(Duration::ZERO, Duration::from_secs(1))
            .analyze(PathBuf::from("/nonexistent/face.png"), None)
            .await
            .unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Error { ref error } if error.contains("cannot read")));
    }

    #[tokio::test]
    async fn test_no_face_payload() {
        let path = write_frame("empty");
        let outcome = engine(Duration::ZERO, Duration::from_secs(1)).analyze(path.clone(), Some(Vec::new())).await;
        let _ = std::fs::remove_file(&path);
        assert_eq!(
            outcome.unwrap(),
            AnalysisOutcome::Error { error: facet_core::pipeline::NO_FACE_MESSAGE.to_string() }
        );
    }
}
