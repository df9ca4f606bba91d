//! End-to-end analysis: landmarks and pixels in, report out.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chat::ChatContext;
use crate::color::{self, ColorProfile};
use crate::config::AnalyzerConfig;
use crate::face_shape::{self, FaceShape};
use crate::gender::{self, Gender};
use crate::landmarks::MESH_POINTS;
use crate::menu::{EmbeddedMenu, ServiceMenu};
use crate::mesh::LandmarkDetector;
use crate::oracle::{ModelRegistry, OracleError};
use crate::recommend::{self, Consultation};
use crate::shades::{self, FoundationMatch};
use crate::skin::{self, SkinScores};
use crate::types::LandmarkSet;

pub const NO_FACE_MESSAGE: &str = "No face detected. Please upload a clear face image.";

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("too few landmarks: need {required}, got {actual}")]
    TooFewLandmarks { required: usize, actual: usize },
    #[error("frame has no pixels ({width}x{height})")]
    DimensionMismatch { width: u32, height: u32 },
    #[error("landmark detector unavailable")]
    DetectorUnavailable,
    #[error("landmark detection failed: {0}")]
    Detector(#[from] OracleError),
}

/// Full result of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub face_shape: FaceShape,
    pub confidence: f32,
    pub gender: Gender,
    pub skin_analysis: SkinScores,
    pub color_analysis: ColorProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foundation: Option<FoundationMatch>,
    pub recommendations: Vec<String>,
}

/// Request-boundary payload: either a report or `{ "error": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Report(Box<AnalysisReport>),
    Error { error: String },
}

impl AnalysisOutcome {
    /// Maps a pipeline result onto the payload callers see. "No face" gets
    /// the friendly message; anything else is reported as an internal error.
    pub fn from_result(result: Result<AnalysisReport, AnalysisError>) -> Self {
        match result {
            Ok(report) => Self::Report(Box::new(report)),
            Err(AnalysisError::NoFaceDetected) => Self::Error { error: NO_FACE_MESSAGE.to_string() },
            Err(e) => Self::Error { error: format!("internal error: {e}") },
        }
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            Self::Report(r) => Some(r),
            Self::Error { .. } => None,
        }
    }
}

impl From<&AnalysisReport> for ChatContext {
    fn from(r: &AnalysisReport) -> Self {
        ChatContext {
            gender: Some(r.gender),
            face_shape: Some(r.face_shape),
            skin: Some(r.skin_analysis),
            skin_tone: Some(r.color_analysis.skin_tone),
            eye_color: Some(r.color_analysis.eye_color),
        }
    }
}

/// Owns the tuning, the oracles and the collaborators for a run of analyses.
/// Cheap to clone; safe to share across threads.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    registry: ModelRegistry,
    menu: Arc<dyn ServiceMenu>,
    detector: Option<Arc<dyn LandmarkDetector>>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("registry", &self.registry)
            .field("detector", &self.detector.is_some())
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig, registry: ModelRegistry) -> Self {
        Self { config: Arc::new(config), registry, menu: Arc::new(EmbeddedMenu), detector: None }
    }

    pub fn with_detector(mut self, detector: Arc<dyn LandmarkDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_menu(mut self, menu: Arc<dyn ServiceMenu>) -> Self {
        self.menu = menu;
        self
    }

    /// Same tuning and collaborators, no oracles.
    pub fn without_oracles(&self) -> Self {
        Self { registry: ModelRegistry::empty(), ..self.clone() }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn menu(&self) -> &Arc<dyn ServiceMenu> {
        &self.menu
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    /// Analyse the first face among `faces`. An empty slice is "no face" and
    /// nothing downstream runs.
    pub fn analyze(&self, image: &RgbImage, faces: &[LandmarkSet]) -> Result<AnalysisReport, AnalysisError> {
        let Some(landmarks) = faces.first() else {
            tracing::info!("no face in frame");
            return Err(AnalysisError::NoFaceDetected);
        };
        if landmarks.len() < MESH_POINTS {
            return Err(AnalysisError::TooFewLandmarks { required: MESH_POINTS, actual: landmarks.len() });
        }
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AnalysisError::DimensionMismatch { width, height });
        }

        let start = Instant::now();
        let cfg = &self.config;
        let shape = face_shape::classify_face_shape(
            landmarks,
            width,
            height,
            Some(image),
            self.registry.face_shape(),
            &cfg.face_shape,
        );
        let gender = gender::classify_gender(
            landmarks,
            width,
            height,
            Some(image),
            Some(shape.shape),
            self.registry.gender(),
            &cfg.gender,
        );
        let skin = skin::analyze_skin(image, landmarks, self.registry.skin(), &cfg.skin);
        let profile = color::extract_color_profile(image, landmarks, &cfg.color);
        let foundation = shades::match_foundation_in(image, landmarks, &cfg.color);

        let recommendations = recommend::compose(
            &Consultation {
                face_shape: shape.shape,
                gender,
                skin: &skin,
                color: Some(&profile),
                foundation: Some(&foundation),
            },
            self.menu.as_ref(),
        );

        tracing::info!(
            face_shape = %shape.shape,
            confidence = shape.confidence,
            %gender,
            acne = skin.acne,
            oiliness = skin.oiliness,
            texture = skin.texture,
            season = profile.season.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "analysis complete"
        );

        Ok(AnalysisReport {
            face_shape: shape.shape,
            confidence: shape.confidence,
            gender,
            skin_analysis: skin,
            color_analysis: profile,
            foundation: Some(foundation),
            recommendations,
        })
    }

    /// Runs the configured landmark detector on the frame.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, AnalysisError> {
        let detector = self.detector.as_ref().ok_or(AnalysisError::DetectorUnavailable)?;
        Ok(detector.detect(image)?)
    }

    /// Decode an uploaded image, find landmarks (supplied or detected) and
    /// analyse. Never fails: errors become the `{ "error": ... }` payload.
    pub fn analyze_upload(&self, bytes: &[u8], landmarks: Option<Vec<LandmarkSet>>) -> AnalysisOutcome {
        AnalysisOutcome::from_result(self.run_upload(bytes, landmarks))
    }

    fn run_upload(&self, bytes: &[u8], landmarks: Option<Vec<LandmarkSet>>) -> Result<AnalysisReport, AnalysisError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| AnalysisError::InvalidImage(e.to_string()))?
            .to_rgb8();
        let faces = match landmarks {
            Some(faces) => faces,
            None => self.detect(&image)?,
        };
        self.analyze(&image, &faces)
    }
}
