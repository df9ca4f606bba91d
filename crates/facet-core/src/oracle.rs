//! Optional learned estimators ("oracles") and the registry that owns them.
//!
//! Every oracle is a capability behind a trait. Classifiers receive an
//! `Option<&dyn …Oracle>` through [`ModelRegistry`] and fall back to their
//! geometric or pixel heuristics when it is `None` or when a call fails.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::face_shape::FaceShape;

// --- Classifier input (ImageNet statistics, 0..1 scale) ---
const CLASSIFIER_INPUT_SIZE: usize = 224;
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output order of the face-shape model.
const SHAPE_CLASSES: [FaceShape; 8] = [
    FaceShape::Diamond,
    FaceShape::Heart,
    FaceShape::Long,
    FaceShape::Oval,
    FaceShape::Pear,
    FaceShape::Round,
    FaceShape::Square,
    FaceShape::Triangle,
];

pub const FACE_MESH_MODEL: &str = "face_mesh.onnx";
pub const FACE_SHAPE_MODEL: &str = "face_shape.onnx";
pub const GENDER_MODEL: &str = "gender.onnx";
pub const SKIN_MODEL: &str = "skin.onnx";

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePrediction {
    pub shape: FaceShape,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenderProbabilities {
    pub male: f32,
    pub female: f32,
}

/// Raw skin-condition scores, each nominally in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinOracleScores {
    pub acne: f32,
    pub pigmentation: f32,
    pub dryness: f32,
}

impl SkinOracleScores {
    /// The model has no oiliness head; dry skin is taken as not oily.
    pub fn oiliness(&self) -> f32 {
        (1.0 - self.dryness).max(0.0)
    }
}

pub trait FaceShapeOracle: Send + Sync {
    /// Classify a face crop.
    fn predict(&self, face: &RgbImage) -> Result<ShapePrediction, OracleError>;
}

pub trait GenderOracle: Send + Sync {
    /// Class probabilities for a face crop.
    fn predict(&self, face: &RgbImage) -> Result<GenderProbabilities, OracleError>;
}

pub trait SkinOracle: Send + Sync {
    /// Condition scores for the full frame.
    fn predict(&self, image: &RgbImage) -> Result<SkinOracleScores, OracleError>;
}

/// Shared, read-only oracle handles, injected into the analyzer at setup.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    face_shape: Option<Arc<dyn FaceShapeOracle>>,
    gender: Option<Arc<dyn GenderOracle>>,
    skin: Option<Arc<dyn SkinOracle>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("face_shape", &self.face_shape.is_some())
            .field("gender", &self.gender.is_some())
            .field("skin", &self.skin.is_some())
            .finish()
    }
}

impl ModelRegistry {
    /// Registry with no oracles: every classifier runs its heuristic path.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_face_shape(mut self, oracle: Arc<dyn FaceShapeOracle>) -> Self {
        self.face_shape = Some(oracle);
        self
    }

    pub fn with_gender(mut self, oracle: Arc<dyn GenderOracle>) -> Self {
        self.gender = Some(oracle);
        self
    }

    pub fn with_skin(mut self, oracle: Arc<dyn SkinOracle>) -> Self {
        self.skin = Some(oracle);
        self
    }

    /// Load whichever oracle models exist in `dir`. A missing or broken
    /// model is logged and left out; this never fails.
    pub fn load(dir: &Path) -> Self {
        let mut registry = Self::empty();
        match OnnxFaceShapeOracle::load(dir.join(FACE_SHAPE_MODEL)) {
            Ok(o) => registry.face_shape = Some(Arc::new(o)),
            Err(e) => tracing::warn!(error = %e, "face-shape oracle unavailable"),
        }
        match OnnxGenderOracle::load(dir.join(GENDER_MODEL)) {
            Ok(o) => registry.gender = Some(Arc::new(o)),
            Err(e) => tracing::warn!(error = %e, "gender oracle unavailable"),
        }
        match OnnxSkinOracle::load(dir.join(SKIN_MODEL)) {
            Ok(o) => registry.skin = Some(Arc::new(o)),
            Err(e) => tracing::warn!(error = %e, "skin oracle unavailable"),
        }
        registry
    }

    pub fn face_shape(&self) -> Option<&dyn FaceShapeOracle> {
        self.face_shape.as_deref()
    }

    pub fn gender(&self) -> Option<&dyn GenderOracle> {
        self.gender.as_deref()
    }

    pub fn skin(&self) -> Option<&dyn SkinOracle> {
        self.skin.as_deref()
    }

    /// Names of the loaded oracles, for status reports.
    pub fn loaded(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.face_shape.is_some() {
            names.push("face_shape");
        }
        if self.gender.is_some() {
            names.push("gender");
        }
        if self.skin.is_some() {
            names.push("skin");
        }
        names
    }
}

/// ONNX session guarded for shared use across request threads.
pub(crate) struct OnnxModel {
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxModel {
    pub(crate) fn load(path: PathBuf, label: &str) -> Result<Self, OracleError> {
        if !path.exists() {
            return Err(OracleError::ModelNotFound(path.display().to_string()));
        }
        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(&path)?;

        tracing::info!(
            path = %path.display(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded {label} model"
        );
        Ok(Self { session: Mutex::new(session), path })
    }

    /// Run the model on one NCHW tensor and copy out every output as a flat
    /// `f32` vector.
    pub(crate) fn run(&self, input: Array4<f32>) -> Result<Vec<Vec<f32>>, OracleError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| OracleError::InferenceFailed(format!("{}: session lock poisoned", self.path.display())))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut flat = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let (_, data) = outputs[i]
                .try_extract_tensor::<f32>()
                .map_err(|e| OracleError::UnexpectedOutput(format!("output {i}: {e}")))?;
            flat.push(data.to_vec());
        }
        Ok(flat)
    }
}

/// Bilinear resize of an RGB image to `size × size` into a NCHW tensor,
/// applying `normalize(channel, value_0_to_1)` to each sample.
pub(crate) fn rgb_tensor(img: &RgbImage, size: usize, normalize: impl Fn(usize, f32) -> f32) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return tensor;
    }
    let sx = w as f32 / size as f32;
    let sy = h as f32 / size as f32;

    for y in 0..size {
        let src_y = (y as f32 + 0.5) * sy - 0.5;
        let y0 = (src_y.floor() as i64).clamp(0, h as i64 - 1) as u32;
        let y1 = (y0 + 1).min(h as u32 - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);
        for x in 0..size {
            let src_x = (x as f32 + 0.5) * sx - 0.5;
            let x0 = (src_x.floor() as i64).clamp(0, w as i64 - 1) as u32;
            let x1 = (x0 + 1).min(w as u32 - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = img.get_pixel(x0, y0).0;
            let tr = img.get_pixel(x1, y0).0;
            let bl = img.get_pixel(x0, y1).0;
            let br = img.get_pixel(x1, y1).0;
            for c in 0..3 {
                let v = tl[c] as f32 * (1.0 - fx) * (1.0 - fy)
                    + tr[c] as f32 * fx * (1.0 - fy)
                    + bl[c] as f32 * (1.0 - fx) * fy
                    + br[c] as f32 * fx * fy;
                tensor[[0, c, y, x]] = normalize(c, v / 255.0);
            }
        }
    }
    tensor
}

fn imagenet_tensor(img: &RgbImage) -> Array4<f32> {
    rgb_tensor(img, CLASSIFIER_INPUT_SIZE, |c, v| (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c])
}

/// Softmax unless the values already form a probability distribution.
pub(crate) fn probabilities(raw: &[f32]) -> Vec<f32> {
    let sum: f32 = raw.iter().sum();
    if raw.iter().all(|&v| (0.0..=1.0).contains(&v)) && (sum - 1.0).abs() < 1e-3 {
        return raw.to_vec();
    }
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = raw.iter().map(|&v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|e| e / total).collect()
}

fn first_output(mut outputs: Vec<Vec<f32>>, expected: usize) -> Result<Vec<f32>, OracleError> {
    if outputs.is_empty() {
        return Err(OracleError::UnexpectedOutput("model produced no outputs".into()));
    }
    let out = outputs.swap_remove(0);
    if out.len() != expected {
        return Err(OracleError::UnexpectedOutput(format!("expected {expected} values, got {}", out.len())));
    }
    Ok(out)
}

/// Eight-class face-shape CNN.
pub struct OnnxFaceShapeOracle {
    model: OnnxModel,
}

impl OnnxFaceShapeOracle {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, OracleError> {
        Ok(Self { model: OnnxModel::load(path.into(), "face-shape")? })
    }
}

impl FaceShapeOracle for OnnxFaceShapeOracle {
    fn predict(&self, face: &RgbImage) -> Result<ShapePrediction, OracleError> {
        let raw = first_output(self.model.run(imagenet_tensor(face))?, SHAPE_CLASSES.len())?;
        let probs = probabilities(&raw);
        let (idx, &confidence) = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .ok_or_else(|| OracleError::UnexpectedOutput("empty class scores".into()))?;
        Ok(ShapePrediction { shape: SHAPE_CLASSES[idx], confidence })
    }
}

/// Two-class gender CNN, outputs ordered `[male, female]`.
pub struct OnnxGenderOracle {
    model: OnnxModel,
}

impl OnnxGenderOracle {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, OracleError> {
        Ok(Self { model: OnnxModel::load(path.into(), "gender")? })
    }
}

impl GenderOracle for OnnxGenderOracle {
    fn predict(&self, face: &RgbImage) -> Result<GenderProbabilities, OracleError> {
        let raw = first_output(self.model.run(imagenet_tensor(face))?, 2)?;
        let probs = probabilities(&raw);
        Ok(GenderProbabilities { male: probs[0], female: probs[1] })
    }
}

/// Multi-head skin CNN, outputs ordered `[acne, pigmentation, dryness]`.
pub struct OnnxSkinOracle {
    model: OnnxModel,
}

impl OnnxSkinOracle {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, OracleError> {
        Ok(Self { model: OnnxModel::load(path.into(), "skin")? })
    }
}

impl SkinOracle for OnnxSkinOracle {
    fn predict(&self, image: &RgbImage) -> Result<SkinOracleScores, OracleError> {
        let raw = first_output(self.model.run(imagenet_tensor(image))?, 3)?;
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        Ok(SkinOracleScores { acne: clamp(raw[0]), pigmentation: clamp(raw[1]), dryness: clamp(raw[2]) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_rgb_tensor_shape_and_normalisation() {
        let img = RgbImage::from_pixel(50, 30, Rgb([255, 0, 128]));
        let t = imagenet_tensor(&img);
        assert_eq!(t.shape(), &[1, 3, CLASSIFIER_INPUT_SIZE, CLASSIFIER_INPUT_SIZE]);
        let r = t[[0, 0, 10, 10]];
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((r - expected).abs() < 1e-5, "got {r}, expected {expected}");
        let g = t[[0, 1, 100, 200]];
        assert!((g - (-IMAGENET_MEAN[1] / IMAGENET_STD[1])).abs() < 1e-5);
    }

    #[test]
    fn test_rgb_tensor_empty_image_is_zeros() {
        let t = rgb_tensor(&RgbImage::new(0, 0), 8, |_, v| v);
        assert!(t.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_probabilities_softmax_logits() {
        let p = probabilities(&[2.0, 0.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[0] > 0.85);
    }

    #[test]
    fn test_probabilities_passthrough() {
        assert_eq!(probabilities(&[0.3, 0.7]), vec![0.3, 0.7]);
    }

    #[test]
    fn test_skin_oiliness_from_dryness() {
        let s = SkinOracleScores { acne: 0.1, pigmentation: 0.2, dryness: 0.3 };
        assert!((s.oiliness() - 0.7).abs() < 1e-6);
        let dry = SkinOracleScores { dryness: 1.0, ..s };
        assert_eq!(dry.oiliness(), 0.0);
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let err = OnnxGenderOracle::load("/nonexistent/gender.onnx").err().unwrap();
        assert!(matches!(err, OracleError::ModelNotFound(_)));
    }

    #[test]
    fn test_registry_load_missing_dir_is_empty() {
        let reg = ModelRegistry::load(Path::new("/nonexistent/facet-models"));
        assert!(reg.loaded().is_empty());
        assert!(reg.face_shape().is_none());
    }
}
