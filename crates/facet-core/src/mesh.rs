//! Dense face-mesh landmark detection.

use std::path::PathBuf;

use image::RgbImage;

use crate::landmarks::{MESH_POINTS, MESH_POINTS_WITH_IRIS};
use crate::oracle::{rgb_tensor, OnnxModel, OracleError};
use crate::types::{Landmark, LandmarkSet};

const MESH_INPUT_SIZE: usize = 192;
const PRESENCE_THRESHOLD: f32 = 0.5;

/// Produces zero or more landmark sets for a frame. Zero sets means no face.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, OracleError>;
}

/// Single-face ONNX face-mesh model.
///
/// Expects one `1×3×192×192` input scaled to [0, 1] and produces a flat
/// `N×3` landmark tensor in input pixels plus an optional one-value
/// face-presence logit.
pub struct FaceMeshDetector {
    model: OnnxModel,
}

impl FaceMeshDetector {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, OracleError> {
        Ok(Self { model: OnnxModel::load(path.into(), "face-mesh")? })
    }
}

impl LandmarkDetector for FaceMeshDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<LandmarkSet>, OracleError> {
        let input = rgb_tensor(image, MESH_INPUT_SIZE, |_, v| v);
        let outputs = self.model.run(input)?;
        decode_mesh(&outputs, MESH_INPUT_SIZE as f32)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Picks the landmark and presence tensors out of the raw model outputs and
/// normalises coordinates to [0, 1] of the input frame.
pub(crate) fn decode_mesh(outputs: &[Vec<f32>], input_size: f32) -> Result<Vec<LandmarkSet>, OracleError> {
    let coords = outputs
        .iter()
        .find(|o| o.len() == MESH_POINTS_WITH_IRIS * 3 || o.len() == MESH_POINTS * 3)
        .ok_or_else(|| {
            let lens: Vec<usize> = outputs.iter().map(Vec::len).collect();
            OracleError::UnexpectedOutput(format!("no landmark tensor among outputs of length {lens:?}"))
        })?;

    if let Some(presence) = outputs.iter().find(|o| o.len() == 1) {
        let p = sigmoid(presence[0]);
        tracing::debug!(presence = p, "face-mesh presence");
        if p < PRESENCE_THRESHOLD {
            return Ok(Vec::new());
        }
    }

    let points = coords
        .chunks_exact(3)
        .map(|xyz| Landmark::new(xyz[0] / input_size, xyz[1] / input_size))
        .collect::<Vec<_>>();
    Ok(vec![LandmarkSet::new(points)])
}
