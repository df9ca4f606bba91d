//! Face-shape classification.
//!
//! Five landmark ratios are compared against fixed reference centroids under
//! a weighted Euclidean distance. An optional CNN oracle can short-circuit or
//! refine the geometric answer.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::config::FaceShapeConfig;
use crate::geometry::{ratio, FaceGeometry};
use crate::imaging;
use crate::oracle::{FaceShapeOracle, ShapePrediction};
use crate::types::{LandmarkSet, PixelRect};

/// Face shape categories. Declaration order breaks exact distance ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FaceShape {
    Oval,
    Round,
    Square,
    Heart,
    Long,
    Diamond,
    Pear,
    Rectangle,
    Triangle,
}

impl FaceShape {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Oval => "Oval",
            Self::Round => "Round",
            Self::Square => "Square",
            Self::Heart => "Heart",
            Self::Long => "Long",
            Self::Diamond => "Diamond",
            Self::Pear => "Pear",
            Self::Rectangle => "Rectangle",
            Self::Triangle => "Triangle",
        }
    }

    pub fn all() -> &'static [FaceShape] {
        &[
            Self::Oval,
            Self::Round,
            Self::Square,
            Self::Heart,
            Self::Long,
            Self::Diamond,
            Self::Pear,
            Self::Rectangle,
            Self::Triangle,
        ]
    }

    /// Case-insensitive lookup by name. "Oblong" is accepted for Long.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("oblong") {
            return Some(Self::Long);
        }
        Self::all().iter().copied().find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for FaceShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// `[length, jaw, forehead, chin_angle, midface]`: face height over cheek
/// width, three widths over cheek width, and the chin angle over the
/// configured divisor.
pub type ShapeFeatures = [f32; 5];

/// Reference centroids, in `ShapeFeatures` order.
pub const CENTROIDS: [(FaceShape, ShapeFeatures); 9] = [
    (FaceShape::Oval, [1.45, 0.78, 0.88, 0.60, 0.95]),
    (FaceShape::Round, [1.10, 0.98, 0.92, 0.95, 0.98]),
    (FaceShape::Square, [1.15, 0.96, 0.96, 0.80, 1.00]),
    (FaceShape::Heart, [1.35, 0.70, 1.00, 0.55, 0.95]),
    (FaceShape::Long, [1.65, 0.85, 0.90, 0.62, 0.95]),
    (FaceShape::Diamond, [1.35, 0.72, 0.80, 0.58, 0.97]),
    (FaceShape::Pear, [1.25, 1.02, 0.82, 0.85, 0.98]),
    (FaceShape::Rectangle, [1.55, 0.95, 0.95, 0.72, 0.97]),
    (FaceShape::Triangle, [1.30, 1.05, 0.78, 0.82, 0.99]),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeResult {
    pub shape: FaceShape,
    pub confidence: f32,
}

pub fn shape_features(geo: &FaceGeometry<'_>, cfg: &FaceShapeConfig) -> ShapeFeatures {
    let cheek = geo.cheek_width();
    [
        ratio(geo.face_height(), cheek),
        ratio(geo.jaw_width(), cheek),
        ratio(geo.forehead_width(), cheek),
        geo.chin_angle() / cfg.jaw_angle_divisor.max(f32::EPSILON),
        ratio(geo.midface_width(), cheek),
    ]
}

pub fn weighted_distance(a: &ShapeFeatures, b: &ShapeFeatures, weights: &[f32; 5]) -> f32 {
    a.iter()
        .zip(b)
        .zip(weights)
        .map(|((x, y), w)| w * (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Closest centroid and its distance. Ties go to the earlier [`FaceShape`]
/// variant, so the result does not depend on table order.
pub fn nearest_centroid(
    features: &ShapeFeatures,
    table: &[(FaceShape, ShapeFeatures)],
    weights: &[f32; 5],
) -> Option<(FaceShape, f32)> {
    table
        .iter()
        .map(|(shape, c)| (*shape, weighted_distance(features, c, weights)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
}

/// Geometric prediction only.
pub fn classify_geometric(geo: &FaceGeometry<'_>, cfg: &FaceShapeConfig) -> ShapeResult {
    let features = shape_features(geo, cfg);
    let Some((shape, dist)) = nearest_centroid(&features, &CENTROIDS, &cfg.weights) else {
        return ShapeResult { shape: FaceShape::Oval, confidence: cfg.fallback_confidence };
    };
    let confidence = (1.0 - dist / cfg.max_reasonable_distance.max(f32::EPSILON)).clamp(0.0, 1.0);
    tracing::debug!(?features, shape = shape.name(), distance = dist, confidence, "geometric face shape");
    ShapeResult { shape, confidence }
}

/// Combine the geometric result with an oracle prediction.
///
/// With no prediction, a very uncertain geometric label is replaced by Oval
/// at a fixed confidence.
pub fn fuse(geometric: ShapeResult, oracle: Option<ShapePrediction>, cfg: &FaceShapeConfig) -> ShapeResult {
    let Some(o) = oracle else {
        if geometric.confidence < cfg.fallback_floor {
            return ShapeResult { shape: FaceShape::Oval, confidence: cfg.fallback_confidence };
        }
        return geometric;
    };

    if o.confidence > cfg.oracle_short_circuit {
        return ShapeResult { shape: o.shape, confidence: o.confidence.min(1.0) };
    }
    if o.shape == geometric.shape {
        let boosted = geometric.confidence.max(o.confidence) + cfg.agreement_boost;
        return ShapeResult { shape: o.shape, confidence: boosted.min(cfg.confidence_cap) };
    }
    if o.confidence > cfg.oracle_override {
        return ShapeResult { shape: o.shape, confidence: o.confidence * cfg.oracle_override_discount };
    }
    ShapeResult { shape: geometric.shape, confidence: geometric.confidence.max(o.confidence) }
}

/// Classify the face shape, consulting the oracle when both it and the
/// image are available. Oracle failures fall back to the geometric path.
pub fn classify_face_shape(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    image: Option<&RgbImage>,
    oracle: Option<&dyn FaceShapeOracle>,
    cfg: &FaceShapeConfig,
) -> ShapeResult {
    let geo = FaceGeometry::new(landmarks, width, height);
    let geometric = classify_geometric(&geo, cfg);

    let prediction = match (oracle, image) {
        (Some(oracle), Some(image)) => {
            let rect = PixelRect::around(landmarks, width, height, cfg.crop_margin);
            match oracle.predict(&imaging::crop(image, rect)) {
                Ok(p) => {
                    tracing::debug!(shape = p.shape.name(), confidence = p.confidence, "face-shape oracle");
                    Some(p)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "face-shape oracle failed, using geometry");
                    None
                }
            }
        }
        _ => None,
    };

    fuse(geometric, prediction, cfg)
}
