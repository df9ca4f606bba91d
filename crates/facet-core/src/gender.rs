//! Biometric gender voting.
//!
//! No single ratio separates the classes reliably, so each signal adds a
//! weighted vote to one side. An optional oracle's probabilities are blended
//! into the totals rather than trusted alone.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::config::GenderConfig;
use crate::face_shape::FaceShape;
use crate::geometry::{ratio, FaceGeometry};
use crate::imaging::{self, Mask};
use crate::landmarks as lm;
use crate::oracle::{GenderOracle, GenderProbabilities};
use crate::types::{LandmarkSet, PixelRect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "man" => Some(Self::Male),
            "female" | "f" | "woman" => Some(Self::Female),
            _ => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running vote totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenderVotes {
    pub male: f32,
    pub female: f32,
}

impl GenderVotes {
    /// Larger total wins; a tie is Female.
    pub fn decide(&self) -> Gender {
        if self.male > self.female {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

/// Geometric and texture measurements feeding the votes. Texture entries
/// are `None` when there is no image or the region has no pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenderSignals {
    pub fwhr: f32,
    pub brow_gap: f32,
    pub jaw_ratio: f32,
    pub mouth_nose: f32,
    /// Jaw-loop over cheek Laplacian variance.
    pub stubble_ratio: Option<f32>,
    /// Upper-lip over cheek Laplacian variance.
    pub mustache_ratio: Option<f32>,
    pub hair_std: Option<f32>,
}

pub fn measure(geo: &FaceGeometry<'_>, gray: Option<&GrayImage>, cfg: &GenderConfig) -> GenderSignals {
    let face_height = geo.face_height();
    let (_, brow_l) = geo.point(lm::LEFT_BROW_MID);
    let (_, brow_r) = geo.point(lm::RIGHT_BROW_MID);
    let (_, lid_l) = geo.point(lm::LEFT_UPPER_LID);
    let (_, lid_r) = geo.point(lm::RIGHT_UPPER_LID);
    let gap = ((lid_l - brow_l).abs() + (lid_r - brow_r).abs()) / 2.0;

    let mut signals = GenderSignals {
        fwhr: ratio(geo.cheek_width(), geo.dist(lm::BROW_CENTER, lm::UPPER_LIP_TOP)),
        brow_gap: ratio(gap, face_height),
        jaw_ratio: ratio(geo.jaw_width(), geo.cheek_width()),
        mouth_nose: ratio(geo.dist(lm::MOUTH_LEFT, lm::MOUTH_RIGHT), geo.dist(lm::NOSE_ALA_LEFT, lm::NOSE_ALA_RIGHT)),
        ..Default::default()
    };

    if let Some(gray) = gray {
        let cheeks = Mask::from_polygon(geo, &lm::LEFT_CHEEK).union(&Mask::from_polygon(geo, &lm::RIGHT_CHEEK));
        let jaw = Mask::from_polygon(geo, &lm::JAW_LOOP);
        let lip = Mask::from_polygon(geo, &lm::UPPER_LIP_ZONE);
        let response = imaging::laplacian(gray);
        if let Some(cheek_var) = imaging::masked_laplacian_variance(&response, &cheeks) {
            signals.stubble_ratio = imaging::masked_laplacian_variance(&response, &jaw).map(|v| ratio(v, cheek_var));
            signals.mustache_ratio = imaging::masked_laplacian_variance(&response, &lip).map(|v| ratio(v, cheek_var));
        }
        signals.hair_std = hair_band(geo, cfg.hair_band).and_then(|band| imaging::masked_std(gray, &band));
    }
    signals
}

/// Rows directly above the forehead, between the cheek landmarks.
fn hair_band(geo: &FaceGeometry<'_>, rows: u32) -> Option<Mask> {
    let (_, top) = geo.point(lm::FOREHEAD_TOP);
    let (left, _) = geo.point(lm::CHEEK_LEFT);
    let (right, _) = geo.point(lm::CHEEK_RIGHT);
    let bottom = top.floor();
    let upper = (bottom - rows as f32).max(0.0);
    if bottom <= upper || right <= left {
        return None;
    }
    let (x0, x1) = (left.round(), right.round());
    let mut band = Mask::empty(geo.width(), geo.height());
    band.fill_rect(x0 as i32, upper as i32, (x1 - x0).max(0.0) as u32, (bottom - upper) as u32);
    (!band.is_empty()).then_some(band)
}

/// Accumulate the biometric votes, without any oracle input.
pub fn cast_votes(signals: &GenderSignals, shape: Option<FaceShape>, cfg: &GenderConfig) -> GenderVotes {
    let mut votes = GenderVotes { male: 0.0, female: cfg.female_bias };

    if signals.fwhr > cfg.fwhr_male {
        let discount = match shape {
            Some(FaceShape::Round | FaceShape::Square) => cfg.fwhr_shape_discount,
            _ => 1.0,
        };
        votes.male += cfg.fwhr_weight * discount;
    }

    if signals.brow_gap > cfg.brow_gap_female {
        votes.female += cfg.brow_gap_female_weight;
    } else if signals.brow_gap < cfg.brow_gap_male {
        votes.male += cfg.brow_gap_male_weight;
    }

    if signals.jaw_ratio > cfg.jaw_ratio_male {
        votes.male += cfg.jaw_ratio_weight;
    }
    if signals.mouth_nose > cfg.mouth_nose_male {
        votes.male += cfg.mouth_nose_weight;
    }

    if let Some(texture) = signals.stubble_ratio {
        let stache = signals.mustache_ratio.unwrap_or(0.0);
        let beard = (texture > cfg.stubble_ratio && stache > cfg.mustache_ratio) || texture > cfg.stubble_strong_ratio;
        if beard {
            votes.male += cfg.stubble_weight;
        }
    }

    if signals.hair_std.is_some_and(|s| s > cfg.hair_std_female) {
        votes.female += cfg.hair_weight;
    }

    votes
}

/// Blend oracle probabilities into the votes and decide.
pub fn resolve(
    mut votes: GenderVotes,
    oracle: Option<GenderProbabilities>,
    shape: Option<FaceShape>,
    cfg: &GenderConfig,
) -> Gender {
    let Some(p) = oracle else {
        return votes.decide();
    };
    if p.male > cfg.oracle_short_circuit {
        return Gender::Male;
    }
    if p.female > cfg.oracle_short_circuit {
        return Gender::Female;
    }

    votes.male += p.male * cfg.oracle_trust;
    votes.female += p.female * cfg.oracle_trust;

    let near_tie = (votes.male - votes.female).abs() < cfg.tie_margin;
    if near_tie && matches!(shape, Some(FaceShape::Round | FaceShape::Oval)) && p.male > cfg.context_male_min {
        votes.male += cfg.context_boost;
    }
    tracing::debug!(male = votes.male, female = votes.female, "gender votes after oracle");
    votes.decide()
}

pub fn classify_gender(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    image: Option<&RgbImage>,
    face_shape: Option<FaceShape>,
    oracle: Option<&dyn GenderOracle>,
    cfg: &GenderConfig,
) -> Gender {
    let geo = FaceGeometry::new(landmarks, width, height);
    let gray = image.map(imaging::to_gray);
    let signals = measure(&geo, gray.as_ref(), cfg);
    let votes = cast_votes(&signals, face_shape, cfg);
    tracing::debug!(?signals, male = votes.male, female = votes.female, "gender votes");

    let probabilities = match (oracle, image) {
        (Some(oracle), Some(image)) => {
            let rect = PixelRect::around(landmarks, width, height, cfg.crop_margin);
            match oracle.predict(&imaging::crop(image, rect)) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "gender oracle failed, using biometric votes");
                    None
                }
            }
        }
        _ => None,
    };

    resolve(votes, probabilities, face_shape, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FaceSpec, Portrait, FRAME};
    use crate::oracle::OracleError;
    use image::Luma;

    struct FixedOracle(GenderProbabilities);

    impl GenderOracle for FixedOracle {
        fn predict(&self, _face: &RgbImage) -> Result<GenderProbabilities, OracleError> {
            Ok(self.0)
        }
    }

    fn neutral() -> GenderSignals {
        GenderSignals { fwhr: 1.8, brow_gap: 0.07, jaw_ratio: 0.8, mouth_nose: 1.4, ..Default::default() }
    }

    #[test]
    fn test_tie_is_female() {
        assert_eq!(GenderVotes { male: 2.0, female: 2.0 }.decide(), Gender::Female);
        assert_eq!(GenderVotes::default().decide(), Gender::Female);
    }

    #[test]
    fn test_engineered_tie_is_female() {
        let cfg = GenderConfig { female_bias: 0.0, ..Default::default() };
        let votes = cast_votes(&neutral(), None, &cfg);
        assert_eq!(votes.male, votes.female);
        for _ in 0..10 {
            assert_eq!(resolve(votes, None, None, &cfg), Gender::Female);
        }
    }

    #[test]
    fn test_female_bias_applied() {
        let votes = cast_votes(&neutral(), None, &GenderConfig::default());
        assert_eq!(votes.female, 0.25);
        assert_eq!(votes.male, 0.0);
    }

    #[test]
    fn test_masculine_geometry_votes_male() {
        let s = GenderSignals { fwhr: 2.1, brow_gap: 0.05, jaw_ratio: 0.97, mouth_nose: 1.7, ..Default::default() };
        let votes = cast_votes(&s, Some(FaceShape::Oval), &GenderConfig::default());
        assert!((votes.male - 3.5).abs() < 1e-6, "male {}", votes.male);
        assert_eq!(votes.decide(), Gender::Male);
    }

    #[test]
    fn test_fwhr_discounted_for_round_faces() {
        let s = GenderSignals { fwhr: 2.1, ..neutral() };
        let cfg = GenderConfig::default();
        let oval = cast_votes(&s, Some(FaceShape::Oval), &cfg);
        let round = cast_votes(&s, Some(FaceShape::Round), &cfg);
        assert!((oval.male - 1.0).abs() < 1e-6);
        assert!((round.male - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_stubble_needs_mustache_unless_strong() {
        let cfg = GenderConfig::default();
        let shadow = GenderSignals { stubble_ratio: Some(2.0), mustache_ratio: Some(1.0), ..neutral() };
        assert_eq!(cast_votes(&shadow, None, &cfg).male, 0.0);
        let beard = GenderSignals { stubble_ratio: Some(2.0), mustache_ratio: Some(1.5), ..neutral() };
        assert_eq!(cast_votes(&beard, None, &cfg).male, 2.5);
        let strong = GenderSignals { stubble_ratio: Some(4.0), mustache_ratio: None, ..neutral() };
        assert_eq!(cast_votes(&strong, None, &cfg).male, 2.5);
    }

    #[test]
    fn test_oracle_short_circuit() {
        let cfg = GenderConfig::default();
        let votes = GenderVotes { male: 0.0, female: 10.0 };
        let p = GenderProbabilities { male: 0.99, female: 0.01 };
        assert_eq!(resolve(votes, Some(p), None, &cfg), Gender::Male);
    }

    #[test]
    fn test_oracle_blended_not_trusted_alone() {
        let cfg = GenderConfig::default();
        // 0.7 * 3.5 = 2.45 male, 0.3 * 3.5 = 1.05 female; strong female evidence wins.
        let votes = GenderVotes { male: 0.0, female: 2.0 };
        let p = GenderProbabilities { male: 0.7, female: 0.3 };
        assert_eq!(resolve(votes, Some(p), None, &cfg), Gender::Female);
        let votes = GenderVotes { male: 0.0, female: 1.0 };
        assert_eq!(resolve(votes, Some(p), None, &cfg), Gender::Male);
    }

    #[test]
    fn test_context_boost_for_round_near_tie() {
        let cfg = GenderConfig::default();
        // 0.56 * 3.5 = 1.96 vs 0.44 * 3.5 + 0.6 = 2.14: near tie, female ahead.
        let votes = GenderVotes { male: 0.0, female: 0.6 };
        let p = GenderProbabilities { male: 0.56, female: 0.44 };
        assert_eq!(resolve(votes, Some(p), Some(FaceShape::Heart), &cfg), Gender::Female);
        assert_eq!(resolve(votes, Some(p), Some(FaceShape::Round), &cfg), Gender::Male);
    }

    #[test]
    fn test_measure_textured_jaw_reads_stubble() {
        let lms = FaceSpec::default().landmarks();
        let geo = FaceGeometry::new(&lms, FRAME, FRAME);
        let jaw = Mask::from_polygon(&geo, &lm::JAW_LOOP);
        let lip = Mask::from_polygon(&geo, &lm::UPPER_LIP_ZONE);
        let gray = GrayImage::from_fn(FRAME, FRAME, |x, y| {
            let rough = jaw.contains(x, y) || lip.contains(x, y);
            let v = if rough && (x + y) % 2 == 0 { 60 } else { 150 };
            Luma([v])
        });
        let s = measure(&geo, Some(&gray), &GenderConfig::default());
        assert!(s.stubble_ratio.unwrap() > 3.5, "stubble {:?}", s.stubble_ratio);
        assert!(s.mustache_ratio.unwrap() > 1.2);
    }

    #[test]
    fn test_hair_band_sits_above_forehead() {
        let lms = FaceSpec::default().landmarks();
        let geo = FaceGeometry::new(&lms, FRAME, FRAME);
        let top = geo.point(lm::FOREHEAD_TOP).1.floor() as u32;
        let band = hair_band(&geo, 10).unwrap();
        assert_eq!(band.count() % 10, 0);
        assert!(band.coords().all(|(_, y)| y < top && y >= top - 10));
    }

    #[test]
    fn test_measure_without_image_has_no_texture() {
        let lms = FaceSpec::default().landmarks();
        let geo = FaceGeometry::new(&lms, FRAME, FRAME);
        let s = measure(&geo, None, &GenderConfig::default());
        assert!(s.stubble_ratio.is_none() && s.hair_std.is_none());
        assert!(s.fwhr > 0.0 && s.jaw_ratio > 0.0);
    }

    #[test]
    fn test_classify_with_oracle_double() {
        let lms = FaceSpec::default().landmarks();
        let img = Portrait { skin: [200, 150, 120], ..Default::default() }.paint(&lms);
        let oracle = FixedOracle(GenderProbabilities { male: 0.995, female: 0.005 });
        let g = classify_gender(&lms, FRAME, FRAME, Some(&img), None, Some(&oracle), &GenderConfig::default());
        assert_eq!(g, Gender::Male);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Gender::from_name(" Female "), Some(Gender::Female));
        assert_eq!(Gender::from_name("m"), Some(Gender::Male));
        assert_eq!(Gender::from_name("x"), None);
    }
}
