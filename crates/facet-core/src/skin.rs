//! Skin condition scoring: acne (redness), oiliness (shine) and texture.
//!
//! Scores are deterministic for identical input. Clustering is seeded and
//! every score is snapped to a fixed step before it leaves this module.

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::cluster;
use crate::config::SkinConfig;
use crate::geometry::FaceGeometry;
use crate::imaging::{self, sigmoid, Mask};
use crate::landmarks as lm;
use crate::oracle::{SkinOracle, SkinOracleScores};
use crate::types::{LandmarkSet, PixelRect};

/// Calibrated skin scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinScores {
    pub acne: f32,
    pub oiliness: f32,
    pub texture: f32,
}

/// Face region after cropping, downscaling and lighting normalisation, with
/// landmarks re-normalised to it.
struct FaceRegion {
    image: RgbImage,
    landmarks: LandmarkSet,
}

impl FaceRegion {
    fn extract(image: &RgbImage, landmarks: &LandmarkSet, cfg: &SkinConfig) -> Self {
        let (w, h) = image.dimensions();
        let rect = PixelRect::around(landmarks, w, h, cfg.crop_margin);
        let mut face = imaging::crop(image, rect);

        let longest = face.width().max(face.height());
        if cfg.max_side > 0 && longest > cfg.max_side {
            let scale = cfg.max_side as f32 / longest as f32;
            let nw = ((face.width() as f32 * scale).round() as u32).max(1);
            let nh = ((face.height() as f32 * scale).round() as u32).max(1);
            face = imageops::resize(&face, nw, nh, FilterType::Triangle);
        }

        let smoothed = imaging::bilateral_filter(&face, cfg.bilateral_radius, cfg.bilateral_sigma_color, cfg.bilateral_sigma_space);
        let normalised = imaging::retinex(&smoothed, &cfg.retinex_sigmas);
        Self { image: normalised, landmarks: landmarks.reframe(w, h, rect) }
    }

    fn geometry(&self) -> FaceGeometry<'_> {
        FaceGeometry::new(&self.landmarks, self.image.width(), self.image.height())
    }
}

/// Redness severity from cheek pixels.
///
/// The share of pixels above the a* threshold is calibrated through a
/// sigmoid. When the cheek splits into two clusters that differ enough in a*,
/// the redder cluster's share is a second estimate averaged in.
pub fn acne_score(pixels: &[[u8; 3]], cfg: &SkinConfig) -> f32 {
    if pixels.is_empty() {
        return sigmoid(0.0, cfg.acne_mid, cfg.acne_k);
    }
    let labs: Vec<[f32; 3]> = pixels.iter().map(|&p| imaging::lab_from_rgb(p)).collect();
    let red = labs.iter().filter(|lab| lab[1] > cfg.redness_threshold).count();
    let fraction = red as f32 / labs.len() as f32;
    let severity = sigmoid(fraction, cfg.acne_mid, cfg.acne_k);

    let clustered = cluster::kmeans(&labs, 2, cfg.cluster_iterations, cfg.cluster_seed).and_then(|c| {
        let (a0, a1) = (c.centers[0][1], c.centers[1][1]);
        if (a0 - a1).abs() <= cfg.cluster_red_separation {
            return None;
        }
        let redder = if a0 > a1 { 0 } else { 1 };
        let share = c.counts[redder] as f32 / labs.len() as f32;
        Some(sigmoid(share, cfg.acne_mid, cfg.acne_k))
    });

    tracing::debug!(fraction, severity, ?clustered, "acne redness");
    match clustered {
        Some(c) => (severity + c) / 2.0,
        None => severity,
    }
}

/// Confidence-weighted blend with an oracle estimate: the oracle is trusted
/// more when it reports a high value.
pub fn blend_acne(heuristic: f32, oracle: Option<f32>, cfg: &SkinConfig) -> f32 {
    match oracle {
        Some(o) => {
            let w = if o > cfg.oracle_high { cfg.oracle_weight_high } else { cfg.oracle_weight_low };
            w * o + (1.0 - w) * heuristic
        }
        None => heuristic,
    }
}

/// T-zone over cheek brightness; 1.0 when either region is empty.
pub fn shine_ratio(region: &RgbImage, tzone: &Mask, cheeks: &Mask, cfg: &SkinConfig) -> f32 {
    let value = imaging::clahe(&imaging::value_channel(region), cfg.clahe_tiles, cfg.clahe_clip);
    match (imaging::masked_mean(&value, tzone), imaging::masked_mean(&value, cheeks)) {
        (Some(t), Some(c)) => t / c.max(1.0),
        _ => 1.0,
    }
}

pub fn oiliness_from_ratio(ratio: f32, cfg: &SkinConfig) -> f32 {
    (cfg.oil_baseline + (ratio - 1.0) * cfg.oil_slope).clamp(cfg.oil_min, cfg.oil_max)
}

/// Roughness from cheek entropy and Laplacian variance; neutral when the
/// cheeks have no pixels.
pub fn texture_score(region: &RgbImage, cheeks: &Mask, cfg: &SkinConfig) -> f32 {
    let gray = imaging::to_gray(region);
    match (imaging::masked_entropy(&gray, cheeks), imaging::laplacian_variance(&gray, cheeks)) {
        (Some(entropy), Some(lap)) => {
            let e = sigmoid(entropy, cfg.entropy_mid, cfg.entropy_k);
            let l = sigmoid(lap, cfg.laplacian_mid, cfg.laplacian_k);
            tracing::debug!(entropy, laplacian_var = lap, "skin texture");
            cfg.entropy_weight * e + (1.0 - cfg.entropy_weight) * l
        }
        _ => cfg.neutral_texture,
    }
}

/// Snap to the nearest multiple of `step` within [0, 1].
pub fn stabilize(value: f32, step: f32) -> f32 {
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    if step <= 0.0 {
        return v;
    }
    ((v / step).round() * step).clamp(0.0, 1.0)
}

pub fn analyze_skin(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    oracle: Option<&dyn SkinOracle>,
    cfg: &SkinConfig,
) -> SkinScores {
    let region = FaceRegion::extract(image, landmarks, cfg);
    let geo = region.geometry();
    let cheeks = Mask::from_polygon(&geo, &lm::LEFT_CHEEK).union(&Mask::from_polygon(&geo, &lm::RIGHT_CHEEK));
    let tzone = Mask::from_polygon(&geo, &lm::FOREHEAD).union(&Mask::from_polygon(&geo, &lm::NOSE));

    let oracle_scores: Option<SkinOracleScores> = oracle.and_then(|o| match o.predict(image) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(error = %e, "skin oracle failed, using pixel heuristics");
            None
        }
    });

    let cheek_pixels = imaging::masked_pixels(&region.image, &cheeks);
    let acne = blend_acne(acne_score(&cheek_pixels, cfg), oracle_scores.map(|s| s.acne), cfg);

    let ratio = shine_ratio(&region.image, &tzone, &cheeks, cfg);
    let mut oiliness = oiliness_from_ratio(ratio, cfg);
    if let Some(s) = oracle_scores {
        oiliness = oiliness.max(s.oiliness());
    }

    let texture = texture_score(&region.image, &cheeks, cfg);

    let scores = SkinScores {
        acne: stabilize(acne, cfg.step),
        oiliness: stabilize(oiliness, cfg.step),
        texture: stabilize(texture, cfg.step),
    };
    tracing::debug!(cheek_px = cheeks.count(), tzone_px = tzone.count(), shine_ratio = ratio, ?scores, "skin scores");
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FaceSpec, Portrait, FRAME};
    use crate::oracle::OracleError;
    use crate::types::Landmark;
    use image::Rgb;

    struct FixedSkin(SkinOracleScores);

    impl SkinOracle for FixedSkin {
        fn predict(&self, _image: &RgbImage) -> Result<SkinOracleScores, OracleError> {
            Ok(self.0)
        }
    }

    fn on_step(v: f32) -> bool {
        ((v / 0.05) - (v / 0.05).round()).abs() < 1e-4
    }

    fn freckled_portrait() -> (RgbImage, LandmarkSet) {
        let lms = FaceSpec::default().landmarks();
        let mut img = Portrait::default().paint(&lms);
        for y in (60..140).step_by(7) {
            for x in (50..150).step_by(9) {
                img.put_pixel(x, y, Rgb([200, 60, 60]));
                img.put_pixel(x + 1, y, Rgb([190, 70, 65]));
            }
        }
        (img, lms)
    }

    #[test]
    fn test_acne_midpoint_calibration() {
        // 5 of 100 cheek pixels red: the sigmoid midpoint.
        let cfg = SkinConfig { cluster_red_separation: f32::INFINITY, ..Default::default() };
        let mut pixels = vec![[200u8, 170, 150]; 95];
        pixels.extend(std::iter::repeat([220u8, 40, 50]).take(5));
        let score = acne_score(&pixels, &cfg);
        assert!((score - 0.5).abs() < 1e-4, "got {score}");
    }

    #[test]
    fn test_acne_clear_skin_is_low() {
        let pixels = vec![[200u8, 170, 150]; 200];
        let score = acne_score(&pixels, &SkinConfig::default());
        assert!(score < 0.2, "got {score}");
    }

    #[test]
    fn test_acne_cluster_corroboration_raises_score() {
        let cfg = SkinConfig::default();
        let mut pixels = vec![[200u8, 170, 150]; 70];
        pixels.extend(std::iter::repeat([210u8, 50, 60]).take(30));
        let score = acne_score(&pixels, &cfg);
        assert!(score > 0.95, "got {score}");
    }

    #[test]
    fn test_blend_acne_trusts_high_oracle_more() {
        let cfg = SkinConfig::default();
        assert!((blend_acne(0.2, Some(0.8), &cfg) - (0.7 * 0.8 + 0.3 * 0.2)).abs() < 1e-6);
        assert!((blend_acne(0.2, Some(0.4), &cfg) - (0.4 * 0.4 + 0.6 * 0.2)).abs() < 1e-6);
        assert_eq!(blend_acne(0.2, None, &cfg), 0.2);
    }

    #[test]
    fn test_oiliness_mapping_clamped() {
        let cfg = SkinConfig::default();
        assert!((oiliness_from_ratio(1.0, &cfg) - 0.35).abs() < 1e-6);
        assert!((oiliness_from_ratio(1.1, &cfg) - 0.55).abs() < 1e-6);
        assert_eq!(oiliness_from_ratio(3.0, &cfg), 0.95);
        assert_eq!(oiliness_from_ratio(0.5, &cfg), 0.05);
    }

    #[test]
    fn test_empty_masks_use_neutral_values() {
        let cfg = SkinConfig::default();
        let img = RgbImage::from_pixel(20, 20, Rgb([180, 150, 130]));
        let empty = Mask::empty(20, 20);
        assert_eq!(shine_ratio(&img, &empty, &empty, &cfg), 1.0);
        assert_eq!(texture_score(&img, &empty, &cfg), cfg.neutral_texture);
    }

    #[test]
    fn test_stabilize_steps() {
        assert!((stabilize(0.52, 0.05) - 0.5).abs() < 1e-6);
        assert!((stabilize(0.53, 0.05) - 0.55).abs() < 1e-6);
        assert_eq!(stabilize(1.7, 0.05), 1.0);
        assert_eq!(stabilize(f32::NAN, 0.05), 0.0);
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let (img, lms) = freckled_portrait();
        let cfg = SkinConfig::default();
        let first = analyze_skin(&img, &lms, None, &cfg);
        for _ in 0..3 {
            let again = analyze_skin(&img, &lms, None, &cfg);
            assert_eq!(first.acne.to_bits(), again.acne.to_bits());
            assert_eq!(first.oiliness.to_bits(), again.oiliness.to_bits());
            assert_eq!(first.texture.to_bits(), again.texture.to_bits());
        }
    }

    #[test]
    fn test_analyze_range_and_steps() {
        let (img, lms) = freckled_portrait();
        let s = analyze_skin(&img, &lms, None, &SkinConfig::default());
        for v in [s.acne, s.oiliness, s.texture] {
            assert!((0.0..=1.0).contains(&v), "out of range: {v}");
            assert!(on_step(v), "not on 0.05 grid: {v}");
        }
    }

    #[test]
    fn test_analyze_coincident_landmarks() {
        let lms = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); lm::MESH_POINTS_WITH_IRIS]);
        let img = RgbImage::from_pixel(64, 64, Rgb([180, 150, 130]));
        let cfg = SkinConfig::default();
        let s = analyze_skin(&img, &lms, None, &cfg);
        assert!((s.oiliness - 0.35).abs() < 1e-6, "oiliness {}", s.oiliness);
        assert!((s.texture - 0.5).abs() < 1e-6, "texture {}", s.texture);
    }

    #[test]
    fn test_oracle_oiliness_takes_maximum() {
        let (img, lms) = freckled_portrait();
        let cfg = SkinConfig::default();
        let oracle = FixedSkin(SkinOracleScores { acne: 0.9, pigmentation: 0.1, dryness: 0.0 });
        let s = analyze_skin(&img, &lms, Some(&oracle), &cfg);
        assert!((s.oiliness - 1.0).abs() < 1e-6, "oiliness {}", s.oiliness);
        assert!(s.acne >= 0.6, "acne {}", s.acne);
    }

    #[test]
    fn test_large_frame_downscaled() {
        let lms = FaceSpec::default().landmarks();
        let small = Portrait::default().paint(&lms);
        let big = imageops::resize(&small, FRAME * 3, FRAME * 3, FilterType::Nearest);
        let s = analyze_skin(&big, &lms, None, &SkinConfig::default());
        assert!((0.0..=1.0).contains(&s.texture));
    }
}
