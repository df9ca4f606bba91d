//! Tunable thresholds for every classifier.
//!
//! All values are empirical defaults. A TOML tuning file may override any
//! subset of them; missing keys keep the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read tuning file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tuning file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Face-shape classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceShapeConfig {
    /// Per-dimension weights for `[length, jaw, forehead, chin_angle, midface]`.
    pub weights: [f32; 5],
    /// Divisor that maps the chin angle (degrees) onto the ratio scale.
    pub jaw_angle_divisor: f32,
    /// Distance at which geometric confidence reaches zero.
    pub max_reasonable_distance: f32,
    /// Oracle confidence above which its label is returned as is.
    pub oracle_short_circuit: f32,
    /// Oracle confidence above which it wins a disagreement.
    pub oracle_override: f32,
    /// Multiplier applied to the oracle confidence when it wins a disagreement.
    pub oracle_override_discount: f32,
    /// Added to the larger confidence when both predictions agree.
    pub agreement_boost: f32,
    pub confidence_cap: f32,
    /// Below this geometric confidence (and with no oracle) the label becomes Oval.
    pub fallback_floor: f32,
    pub fallback_confidence: f32,
    /// Margin around the landmark box when cropping the face for oracles.
    pub crop_margin: f32,
}

impl Default for FaceShapeConfig {
    fn default() -> Self {
        Self {
            weights: [1.0, 2.0, 1.0, 2.0, 0.5],
            jaw_angle_divisor: 180.0,
            max_reasonable_distance: 1.5,
            oracle_short_circuit: 0.85,
            oracle_override: 0.6,
            oracle_override_discount: 0.9,
            agreement_boost: 0.1,
            confidence_cap: 0.98,
            fallback_floor: 0.3,
            fallback_confidence: 0.5,
            crop_margin: 0.1,
        }
    }
}

/// Gender voting settings. Weights are vote sizes added to a side's total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderConfig {
    /// Cheek width over brow-to-lip height above which fWHR votes male.
    pub fwhr_male: f32,
    pub fwhr_weight: f32,
    /// Multiplier on the fWHR vote for Round and Square faces.
    pub fwhr_shape_discount: f32,
    /// Brow-to-lid gap (fraction of face height) above which the vote is female.
    pub brow_gap_female: f32,
    pub brow_gap_female_weight: f32,
    /// Gap below which the vote is male.
    pub brow_gap_male: f32,
    pub brow_gap_male_weight: f32,
    pub jaw_ratio_male: f32,
    pub jaw_ratio_weight: f32,
    pub mouth_nose_male: f32,
    pub mouth_nose_weight: f32,
    /// Jaw over cheek Laplacian variance ratio that counts as stubble when
    /// the moustache zone corroborates.
    pub stubble_ratio: f32,
    /// Upper-lip over cheek variance ratio that corroborates stubble.
    pub mustache_ratio: f32,
    /// Jaw over cheek ratio strong enough to count without corroboration.
    pub stubble_strong_ratio: f32,
    pub stubble_weight: f32,
    /// Grey-level standard deviation above the forehead that votes female.
    pub hair_std_female: f32,
    pub hair_weight: f32,
    /// Rows sampled above the forehead for the hair signal.
    pub hair_band: u32,
    pub female_bias: f32,
    /// Scale applied to oracle probabilities before adding them to the votes.
    pub oracle_trust: f32,
    /// Oracle probability above which its label is returned as is.
    pub oracle_short_circuit: f32,
    /// Vote difference that counts as a near tie for the context correction.
    pub tie_margin: f32,
    /// Oracle male probability needed to trigger the context correction.
    pub context_male_min: f32,
    pub context_boost: f32,
    /// Margin around the landmark box when cropping the face for the oracle.
    pub crop_margin: f32,
}

impl Default for GenderConfig {
    fn default() -> Self {
        Self {
            fwhr_male: 1.95,
            fwhr_weight: 1.0,
            fwhr_shape_discount: 0.5,
            brow_gap_female: 0.08,
            brow_gap_female_weight: 1.5,
            brow_gap_male: 0.06,
            brow_gap_male_weight: 1.0,
            jaw_ratio_male: 0.95,
            jaw_ratio_weight: 1.0,
            mouth_nose_male: 1.65,
            mouth_nose_weight: 0.5,
            stubble_ratio: 1.3,
            mustache_ratio: 1.2,
            stubble_strong_ratio: 3.5,
            stubble_weight: 2.5,
            hair_std_female: 45.0,
            hair_weight: 1.0,
            hair_band: 50,
            female_bias: 0.25,
            oracle_trust: 3.5,
            oracle_short_circuit: 0.98,
            tie_margin: 0.5,
            context_male_min: 0.55,
            context_boost: 1.0,
            crop_margin: 0.1,
        }
    }
}

/// Skin condition scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinConfig {
    /// Margin around the landmark box for the analysed face region.
    pub crop_margin: f32,
    /// Longest side of the face region after downscaling.
    pub max_side: u32,
    pub bilateral_radius: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,
    /// Gaussian sigmas for multi-scale retinex. Non-positive entries are skipped.
    pub retinex_sigmas: Vec<f32>,
    /// Lab a* above which a cheek pixel counts as red.
    pub redness_threshold: f32,
    pub acne_mid: f32,
    pub acne_k: f32,
    /// Minimum a* gap between the two cheek clusters for the cluster estimate to count.
    pub cluster_red_separation: f32,
    pub cluster_iterations: usize,
    pub cluster_seed: u64,
    /// Oracle acne value above which the oracle gets the high weight.
    pub oracle_high: f32,
    pub oracle_weight_high: f32,
    pub oracle_weight_low: f32,
    pub clahe_tiles: u32,
    pub clahe_clip: f32,
    /// Oiliness at a T-zone/cheek brightness ratio of 1.0.
    pub oil_baseline: f32,
    /// Oiliness gained per unit of ratio above 1.0.
    pub oil_slope: f32,
    pub oil_min: f32,
    pub oil_max: f32,
    pub entropy_mid: f32,
    pub entropy_k: f32,
    pub laplacian_mid: f32,
    pub laplacian_k: f32,
    /// Entropy share of the texture score; the Laplacian gets the rest.
    pub entropy_weight: f32,
    /// Texture score reported when the cheek mask is empty.
    pub neutral_texture: f32,
    /// Every final score is rounded to a multiple of this.
    pub step: f32,
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            crop_margin: 0.05,
            max_side: 256,
            bilateral_radius: 2,
            bilateral_sigma_color: 25.0,
            bilateral_sigma_space: 2.0,
            retinex_sigmas: vec![10.0, 40.0, 120.0],
            redness_threshold: 17.0,
            acne_mid: 0.05,
            acne_k: 30.0,
            cluster_red_separation: 25.0,
            cluster_iterations: 20,
            cluster_seed: 42,
            oracle_high: 0.5,
            oracle_weight_high: 0.7,
            oracle_weight_low: 0.4,
            clahe_tiles: 4,
            clahe_clip: 0.02,
            oil_baseline: 0.35,
            oil_slope: 2.0,
            oil_min: 0.05,
            oil_max: 0.95,
            entropy_mid: 7.0,
            entropy_k: 2.0,
            laplacian_mid: 400.0,
            laplacian_k: 0.01,
            entropy_weight: 0.6,
            neutral_texture: 0.5,
            step: 0.05,
        }
    }
}

/// Colour profile settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Cheek sample radius as a fraction of the frame width.
    pub cheek_radius: f32,
    /// Minimum cheek pixels before the skin fallback is used.
    pub min_skin_pixels: usize,
    /// (r+g)/2 over b above which skin is warm.
    pub warm_margin: f32,
    /// b over (r+g)/2 above which skin is cool.
    pub cool_margin: f32,
    /// Upper brightness bounds for Deep, Medium-Dark, Medium and Light-Medium.
    pub tone_bands: [f32; 4],
    /// Iris sample radius as a fraction of the frame width.
    pub iris_radius: f32,
    pub iris_min: u8,
    pub iris_max: u8,
    pub min_iris_pixels: usize,
    /// Forehead rows needed above the top landmark before hair is sampled.
    pub hair_guard: u32,
    /// Hair band spans `[forehead - hair_far, forehead - hair_near)`.
    pub hair_far: u32,
    pub hair_near: u32,
    /// Hair pixels with any channel at or above this are dropped.
    pub blown_out: u8,
    pub hair_clusters: usize,
    /// Clusters over the face region when picking the dominant skin colour.
    pub skin_clusters: usize,
    pub cluster_iterations: usize,
    pub cluster_seed: u64,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            cheek_radius: 0.05,
            min_skin_pixels: 10,
            warm_margin: 1.15,
            cool_margin: 1.10,
            tone_bands: [100.0, 140.0, 180.0, 210.0],
            iris_radius: 0.015,
            iris_min: 20,
            iris_max: 240,
            min_iris_pixels: 5,
            hair_guard: 30,
            hair_far: 60,
            hair_near: 10,
            blown_out: 240,
            hair_clusters: 3,
            skin_clusters: 3,
            cluster_iterations: 20,
            cluster_seed: 42,
        }
    }
}

/// All analyzer settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub face_shape: FaceShapeConfig,
    pub gender: GenderConfig,
    pub skin: SkinConfig,
    pub color: ColorConfig,
}

impl AnalyzerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "loaded tuning file");
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let cfg = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AnalyzerConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let cfg = AnalyzerConfig::from_toml_str(
            r#"
            [skin]
            acne_mid = 0.08

            [face_shape]
            weights = [1.0, 1.0, 1.0, 1.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.skin.acne_mid, 0.08);
        assert_eq!(cfg.skin.acne_k, 30.0);
        assert_eq!(cfg.face_shape.weights, [1.0; 5]);
        assert_eq!(cfg.face_shape.max_reasonable_distance, 1.5);
        assert_eq!(cfg.gender, GenderConfig::default());
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = AnalyzerConfig::from_toml_str("[skin]\nacne_mid = \"high\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AnalyzerConfig::load("/nonexistent/facet-tuning.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
