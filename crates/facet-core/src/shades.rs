//! Foundation shade reference table and nearest-shade matching.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::{self, Undertone};
use crate::config::ColorConfig;
use crate::imaging;
use crate::types::{hex_color, LandmarkSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadeCategory {
    Fair,
    Light,
    Medium,
    Tan,
    Deep,
    #[serde(rename = "Very Deep")]
    VeryDeep,
}

impl ShadeCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fair => "Fair",
            Self::Light => "Light",
            Self::Medium => "Medium",
            Self::Tan => "Tan",
            Self::Deep => "Deep",
            Self::VeryDeep => "Very Deep",
        }
    }
}

/// Category for a CIE L* lightness value.
pub fn shade_category(lightness: f32) -> ShadeCategory {
    if lightness >= 85.0 {
        ShadeCategory::Fair
    } else if lightness >= 75.0 {
        ShadeCategory::Light
    } else if lightness >= 62.0 {
        ShadeCategory::Medium
    } else if lightness >= 50.0 {
        ShadeCategory::Tan
    } else if lightness >= 35.0 {
        ShadeCategory::Deep
    } else {
        ShadeCategory::VeryDeep
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoundationShade {
    pub name: &'static str,
    pub category: ShadeCategory,
    pub lab: [f32; 3],
    pub undertone: Undertone,
    pub hex: &'static str,
}

const fn shade(
    name: &'static str,
    category: ShadeCategory,
    lab: [f32; 3],
    undertone: Undertone,
    hex: &'static str,
) -> FoundationShade {
    FoundationShade { name, category, lab, undertone, hex }
}

use ShadeCategory as C;
use Undertone as U;

pub static FOUNDATION_SHADES: [FoundationShade; 19] = [
    shade("Porcelain", C::Fair, [92.0, 2.0, 10.0], U::Cool, "#f5e8dd"),
    shade("Ivory", C::Fair, [90.0, 3.0, 12.0], U::Neutral, "#f4e4d7"),
    shade("Warm Ivory", C::Fair, [88.0, 5.0, 15.0], U::Warm, "#f2dec8"),
    shade("Natural Beige", C::Light, [80.0, 8.0, 18.0], U::Neutral, "#e8d4b8"),
    shade("Warm Beige", C::Light, [78.0, 10.0, 22.0], U::Warm, "#e5cfad"),
    shade("Cool Beige", C::Light, [82.0, 6.0, 14.0], U::Cool, "#ebd8c0"),
    shade("Sand", C::Medium, [70.0, 12.0, 25.0], U::Neutral, "#d4b896"),
    shade("Golden", C::Medium, [68.0, 14.0, 28.0], U::Warm, "#d0b088"),
    shade("Honey", C::Medium, [72.0, 10.0, 22.0], U::Warm, "#d8bea0"),
    shade("Tan", C::Medium, [65.0, 15.0, 26.0], U::Neutral, "#c8a882"),
    shade("Caramel", C::Tan, [58.0, 18.0, 28.0], U::Warm, "#b89570"),
    shade("Cocoa", C::Tan, [55.0, 20.0, 26.0], U::Neutral, "#b08868"),
    shade("Toffee", C::Tan, [60.0, 16.0, 30.0], U::Warm, "#bc9a78"),
    shade("Espresso", C::Deep, [45.0, 22.0, 24.0], U::Warm, "#8e6f50"),
    shade("Mahogany", C::Deep, [42.0, 24.0, 22.0], U::Cool, "#86654a"),
    shade("Ebony", C::Deep, [38.0, 20.0, 18.0], U::Neutral, "#7a5e45"),
    shade("Chocolate", C::VeryDeep, [32.0, 18.0, 16.0], U::Warm, "#654d38"),
    shade("Mocha", C::VeryDeep, [35.0, 16.0, 18.0], U::Neutral, "#6b533e"),
    shade("Midnight", C::VeryDeep, [28.0, 14.0, 12.0], U::Cool, "#5a4530"),
];

/// Result of matching a measured skin colour against the shade table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoundationMatch {
    pub shade: String,
    pub shade_hex: String,
    pub category: ShadeCategory,
    pub delta_e: f32,
    pub skin_lab: [f32; 3],
    pub skin_hex: String,
    pub skin_category: ShadeCategory,
    pub undertone: Undertone,
}

/// Nearest shade by CIEDE2000. Earlier table entries win exact ties.
pub fn nearest_shade(lab: [f32; 3]) -> (&'static FoundationShade, f32) {
    let mut best = &FOUNDATION_SHADES[0];
    let mut best_d = color::ciede2000(lab, best.lab);
    for candidate in &FOUNDATION_SHADES[1..] {
        let d = color::ciede2000(lab, candidate.lab);
        if d < best_d {
            best = candidate;
            best_d = d;
        }
    }
    (best, best_d)
}

pub fn match_foundation(skin_rgb: [u8; 3]) -> FoundationMatch {
    let lab = imaging::lab_from_rgb(skin_rgb);
    let (shade, delta_e) = nearest_shade(lab);
    tracing::debug!(shade = shade.name, delta_e, l = lab[0], "foundation match");
    FoundationMatch {
        shade: shade.name.to_string(),
        shade_hex: shade.hex.to_string(),
        category: shade.category,
        delta_e,
        skin_lab: lab,
        skin_hex: hex_color(skin_rgb),
        skin_category: shade_category(lab[0]),
        undertone: color::undertone_from_hue(skin_rgb),
    }
}

/// Matches the dominant face colour of a frame.
pub fn match_foundation_in(image: &RgbImage, landmarks: &LandmarkSet, cfg: &ColorConfig) -> FoundationMatch {
    match_foundation(color::dominant_skin_color(image, landmarks, cfg))
}
