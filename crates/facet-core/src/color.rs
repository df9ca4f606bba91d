//! Colour profile: skin tone and undertone, eye colour, hair colour and the
//! seasonal palette derived from them. Also hosts the CIEDE2000 colour
//! difference used by foundation matching.

use image::RgbImage;
use palette::color_difference::Ciede2000;
use palette::white_point::D65;
use palette::{FromColor, Hsv, Lab, Srgb};
use serde::{Deserialize, Serialize};

use crate::cluster;
use crate::config::ColorConfig;
use crate::geometry::FaceGeometry;
use crate::imaging::{self, Mask};
use crate::landmarks as lm;
use crate::types::{hex_color, LandmarkSet};

const FALLBACK_SKIN: [u8; 3] = [198, 134, 66];
const FALLBACK_EYE: [u8; 3] = [139, 69, 19];
const FALLBACK_HAIR: [u8; 3] = [101, 67, 33];
const FALLBACK_DOMINANT_SKIN: [u8; 3] = [200, 180, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkinTone {
    Fair,
    #[serde(rename = "Light-Medium")]
    LightMedium,
    Medium,
    #[serde(rename = "Medium-Dark")]
    MediumDark,
    Deep,
}

impl SkinTone {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fair => "Fair",
            Self::LightMedium => "Light-Medium",
            Self::Medium => "Medium",
            Self::MediumDark => "Medium-Dark",
            Self::Deep => "Deep",
        }
    }

    pub fn is_light(&self) -> bool {
        matches!(self, Self::Fair | Self::LightMedium)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Undertone {
    Warm,
    Cool,
    Neutral,
}

impl Undertone {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Warm => "Warm",
            Self::Cool => "Cool",
            Self::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EyeColor {
    Blue,
    Green,
    Hazel,
    Brown,
    #[serde(rename = "Dark Brown")]
    DarkBrown,
}

impl EyeColor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Green => "Green",
            Self::Hazel => "Hazel",
            Self::Brown => "Brown",
            Self::DarkBrown => "Dark Brown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HairColor {
    Black,
    #[serde(rename = "Dark Brown")]
    DarkBrown,
    Auburn,
    Brown,
    #[serde(rename = "Light Brown")]
    LightBrown,
    Red,
    Blonde,
    #[serde(rename = "Light Blonde")]
    LightBlonde,
}

impl HairColor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Black => "Black",
            Self::DarkBrown => "Dark Brown",
            Self::Auburn => "Auburn",
            Self::Brown => "Brown",
            Self::LightBrown => "Light Brown",
            Self::Red => "Red",
            Self::Blonde => "Blonde",
            Self::LightBlonde => "Light Blonde",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Autumn => "Autumn",
            Self::Winter => "Winter",
        }
    }

    pub fn palette(&self) -> &'static str {
        match self {
            Self::Spring => "Warm, bright colors like coral, peach, golden yellow",
            Self::Summer => "Cool, soft colors like lavender, rose, powder blue",
            Self::Autumn => "Warm, earthy tones like rust, olive, camel",
            Self::Winter => "Cool, bold colors like royal blue, emerald, black",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorProfile {
    pub skin_tone: SkinTone,
    pub undertone: Undertone,
    pub skin_hex: String,
    pub eye_color: EyeColor,
    pub eye_hex: String,
    pub hair_color: HairColor,
    pub hair_hex: String,
    pub season: Season,
}

// --- Skin tone ---

pub fn classify_undertone(rgb: [f32; 3], cfg: &ColorConfig) -> Undertone {
    let warm = (rgb[0] + rgb[1]) / 2.0;
    let blue = rgb[2];
    if warm > blue * cfg.warm_margin {
        Undertone::Warm
    } else if blue > warm * cfg.cool_margin {
        Undertone::Cool
    } else {
        Undertone::Neutral
    }
}

pub fn tone_from_brightness(brightness: f32, cfg: &ColorConfig) -> SkinTone {
    let [deep, medium_dark, medium, light_medium] = cfg.tone_bands;
    if brightness < deep {
        SkinTone::Deep
    } else if brightness < medium_dark {
        SkinTone::MediumDark
    } else if brightness < medium {
        SkinTone::Medium
    } else if brightness < light_medium {
        SkinTone::LightMedium
    } else {
        SkinTone::Fair
    }
}

/// Average cheek colour sampled in two discs at the cheekbone landmarks.
pub fn detect_skin_tone(image: &RgbImage, geo: &FaceGeometry<'_>, cfg: &ColorConfig) -> (SkinTone, Undertone, [u8; 3]) {
    let radius = (geo.width() as f32 * cfg.cheek_radius).floor();
    let mut mask = Mask::empty(image.width(), image.height());
    for idx in [lm::CHEEK_LEFT, lm::CHEEK_RIGHT] {
        let (x, y) = geo.point(idx);
        mask.fill_circle(x, y, radius);
    }
    let pixels = imaging::masked_pixels(image, &mask);
    if pixels.len() < cfg.min_skin_pixels {
        tracing::debug!(pixels = pixels.len(), "too few cheek pixels, default skin tone");
        return (SkinTone::Medium, Undertone::Neutral, FALLBACK_SKIN);
    }

    let n = pixels.len() as f32;
    let mut sum = [0f32; 3];
    for p in &pixels {
        for c in 0..3 {
            sum[c] += p[c] as f32;
        }
    }
    let avg = sum.map(|s| (s / n).floor());
    let brightness = avg.iter().sum::<f32>() / 3.0;
    let tone = tone_from_brightness(brightness, cfg);
    let undertone = classify_undertone(avg, cfg);
    (tone, undertone, avg.map(|v| v as u8))
}

// --- Eyes ---

pub fn classify_eye(rgb: [u8; 3]) -> EyeColor {
    let [r, g, b] = rgb.map(f32::from);
    if b > 120.0 && b > r * 1.3 && b > g * 1.2 {
        EyeColor::Blue
    } else if g > 100.0 && g > r * 1.1 && b > 80.0 {
        EyeColor::Green
    } else if g > r * 0.9 && g > b * 1.2 && r > 80.0 {
        EyeColor::Hazel
    } else if r < 80.0 && g < 80.0 && b < 80.0 {
        EyeColor::DarkBrown
    } else {
        EyeColor::Brown
    }
}

/// Iris centres: the refined iris landmarks when present, otherwise the
/// centroid of each eye's contour points.
fn iris_centres(landmarks: &LandmarkSet, geo: &FaceGeometry<'_>) -> [(f32, f32); 2] {
    if landmarks.has_iris() {
        return [geo.point(lm::LEFT_IRIS_CENTER), geo.point(lm::RIGHT_IRIS_CENTER)];
    }
    let centroid = |idx: &[usize]| {
        let (sx, sy) = idx.iter().map(|&i| geo.point(i)).fold((0.0, 0.0), |a, p| (a.0 + p.0, a.1 + p.1));
        (sx / idx.len() as f32, sy / idx.len() as f32)
    };
    [centroid(&lm::LEFT_EYE_CONTOUR[..]), centroid(&lm::RIGHT_EYE_CONTOUR[..])]
}

fn median(values: &mut [u8]) -> u8 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        ((values[mid - 1] as u16 + values[mid] as u16) / 2) as u8
    } else {
        values[mid]
    }
}

pub fn detect_eye_color(
    image: &RgbImage,
    landmarks: &LandmarkSet,
    geo: &FaceGeometry<'_>,
    cfg: &ColorConfig,
) -> (EyeColor, [u8; 3]) {
    let radius = (geo.width() as f32 * cfg.iris_radius).floor();
    let mut mask = Mask::empty(image.width(), image.height());
    for (x, y) in iris_centres(landmarks, geo) {
        mask.fill_circle(x, y, radius);
    }
    let pixels = imaging::masked_pixels(image, &mask);
    if pixels.len() < cfg.min_iris_pixels {
        return (EyeColor::Brown, FALLBACK_EYE);
    }

    // Drop eyelash and specular pixels unless that leaves too few.
    let filtered: Vec<[u8; 3]> = pixels
        .iter()
        .copied()
        .filter(|p| p.iter().all(|&c| c > cfg.iris_min && c < cfg.iris_max))
        .collect();
    let sample = if filtered.len() < cfg.min_iris_pixels { pixels } else { filtered };

    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let mut channel: Vec<u8> = sample.iter().map(|p| p[c]).collect();
        *out = median(&mut channel);
    }
    (classify_eye(rgb), rgb)
}

// --- Hair ---

pub fn classify_hair(rgb: [u8; 3]) -> HairColor {
    let [r, g, b] = rgb.map(f32::from);
    let brightness = (r + g + b) / 3.0;
    if brightness < 50.0 {
        HairColor::Black
    } else if brightness < 100.0 {
        HairColor::DarkBrown
    } else if brightness < 150.0 {
        if r > g * 1.15 {
            HairColor::Auburn
        } else {
            HairColor::Brown
        }
    } else if brightness < 190.0 {
        if r > g * 1.2 && r > 140.0 {
            HairColor::Red
        } else if g > r * 1.1 {
            HairColor::LightBrown
        } else {
            HairColor::Brown
        }
    } else if r > 200.0 && g > 180.0 {
        HairColor::Blonde
    } else if r > 180.0 && g > 160.0 {
        HairColor::LightBlonde
    } else {
        HairColor::Blonde
    }
}

/// Dominant colour of a band of rows above the forehead landmark.
pub fn detect_hair_color(image: &RgbImage, geo: &FaceGeometry<'_>, cfg: &ColorConfig) -> (HairColor, [u8; 3]) {
    let (_, fy) = geo.point(lm::FOREHEAD_TOP);
    let fy = fy.max(0.0) as u32;
    if fy < cfg.hair_guard {
        return (HairColor::Brown, FALLBACK_HAIR);
    }
    let top = fy.saturating_sub(cfg.hair_far);
    let bottom = fy.saturating_sub(cfg.hair_near).min(image.height());

    let mut pixels = Vec::new();
    for y in top..bottom {
        for x in 0..image.width() {
            pixels.push(image.get_pixel(x, y).0);
        }
    }
    if pixels.is_empty() {
        return (HairColor::Brown, FALLBACK_HAIR);
    }

    let kept: Vec<[f32; 3]> = pixels
        .iter()
        .filter(|p| p.iter().all(|&c| c < cfg.blown_out))
        .map(|p| p.map(f32::from))
        .collect();
    let samples = if kept.len() < 10 { pixels.iter().map(|p| p.map(f32::from)).collect() } else { kept };

    let Some(clusters) = cluster::kmeans(&samples, cfg.hair_clusters, cfg.cluster_iterations, cfg.cluster_seed) else {
        return (HairColor::Brown, FALLBACK_HAIR);
    };
    let rgb = clusters.centers[clusters.largest()].map(|v| v.clamp(0.0, 255.0) as u8);
    (classify_hair(rgb), rgb)
}

// --- Season ---

pub fn season_for(tone: SkinTone, undertone: Undertone, eye: EyeColor, hair: HairColor) -> Season {
    let mut warm = 0;
    let mut cool = 0;
    match undertone {
        Undertone::Warm => warm += 2,
        Undertone::Cool => cool += 2,
        Undertone::Neutral => {}
    }
    match eye {
        EyeColor::Blue | EyeColor::Green => cool += 1,
        EyeColor::Brown | EyeColor::DarkBrown => warm += 1,
        EyeColor::Hazel => {}
    }
    match hair {
        HairColor::Auburn | HairColor::Red | HairColor::Blonde => warm += 1,
        HairColor::Black | HairColor::DarkBrown => cool += 1,
        _ => {}
    }
    match (warm > cool, tone.is_light()) {
        (true, true) => Season::Spring,
        (true, false) => Season::Autumn,
        (false, true) => Season::Summer,
        (false, false) => Season::Winter,
    }
}

pub fn extract_color_profile(image: &RgbImage, landmarks: &LandmarkSet, cfg: &ColorConfig) -> ColorProfile {
    let geo = FaceGeometry::new(landmarks, image.width(), image.height());
    let (skin_tone, undertone, skin) = detect_skin_tone(image, &geo, cfg);
    let (eye_color, eye) = detect_eye_color(image, landmarks, &geo, cfg);
    let (hair_color, hair) = detect_hair_color(image, &geo, cfg);
    let season = season_for(skin_tone, undertone, eye_color, hair_color);
    tracing::debug!(
        skin_tone = skin_tone.name(),
        undertone = undertone.name(),
        eye = eye_color.name(),
        hair = hair_color.name(),
        season = season.name(),
        "colour profile"
    );
    ColorProfile {
        skin_tone,
        undertone,
        skin_hex: hex_color(skin),
        eye_color,
        eye_hex: hex_color(eye),
        hair_color,
        hair_hex: hex_color(hair),
        season,
    }
}

// --- Foundation support ---

/// Undertone from the HSV hue of a colour: reds and oranges are warm,
/// greens through blues are cool.
pub fn undertone_from_hue(rgb: [u8; 3]) -> Undertone {
    let hsv = Hsv::from_color(Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>());
    let hue = hsv.hue.into_positive_degrees();
    if !(30.0..=330.0).contains(&hue) {
        Undertone::Warm
    } else if hue > 150.0 && hue < 270.0 {
        Undertone::Cool
    } else {
        Undertone::Neutral
    }
}

/// Dominant colour inside the face oval with eyes, brows and lips removed.
pub fn dominant_skin_color(image: &RgbImage, landmarks: &LandmarkSet, cfg: &ColorConfig) -> [u8; 3] {
    let geo = FaceGeometry::new(landmarks, image.width(), image.height());
    let mut features = Mask::empty(image.width(), image.height());
    for poly in [&lm::LEFT_EYE[..], &lm::RIGHT_EYE[..], &lm::LEFT_BROW[..], &lm::RIGHT_BROW[..], &lm::LIPS[..]] {
        features = features.union(&Mask::from_polygon(&geo, poly));
    }
    let face = Mask::from_polygon(&geo, &lm::FACE_OVAL).subtract(&features);
    let samples: Vec<[f32; 3]> = imaging::masked_pixels(image, &face).iter().map(|p| p.map(f32::from)).collect();

    match cluster::kmeans(&samples, cfg.skin_clusters, cfg.cluster_iterations, cfg.cluster_seed) {
        Some(c) => c.centers[c.largest()].map(|v| v.clamp(0.0, 255.0) as u8),
        None => FALLBACK_DOMINANT_SKIN,
    }
}

/// CIEDE2000 colour difference between two L*a*b* (D65) colours.
pub fn ciede2000(lab1: [f32; 3], lab2: [f32; 3]) -> f32 {
    let [l1, a1, b1] = lab1;
    let [l2, a2, b2] = lab2;
    Lab::<D65, f32>::new(l1, a1, b1).difference(Lab::new(l2, a2, b2))
}
