use serde::{Deserialize, Serialize};

/// One face-mesh point, normalised to the frame: `x` and `y` in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered landmark set produced by the upstream face-mesh detector.
///
/// Index identity is significant: see [`crate::landmarks`] for the pinned
/// index table. The set is read-only for the whole analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    pub fn get(&self, idx: usize) -> Option<Landmark> {
        self.points.get(idx).copied()
    }

    /// Denormalised pixel position of landmark `idx`.
    ///
    /// A missing index maps to the origin; callers validate the set once at
    /// the pipeline boundary instead of checking every lookup.
    pub fn pixel(&self, idx: usize, width: u32, height: u32) -> (f32, f32) {
        let p = self.points.get(idx).copied().unwrap_or_default();
        (p.x * width as f32, p.y * height as f32)
    }

    /// Re-normalise every point to a sub-rectangle of the original
    /// `width × height` frame.
    pub fn reframe(&self, width: u32, height: u32, rect: PixelRect) -> Self {
        let rw = rect.width.max(1) as f32;
        let rh = rect.height.max(1) as f32;
        let points = self
            .points
            .iter()
            .map(|p| Landmark::new((p.x * width as f32 - rect.x as f32) / rw, (p.y * height as f32 - rect.y as f32) / rh))
            .collect();
        Self { points }
    }

    /// Whether the refined iris points are present.
    pub fn has_iris(&self) -> bool {
        self.points.len() >= crate::landmarks::MESH_POINTS_WITH_IRIS
    }

    /// Parse either one set (an array of points) or several (an array of
    /// arrays).
    pub fn parse_json(json: &str) -> Result<Vec<LandmarkSet>, serde_json::Error> {
        match serde_json::from_str::<Vec<LandmarkSet>>(json) {
            Ok(faces) => Ok(faces),
            Err(_) => serde_json::from_str::<LandmarkSet>(json).map(|set| vec![set]),
        }
    }
}

impl From<Vec<Landmark>> for LandmarkSet {
    fn from(points: Vec<Landmark>) -> Self {
        Self::new(points)
    }
}

/// Axis-aligned pixel rectangle, always inside the frame it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    /// Bounding rectangle of all landmarks, grown by `margin` (fraction of
    /// the box size) on each side and clamped to the frame. Never empty for a
    /// non-empty frame.
    pub fn around(landmarks: &LandmarkSet, width: u32, height: u32, margin: f32) -> Self {
        if width == 0 || height == 0 {
            return Self { x: 0, y: 0, width: 0, height: 0 };
        }
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in landmarks.points() {
            let (px, py) = (p.x * width as f32, p.y * height as f32);
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
        if !min_x.is_finite() || !min_y.is_finite() {
            return Self { x: 0, y: 0, width, height };
        }

        let pad_x = (max_x - min_x) * margin;
        let pad_y = (max_y - min_y) * margin;
        let x0 = (min_x - pad_x).floor().clamp(0.0, (width - 1) as f32) as u32;
        let y0 = (min_y - pad_y).floor().clamp(0.0, (height - 1) as f32) as u32;
        let x1 = (max_x + pad_x).ceil().clamp(0.0, width as f32) as u32;
        let y1 = (max_y + pad_y).ceil().clamp(0.0, height as f32) as u32;

        Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0).max(1),
            height: y1.saturating_sub(y0).max(1),
        }
    }
}

/// Format an RGB triple as `#rrggbb`.
pub fn hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}
