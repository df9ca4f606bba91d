//! Synthetic faces for tests (enabled by the `test-support` feature).
//!
//! Builds a full 478-point mesh from a handful of proportions: region rings
//! are laid out on ellipses in polygon order, then anatomical anchors are
//! pinned on top. Proportions are normalised to a square frame.

use std::f32::consts::{FRAC_PI_2, PI};

use image::{Rgb, RgbImage};

use crate::geometry::FaceGeometry;
use crate::imaging::Mask;
use crate::landmarks as lm;
use crate::types::{Landmark, LandmarkSet};

pub const FRAME: u32 = 200;

#[derive(Debug, Clone, Copy)]
pub struct FaceSpec {
    pub cheek: f32,
    pub jaw: f32,
    pub forehead: f32,
    pub midface: f32,
    pub height: f32,
    /// Vertical drop from the jaw corners to the chin.
    pub jaw_drop: f32,
}

impl Default for FaceSpec {
    fn default() -> Self {
        Self { cheek: 0.5, jaw: 0.39, forehead: 0.44, midface: 0.475, height: 0.72, jaw_drop: 0.16 }
    }
}

impl FaceSpec {
    /// Jaw as wide as the cheeks, height 1.1× cheek width, flat chin line.
    pub fn round() -> Self {
        Self { cheek: 0.6, jaw: 0.6, forehead: 0.552, midface: 0.588, height: 0.66, jaw_drop: 0.004 }
    }

    pub fn landmarks(&self) -> LandmarkSet {
        let mut pts = vec![Landmark::new(0.5, 0.5); lm::MESH_POINTS_WITH_IRIS];
        let top = 0.18;
        let chin = top + self.height;
        let jaw_y = chin - self.jaw_drop;
        let cx = 0.5;

        let mut ring = |indices: &[usize], centre: (f32, f32), radii: (f32, f32), start: f32, dir: f32| {
            let n = indices.len() as f32;
            for (i, &idx) in indices.iter().enumerate() {
                let t = start + dir * 2.0 * PI * i as f32 / n;
                pts[idx] = Landmark::new(centre.0 + radii.0 * t.cos(), centre.1 + radii.1 * t.sin());
            }
        };

        ring(&lm::FACE_OVAL[..], (cx, top + self.height / 2.0), (self.cheek / 2.0, self.height / 2.0), -FRAC_PI_2, 1.0);
        ring(&lm::FOREHEAD[..], (cx, 0.28), (self.forehead / 2.0, 0.05), PI, -1.0);
        ring(&lm::LEFT_CHEEK[..], (0.33, 0.56), (0.05, 0.05), 0.0, 1.0);
        ring(&lm::RIGHT_CHEEK[..], (0.67, 0.56), (0.05, 0.05), 0.0, 1.0);
        ring(&lm::NOSE[..], (cx, 0.52), (0.035, 0.08), -FRAC_PI_2, 1.0);
        ring(&lm::UPPER_LIP_ZONE[..], (cx, 0.65), (0.07, 0.025), -FRAC_PI_2, 1.0);
        ring(&lm::LEFT_EYE[..], (0.38, 0.40), (0.05, 0.02), PI, 1.0);
        ring(&lm::RIGHT_EYE[..], (0.62, 0.40), (0.05, 0.02), PI, 1.0);
        ring(&lm::LEFT_BROW[..], (0.38, 0.33), (0.06, 0.012), PI, 1.0);
        ring(&lm::RIGHT_BROW[..], (0.62, 0.33), (0.06, 0.012), PI, 1.0);
        ring(&lm::LIPS[..], (cx, 0.72), (0.1, 0.04), PI, 1.0);

        // Jaw loop: lower half-ellipse from the left jaw corner through the chin.
        let n = (lm::JAW_LOOP.len() - 1) as f32;
        for (i, &idx) in lm::JAW_LOOP.iter().enumerate() {
            let t = PI - PI * i as f32 / n;
            pts[idx] = Landmark::new(cx + self.jaw / 2.0 * t.cos(), jaw_y + self.jaw_drop * t.sin());
        }

        let mut pin = |idx: usize, x: f32, y: f32| pts[idx] = Landmark::new(x, y);
        pin(lm::FOREHEAD_TOP, cx, top);
        pin(lm::CHIN, cx, chin);
        pin(lm::CHEEK_LEFT, cx - self.cheek / 2.0, 0.45);
        pin(lm::CHEEK_RIGHT, cx + self.cheek / 2.0, 0.45);
        pin(lm::MIDFACE_LEFT, cx - self.midface / 2.0, 0.5);
        pin(lm::MIDFACE_RIGHT, cx + self.midface / 2.0, 0.5);
        pin(lm::FOREHEAD_LEFT, cx - self.forehead / 2.0, 0.28);
        pin(lm::FOREHEAD_RIGHT, cx + self.forehead / 2.0, 0.28);
        pin(lm::JAW_LEFT, cx - self.jaw / 2.0, jaw_y);
        pin(lm::JAW_RIGHT, cx + self.jaw / 2.0, jaw_y);
        pin(lm::BROW_CENTER, cx, 0.33);
        pin(lm::LEFT_BROW_MID, 0.38, 0.33);
        pin(lm::RIGHT_BROW_MID, 0.62, 0.33);
        pin(lm::LEFT_IRIS_CENTER, 0.38, 0.40);
        pin(lm::RIGHT_IRIS_CENTER, 0.62, 0.40);
        pin(lm::UPPER_LIP_TOP, cx, 0.68);
        pin(lm::NOSE_ALA_LEFT, cx - 0.06, 0.58);
        pin(lm::NOSE_ALA_RIGHT, cx + 0.06, 0.58);

        LandmarkSet::new(pts)
    }
}

/// Flat-coloured portrait matching [`FaceSpec::landmarks`].
#[derive(Debug, Clone, Copy)]
pub struct Portrait {
    pub background: [u8; 3],
    pub skin: [u8; 3],
    pub hair: [u8; 3],
    pub iris: [u8; 3],
}

impl Default for Portrait {
    fn default() -> Self {
        Self { background: [230, 230, 230], skin: [205, 160, 130], hair: [60, 40, 25], iris: [70, 45, 30] }
    }
}

impl Portrait {
    pub fn paint(&self, landmarks: &LandmarkSet) -> RgbImage {
        let mut img = RgbImage::from_pixel(FRAME, FRAME, Rgb(self.background));
        let geo = FaceGeometry::new(landmarks, FRAME, FRAME);
        let face = Mask::from_polygon(&geo, &lm::FACE_OVAL);
        for (x, y) in face.coords() {
            img.put_pixel(x, y, Rgb(self.skin));
        }
        // Hair band above the forehead.
        let (_, top) = geo.point(lm::FOREHEAD_TOP);
        for y in 0..(top as u32).min(FRAME) {
            for x in (FRAME / 4)..(FRAME * 3 / 4) {
                img.put_pixel(x, y, Rgb(self.hair));
            }
        }
        for idx in [lm::LEFT_IRIS_CENTER, lm::RIGHT_IRIS_CENTER] {
            let (cx, cy) = geo.point(idx);
            let mut iris = Mask::empty(FRAME, FRAME);
            iris.fill_circle(cx, cy, 4.0);
            for (x, y) in iris.coords() {
                img.put_pixel(x, y, Rgb(self.iris));
            }
        }
        img
    }
}
