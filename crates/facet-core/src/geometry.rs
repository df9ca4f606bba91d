//! Pixel-space measurements over a landmark set.

use crate::landmarks as lm;
use crate::types::LandmarkSet;

/// Smallest divisor used by every ratio, in pixels.
pub const MIN_DIVISOR: f32 = 1.0;

/// Euclidean distance between two pixel points.
pub fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Angle at vertex `b` between rays `b→a` and `b→c`, in degrees.
///
/// The cosine is clamped to [-1, 1] before `acos`. A zero-length ray has no
/// direction and yields 0°.
pub fn angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);
    let norm = (ba.0.hypot(ba.1)) * (bc.0.hypot(bc.1));
    if norm <= f32::EPSILON {
        return 0.0;
    }
    let cos = ((ba.0 * bc.0 + ba.1 * bc.1) / norm).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// `numerator / denominator` with the denominator floored at [`MIN_DIVISOR`].
pub fn ratio(numerator: f32, denominator: f32) -> f32 {
    numerator / denominator.max(MIN_DIVISOR)
}

/// Landmark set bound to the frame it was normalised against.
#[derive(Debug, Clone, Copy)]
pub struct FaceGeometry<'a> {
    landmarks: &'a LandmarkSet,
    width: u32,
    height: u32,
}

impl<'a> FaceGeometry<'a> {
    pub fn new(landmarks: &'a LandmarkSet, width: u32, height: u32) -> Self {
        Self { landmarks, width, height }
    }

    pub fn point(&self, idx: usize) -> (f32, f32) {
        self.landmarks.pixel(idx, self.width, self.height)
    }

    pub fn dist(&self, a: usize, b: usize) -> f32 {
        distance(self.point(a), self.point(b))
    }

    pub fn angle_at(&self, a: usize, vertex: usize, c: usize) -> f32 {
        angle(self.point(a), self.point(vertex), self.point(c))
    }

    pub fn cheek_width(&self) -> f32 {
        self.dist(lm::CHEEK_LEFT, lm::CHEEK_RIGHT)
    }

    pub fn jaw_width(&self) -> f32 {
        self.dist(lm::JAW_LEFT, lm::JAW_RIGHT)
    }

    pub fn forehead_width(&self) -> f32 {
        self.dist(lm::FOREHEAD_LEFT, lm::FOREHEAD_RIGHT)
    }

    pub fn midface_width(&self) -> f32 {
        self.dist(lm::MIDFACE_LEFT, lm::MIDFACE_RIGHT)
    }

    /// Forehead top to chin.
    pub fn face_height(&self) -> f32 {
        self.dist(lm::FOREHEAD_TOP, lm::CHIN)
    }

    /// Angle at the chin between the two jaw corners. A wide, flat lower face
    /// approaches 180°, a pointed chin gets smaller.
    pub fn chin_angle(&self) -> f32 {
        self.angle_at(lm::JAW_LEFT, lm::CHIN, lm::JAW_RIGHT)
    }

    /// Width of the face at the given pair, relative to cheek width.
    pub fn width_ratio(&self, a: usize, b: usize) -> f32 {
        ratio(self.dist(a, b), self.cheek_width())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;

    #[test]
    fn test_distance_pythagorean() {
        assert!((distance((0.0, 0.0), (3.0, 4.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_angle_right_angle() {
        let a = angle((1.0, 0.0), (0.0, 0.0), (0.0, 1.0));
        assert!((a - 90.0).abs() < 1e-4, "got {a}");
    }

    #[test]
    fn test_angle_straight_line_clamped() {
        // Collinear rays can drift past -1 in floating point.
        let a = angle((-1e6, 0.0), (0.0, 0.0), (1e6, 1e-7));
        assert!((a - 180.0).abs() < 1e-3, "got {a}");
        assert!(a.is_finite());
    }

    #[test]
    fn test_angle_degenerate_is_zero() {
        assert_eq!(angle((2.0, 2.0), (2.0, 2.0), (5.0, 1.0)), 0.0);
    }

    #[test]
    fn test_ratio_floors_divisor() {
        assert_eq!(ratio(3.0, 0.0), 3.0);
        assert_eq!(ratio(3.0, 0.25), 3.0);
        assert_eq!(ratio(3.0, 2.0), 1.5);
    }

    #[test]
    fn test_coincident_landmarks_do_not_divide_by_zero() {
        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5); lm::MESH_POINTS]);
        let geo = FaceGeometry::new(&set, 640, 480);
        let r = geo.width_ratio(lm::JAW_LEFT, lm::JAW_RIGHT);
        assert!(r.is_finite());
        assert_eq!(r, 0.0);
        assert_eq!(geo.chin_angle(), 0.0);
    }
}
