//! Pixel-level helpers: region masks, filtering, lighting normalisation and
//! per-region statistics.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use imageproc::point::Point;
use imageproc::rect::Rect;
use palette::{FromColor, Lab, Srgb};

use crate::geometry::FaceGeometry;
use crate::types::PixelRect;

const ON: Luma<u8> = Luma([255]);

/// Binary region mask with the same dimensions as the frame it was built for.
///
/// Regions are drawn with `imageproc` into an 8-bit image where any non-zero
/// pixel is inside the mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    canvas: GrayImage,
}

impl Mask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self { canvas: GrayImage::new(width, height) }
    }

    /// Polygon through the given landmarks, in landmark order.
    pub fn from_polygon(geo: &FaceGeometry<'_>, indices: &[usize]) -> Self {
        let points: Vec<(f32, f32)> = indices.iter().map(|&i| geo.point(i)).collect();
        let mut mask = Self::empty(geo.width(), geo.height());
        mask.fill_polygon(&points);
        mask
    }

    /// Fill a polygon, boundary included, with vertices rounded to the pixel
    /// grid. Polygons with zero area fill nothing.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)]) {
        let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let p = Point::new(x.round() as i32, y.round() as i32);
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }
        // imageproc closes the polygon itself and rejects an explicit closing vertex.
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 || doubled_area(&poly) == 0 {
            return;
        }
        draw_polygon_mut(&mut self.canvas, &poly, ON);
    }

    /// Axis-aligned rectangle `[x, x + width) × [y, y + height)`, clipped to the frame.
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        draw_filled_rect_mut(&mut self.canvas, Rect::at(x, y).of_size(width, height), ON);
    }

    /// Disc around `(cx, cy)`; centre and radius are rounded to whole pixels.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32) {
        if radius < 0.0 || !cx.is_finite() || !cy.is_finite() {
            return;
        }
        draw_filled_circle_mut(&mut self.canvas, (cx.round() as i32, cy.round() as i32), radius.round() as i32, ON);
    }

    pub fn union(mut self, other: &Mask) -> Self {
        for (a, b) in self.canvas.pixels_mut().zip(other.canvas.pixels()) {
            a.0[0] |= b.0[0];
        }
        self
    }

    pub fn subtract(mut self, other: &Mask) -> Self {
        for (a, b) in self.canvas.pixels_mut().zip(other.canvas.pixels()) {
            if b.0[0] != 0 {
                a.0[0] = 0;
            }
        }
        self
    }

    /// Restrict to a sub-rectangle, re-indexed to that rectangle's origin.
    pub fn crop(&self, rect: PixelRect) -> Self {
        let mut out = Self::empty(rect.width, rect.height);
        let visible = image::imageops::crop_imm(&self.canvas, rect.x, rect.y, rect.width, rect.height).to_image();
        image::imageops::replace(&mut out.canvas, &visible, 0, 0);
        out
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.canvas.get_pixel_checked(x, y).is_some_and(|p| p.0[0] != 0)
    }

    pub fn count(&self) -> usize {
        self.canvas.pixels().filter(|p| p.0[0] != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.canvas.pixels().all(|p| p.0[0] == 0)
    }

    /// Masked coordinates in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.canvas.enumerate_pixels().filter(|(_, _, p)| p.0[0] != 0).map(|(x, y, _)| (x, y))
    }
}

/// Twice the signed shoelace area; zero for collinear vertices.
fn doubled_area(poly: &[Point<i32>]) -> i64 {
    poly.iter()
        .zip(poly.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum()
}

pub fn to_gray(img: &RgbImage) -> GrayImage {
    image::imageops::grayscale(img)
}

pub fn crop(img: &RgbImage, rect: PixelRect) -> RgbImage {
    image::imageops::crop_imm(img, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Masked RGB pixels in row-major order.
pub fn masked_pixels(img: &RgbImage, mask: &Mask) -> Vec<[u8; 3]> {
    mask.coords()
        .filter(|&(x, y)| x < img.width() && y < img.height())
        .map(|(x, y)| img.get_pixel(x, y).0)
        .collect()
}

/// Edge-preserving smoothing: each output pixel is the average of its
/// neighbourhood weighted by spatial distance and colour difference.
pub fn bilateral_filter(img: &RgbImage, radius: u32, sigma_color: f32, sigma_space: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if radius == 0 || sigma_color <= 0.0 || sigma_space <= 0.0 {
        return img.clone();
    }
    let r = radius as i64;
    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let color_coeff = -0.5 / (sigma_color * sigma_color);

    let mut spatial = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            spatial.push(((dx * dx + dy * dy) as f32 * space_coeff).exp());
        }
    }

    let mut out = RgbImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let centre = img.get_pixel(x, y).0;
            let mut acc = [0f32; 3];
            let mut total = 0f32;
            let mut k = 0;
            for dy in -r..=r {
                for dx in -r..=r {
                    let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                    let p = img.get_pixel(sx, sy).0;
                    let diff: f32 = (0..3).map(|c| (p[c] as f32 - centre[c] as f32).powi(2)).sum();
                    let weight = spatial[k] * (diff * color_coeff).exp();
                    for c in 0..3 {
                        acc[c] += p[c] as f32 * weight;
                    }
                    total += weight;
                    k += 1;
                }
            }
            let px = acc.map(|v| (v / total).round().clamp(0.0, 255.0) as u8);
            out.put_pixel(x, y, Rgb(px));
        }
    }
    out
}

/// Multi-scale retinex per channel: average `ln(p) - ln(blur_s(p))` over the
/// given sigmas, then stretch back to 0..=255.
///
/// A channel with no spread after normalisation is returned unchanged, so a
/// uniform image comes back as is.
pub fn retinex(img: &RgbImage, sigmas: &[f32]) -> RgbImage {
    let (w, h) = img.dimensions();
    let sigmas: Vec<f32> = sigmas.iter().copied().filter(|&s| s > 0.0).collect();
    if w == 0 || h == 0 || sigmas.is_empty() {
        return img.clone();
    }

    let mut out = img.clone();
    for c in 0..3 {
        let mut channel = ImageBuffer::<Luma<f32>, Vec<f32>>::new(w, h);
        for (x, y, p) in img.enumerate_pixels() {
            channel.put_pixel(x, y, Luma([p.0[c] as f32 + 1.0]));
        }

        let mut acc = vec![0f32; (w * h) as usize];
        for &sigma in &sigmas {
            let blurred = gaussian_blur_f32(&channel, sigma);
            for (i, (orig, blur)) in channel.pixels().zip(blurred.pixels()).enumerate() {
                acc[i] += orig.0[0].ln() - blur.0[0].max(1.0).ln();
            }
        }
        let scale = sigmas.len() as f32;
        for v in acc.iter_mut() {
            *v /= scale;
        }

        let lo = acc.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = acc.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if hi - lo < 1e-3 {
            continue;
        }
        for (i, p) in out.pixels_mut().enumerate() {
            p.0[c] = ((acc[i] - lo) / (hi - lo) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// HSV value channel (max of R, G, B).
pub fn value_channel(img: &RgbImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y).0;
        Luma([p[0].max(p[1]).max(p[2])])
    })
}

/// Contrast-limited adaptive histogram equalisation on a `tiles × tiles`
/// grid. Per-tile histograms are clipped at `clip_limit` of the tile size,
/// the excess spread evenly, and each pixel blends the four nearest tile
/// mappings bilinearly.
pub fn clahe(gray: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let n = tiles.max(1) as usize;
    let tile_w = w / n;
    let tile_h = h / n;
    if tile_w == 0 || tile_h == 0 {
        return gray.clone();
    }
    let area = (tile_w * tile_h) as f32;
    let clip = ((clip_limit * area) as u32).max(1);

    let luts: Vec<[f32; 256]> = (0..n * n)
        .map(|t| {
            let (row, col) = (t / n, t % n);
            let mut hist = [0u32; 256];
            for y in row * tile_h..(row + 1) * tile_h {
                for x in col * tile_w..(col + 1) * tile_w {
                    hist[gray.get_pixel(x as u32, y as u32).0[0] as usize] += 1;
                }
            }
            tile_lut(&mut hist, clip, area)
        })
        .collect();

    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;
        let fy = (y as f32 / tile_h as f32 - 0.5).clamp(0.0, (n - 1) as f32);
        let fx = (x as f32 / tile_w as f32 - 0.5).clamp(0.0, (n - 1) as f32);
        let (r0, c0) = (fy as usize, fx as usize);
        let (r1, c1) = ((r0 + 1).min(n - 1), (c0 + 1).min(n - 1));
        let (dy, dx) = (fy - r0 as f32, fx - c0 as f32);

        let top = luts[r0 * n + c0][v] * (1.0 - dx) + luts[r0 * n + c1][v] * dx;
        let bottom = luts[r1 * n + c0][v] * (1.0 - dx) + luts[r1 * n + c1][v] * dx;
        Luma([(top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(hist: &mut [u32; 256], clip: u32, area: f32) -> [f32; 256] {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let share = excess / 256;
    let rest = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < rest);
    }

    let mut lut = [0f32; 256];
    let mut running = 0f32;
    for (i, &count) in hist.iter().enumerate() {
        running += count as f32;
        lut[i] = running;
    }
    let first = lut.iter().copied().find(|&v| v > 0.0).unwrap_or(0.0);
    let span = area - first;
    if span > 0.0 {
        for v in lut.iter_mut() {
            *v = ((*v - first) / span * 255.0).clamp(0.0, 255.0);
        }
    }
    lut
}

/// Mean grey level over the mask, `None` when the mask covers nothing.
pub fn masked_mean(gray: &GrayImage, mask: &Mask) -> Option<f32> {
    let values: Vec<f32> = masked_gray(gray, mask).map(f32::from).collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

/// Population standard deviation of grey levels over the mask.
pub fn masked_std(gray: &GrayImage, mask: &Mask) -> Option<f32> {
    let values: Vec<f32> = masked_gray(gray, mask).map(f32::from).collect();
    variance(&values).map(f32::sqrt)
}

/// Shannon entropy (bits) of the grey-level histogram over the mask.
pub fn masked_entropy(gray: &GrayImage, mask: &Mask) -> Option<f32> {
    let mut hist = [0u32; 256];
    let mut total = 0u32;
    for v in masked_gray(gray, mask) {
        hist[v as usize] += 1;
        total += 1;
    }
    if total == 0 {
        return None;
    }
    let total = total as f32;
    Some(
        hist.iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f32 / total;
                -p * p.log2()
            })
            .sum(),
    )
}

/// Signed Laplacian response of a grey frame.
pub type LaplacianResponse = ImageBuffer<Luma<i16>, Vec<i16>>;

pub fn laplacian(gray: &GrayImage) -> LaplacianResponse {
    laplacian_filter(gray)
}

/// Variance of a precomputed Laplacian response over the mask: a sharpness
/// and roughness measure.
pub fn masked_laplacian_variance(response: &LaplacianResponse, mask: &Mask) -> Option<f32> {
    let values: Vec<f32> = mask
        .coords()
        .filter(|&(x, y)| x < response.width() && y < response.height())
        .map(|(x, y)| response.get_pixel(x, y).0[0] as f32)
        .collect();
    variance(&values)
}

/// Filters the whole frame; use [`laplacian`] with
/// [`masked_laplacian_variance`] when reading several regions.
pub fn laplacian_variance(gray: &GrayImage, mask: &Mask) -> Option<f32> {
    masked_laplacian_variance(&laplacian(gray), mask)
}

fn masked_gray<'a>(gray: &'a GrayImage, mask: &'a Mask) -> impl Iterator<Item = u8> + 'a {
    mask.coords()
        .filter(|&(x, y)| x < gray.width() && y < gray.height())
        .map(|(x, y)| gray.get_pixel(x, y).0[0])
}

fn variance(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n)
}

/// Logistic calibration `1 / (1 + e^(-k (x - mid)))`.
pub fn sigmoid(x: f32, mid: f32, k: f32) -> f32 {
    1.0 / (1.0 + (-k * (x - mid)).exp())
}

/// CIE L*a*b* (D65) of an 8-bit sRGB colour: L in 0..=100, a/b signed.
pub fn lab_from_rgb(rgb: [u8; 3]) -> [f32; 3] {
    let srgb = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format::<f32>();
    let lab = Lab::from_color(srgb.into_linear());
    [lab.l, lab.a, lab.b]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stddev(img: &GrayImage) -> f32 {
        let values: Vec<f32> = img.pixels().map(|p| p.0[0] as f32).collect();
        variance(&values).unwrap_or(0.0).sqrt()
    }

    #[test]
    fn test_polygon_fill_square() {
        let mut m = Mask::empty(10, 10);
        m.fill_polygon(&[(2.0, 2.0), (6.0, 2.0), (6.0, 6.0), (2.0, 6.0)]);
        assert_eq!(m.count(), 25);
        assert!(m.contains(2, 2));
        assert!(m.contains(6, 6));
        assert!(!m.contains(7, 7));
    }

    #[test]
    fn test_polygon_fill_accepts_closed_ring_and_collinear() {
        let mut m = Mask::empty(10, 10);
        m.fill_polygon(&[(1.0, 1.0), (4.0, 1.0), (4.0, 4.0), (1.0, 4.0), (1.0, 1.0)]);
        assert_eq!(m.count(), 16);
        let mut line = Mask::empty(10, 10);
        line.fill_polygon(&[(1.0, 1.0), (4.0, 4.0), (7.0, 7.0)]);
        assert!(line.is_empty());
    }

    #[test]
    fn test_rect_fill_is_half_open_and_clipped() {
        let mut m = Mask::empty(10, 10);
        m.fill_rect(2, 3, 4, 2);
        assert_eq!(m.count(), 8);
        assert!(m.contains(5, 4));
        assert!(!m.contains(6, 4));
        let mut edge = Mask::empty(4, 4);
        edge.fill_rect(-2, -2, 4, 4);
        assert_eq!(edge.count(), 4);
    }

    #[test]
    fn test_crop_reindexes() {
        let mut m = Mask::empty(10, 10);
        m.fill_rect(4, 4, 2, 2);
        let c = m.crop(PixelRect { x: 3, y: 3, width: 4, height: 4 });
        assert_eq!(c.count(), 4);
        assert!(c.contains(1, 1));
        assert!(!c.contains(0, 0));
    }

    #[test]
    fn test_polygon_fill_degenerate_is_empty() {
        let mut m = Mask::empty(10, 10);
        m.fill_polygon(&[(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)]);
        assert!(m.is_empty());
        m.fill_polygon(&[(1.0, 1.0), (8.0, 1.0)]);
        assert!(m.is_empty());
    }

    #[test]
    fn test_polygon_fill_clips_to_frame() {
        let mut m = Mask::empty(8, 8);
        m.fill_polygon(&[(-5.0, -5.0), (20.0, -5.0), (20.0, 20.0), (-5.0, 20.0)]);
        assert_eq!(m.count(), 64);
    }

    #[test]
    fn test_circle_fill() {
        let mut m = Mask::empty(21, 21);
        m.fill_circle(10.0, 10.0, 3.0);
        assert!(m.contains(10, 10));
        assert!(m.contains(13, 10));
        assert!(!m.contains(13, 13));
        let area = m.count();
        assert!((25..=40).contains(&area), "area {area}");
    }

    #[test]
    fn test_union_and_subtract() {
        let mut a = Mask::empty(4, 1);
        a.fill_polygon(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (0.0, 1.0)]);
        let mut b = Mask::empty(4, 1);
        b.fill_polygon(&[(1.0, 0.0), (4.0, 0.0), (4.0, 1.0), (1.0, 1.0)]);
        assert_eq!(a.clone().union(&b).count(), 4);
        assert_eq!(a.subtract(&b).count(), 1);
    }

    #[test]
    fn test_retinex_uniform_unchanged() {
        let img = RgbImage::from_pixel(32, 32, Rgb([120, 90, 60]));
        let out = retinex(&img, &[2.0, 8.0]);
        assert_eq!(out, img);
    }

    #[test]
    fn test_retinex_flattens_gradient() {
        // Left-to-right illumination ramp with a dark square in the middle.
        let img = RgbImage::from_fn(48, 48, |x, y| {
            let base = 80 + (x * 3) as u8;
            let v = if (18..30).contains(&x) && (18..30).contains(&y) { base / 2 } else { base };
            Rgb([v, v, v])
        });
        let out = retinex(&img, &[4.0, 12.0]);
        assert_eq!(out.dimensions(), img.dimensions());
        // The square should still be darker than its surround after normalisation.
        let inside = out.get_pixel(24, 24).0[0];
        let outside = out.get_pixel(24, 8).0[0];
        assert!(inside < outside, "inside={inside} outside={outside}");
    }

    #[test]
    fn test_bilateral_keeps_edge() {
        let img = RgbImage::from_fn(16, 16, |x, _| if x < 8 { Rgb([20, 20, 20]) } else { Rgb([220, 220, 220]) });
        let out = bilateral_filter(&img, 2, 25.0, 2.0);
        assert!(out.get_pixel(7, 8).0[0] < 40);
        assert!(out.get_pixel(8, 8).0[0] > 200);
    }

    #[test]
    fn test_clahe_increases_contrast() {
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([100 + ((y * 16 + x) % 11) as u8]));
        let before = stddev(&gray);
        let after = stddev(&clahe(&gray, 2, 0.02));
        assert!(after > before, "CLAHE should increase contrast: before={before:.2}, after={after:.2}");
    }

    #[test]
    fn test_clahe_tiny_image_unchanged() {
        let gray = GrayImage::from_pixel(3, 3, Luma([50]));
        assert_eq!(clahe(&gray, 4, 0.02), gray);
    }

    #[test]
    fn test_entropy_uniform_region_is_zero() {
        let gray = GrayImage::from_pixel(8, 8, Luma([128]));
        let mut m = Mask::empty(8, 8);
        m.fill_circle(4.0, 4.0, 3.0);
        assert_eq!(masked_entropy(&gray, &m), Some(0.0));
    }

    #[test]
    fn test_entropy_two_levels_is_one_bit() {
        let gray = GrayImage::from_fn(8, 8, |x, _| Luma([if x % 2 == 0 { 0 } else { 255 }]));
        let mut m = Mask::empty(8, 8);
        m.fill_polygon(&[(0.0, 0.0), (8.0, 0.0), (8.0, 8.0), (0.0, 8.0)]);
        let e = masked_entropy(&gray, &m).unwrap();
        assert!((e - 1.0).abs() < 1e-5, "got {e}");
    }

    #[test]
    fn test_empty_mask_statistics_are_none() {
        let gray = GrayImage::from_pixel(8, 8, Luma([10]));
        let m = Mask::empty(8, 8);
        assert_eq!(masked_mean(&gray, &m), None);
        assert_eq!(masked_entropy(&gray, &m), None);
        assert_eq!(laplacian_variance(&gray, &m), None);
    }

    #[test]
    fn test_laplacian_variance_flat_vs_noisy() {
        let flat = GrayImage::from_pixel(16, 16, Luma([100]));
        let noisy = GrayImage::from_fn(16, 16, |x, y| Luma([if (x + y) % 2 == 0 { 60 } else { 160 }]));
        let mut m = Mask::empty(16, 16);
        m.fill_polygon(&[(2.0, 2.0), (14.0, 2.0), (14.0, 14.0), (2.0, 14.0)]);
        assert_eq!(laplacian_variance(&flat, &m), Some(0.0));
        assert!(laplacian_variance(&noisy, &m).unwrap() > 1000.0);
    }

    #[test]
    fn test_shared_laplacian_matches_per_region_filtering() {
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 37 + y * 91) % 251) as u8]));
        let response = laplacian(&gray);
        let mut a = Mask::empty(16, 16);
        a.fill_rect(1, 1, 6, 6);
        let mut b = Mask::empty(16, 16);
        b.fill_circle(11.0, 11.0, 3.0);
        for m in [&a, &b] {
            assert_eq!(masked_laplacian_variance(&response, m), laplacian_variance(&gray, m));
        }
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.05, 0.05, 30.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(0.2, 0.05, 30.0) > 0.95);
    }

    #[test]
    fn test_lab_white_and_red() {
        let white = lab_from_rgb([255, 255, 255]);
        assert!((white[0] - 100.0).abs() < 0.5, "L={}", white[0]);
        assert!(white[1].abs() < 0.5 && white[2].abs() < 0.5);
        let red = lab_from_rgb([255, 0, 0]);
        assert!(red[1] > 70.0, "a*={}", red[1]);
    }
}
