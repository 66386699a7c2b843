//! Page normalization: binarization, orientation correction and deskew.
//!
//! Every variant the selector scores is produced here. The functions are
//! deliberately free of any engine dependency; they only consume
//! [`ImageOps`].

use image::{DynamicImage, GrayImage};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use thiserror::Error;
use tracing::debug;

use crate::imageops::{ImageOps, ImageOpsError, Rotation};

const BLUR_SIGMA: f32 = 0.8;
/// 15 px window for the local mean.
const ADAPTIVE_RADIUS: u32 = 7;
const ADAPTIVE_BIAS: i32 = 11;
/// Deskew needs strictly more foreground pixels than this to trust the fit.
const MIN_FOREGROUND_PIXELS: usize = 1500;
const LEVEL_BAND_DEG: f32 = 1.5;
const VERTICAL_BAND_DEG: f32 = 5.0;
/// Pixels darker than this count as foreground in a binarized page.
const FOREGROUND_CUTOFF: u8 = 128;
const BACKGROUND: u8 = 255;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("thresholding failed: {0}")]
    Threshold(#[from] ImageOpsError),
}

/// Baseline binarization: grayscale, light blur, then an adaptive local mean
/// threshold. Falls back to a global Otsu threshold on the unblurred
/// grayscale when the adaptive pass fails.
pub fn binarize(ops: &dyn ImageOps, image: &DynamicImage) -> Result<GrayImage, NormalizeError> {
    let gray = ops.grayscale(image);
    if gray.width() == 0 || gray.height() == 0 {
        return Err(NormalizeError::Threshold(ImageOpsError::EmptyImage));
    }
    let blurred = ops.blur(&gray, BLUR_SIGMA);
    match ops.adaptive_mean_threshold(&blurred, ADAPTIVE_RADIUS, ADAPTIVE_BIAS) {
        Ok(binary) => Ok(binary),
        Err(err) => {
            debug!(error = %err, "adaptive threshold failed, falling back to Otsu");
            Ok(ops.otsu_threshold(&gray)?)
        }
    }
}

/// Re-binarizes the page after undoing the detected quadrant rotation.
/// A half-turn correction additionally runs the deskew pass, since pages
/// scanned upside down tend to carry residual skew as well.
pub fn orientation_corrected(
    ops: &dyn ImageOps,
    image: &DynamicImage,
    rotation: Rotation,
) -> Result<GrayImage, NormalizeError> {
    let upright = ops.rotate_quadrant(image, rotation);
    let binary = binarize(ops, &upright)?;
    if rotation == Rotation::Cw180 {
        Ok(deskew(ops, &binary))
    } else {
        Ok(binary)
    }
}

/// Removes small residual skew from a binarized page.
///
/// Returns the input unchanged when the page is too sparse to fit an angle
/// or when the estimate falls inside a noise band. Otherwise the page is
/// padded by 20% per axis and rotated, so output dimensions grow.
pub fn deskew(ops: &dyn ImageOps, binary: &GrayImage) -> GrayImage {
    let Some(skew) = estimate_skew_angle(binary) else {
        debug!("deskew skipped: not enough foreground");
        return binary.clone();
    };
    if is_noise_angle(skew) {
        debug!(skew, "deskew skipped: angle inside noise band");
        return binary.clone();
    }
    let padded = ops.pad(
        binary,
        binary.width() / 10,
        binary.height() / 10,
        BACKGROUND,
    );
    debug!(skew, "rotating page to remove skew");
    ops.rotate_fine(&padded, skew, BACKGROUND)
}

/// Estimates the correction angle in degrees (counterclockwise positive)
/// that levels the page content, or `None` when the page has too little
/// foreground to fit one.
///
/// The fit takes the convex hull of all foreground pixels, finds the
/// minimum-area enclosing rectangle, folds its edge angle into `[-90, 0)`
/// and maps angles below `-45` to `-(90 + angle)`, the rest to the plain
/// negation.
pub fn estimate_skew_angle(binary: &GrayImage) -> Option<f32> {
    let mut points = Vec::new();
    for (x, y, px) in binary.enumerate_pixels() {
        if px[0] < FOREGROUND_CUTOFF {
            points.push(Point::new(x as i32, y as i32));
        }
    }
    if points.len() <= MIN_FOREGROUND_PIXELS {
        return None;
    }
    let hull = convex_hull(points);
    let raw = min_area_angle(&hull)?;

    let mut alpha = raw % 180.0;
    if alpha >= 90.0 {
        alpha -= 180.0;
    } else if alpha < -90.0 {
        alpha += 180.0;
    }
    if alpha >= 0.0 {
        alpha -= 90.0;
    }
    let skew = if alpha < -45.0 { -(90.0 + alpha) } else { -alpha };
    Some(skew)
}

/// Angles this close to level or to a quarter turn are measurement noise,
/// not real skew.
fn is_noise_angle(angle: f32) -> bool {
    angle.abs() < LEVEL_BAND_DEG || (angle.abs() - 90.0).abs() < VERTICAL_BAND_DEG
}

/// Edge direction (degrees, counterclockwise positive, y up) of the hull
/// edge whose supporting rectangle has the smallest area.
fn min_area_angle(hull: &[Point<i32>]) -> Option<f32> {
    if hull.len() < 2 {
        return None;
    }
    let mut best_area = f32::INFINITY;
    let mut best_angle = None;
    for i in 0..hull.len() {
        let p = hull[i];
        let q = hull[(i + 1) % hull.len()];
        let (ex, ey) = ((q.x - p.x) as f32, (q.y - p.y) as f32);
        let len = (ex * ex + ey * ey).sqrt();
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = (ex / len, ey / len);
        let (mut min_u, mut max_u) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f32::INFINITY, f32::NEG_INFINITY);
        for pt in hull {
            let (px, py) = (pt.x as f32, pt.y as f32);
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            best_angle = Some((-ey).atan2(ex).to_degrees());
        }
    }
    best_angle
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Luma};

    use super::*;
    use crate::imageops::RasterOps;

    /// White canvas with a centered black rectangle tilted counterclockwise
    /// on screen by `tilt_deg`.
    fn tilted_rect(size: u32, rect_w: f32, rect_h: f32, tilt_deg: f32) -> GrayImage {
        let center = size as f32 / 2.0;
        let (sin, cos) = tilt_deg.to_radians().sin_cos();
        ImageBuffer::from_fn(size, size, |x, y| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            let u = dx * cos - dy * sin;
            let v = dx * sin + dy * cos;
            if u.abs() <= rect_w / 2.0 && v.abs() <= rect_h / 2.0 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }

    fn solid(width: u32, height: u32, value: u8) -> GrayImage {
        ImageBuffer::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn binarize_turns_uniform_page_white() {
        let page = DynamicImage::ImageLuma8(solid(48, 48, 128));
        let binary = binarize(&RasterOps, &page).unwrap();
        assert!(binary.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn binarize_keeps_dark_marks_black() {
        let mut img = solid(64, 64, 220);
        for y in 28..36 {
            for x in 28..36 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let binary = binarize(&RasterOps, &DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(binary.get_pixel(31, 31)[0], 0);
        assert_eq!(binary.get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn binarize_fails_on_empty_page() {
        let page = DynamicImage::new_luma8(0, 0);
        assert!(binarize(&RasterOps, &page).is_err());
    }

    /// Delegates everything to [`RasterOps`] but refuses the adaptive pass.
    struct NoAdaptive;

    impl ImageOps for NoAdaptive {
        fn grayscale(&self, image: &DynamicImage) -> GrayImage {
            RasterOps.grayscale(image)
        }
        fn blur(&self, image: &GrayImage, sigma: f32) -> GrayImage {
            RasterOps.blur(image, sigma)
        }
        fn adaptive_mean_threshold(
            &self,
            _image: &GrayImage,
            _radius: u32,
            _bias: i32,
        ) -> Result<GrayImage, ImageOpsError> {
            Err(ImageOpsError::EmptyImage)
        }
        fn otsu_threshold(&self, image: &GrayImage) -> Result<GrayImage, ImageOpsError> {
            RasterOps.otsu_threshold(image)
        }
        fn rotate_quadrant(&self, image: &DynamicImage, rotation: Rotation) -> DynamicImage {
            RasterOps.rotate_quadrant(image, rotation)
        }
        fn rotate_fine(&self, image: &GrayImage, degrees: f32, fill: u8) -> GrayImage {
            RasterOps.rotate_fine(image, degrees, fill)
        }
        fn pad(&self, image: &GrayImage, pad_x: u32, pad_y: u32, fill: u8) -> GrayImage {
            RasterOps.pad(image, pad_x, pad_y, fill)
        }
    }

    #[test]
    fn binarize_falls_back_to_otsu() {
        // Bimodal page: adaptive thresholding would hollow out both halves
        // to white, Otsu keeps the dark half black.
        let mut img = solid(40, 40, 60);
        for y in 0..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Luma([210]));
            }
        }
        let binary = binarize(&NoAdaptive, &DynamicImage::ImageLuma8(img)).unwrap();
        assert_eq!(binary.get_pixel(10, 20)[0], 0);
        assert_eq!(binary.get_pixel(30, 20)[0], 255);
    }

    #[test]
    fn estimates_counterclockwise_tilt() {
        let img = tilted_rect(240, 120.0, 50.0, 3.0);
        let skew = estimate_skew_angle(&img).unwrap();
        assert!((skew + 3.0).abs() < 0.75, "skew = {skew}");
    }

    #[test]
    fn estimates_clockwise_tilt() {
        let img = tilted_rect(240, 120.0, 50.0, -3.0);
        let skew = estimate_skew_angle(&img).unwrap();
        assert!((skew - 3.0).abs() < 0.75, "skew = {skew}");
    }

    #[test]
    fn level_content_estimates_near_zero() {
        let img = tilted_rect(240, 120.0, 50.0, 0.0);
        let skew = estimate_skew_angle(&img).unwrap();
        assert!(skew.abs() < 0.5, "skew = {skew}");
    }

    #[test]
    fn sparse_page_has_no_estimate() {
        let mut img = solid(240, 240, 255);
        for y in 0..10 {
            for x in 0..10 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        assert_eq!(estimate_skew_angle(&img), None);
    }

    #[test]
    fn deskew_levels_a_tilted_page() {
        let img = tilted_rect(240, 120.0, 50.0, 3.0);
        let leveled = deskew(&RasterOps, &img);
        assert_eq!(leveled.dimensions(), (288, 288));
        let residual = estimate_skew_angle(&leveled).unwrap();
        assert!(residual.abs() < 1.5, "residual = {residual}");
    }

    #[test]
    fn deskew_leaves_near_level_page_untouched() {
        let img = tilted_rect(240, 120.0, 50.0, 0.8);
        let out = deskew(&RasterOps, &img);
        assert!(out == img, "sub-band tilt must not be corrected");
    }

    #[test]
    fn deskew_leaves_sparse_page_untouched() {
        let img = solid(100, 100, 255);
        let out = deskew(&RasterOps, &img);
        assert!(out == img);
    }

    #[test]
    fn noise_bands_cover_level_and_vertical_angles() {
        assert!(is_noise_angle(0.0));
        assert!(is_noise_angle(-1.2));
        assert!(is_noise_angle(1.49));
        assert!(!is_noise_angle(1.5));
        assert!(!is_noise_angle(-3.0));
        assert!(is_noise_angle(88.0));
        assert!(is_noise_angle(-85.1));
        assert!(!is_noise_angle(84.9));
        assert!(!is_noise_angle(45.0));
    }

    #[test]
    fn upright_correction_matches_baseline() {
        let img = DynamicImage::ImageLuma8(tilted_rect(120, 60.0, 24.0, 0.0));
        let corrected = orientation_corrected(&RasterOps, &img, Rotation::None).unwrap();
        let baseline = binarize(&RasterOps, &img).unwrap();
        assert!(corrected == baseline);
    }

    #[test]
    fn quarter_turn_correction_rebinarizes_without_deskew() {
        // The tilted content would qualify for deskew, but only half-turn
        // corrections run it, so dimensions stay those of the rotated page.
        let img = DynamicImage::ImageLuma8(tilted_rect(240, 160.0, 80.0, 3.0));
        let corrected = orientation_corrected(&RasterOps, &img, Rotation::Cw90).unwrap();
        assert_eq!(corrected.dimensions(), (240, 240));
    }

    #[test]
    fn half_turn_correction_also_deskews() {
        let img = DynamicImage::ImageLuma8(tilted_rect(240, 160.0, 80.0, 3.0));
        let corrected = orientation_corrected(&RasterOps, &img, Rotation::Cw180).unwrap();
        assert_eq!(corrected.dimensions(), (288, 288));
    }
}
