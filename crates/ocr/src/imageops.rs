//! Raster primitives the page normalizer is written against.
//!
//! The trait keeps the normalizer independent of any one imaging backend;
//! `RasterOps` is the stock implementation on top of `image`/`imageproc`.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageOpsError {
    #[error("image has no pixels")]
    EmptyImage,
}

/// Coarse page rotation, expressed as the clockwise turn that brings the
/// page upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Maps a detector-reported angle onto a quadrant turn. Anything other
    /// than an exact 90/180/270 counts as upright.
    pub fn from_degrees(angle: i32) -> Self {
        match angle {
            90 => Rotation::Cw90,
            180 => Rotation::Cw180,
            270 => Rotation::Cw270,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// True when applying this rotation actually changes the page.
    pub fn is_correction(self) -> bool {
        !matches!(self, Rotation::None)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Image operations needed by the normalizer, in backend-neutral form.
pub trait ImageOps: Send + Sync {
    fn grayscale(&self, image: &DynamicImage) -> GrayImage;

    fn blur(&self, image: &GrayImage, sigma: f32) -> GrayImage;

    /// Local mean threshold over a `(2 * radius + 1)` square window: pixels
    /// brighter than `mean - bias` go white, the rest black.
    fn adaptive_mean_threshold(
        &self,
        image: &GrayImage,
        radius: u32,
        bias: i32,
    ) -> Result<GrayImage, ImageOpsError>;

    /// Global threshold at the Otsu level.
    fn otsu_threshold(&self, image: &GrayImage) -> Result<GrayImage, ImageOpsError>;

    fn rotate_quadrant(&self, image: &DynamicImage, rotation: Rotation) -> DynamicImage;

    /// Rotates about the center by `degrees` (counterclockwise positive),
    /// keeping dimensions and filling uncovered corners with `fill`.
    fn rotate_fine(&self, image: &GrayImage, degrees: f32, fill: u8) -> GrayImage;

    /// Centers the image on a larger canvas with `pad_x`/`pad_y` margins on
    /// each side, filled with `fill`.
    fn pad(&self, image: &GrayImage, pad_x: u32, pad_y: u32, fill: u8) -> GrayImage;
}

/// `image`/`imageproc` backed implementation of [`ImageOps`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterOps;

impl ImageOps for RasterOps {
    fn grayscale(&self, image: &DynamicImage) -> GrayImage {
        image.to_luma8()
    }

    fn blur(&self, image: &GrayImage, sigma: f32) -> GrayImage {
        gaussian_blur_f32(image, sigma)
    }

    fn adaptive_mean_threshold(
        &self,
        image: &GrayImage,
        radius: u32,
        bias: i32,
    ) -> Result<GrayImage, ImageOpsError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageOpsError::EmptyImage);
        }
        let (w, h) = (width as usize, height as usize);

        // Summed-area table with a zero row and column on the top and left.
        let stride = w + 1;
        let mut integral = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += u64::from(image.get_pixel(x as u32, y as u32)[0]);
                integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_sum;
            }
        }
        let window_sum = |x0: usize, y0: usize, x1: usize, y1: usize| -> u64 {
            integral[(y1 + 1) * stride + (x1 + 1)] + integral[y0 * stride + x0]
                - integral[y0 * stride + (x1 + 1)]
                - integral[(y1 + 1) * stride + x0]
        };

        let r = radius as usize;
        Ok(ImageBuffer::from_fn(width, height, |x, y| {
            let (xu, yu) = (x as usize, y as usize);
            let x0 = xu.saturating_sub(r);
            let y0 = yu.saturating_sub(r);
            let x1 = (xu + r).min(w - 1);
            let y1 = (yu + r).min(h - 1);
            let count = ((x1 - x0 + 1) * (y1 - y0 + 1)) as u64;
            let mean = (window_sum(x0, y0, x1, y1) / count) as i32;
            if i32::from(image.get_pixel(x, y)[0]) > mean - bias {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        }))
    }

    fn otsu_threshold(&self, image: &GrayImage) -> Result<GrayImage, ImageOpsError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ImageOpsError::EmptyImage);
        }
        let level = otsu_level(image);
        Ok(ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y)[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        }))
    }

    fn rotate_quadrant(&self, image: &DynamicImage, rotation: Rotation) -> DynamicImage {
        match rotation {
            Rotation::None => image.clone(),
            Rotation::Cw90 => image.rotate90(),
            Rotation::Cw180 => image.rotate180(),
            Rotation::Cw270 => image.rotate270(),
        }
    }

    fn rotate_fine(&self, image: &GrayImage, degrees: f32, fill: u8) -> GrayImage {
        // imageproc counts clockwise-positive; callers count counterclockwise.
        rotate_about_center(
            image,
            -degrees.to_radians(),
            Interpolation::Bicubic,
            Luma([fill]),
        )
    }

    fn pad(&self, image: &GrayImage, pad_x: u32, pad_y: u32, fill: u8) -> GrayImage {
        let (w, h) = image.dimensions();
        ImageBuffer::from_fn(w + 2 * pad_x, h + 2 * pad_y, |x, y| {
            if x >= pad_x && x < pad_x + w && y >= pad_y && y < pad_y + h {
                *image.get_pixel(x - pad_x, y - pad_y)
            } else {
                Luma([fill])
            }
        })
    }
}
