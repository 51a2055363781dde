//! Random geometric augmentation of RGB images.

use image::{Rgb, RgbImage};
use rand::Rng;

pub use lungprep_core::AugmentationSettings as AugmentationOptions;

/// One concrete draw of augmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineParams {
    /// Rotation in degrees, counter-clockwise.
    pub theta: f32,
    /// Horizontal shift in pixels.
    pub tx: f32,
    /// Vertical shift in pixels.
    pub ty: f32,
    /// Shear angle in degrees.
    pub shear: f32,
    pub zx: f32,
    pub zy: f32,
    pub flip_horizontal: bool,
}

impl AffineParams {
    pub fn identity() -> Self {
        Self {
            theta: 0.0,
            tx: 0.0,
            ty: 0.0,
            shear: 0.0,
            zx: 1.0,
            zy: 1.0,
            flip_horizontal: false,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

fn symmetric(rng: &mut impl Rng, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}

/// Draw parameters for an image of `width` x `height` pixels.
pub fn random_transform(
    options: &AugmentationOptions,
    width: u32,
    height: u32,
    rng: &mut impl Rng,
) -> AffineParams {
    let theta = symmetric(rng, options.rotation_range);
    let tx = symmetric(rng, options.width_shift_range) * width as f32;
    let ty = symmetric(rng, options.height_shift_range) * height as f32;
    let shear = symmetric(rng, options.shear_range);
    let (zx, zy) = if options.zoom_range > 0.0 {
        let lo = 1.0 - options.zoom_range;
        let hi = 1.0 + options.zoom_range;
        (rng.gen_range(lo..=hi), rng.gen_range(lo..=hi))
    } else {
        (1.0, 1.0)
    };
    let flip_horizontal = options.horizontal_flip && rng.gen_bool(0.5);

    AffineParams {
        theta,
        tx,
        ty,
        shear,
        zx,
        zy,
        flip_horizontal,
    }
}

/// Bilinear sample at a fractional position; out-of-range positions take the
/// nearest edge pixel.
fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let max_x = (img.width() - 1) as f32;
    let max_y = (img.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, slot) in out.iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *slot = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Apply `params` around the image centre.
///
/// Each output pixel is mapped back into the source with the rotation, shear
/// and zoom matrix plus the shift, then sampled bilinearly. The horizontal
/// flip is applied last.
pub fn apply_affine(img: &RgbImage, params: &AffineParams) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }

    let (sin_t, cos_t) = params.theta.to_radians().sin_cos();
    let (sin_s, cos_s) = params.shear.to_radians().sin_cos();

    // R * Shear * Zoom
    let a = cos_t * params.zx;
    let b = (cos_t * -sin_s - sin_t * cos_s) * params.zy;
    let c = sin_t * params.zx;
    let d = (sin_t * -sin_s + cos_t * cos_s) * params.zy;

    let cx = (w as f32 - 1.0) / 2.0;
    let cy = (h as f32 - 1.0) / 2.0;

    let mut out = RgbImage::new(w, h);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = a * dx + b * dy + cx + params.tx;
        let sy = c * dx + d * dy + cy + params.ty;
        *pixel = sample_bilinear(img, sx, sy);
    }

    if params.flip_horizontal {
        image::imageops::flip_horizontal_in_place(&mut out);
    }
    out
}
