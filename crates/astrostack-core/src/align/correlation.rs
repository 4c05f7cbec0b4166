use serde::{Deserialize, Serialize};

use crate::buffer::ImageBuffer;
use crate::error::{Result, StackError};
use crate::precision::Precision;
use crate::spectrum::{SpectralBuffer, TransformGoal};

use super::subpixel::{circular_distance, parabolic_offset, wrap_signed};

/// Maximum of one plane of a correlation surface.
///
/// `(x, y)` is the displacement of the first operand relative to the second,
/// in pixels with sub-pixel precision. `sigma_x`/`sigma_y` measure the peak
/// width: small for a sharp, trustworthy peak, `f64::INFINITY` when the
/// surface carries no usable peak at all.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPeak {
    pub x: f64,
    pub y: f64,
    pub value: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
}

impl CorrelationPeak {
    /// Peak of a surface that could not be measured.
    pub fn undefined() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            value: 0.0,
            sigma_x: f64::INFINITY,
            sigma_y: f64::INFINITY,
        }
    }
}

/// Cross-correlate two spatial images into `surface`.
///
/// The inputs are transformed on copies and left untouched. `surface` must
/// be prepared for the inverse transform.
pub fn correlate<T: Precision>(
    a: &ImageBuffer<T>,
    b: &ImageBuffer<T>,
    surface: &mut SpectralBuffer<T>,
) -> Result<()> {
    let mut sa = SpectralBuffer::from_image(a, TransformGoal::Direct);
    let mut sb = SpectralBuffer::from_image(b, TransformGoal::Direct);
    sa.forward_transform()?;
    sb.forward_transform()?;
    correlate_spectra(&sa, &sb, surface)
}

/// `surface = inverse(a * conj(b))`; the surface ends in spatial state.
pub fn correlate_spectra<T: Precision>(
    a: &SpectralBuffer<T>,
    b: &SpectralBuffer<T>,
    surface: &mut SpectralBuffer<T>,
) -> Result<()> {
    a.multiply_with_conjugate(b, surface)?;
    surface.inverse_transform()
}

/// Locate the correlation peak of every plane of a spatial surface.
pub fn find_peak<T: Precision>(surface: &SpectralBuffer<T>) -> Result<Vec<CorrelationPeak>> {
    if surface.is_spectrum() {
        return Err(StackError::AlreadySpectrum);
    }
    let image = surface.image();
    Ok((0..image.planes()).map(|p| plane_peak(image, p)).collect())
}

/// Peak of one plane: discrete maximum, parabolic refinement through the
/// circular neighbours on each axis, and half-maximum second moments.
pub fn plane_peak<T: Precision>(image: &ImageBuffer<T>, plane: usize) -> CorrelationPeak {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return CorrelationPeak::undefined();
    }

    let mut max = f64::NEG_INFINITY;
    let (mut px, mut py) = (0, 0);
    let mut total = 0.0;
    for y in 0..h {
        for (x, v) in image.row(plane, y).iter().enumerate() {
            let v = v.as_f64();
            total += v;
            if v > max {
                max = v;
                px = x;
                py = y;
            }
        }
    }
    if !max.is_finite() {
        return CorrelationPeak::undefined();
    }
    let mean = total / (w * h) as f64;

    let at = |x: usize, y: usize| image.get(plane, x, y).as_f64();
    let sub_x = parabolic_offset(at((px + w - 1) % w, py), max, at((px + 1) % w, py));
    let sub_y = parabolic_offset(at(px, (py + h - 1) % h), max, at(px, (py + 1) % h));

    let (sigma_x, sigma_y) = half_maximum_width(image, plane, px, py, max, mean);

    CorrelationPeak {
        x: wrap_signed(px, w) as f64 + sub_x,
        y: wrap_signed(py, h) as f64 + sub_y,
        value: max,
        sigma_x,
        sigma_y,
    }
}

/// Second moments of the excess over `(max + mean) / 2`, measured
/// circularly from the discrete peak.
fn half_maximum_width<T: Precision>(
    image: &ImageBuffer<T>,
    plane: usize,
    px: usize,
    py: usize,
    max: f64,
    mean: f64,
) -> (f64, f64) {
    let (w, h) = (image.width(), image.height());
    let level = (max + mean) / 2.0;
    if max - mean <= f64::EPSILON * max.abs().max(1.0) {
        return (f64::INFINITY, f64::INFINITY);
    }

    let (mut weight, mut mxx, mut myy) = (0.0, 0.0, 0.0);
    for y in 0..h {
        let dy = circular_distance(py, y, h) as f64;
        for (x, v) in image.row(plane, y).iter().enumerate() {
            let excess = v.as_f64() - level;
            if excess > 0.0 {
                let dx = circular_distance(px, x, w) as f64;
                weight += excess;
                mxx += excess * dx * dx;
                myy += excess * dy * dy;
            }
        }
    }
    if weight <= 0.0 {
        return (f64::INFINITY, f64::INFINITY);
    }

    let finite_or_inf = |v: f64| if v.is_finite() { v } else { f64::INFINITY };
    (
        finite_or_inf((mxx / weight).sqrt()),
        finite_or_inf((myy / weight).sqrt()),
    )
}
