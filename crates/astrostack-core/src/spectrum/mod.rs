//! Fourier-domain companion of [`ImageBuffer`].
//!
//! A `SpectralBuffer` is either in spatial state (real pixels held by the
//! wrapped `ImageBuffer`) or in spectrum state (complex half-width bins).
//! The FFT plans are built once at construction for the declared
//! [`TransformGoal`] and reused for the buffer's lifetime.

mod transform;

use num_complex::Complex;
use num_traits::{One, Zero};
use rustfft::FftPlanner;

use crate::buffer::ImageBuffer;
use crate::consts::EPSILON;
use crate::error::{Direction, Result, StackError};
use crate::kernels::ComplexLineOp;
use crate::precision::Precision;

use transform::TransformPlan;

/// Which transform plans a buffer is prepared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformGoal {
    Direct,
    Inverse,
    Both,
}

impl TransformGoal {
    pub fn has_direct(self) -> bool {
        matches!(self, Self::Direct | Self::Both)
    }

    pub fn has_inverse(self) -> bool {
        matches!(self, Self::Inverse | Self::Both)
    }
}

#[derive(Clone)]
pub struct SpectralBuffer<T: Precision> {
    image: ImageBuffer<T>,
    spectrum: Vec<Complex<T>>,
    half_width: usize,
    goal: TransformGoal,
    direct: Option<TransformPlan<T>>,
    inverse: Option<TransformPlan<T>>,
    is_spectrum: bool,
}

impl<T: Precision> SpectralBuffer<T> {
    /// Allocate a zeroed buffer in spatial state.
    pub fn new(planes: usize, width: usize, height: usize, goal: TransformGoal) -> Self {
        let half_width = width / 2 + 1;
        let mut planner = FftPlanner::new();
        let direct = goal
            .has_direct()
            .then(|| TransformPlan::direct(&mut planner, width, height));
        let inverse = goal
            .has_inverse()
            .then(|| TransformPlan::inverse(&mut planner, width, height));
        Self {
            image: ImageBuffer::new(planes, width, height),
            spectrum: vec![Complex::zero(); planes * height * half_width],
            half_width,
            goal,
            direct,
            inverse,
            is_spectrum: false,
        }
    }

    /// Allocate a zeroed buffer that starts in spectrum state.
    pub fn new_spectrum(planes: usize, width: usize, height: usize, goal: TransformGoal) -> Self {
        let mut buffer = Self::new(planes, width, height, goal);
        buffer.is_spectrum = true;
        buffer
    }

    /// Wrap an existing image, in spatial state.
    pub fn from_image(image: &ImageBuffer<T>, goal: TransformGoal) -> Self {
        let mut buffer = Self::new(image.planes(), image.width(), image.height(), goal);
        buffer.image = image.clone();
        buffer
    }

    /// Replace the spatial content with `image` (same shape) and return to
    /// spatial state. Lets a worker reuse one buffer and its plans.
    pub fn load(&mut self, image: &ImageBuffer<T>) -> Result<()> {
        self.image.copy_from(image)?;
        self.is_spectrum = false;
        Ok(())
    }

    pub fn planes(&self) -> usize {
        self.image.planes()
    }

    pub fn width(&self) -> usize {
        self.image.width()
    }

    pub fn height(&self) -> usize {
        self.image.height()
    }

    /// Number of complex bins kept per spectrum row.
    pub fn half_width(&self) -> usize {
        self.half_width
    }

    pub fn goal(&self) -> TransformGoal {
        self.goal
    }

    pub fn is_spectrum(&self) -> bool {
        self.is_spectrum
    }

    /// Spatial pixels. Only meaningful when not in spectrum state.
    pub fn image(&self) -> &ImageBuffer<T> {
        &self.image
    }

    pub fn into_image(self) -> Result<ImageBuffer<T>> {
        if self.is_spectrum {
            return Err(StackError::AlreadySpectrum);
        }
        Ok(self.image)
    }

    fn plane_len(&self) -> usize {
        self.height() * self.half_width
    }

    /// Complex bins of one plane, `height` rows of `half_width`.
    pub fn spectrum_plane(&self, plane: usize) -> Result<&[Complex<T>]> {
        self.require_spectrum()?;
        let len = self.plane_len();
        Ok(&self.spectrum[plane * len..(plane + 1) * len])
    }

    pub fn bin(&self, plane: usize, y: usize, x: usize) -> Result<Complex<T>> {
        Ok(self.spectrum_plane(plane)?[y * self.half_width + x])
    }

    fn require_spectrum(&self) -> Result<()> {
        if self.is_spectrum {
            Ok(())
        } else {
            Err(StackError::NotASpectrum)
        }
    }

    /// Spatial to frequency domain, in place.
    pub fn forward_transform(&mut self) -> Result<()> {
        if self.is_spectrum {
            return Err(StackError::AlreadySpectrum);
        }
        let plan = self
            .direct
            .as_ref()
            .ok_or(StackError::TransformNotPrepared(Direction::Direct))?;

        let (w, h, stride) = (self.width(), self.height(), self.image.padded_width());
        let len = h * self.half_width;
        for p in 0..self.planes() {
            plan.forward_plane(
                self.image.plane(p),
                w,
                h,
                stride,
                &mut self.spectrum[p * len..(p + 1) * len],
            );
        }
        self.is_spectrum = true;
        Ok(())
    }

    /// Frequency to spatial domain, normalized by the pixel count. The
    /// spatial extrema are recomputed.
    pub fn inverse_transform(&mut self) -> Result<()> {
        self.require_spectrum()?;
        let plan = self
            .inverse
            .as_ref()
            .ok_or(StackError::TransformNotPrepared(Direction::Inverse))?;

        let (w, h, stride) = (self.width(), self.height(), self.image.padded_width());
        let len = h * self.half_width;
        for p in 0..self.planes() {
            plan.inverse_plane(
                &mut self.spectrum[p * len..(p + 1) * len],
                w,
                h,
                stride,
                self.image.plane_mut(p),
            );
        }
        self.is_spectrum = false;
        self.image.reset_min_max();
        self.image.min_max();
        Ok(())
    }

    /// Rescale each plane so its zero-frequency term is 1.0. Planes with a
    /// vanishing DC term are left untouched.
    pub fn normalize(&mut self) -> Result<()> {
        self.require_spectrum()?;
        let scale = T::kernels().complex_scale;
        let len = self.plane_len();
        for plane in self.spectrum.chunks_mut(len) {
            let dc = plane[0].re.as_f64();
            if dc.abs() > EPSILON {
                scale(plane, T::from_real(1.0 / dc));
            }
        }
        Ok(())
    }

    /// Negate the imaginary part of every bin.
    pub fn conjugate(&mut self) -> Result<()> {
        self.require_spectrum()?;
        for c in self.spectrum.iter_mut() {
            *c = c.conj();
        }
        Ok(())
    }

    /// Multiply every sample by `factor`, in whichever state the buffer is.
    pub fn scale(&mut self, factor: T) {
        if self.is_spectrum {
            (T::kernels().complex_scale)(&mut self.spectrum, factor);
        } else {
            self.image.multiply_scalar(factor);
        }
    }

    fn check_operand(&self, other: &SpectralBuffer<T>) -> Result<bool> {
        self.require_spectrum()?;
        other.require_spectrum()?;
        self.image.check_operand(&other.image)
    }

    fn apply_complex_op(&mut self, other: &SpectralBuffer<T>, op: ComplexLineOp<T>) -> Result<()> {
        let broadcast = self.check_operand(other)?;
        let len = self.plane_len();
        for (p, plane) in self.spectrum.chunks_mut(len).enumerate() {
            let src = if broadcast { 0 } else { p };
            op(plane, &other.spectrum[src * len..(src + 1) * len]);
        }
        Ok(())
    }

    fn store_into(&self, result: &mut SpectralBuffer<T>) -> Result<()> {
        if result.image.shape() != self.image.shape() {
            return Err(StackError::ShapeMismatch {
                expected: self.image.shape(),
                found: result.image.shape(),
            });
        }
        result.spectrum.copy_from_slice(&self.spectrum);
        result.is_spectrum = true;
        Ok(())
    }

    pub fn multiply_in_place(&mut self, term: &SpectralBuffer<T>) -> Result<()> {
        self.apply_complex_op(term, T::kernels().complex_mul)
    }

    /// `result = self * term`
    pub fn multiply(&self, term: &SpectralBuffer<T>, result: &mut SpectralBuffer<T>) -> Result<()> {
        self.check_operand(term)?;
        self.store_into(result)?;
        result.multiply_in_place(term)
    }

    /// `self = self * conj(term)`
    pub fn multiply_with_conjugate_in_place(&mut self, term: &SpectralBuffer<T>) -> Result<()> {
        self.apply_complex_op(term, T::kernels().complex_mul_conj)
    }

    /// `result = self * conj(term)`, the basis of cross-correlation.
    pub fn multiply_with_conjugate(
        &self,
        term: &SpectralBuffer<T>,
        result: &mut SpectralBuffer<T>,
    ) -> Result<()> {
        self.check_operand(term)?;
        self.store_into(result)?;
        result.multiply_with_conjugate_in_place(term)
    }

    /// Complex division; zero bins of `denominator` give zero.
    pub fn divide_in_place(&mut self, denominator: &SpectralBuffer<T>) -> Result<()> {
        self.apply_complex_op(denominator, T::kernels().complex_div)
    }

    /// Zero every bin whose radial frequency, as a fraction of Nyquist,
    /// exceeds `cutoff`. A cutoff outside `(0, 1)` leaves the spectrum as is.
    pub fn apply_cutoff(&mut self, cutoff: f64) -> Result<()> {
        self.require_spectrum()?;
        if cutoff <= 0.0 || cutoff >= 1.0 {
            return Ok(());
        }
        let (w, h, hw) = (self.width(), self.height(), self.half_width);
        let nyquist_x = (w / 2).max(1) as f64;
        let nyquist_y = (h / 2).max(1) as f64;
        let cutoff_sq = cutoff * cutoff;

        for plane in self.spectrum.chunks_mut(h * hw) {
            for y in 0..h {
                let fy = y.min(h - y) as f64 / nyquist_y;
                for x in 0..hw {
                    let fx = x as f64 / nyquist_x;
                    if fx * fx + fy * fy > cutoff_sq {
                        plane[y * hw + x] = Complex::zero();
                    }
                }
            }
        }
        Ok(())
    }

    /// Reset every bin to `value`, switching to spectrum state.
    pub fn fill_spectrum(&mut self, value: Complex<T>) {
        self.spectrum.fill(value);
        self.is_spectrum = true;
    }

    /// Spectrum of a unit impulse at the origin: all ones.
    pub fn set_identity(&mut self) {
        self.fill_spectrum(Complex::new(T::one(), T::zero()));
    }
}

impl<T: Precision> std::fmt::Debug for SpectralBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralBuffer")
            .field("planes", &self.planes())
            .field("width", &self.width())
            .field("height", &self.height())
            .field("half_width", &self.half_width)
            .field("goal", &self.goal)
            .field("is_spectrum", &self.is_spectrum)
            .finish()
    }
}
