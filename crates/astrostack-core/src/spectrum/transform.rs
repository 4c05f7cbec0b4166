use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;
use rustfft::{Fft, FftPlanner};

use crate::precision::Precision;

/// Row and column FFT plans for one transform direction.
#[derive(Clone)]
pub(crate) struct TransformPlan<T: Precision> {
    rows: Arc<dyn Fft<T>>,
    cols: Arc<dyn Fft<T>>,
}

impl<T: Precision> TransformPlan<T> {
    pub(crate) fn direct(planner: &mut FftPlanner<T>, width: usize, height: usize) -> Self {
        Self {
            rows: planner.plan_fft_forward(width),
            cols: planner.plan_fft_forward(height),
        }
    }

    pub(crate) fn inverse(planner: &mut FftPlanner<T>, width: usize, height: usize) -> Self {
        Self {
            rows: planner.plan_fft_inverse(width),
            cols: planner.plan_fft_inverse(height),
        }
    }

    fn scratch(&self) -> Vec<Complex<T>> {
        let len = self
            .rows
            .get_inplace_scratch_len()
            .max(self.cols.get_inplace_scratch_len());
        vec![Complex::zero(); len]
    }

    /// Real-to-complex forward transform of one plane.
    ///
    /// `plane` holds `height` rows of `stride` samples, the first `width` of
    /// which are meaningful. `out` receives `height` rows of `half_width`
    /// bins: the non-redundant half of the Hermitian spectrum.
    pub(crate) fn forward_plane(
        &self,
        plane: &[T],
        width: usize,
        height: usize,
        stride: usize,
        out: &mut [Complex<T>],
    ) {
        let half_width = width / 2 + 1;
        let mut scratch = self.scratch();
        let mut row_buf = vec![Complex::zero(); width];

        for y in 0..height {
            let src = &plane[y * stride..y * stride + width];
            for (dst, &v) in row_buf.iter_mut().zip(src) {
                *dst = Complex::new(v, T::zero());
            }
            self.rows.process_with_scratch(&mut row_buf, &mut scratch);
            out[y * half_width..(y + 1) * half_width].copy_from_slice(&row_buf[..half_width]);
        }

        self.columns(out, half_width, height, &mut scratch);
    }

    /// Complex-to-real inverse transform of one plane, normalized by the
    /// pixel count. `spectrum` is consumed as scratch.
    pub(crate) fn inverse_plane(
        &self,
        spectrum: &mut [Complex<T>],
        width: usize,
        height: usize,
        stride: usize,
        out: &mut [T],
    ) {
        let half_width = width / 2 + 1;
        let mut scratch = self.scratch();
        self.columns(spectrum, half_width, height, &mut scratch);

        let norm = T::from_real(1.0 / (width * height) as f64);
        let mut row_buf = vec![Complex::zero(); width];
        for y in 0..height {
            let half = &spectrum[y * half_width..(y + 1) * half_width];
            row_buf[..half_width].copy_from_slice(half);
            for k in half_width..width {
                row_buf[k] = half[width - k].conj();
            }
            self.rows.process_with_scratch(&mut row_buf, &mut scratch);
            let dst = &mut out[y * stride..y * stride + width];
            for (d, c) in dst.iter_mut().zip(&row_buf) {
                *d = c.re * norm;
            }
        }
    }

    fn columns(
        &self,
        data: &mut [Complex<T>],
        half_width: usize,
        height: usize,
        scratch: &mut [Complex<T>],
    ) {
        let mut col_buf = vec![Complex::zero(); height];
        for k in 0..half_width {
            for (y, c) in col_buf.iter_mut().enumerate() {
                *c = data[y * half_width + k];
            }
            self.cols.process_with_scratch(&mut col_buf, scratch);
            for (y, c) in col_buf.iter().enumerate() {
                data[y * half_width + k] = *c;
            }
        }
    }
}
