use crate::consts::EPSILON;
use crate::error::{Result, StackError};
use crate::geometry::Offset;
use crate::kernels::LineOp;
use crate::precision::Precision;

use super::ImageBuffer;

impl<T: Precision> ImageBuffer<T> {
    /// Check `other` can be combined with `self` and tell whether its single
    /// plane must be broadcast across all of ours.
    pub(crate) fn check_operand(&self, other: &ImageBuffer<T>) -> Result<bool> {
        let same_size = other.width == self.width && other.height == self.height;
        if same_size && other.planes == self.planes {
            Ok(false)
        } else if same_size && other.planes == 1 {
            Ok(true)
        } else {
            Err(StackError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            })
        }
    }

    fn apply_line_op(&mut self, other: &ImageBuffer<T>, op: LineOp<T>) -> Result<()> {
        let broadcast = self.check_operand(other)?;
        self.extrema.take();
        for p in 0..self.planes {
            let src_plane = if broadcast { 0 } else { p };
            for y in 0..self.height {
                op(self.row_slice_mut(p, y), other.row(src_plane, y));
            }
        }
        Ok(())
    }

    /// `self += other`
    pub fn add(&mut self, other: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(other, T::kernels().add)
    }

    /// `self -= other`
    pub fn subtract(&mut self, other: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(other, T::kernels().sub)
    }

    pub fn multiply_in_place(&mut self, term: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(term, T::kernels().mul)
    }

    /// `result = self * term`, pixel by pixel.
    pub fn multiply(&self, term: &ImageBuffer<T>, result: &mut ImageBuffer<T>) -> Result<()> {
        self.check_operand(term)?;
        result.copy_from(self)?;
        result.multiply_in_place(term)
    }

    /// Divide pixel by pixel; a zero denominator gives zero.
    pub fn divide_in_place(&mut self, denominator: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(denominator, T::kernels().div)
    }

    pub fn divide(&self, denominator: &ImageBuffer<T>, result: &mut ImageBuffer<T>) -> Result<()> {
        self.check_operand(denominator)?;
        result.copy_from(self)?;
        result.divide_in_place(denominator)
    }

    /// Keep the per-pixel maximum of `self` and `other`.
    pub fn max_in_place(&mut self, other: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(other, T::kernels().max)
    }

    /// Keep the per-pixel minimum of `self` and `other`.
    pub fn min_in_place(&mut self, other: &ImageBuffer<T>) -> Result<()> {
        self.apply_line_op(other, T::kernels().min)
    }

    pub fn multiply_scalar(&mut self, scalar: T) {
        let scale = T::kernels().scale;
        self.extrema.take();
        for p in 0..self.planes {
            for y in 0..self.height {
                scale(self.row_slice_mut(p, y), scalar);
            }
        }
    }

    fn scale_plane(&mut self, plane: usize, scalar: T) {
        let scale = T::kernels().scale;
        self.extrema.take();
        for y in 0..self.height {
            scale(self.row_slice_mut(plane, y), scalar);
        }
    }

    /// Resample `image` at the given per-plane offsets and expansion, then
    /// add it to `self`. `self` defines the output grid.
    pub fn add_with_offsets(
        &mut self,
        image: &ImageBuffer<T>,
        offsets: &[Offset],
        expansion: usize,
    ) -> Result<()> {
        let aligned = image.resampled(offsets, self.width, self.height, expansion)?;
        self.add(&aligned)
    }

    /// Scale the pixels and return the factor applied to each plane.
    ///
    /// A non-zero `factor` is applied as is. A zero `factor` rescales so the
    /// maximum becomes 1.0: with `mono` every plane shares the factor derived
    /// from the global maximum, otherwise each plane uses its own.
    pub fn normalize_with_factor(&mut self, factor: f64, mono: bool) -> Vec<f64> {
        if factor != 0.0 {
            self.multiply_scalar(T::from_real(factor));
            return vec![factor; self.planes];
        }

        let inverse = |max: f64| if max > EPSILON { 1.0 / max } else { 1.0 };
        let factors: Vec<f64> = if mono {
            let (_, max) = self.min_max();
            vec![inverse(max.as_f64()); self.planes]
        } else {
            (0..self.planes)
                .map(|p| inverse(self.plane_min_max(p).1.as_f64()))
                .collect()
        };
        for (p, &f) in factors.iter().enumerate() {
            self.scale_plane(p, T::from_real(f));
        }
        factors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(planes: usize, w: usize, h: usize) -> ImageBuffer<f64> {
        let mut buf = ImageBuffer::new(planes, w, h);
        for p in 0..planes {
            for y in 0..h {
                for x in 0..w {
                    buf.set(p, x, y, (p * 100 + y * w + x) as f64);
                }
            }
        }
        buf
    }

    #[test]
    fn test_broadcast_single_plane() {
        let mut rgb = ramp(3, 5, 4);
        let mono = ImageBuffer::filled(1, 5, 4, 1.0);
        rgb.add(&mono).unwrap();
        assert_eq!(rgb.get(0, 0, 0), 1.0);
        assert_eq!(rgb.get(2, 4, 3), 200.0 + 19.0 + 1.0);
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let mut a = ramp(3, 5, 4);
        let b = ramp(2, 5, 4);
        assert!(matches!(a.add(&b), Err(StackError::ShapeMismatch { .. })));
        let c = ramp(3, 4, 4);
        assert!(a.subtract(&c).is_err());
    }

    #[test]
    fn test_padding_untouched_by_ops() {
        let mut a = ramp(1, 5, 2);
        let b = ImageBuffer::filled(1, 5, 2, 3.0);
        a.multiply_in_place(&b).unwrap();
        let pad = a.padded_width();
        assert_eq!(a.plane(0)[5..pad], vec![0.0; pad - 5][..]);
    }

    #[test]
    fn test_normalize_per_plane_and_mono() {
        let mut a = ImageBuffer::<f64>::new(2, 2, 1);
        a.set(0, 0, 0, 2.0);
        a.set(1, 0, 0, 4.0);
        let mut b = a.clone();

        let factors = a.normalize_with_factor(0.0, false);
        assert_eq!(factors, vec![0.5, 0.25]);
        assert_eq!(a.plane_min_max(0).1, 1.0);
        assert_eq!(a.plane_min_max(1).1, 1.0);

        let factors = b.normalize_with_factor(0.0, true);
        assert_eq!(factors, vec![0.25, 0.25]);
        assert_eq!(b.get(0, 0, 0), 0.5);
        assert_eq!(b.get(1, 0, 0), 1.0);
    }
}
