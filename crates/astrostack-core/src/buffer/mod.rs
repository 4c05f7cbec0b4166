//! Planar floating-point image storage.
//!
//! Planes are stored one after the other in a single `Vec`, each row padded
//! to `padded_width` samples so every row starts on a full SIMD lane.

mod arith;
mod resample;

use std::sync::OnceLock;

use ndarray::{Array2, ArrayView2, ShapeBuilder};
use num_traits::{Float, Zero};

use crate::consts::{COLOR_PLANE_COUNT, LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, ROW_ALIGNMENT};
use crate::error::{Result, Shape, StackError};
use crate::geometry::Rect;
use crate::precision::Precision;

pub use resample::bilinear_sample;

/// Planar image buffer with cached per-plane extrema.
#[derive(Clone)]
pub struct ImageBuffer<T: Precision> {
    planes: usize,
    width: usize,
    height: usize,
    padded_width: usize,
    data: Vec<T>,
    extrema: OnceLock<Vec<(T, T)>>,
}

/// Row stride for a given image width: the width rounded up to a multiple of
/// [`ROW_ALIGNMENT`] for SIMD row loops. The padding samples are never part
/// of the image; spectra are computed over `width` samples per row.
pub fn padded_width_for(width: usize) -> usize {
    width.div_ceil(ROW_ALIGNMENT) * ROW_ALIGNMENT
}

impl<T: Precision> ImageBuffer<T> {
    /// Allocate a zero-filled buffer.
    pub fn new(planes: usize, width: usize, height: usize) -> Self {
        let padded_width = padded_width_for(width);
        Self {
            planes,
            width,
            height,
            padded_width,
            data: vec![T::zero(); planes * height * padded_width],
            extrema: OnceLock::new(),
        }
    }

    /// Allocate a buffer filled with a constant value.
    pub fn filled(planes: usize, width: usize, height: usize, value: T) -> Self {
        let mut buffer = Self::new(planes, width, height);
        buffer.fill(value);
        buffer
    }

    /// Take ownership of existing planar data laid out with `padded_width`
    /// samples per row. The storage is released with the buffer.
    pub fn from_planar(
        data: Vec<T>,
        planes: usize,
        width: usize,
        padded_width: usize,
        height: usize,
    ) -> Result<Self> {
        if padded_width < width {
            return Err(StackError::InvalidParameter(format!(
                "padded width {padded_width} is smaller than width {width}"
            )));
        }
        let expected = planes * height * padded_width;
        if data.len() != expected {
            return Err(StackError::InvalidParameter(format!(
                "planar data holds {} samples, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            planes,
            width,
            height,
            padded_width,
            data,
            extrema: OnceLock::new(),
        })
    }

    /// Copy caller-owned planar data into a freshly allocated buffer.
    pub fn from_slice(
        data: &[T],
        planes: usize,
        width: usize,
        padded_width: usize,
        height: usize,
    ) -> Result<Self> {
        if padded_width < width || data.len() < planes * height * padded_width {
            return Err(StackError::InvalidParameter(format!(
                "slice of {} samples cannot hold {planes} planes of {width}x{height} (stride {padded_width})",
                data.len()
            )));
        }
        let mut buffer = Self::new(planes, width, height);
        for p in 0..planes {
            for y in 0..height {
                let start = (p * height + y) * padded_width;
                buffer
                    .row_slice_mut(p, y)
                    .copy_from_slice(&data[start..start + width]);
            }
        }
        Ok(buffer)
    }

    /// Build a buffer from one `ndarray` plane per color channel.
    pub fn from_planes(planes: &[Array2<T>]) -> Result<Self> {
        let first = planes.first().ok_or(StackError::EmptySequence)?;
        let (height, width) = first.dim();
        let mut buffer = Self::new(planes.len(), width, height);
        for (p, plane) in planes.iter().enumerate() {
            if plane.dim() != (height, width) {
                return Err(StackError::ShapeMismatch {
                    expected: Shape {
                        planes: 1,
                        width,
                        height,
                    },
                    found: Shape {
                        planes: 1,
                        width: plane.ncols(),
                        height: plane.nrows(),
                    },
                });
            }
            for (y, row) in plane.rows().into_iter().enumerate() {
                for (dst, &src) in buffer.row_slice_mut(p, y).iter_mut().zip(row.iter()) {
                    *dst = src;
                }
            }
        }
        Ok(buffer)
    }

    /// Borrow one plane as an `ndarray` view of shape (height, width),
    /// skipping the row padding.
    pub fn plane_view(&self, plane: usize) -> Result<ArrayView2<'_, T>> {
        ArrayView2::from_shape(
            (self.height, self.width).strides((self.padded_width, 1)),
            self.plane(plane),
        )
        .map_err(|e| StackError::InvalidParameter(format!("plane view: {e}")))
    }

    /// Copy one plane out as an `ndarray` array of shape (height, width).
    pub fn plane_array(&self, plane: usize) -> Array2<T> {
        Array2::from_shape_fn((self.height, self.width), |(y, x)| self.get(plane, x, y))
    }

    pub fn planes(&self) -> usize {
        self.planes
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn padded_width(&self) -> usize {
        self.padded_width
    }

    pub fn shape(&self) -> Shape {
        Shape {
            planes: self.planes,
            width: self.width,
            height: self.height,
        }
    }

    /// Raw padded storage of one plane.
    pub fn plane(&self, plane: usize) -> &[T] {
        let len = self.height * self.padded_width;
        &self.data[plane * len..(plane + 1) * len]
    }

    pub fn plane_mut(&mut self, plane: usize) -> &mut [T] {
        self.extrema.take();
        let len = self.height * self.padded_width;
        &mut self.data[plane * len..(plane + 1) * len]
    }

    /// The `width` meaningful samples of row `y` in `plane`.
    pub fn row(&self, plane: usize, y: usize) -> &[T] {
        let start = (plane * self.height + y) * self.padded_width;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, plane: usize, y: usize) -> &mut [T] {
        self.extrema.take();
        self.row_slice_mut(plane, y)
    }

    /// Row access that leaves the extrema cache alone; callers reset it once.
    fn row_slice_mut(&mut self, plane: usize, y: usize) -> &mut [T] {
        let start = (plane * self.height + y) * self.padded_width;
        &mut self.data[start..start + self.width]
    }

    #[inline]
    pub fn get(&self, plane: usize, x: usize, y: usize) -> T {
        self.data[(plane * self.height + y) * self.padded_width + x]
    }

    #[inline]
    pub fn set(&mut self, plane: usize, x: usize, y: usize, value: T) {
        self.extrema.take();
        self.data[(plane * self.height + y) * self.padded_width + x] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.extrema.take();
        for p in 0..self.planes {
            for y in 0..self.height {
                self.row_slice_mut(p, y).fill(value);
            }
        }
    }

    /// Overwrite the pixels with those of a buffer of identical shape.
    pub fn copy_from(&mut self, other: &ImageBuffer<T>) -> Result<()> {
        if other.shape() != self.shape() {
            return Err(StackError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        self.extrema.take();
        for p in 0..self.planes {
            for y in 0..self.height {
                self.row_slice_mut(p, y).copy_from_slice(other.row(p, y));
            }
        }
        Ok(())
    }

    /// Forget the cached extrema; they are recomputed on next access.
    pub fn reset_min_max(&mut self) {
        self.extrema.take();
    }

    fn extrema(&self) -> &[(T, T)] {
        self.extrema.get_or_init(|| {
            (0..self.planes)
                .map(|p| {
                    let mut lo = T::infinity();
                    let mut hi = T::neg_infinity();
                    for y in 0..self.height {
                        for &v in self.row(p, y) {
                            lo = Float::min(lo, v);
                            hi = Float::max(hi, v);
                        }
                    }
                    (lo, hi)
                })
                .collect()
        })
    }

    /// Minimum and maximum over all planes.
    pub fn min_max(&self) -> (T, T) {
        self.extrema().iter().fold(
            (T::infinity(), T::neg_infinity()),
            |(lo, hi), &(plo, phi)| (Float::min(lo, plo), Float::max(hi, phi)),
        )
    }

    pub fn plane_min_max(&self, plane: usize) -> (T, T) {
        self.extrema()[plane]
    }

    /// Copy a rectangular region into a new buffer.
    pub fn extract(&self, rect: Rect) -> Result<ImageBuffer<T>> {
        let rect = rect.validated(self.width, self.height)?;
        let mut out = ImageBuffer::new(self.planes, rect.width, rect.height);
        for p in 0..self.planes {
            for y in 0..rect.height {
                let src = &self.row(p, rect.y + y)[rect.x..rect.x + rect.width];
                out.row_slice_mut(p, y).copy_from_slice(src);
            }
        }
        Ok(out)
    }

    /// Collapse the planes to a single luminance plane.
    ///
    /// Three-plane buffers use BT.601 weights, any other plane count is
    /// averaged.
    pub fn to_luminance(&self) -> ImageBuffer<T> {
        if self.planes == 1 {
            return self.clone();
        }
        let weights: Vec<T> = if self.planes == COLOR_PLANE_COUNT {
            [LUMINANCE_R, LUMINANCE_G, LUMINANCE_B]
                .iter()
                .map(|&w| T::from_real(w))
                .collect()
        } else {
            vec![T::from_real(1.0 / self.planes as f64); self.planes]
        };

        let mut out = ImageBuffer::new(1, self.width, self.height);
        for y in 0..self.height {
            let dst = out.row_slice_mut(0, y);
            for (p, &w) in weights.iter().enumerate() {
                for (d, &s) in dst.iter_mut().zip(self.row(p, y)) {
                    *d = *d + s * w;
                }
            }
        }
        out
    }

    /// Sum of all meaningful samples of one plane.
    pub fn plane_sum(&self, plane: usize) -> f64 {
        (0..self.height)
            .map(|y| self.row(plane, y).iter().map(|v| v.as_f64()).sum::<f64>())
            .sum()
    }

    pub(crate) fn is_zero(&self) -> bool {
        (0..self.planes).all(|p| (0..self.height).all(|y| self.row(p, y).iter().all(|v| v.is_zero())))
    }
}

impl<T: Precision> std::fmt::Debug for ImageBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("planes", &self.planes)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("padded_width", &self.padded_width)
            .finish_non_exhaustive()
    }
}

impl<T: Precision> PartialEq for ImageBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && (0..self.planes)
                .all(|p| (0..self.height).all(|y| self.row(p, y) == other.row(p, y)))
    }
}
