use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{Result, StackError};
use crate::geometry::Offset;
use crate::precision::Precision;

use super::ImageBuffer;

/// Bilinear sample of one padded plane at `(x, y)`, clamping to the edges.
pub fn bilinear_sample<T: Precision>(
    plane: &[T],
    width: usize,
    height: usize,
    stride: usize,
    x: f64,
    y: f64,
) -> T {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let clamp = |v: f64, max: usize| -> usize { v.clamp(0.0, (max - 1) as f64) as usize };
    let cx0 = clamp(x0, width);
    let cx1 = clamp(x0 + 1.0, width);
    let cy0 = clamp(y0, height);
    let cy1 = clamp(y0 + 1.0, height);

    let v00 = plane[cy0 * stride + cx0].as_f64();
    let v10 = plane[cy0 * stride + cx1].as_f64();
    let v01 = plane[cy1 * stride + cx0].as_f64();
    let v11 = plane[cy1 * stride + cx1].as_f64();

    T::from_real(
        v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy,
    )
}

impl<T: Precision> ImageBuffer<T> {
    /// Resample onto a `width` x `height` grid.
    ///
    /// Output pixel `(xo, yo)` of plane `p` samples this buffer at
    /// `offsets[p] + (xo / e, yo / e)` with integer division, where `e` is
    /// the expansion factor: each aligned source pixel becomes an `e` x `e`
    /// block. A single offset applies to every plane.
    pub fn resampled(
        &self,
        offsets: &[Offset],
        width: usize,
        height: usize,
        expansion: usize,
    ) -> Result<ImageBuffer<T>> {
        if expansion == 0 {
            return Err(StackError::InvalidParameter(
                "expansion factor must be >= 1".into(),
            ));
        }
        if offsets.len() != self.planes && offsets.len() != 1 {
            return Err(StackError::InvalidParameter(format!(
                "{} offsets for a {}-plane image",
                offsets.len(),
                self.planes
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StackError::InvalidParameter("cannot resample an empty image".into()));
        }

        let mut out = ImageBuffer::new(self.planes, width, height);
        if width == 0 || height == 0 {
            return Ok(out);
        }
        let out_stride = out.padded_width;

        for p in 0..self.planes {
            let offset = offsets[if offsets.len() == 1 { 0 } else { p }];
            let src = self.plane(p);
            let sample_row = |yo: usize, row: &mut [T]| {
                let sy = offset.dy + (yo / expansion) as f64;
                for (xo, dst) in row[..width].iter_mut().enumerate() {
                    let sx = offset.dx + (xo / expansion) as f64;
                    *dst = bilinear_sample(src, self.width, self.height, self.padded_width, sx, sy);
                }
            };

            let dst = out.plane_mut(p);
            if width * height >= PARALLEL_PIXEL_THRESHOLD {
                dst.par_chunks_mut(out_stride)
                    .enumerate()
                    .for_each(|(yo, row)| sample_row(yo, row));
            } else {
                dst.chunks_mut(out_stride)
                    .enumerate()
                    .for_each(|(yo, row)| sample_row(yo, row));
            }
        }

        Ok(out)
    }
}
