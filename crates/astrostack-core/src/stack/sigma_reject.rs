use std::marker::PhantomData;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::buffer::ImageBuffer;
use crate::consts::{FIXED_POINT_LIMIT, FIXED_POINT_SCALE};
use crate::error::{Result, Shape, StackError};
use crate::geometry::Offset;
use crate::precision::Precision;

use super::strategy::{PassOutcome, StackingStrategy};

/// Per-pixel mean and standard deviation from the first pass, indexed like
/// the accumulators.
#[derive(Debug)]
struct Moments {
    planes: usize,
    mean: Vec<f64>,
    std_dev: Vec<f64>,
}

/// First pass: plain and squared sums, in fixed point.
#[derive(Debug)]
pub struct MomentSums {
    shape: Shape,
    sum: Vec<i128>,
    sum_sq: Vec<i128>,
    count: u64,
}

/// Second pass: fixed-point sum of the accepted samples and how many there
/// were, per pixel.
#[derive(Debug)]
pub struct GatedSum {
    sum: Vec<i128>,
    count: Vec<u32>,
}

/// Per-worker state of a [`SigmaRejectStack`].
///
/// Sums are kept as `i128` fixed-point values: integer addition is exactly
/// associative, so the statistics and the result are bit-identical however
/// the images are partitioned.
#[derive(Debug)]
pub enum SigmaPartial {
    Moments(Option<MomentSums>),
    Gated(GatedSum),
}

impl SigmaPartial {
    /// Whether this partial belongs to the first pass.
    pub fn is_moments(&self) -> bool {
        matches!(self, Self::Moments(_))
    }
}

/// Two-pass mean that ignores, pixel by pixel, the samples further than
/// `threshold` standard deviations from the first-pass mean.
///
/// Every image must have the same plane count.
pub struct SigmaRejectStack<T: Precision> {
    width: usize,
    height: usize,
    expansion: usize,
    threshold: f64,
    moments: OnceCell<Moments>,
    _precision: PhantomData<T>,
}

impl<T: Precision> SigmaRejectStack<T> {
    /// `width` x `height` is the output size, expansion included.
    pub fn new(width: usize, height: usize, expansion: usize, threshold: f64) -> Result<Self> {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(StackError::InvalidParameter(format!(
                "rejection threshold must be >= 0, got {threshold}"
            )));
        }
        Ok(Self {
            width,
            height,
            expansion,
            threshold,
            moments: OnceCell::new(),
            _precision: PhantomData,
        })
    }

    fn pixel_index(&self, plane: usize, x: usize, y: usize) -> usize {
        (plane * self.height + y) * self.width + x
    }

    fn moments(&self) -> Result<&Moments> {
        self.moments
            .get()
            .ok_or_else(|| StackError::InvalidParameter("second pass before statistics".into()))
    }

    fn accumulate_moments(&self, partial: &mut Option<MomentSums>, aligned: &ImageBuffer<T>) -> Result<()> {
        let len = aligned.planes() * self.width * self.height;
        let sums = partial.get_or_insert_with(|| MomentSums {
            shape: aligned.shape(),
            sum: vec![0; len],
            sum_sq: vec![0; len],
            count: 0,
        });
        if sums.shape != aligned.shape() {
            return Err(StackError::ShapeMismatch {
                expected: sums.shape,
                found: aligned.shape(),
            });
        }
        for p in 0..aligned.planes() {
            for y in 0..self.height {
                let base = self.pixel_index(p, 0, y);
                for (x, &v) in aligned.row(p, y).iter().enumerate() {
                    let v = v.as_f64();
                    sums.sum[base + x] += to_fixed(v);
                    sums.sum_sq[base + x] += to_fixed(v * v);
                }
            }
        }
        sums.count += 1;
        Ok(())
    }

    fn accumulate_gated(&self, gated: &mut GatedSum, aligned: &ImageBuffer<T>) -> Result<()> {
        let moments = self.moments()?;
        let expected = Shape {
            planes: moments.planes,
            width: self.width,
            height: self.height,
        };
        if aligned.shape() != expected {
            return Err(StackError::ShapeMismatch {
                expected,
                found: aligned.shape(),
            });
        }
        for p in 0..aligned.planes() {
            for y in 0..self.height {
                let base = self.pixel_index(p, 0, y);
                for (x, &v) in aligned.row(p, y).iter().enumerate() {
                    let i = base + x;
                    let v = v.as_f64();
                    if (v - moments.mean[i]).abs() <= self.threshold * moments.std_dev[i] {
                        gated.sum[i] += to_fixed(v);
                        gated.count[i] += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<T: Precision> StackingStrategy<T> for SigmaRejectStack<T> {
    type Partial = SigmaPartial;

    fn begin_pass(&self, pass: usize) -> SigmaPartial {
        match (pass, self.moments.get()) {
            (1, _) | (_, None) => SigmaPartial::Moments(None),
            (_, Some(moments)) => {
                let len = moments.planes * self.width * self.height;
                SigmaPartial::Gated(GatedSum {
                    sum: vec![0; len],
                    count: vec![0; len],
                })
            }
        }
    }

    fn process_image(
        &self,
        partial: &mut SigmaPartial,
        image: &ImageBuffer<T>,
        offsets: &[Offset],
    ) -> Result<()> {
        let aligned = image.resampled(offsets, self.width, self.height, self.expansion)?;
        match partial {
            SigmaPartial::Moments(sums) => self.accumulate_moments(sums, &aligned),
            SigmaPartial::Gated(gated) => self.accumulate_gated(gated, &aligned),
        }
    }

    fn merge(&self, into: &mut SigmaPartial, from: SigmaPartial) -> Result<()> {
        match (into, from) {
            (_, SigmaPartial::Moments(None)) => Ok(()),
            (SigmaPartial::Moments(into @ None), SigmaPartial::Moments(from)) => {
                *into = from;
                Ok(())
            }
            (SigmaPartial::Moments(Some(into)), SigmaPartial::Moments(Some(from))) => {
                if into.shape != from.shape {
                    return Err(StackError::ShapeMismatch {
                        expected: into.shape,
                        found: from.shape,
                    });
                }
                add_fixed(&mut into.sum, &from.sum);
                add_fixed(&mut into.sum_sq, &from.sum_sq);
                into.count += from.count;
                Ok(())
            }
            (SigmaPartial::Gated(into), SigmaPartial::Gated(from)) => {
                add_fixed(&mut into.sum, &from.sum);
                for (c, f) in into.count.iter_mut().zip(&from.count) {
                    *c += f;
                }
                Ok(())
            }
            _ => Err(StackError::InvalidParameter(
                "cannot merge partials of different passes".into(),
            )),
        }
    }

    fn finish_all(&self, merged: SigmaPartial) -> Result<PassOutcome<T>> {
        match merged {
            SigmaPartial::Moments(None) => Err(StackError::EmptySequence),
            SigmaPartial::Moments(Some(sums)) => {
                let moments = moments_from_sums(&sums);
                debug!(
                    planes = moments.planes,
                    images = sums.count,
                    threshold = self.threshold,
                    "First pass statistics ready"
                );
                self.moments
                    .set(moments)
                    .map_err(|_| StackError::InvalidParameter("statistics computed twice".into()))?;
                Ok(PassOutcome::AnotherPass)
            }
            SigmaPartial::Gated(gated) => {
                let moments = self.moments()?;
                let mut result = ImageBuffer::new(moments.planes, self.width, self.height);
                let mut rejected_everywhere = 0usize;
                for p in 0..moments.planes {
                    for y in 0..self.height {
                        let base = self.pixel_index(p, 0, y);
                        let row = result.row_mut(p, y);
                        for (x, out) in row.iter_mut().enumerate() {
                            let i = base + x;
                            let n = gated.count[i];
                            let value = if n > 0 {
                                fixed_mean(gated.sum[i], u64::from(n))
                            } else {
                                rejected_everywhere += 1;
                                moments.mean[i]
                            };
                            *out = T::from_real(value);
                        }
                    }
                }
                if rejected_everywhere > 0 {
                    debug!(pixels = rejected_everywhere, "Pixels with every sample rejected");
                }
                Ok(PassOutcome::Done(result))
            }
        }
    }
}

/// Scale `v` to the fixed-point grid. NaN maps to zero.
fn to_fixed(v: f64) -> i128 {
    (v * FIXED_POINT_SCALE)
        .round()
        .clamp(-FIXED_POINT_LIMIT, FIXED_POINT_LIMIT) as i128
}

/// Mean of `n` fixed-point samples summing to `sum`, back in sample units.
fn fixed_mean(sum: i128, n: u64) -> f64 {
    let n = i128::from(n);
    let (whole, rest) = (sum.div_euclid(n), sum.rem_euclid(n));
    (whole as f64 + rest as f64 / n as f64) / FIXED_POINT_SCALE
}

fn add_fixed(into: &mut [i128], from: &[i128]) {
    for (a, b) in into.iter_mut().zip(from) {
        *a += b;
    }
}

fn moments_from_sums(sums: &MomentSums) -> Moments {
    let (mean, std_dev) = sums
        .sum
        .iter()
        .zip(&sums.sum_sq)
        .map(|(&s, &s2)| {
            let mean = fixed_mean(s, sums.count);
            let variance = fixed_mean(s2, sums.count) - mean * mean;
            (mean, variance.max(0.0).sqrt())
        })
        .unzip();
    Moments {
        planes: sums.shape.planes,
        mean,
        std_dev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_mean_is_exact_for_repeated_samples() {
        for v in [0.0, 0.25, 1.0, 10.0, 65535.0, -3.5] {
            let sum: i128 = (0..7).map(|_| to_fixed(v)).sum();
            assert_eq!(fixed_mean(sum, 7), v);
        }
    }

    #[test]
    fn test_fixed_sums_do_not_depend_on_grouping() {
        let samples = [0.1f64, 1e-7, 0.7, 3.3, 1e5, 0.333];
        let left: i128 = samples.iter().map(|&v| to_fixed(v)).sum();
        let right = samples[3..].iter().map(|&v| to_fixed(v)).sum::<i128>()
            + samples[..3].iter().rev().map(|&v| to_fixed(v)).sum::<i128>();
        assert_eq!(left, right);
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        assert_eq!(to_fixed(f64::NAN), 0);
        assert_eq!(to_fixed(f64::INFINITY), FIXED_POINT_LIMIT as i128);
    }
}
