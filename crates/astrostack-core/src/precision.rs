use std::sync::OnceLock;

use num_traits::Float;
use rustfft::FftNum;

use crate::kernels::LineKernels;

/// Floating-point sample type of every buffer in the crate.
///
/// Implemented for `f32` and `f64`; the choice is a type parameter threaded
/// through `ImageBuffer`, `SpectralBuffer` and the stacking strategies.
pub trait Precision: FftNum + Float + Default {
    /// Scanline kernels for this precision, selected once per process.
    fn kernels() -> &'static LineKernels<Self>;

    /// Lossy conversion from `f64` (plain `as` cast).
    fn from_real(v: f64) -> Self;

    /// Widening conversion to `f64`.
    fn as_f64(self) -> f64;
}

macro_rules! impl_precision {
    ($t:ty) => {
        impl Precision for $t {
            fn kernels() -> &'static LineKernels<Self> {
                static KERNELS: OnceLock<LineKernels<$t>> = OnceLock::new();
                KERNELS.get_or_init(LineKernels::detect)
            }

            #[inline]
            fn from_real(v: f64) -> Self {
                v as $t
            }

            #[inline]
            fn as_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_precision!(f32);
impl_precision!(f64);

/// Sample type used by front ends that do not care about the precision.
#[cfg(not(feature = "double"))]
pub type DefaultPrecision = f32;

/// Sample type used by front ends that do not care about the precision.
#[cfg(feature = "double")]
pub type DefaultPrecision = f64;
