//! Scanline arithmetic kernels with a once-per-process flavour choice.
//!
//! Buffers never call a kernel directly: they go through the table returned
//! by `Precision::kernels()`, which is filled on first use from the cached
//! CPU probe and never re-decided afterwards.

#[cfg(target_arch = "x86_64")]
mod avx2;
pub mod cpu_features;
pub mod scalar;

use num_complex::Complex;
use tracing::debug;

use crate::precision::Precision;

/// Which implementation family backs the kernel table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelFlavor {
    Scalar,
    Avx2,
}

impl std::fmt::Display for KernelFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Avx2 => write!(f, "AVX2/FMA"),
        }
    }
}

/// Flavour the current CPU supports.
pub fn kernel_flavor() -> KernelFlavor {
    if cpu_features::has_avx2_fma() {
        KernelFlavor::Avx2
    } else {
        KernelFlavor::Scalar
    }
}

pub type LineOp<T> = fn(&mut [T], &[T]);
pub type LineScale<T> = fn(&mut [T], T);
pub type ComplexLineOp<T> = fn(&mut [Complex<T>], &[Complex<T>]);
pub type ComplexLineScale<T> = fn(&mut [Complex<T>], T);

/// Table of scanline kernels for one precision.
#[derive(Clone, Copy)]
pub struct LineKernels<T: Precision> {
    pub flavor: KernelFlavor,
    pub add: LineOp<T>,
    pub sub: LineOp<T>,
    pub mul: LineOp<T>,
    pub div: LineOp<T>,
    pub scale: LineScale<T>,
    pub max: LineOp<T>,
    pub min: LineOp<T>,
    pub complex_mul: ComplexLineOp<T>,
    pub complex_mul_conj: ComplexLineOp<T>,
    pub complex_scale: ComplexLineScale<T>,
    pub complex_div: ComplexLineOp<T>,
}

impl<T: Precision> LineKernels<T> {
    /// Plain loops, available everywhere.
    pub fn scalar() -> Self {
        Self {
            flavor: KernelFlavor::Scalar,
            add: scalar::add::<T>,
            sub: scalar::sub::<T>,
            mul: scalar::mul::<T>,
            div: scalar::div::<T>,
            scale: scalar::scale::<T>,
            max: scalar::max::<T>,
            min: scalar::min::<T>,
            complex_mul: scalar::complex_mul::<T>,
            complex_mul_conj: scalar::complex_mul_conj::<T>,
            complex_scale: scalar::complex_scale::<T>,
            complex_div: scalar::complex_div::<T>,
        }
    }

    #[cfg(target_arch = "x86_64")]
    fn avx2() -> Self {
        Self {
            flavor: KernelFlavor::Avx2,
            add: avx2::add::<T>,
            sub: avx2::sub::<T>,
            mul: avx2::mul::<T>,
            div: avx2::div::<T>,
            scale: avx2::scale::<T>,
            max: avx2::max::<T>,
            min: avx2::min::<T>,
            complex_mul: avx2::complex_mul::<T>,
            complex_mul_conj: avx2::complex_mul_conj::<T>,
            complex_scale: avx2::complex_scale::<T>,
            complex_div: avx2::complex_div::<T>,
        }
    }

    /// Build the table for the running CPU.
    pub fn detect() -> Self {
        let kernels = match kernel_flavor() {
            #[cfg(target_arch = "x86_64")]
            KernelFlavor::Avx2 => Self::avx2(),
            _ => Self::scalar(),
        };
        debug!(
            flavor = %kernels.flavor,
            precision = std::any::type_name::<T>(),
            "Selected scanline kernels"
        );
        kernels
    }
}

impl<T: Precision> std::fmt::Debug for LineKernels<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineKernels")
            .field("flavor", &self.flavor)
            .finish_non_exhaustive()
    }
}
