//! AVX2/FMA flavour of the scanline kernels (x86_64).
//!
//! The loop bodies are the scalar ones, inlined into functions compiled with
//! wider target features so LLVM vectorizes them. No floating-point
//! contraction happens, results are bit-identical to the scalar flavour.

use num_complex::Complex;

use crate::precision::Precision;

use super::scalar;

macro_rules! avx2_kernel {
    ($name:ident, $inner:ident, $dst:ty, $src:ty) => {
        #[target_feature(enable = "avx2,fma")]
        unsafe fn $inner<T: Precision>(dst: &mut [$dst], src: $src) {
            scalar::$name(dst, src)
        }

        pub(super) fn $name<T: Precision>(dst: &mut [$dst], src: $src) {
            // SAFETY: this flavour is only installed after the CPU probe
            // reported AVX2 and FMA.
            unsafe { $inner(dst, src) }
        }
    };
}

avx2_kernel!(add, add_avx2, T, &[T]);
avx2_kernel!(sub, sub_avx2, T, &[T]);
avx2_kernel!(mul, mul_avx2, T, &[T]);
avx2_kernel!(div, div_avx2, T, &[T]);
avx2_kernel!(scale, scale_avx2, T, T);
avx2_kernel!(max, max_avx2, T, &[T]);
avx2_kernel!(min, min_avx2, T, &[T]);
avx2_kernel!(complex_mul, complex_mul_avx2, Complex<T>, &[Complex<T>]);
avx2_kernel!(complex_mul_conj, complex_mul_conj_avx2, Complex<T>, &[Complex<T>]);
avx2_kernel!(complex_scale, complex_scale_avx2, Complex<T>, T);
avx2_kernel!(complex_div, complex_div_avx2, Complex<T>, &[Complex<T>]);
