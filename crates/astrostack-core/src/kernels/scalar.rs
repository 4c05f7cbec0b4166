//! Plain-loop scanline kernels.
//!
//! Every function is `#[inline(always)]` so the AVX2 flavour can recompile
//! the same loop body under wider target features.

use num_complex::Complex;
use num_traits::{Float, Zero};

use crate::precision::Precision;

#[inline(always)]
pub fn add<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = *d + s;
    }
}

#[inline(always)]
pub fn sub<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = *d - s;
    }
}

#[inline(always)]
pub fn mul<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = *d * s;
    }
}

/// Division where a zero denominator yields zero.
#[inline(always)]
pub fn div<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = if s == T::zero() { T::zero() } else { *d / s };
    }
}

#[inline(always)]
pub fn scale<T: Precision>(dst: &mut [T], factor: T) {
    for d in dst.iter_mut() {
        *d = *d * factor;
    }
}

#[inline(always)]
pub fn max<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = Float::max(*d, s);
    }
}

#[inline(always)]
pub fn min<T: Precision>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = Float::min(*d, s);
    }
}

#[inline(always)]
pub fn complex_mul<T: Precision>(dst: &mut [Complex<T>], src: &[Complex<T>]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = Complex::new(d.re * s.re - d.im * s.im, d.re * s.im + d.im * s.re);
    }
}

/// `dst = dst * conj(src)`
#[inline(always)]
pub fn complex_mul_conj<T: Precision>(dst: &mut [Complex<T>], src: &[Complex<T>]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = Complex::new(d.re * s.re + d.im * s.im, d.im * s.re - d.re * s.im);
    }
}

#[inline(always)]
pub fn complex_scale<T: Precision>(dst: &mut [Complex<T>], factor: T) {
    for d in dst.iter_mut() {
        *d = Complex::new(d.re * factor, d.im * factor);
    }
}

/// Complex division where a zero denominator yields zero.
#[inline(always)]
pub fn complex_div<T: Precision>(dst: &mut [Complex<T>], src: &[Complex<T>]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        let norm = s.re * s.re + s.im * s.im;
        *d = if norm == T::zero() {
            Complex::zero()
        } else {
            Complex::new(
                (d.re * s.re + d.im * s.im) / norm,
                (d.im * s.re - d.re * s.im) / norm,
            )
        };
    }
}
