mod common;

use approx::assert_relative_eq;
use num_complex::Complex;

use astrostack_core::buffer::ImageBuffer;
use astrostack_core::error::{Direction, StackError};
use astrostack_core::spectrum::{SpectralBuffer, TransformGoal};

fn round_trip_error<T: astrostack_core::precision::Precision>(image: &ImageBuffer<T>) -> f64 {
    let mut s = SpectralBuffer::from_image(image, TransformGoal::Both);
    s.forward_transform().unwrap();
    assert!(s.is_spectrum());
    s.inverse_transform().unwrap();
    assert!(!s.is_spectrum());
    common::max_abs_diff(s.image(), image)
}

#[test]
fn test_round_trip_f64() {
    for (w, h) in [(16, 16), (15, 9), (1, 7), (32, 5)] {
        let img = common::noise::<f64>(2, w, h, (w * h) as u64);
        let err = round_trip_error(&img);
        assert!(err < 1e-12, "{w}x{h}: {err}");
    }
}

#[test]
fn test_round_trip_f32() {
    for (w, h) in [(16, 16), (15, 9), (33, 20)] {
        let img = common::noise::<f32>(3, w, h, 7);
        let err = round_trip_error(&img);
        assert!(err < 1e-4, "{w}x{h}: {err}");
    }
}

#[test]
fn test_transform_ignores_row_padding() {
    let (width, height, stride) = (13, 3, 16);
    let data: Vec<f64> = (0..height * stride)
        .map(|i| if i % stride < width { 1.0 } else { 1.0e6 })
        .collect();
    let image = ImageBuffer::from_planar(data, 1, width, stride, height).unwrap();

    let mut s = SpectralBuffer::from_image(&image, TransformGoal::Both);
    assert_eq!(s.half_width(), width / 2 + 1);
    s.forward_transform().unwrap();
    assert_relative_eq!(s.bin(0, 0, 0).unwrap().re, (width * height) as f64, epsilon = 1e-9);
    s.inverse_transform().unwrap();
    assert!(common::max_abs_diff(s.image(), &image) < 1e-12);
}

#[test]
fn test_inverse_refreshes_extrema() {
    let img = common::scene::<f64>(24, 24, 0.0, 0.0);
    let (lo, hi) = img.min_max();
    let mut s = SpectralBuffer::from_image(&img, TransformGoal::Both);
    s.forward_transform().unwrap();
    s.inverse_transform().unwrap();
    let (lo2, hi2) = s.image().min_max();
    assert_relative_eq!(lo, lo2, epsilon = 1e-12);
    assert_relative_eq!(hi, hi2, epsilon = 1e-12);
}

#[test]
fn test_state_errors() {
    let img = ImageBuffer::<f32>::filled(1, 8, 8, 1.0);
    let mut s = SpectralBuffer::from_image(&img, TransformGoal::Direct);
    assert_eq!(s.conjugate(), Err(StackError::NotASpectrum));
    assert_eq!(s.normalize(), Err(StackError::NotASpectrum));
    assert_eq!(s.inverse_transform(), Err(StackError::NotASpectrum));
    s.forward_transform().unwrap();
    assert_eq!(s.forward_transform(), Err(StackError::AlreadySpectrum));
    assert_eq!(
        s.inverse_transform(),
        Err(StackError::TransformNotPrepared(Direction::Inverse))
    );

    let mut inverse_only = SpectralBuffer::from_image(&img, TransformGoal::Inverse);
    assert_eq!(
        inverse_only.forward_transform(),
        Err(StackError::TransformNotPrepared(Direction::Direct))
    );
}

#[test]
fn test_normalize_sets_dc_to_one() {
    let img = common::noise::<f64>(2, 10, 6, 3);
    let mut s = SpectralBuffer::from_image(&img, TransformGoal::Direct);
    s.forward_transform().unwrap();
    s.normalize().unwrap();
    for p in 0..2 {
        let dc = s.bin(p, 0, 0).unwrap();
        assert_relative_eq!(dc.re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(dc.im, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn test_normalize_skips_zero_dc() {
    let mut s = SpectralBuffer::<f64>::new_spectrum(1, 4, 4, TransformGoal::Inverse);
    s.fill_spectrum(Complex::new(0.0, 2.0));
    s.normalize().unwrap();
    assert_eq!(s.bin(0, 1, 1).unwrap(), Complex::new(0.0, 2.0));
}

#[test]
fn test_conjugate_negates_imaginary() {
    let mut s = SpectralBuffer::<f32>::new_spectrum(2, 6, 4, TransformGoal::Inverse);
    s.fill_spectrum(Complex::new(1.0, 3.0));
    s.conjugate().unwrap();
    assert_eq!(s.bin(1, 3, 3).unwrap(), Complex::new(1.0, -3.0));
}

#[test]
fn test_multiply_with_conjugate_broadcasts_one_plane() {
    let mut a = SpectralBuffer::<f64>::new_spectrum(3, 4, 4, TransformGoal::Inverse);
    a.fill_spectrum(Complex::new(1.0, 2.0));
    let mut b = SpectralBuffer::<f64>::new_spectrum(1, 4, 4, TransformGoal::Inverse);
    b.fill_spectrum(Complex::new(3.0, 4.0));
    let mut out = SpectralBuffer::<f64>::new(3, 4, 4, TransformGoal::Inverse);
    a.multiply_with_conjugate(&b, &mut out).unwrap();
    // (1 + 2i)(3 - 4i) = 11 + 2i
    assert_eq!(out.bin(2, 0, 0).unwrap(), Complex::new(11.0, 2.0));
    a.multiply(&b, &mut out).unwrap();
    // (1 + 2i)(3 + 4i) = -5 + 10i
    assert_eq!(out.bin(0, 1, 2).unwrap(), Complex::new(-5.0, 10.0));
}

#[test]
fn test_operand_shape_checked() {
    let mut a = SpectralBuffer::<f32>::new_spectrum(3, 4, 4, TransformGoal::Inverse);
    let b = SpectralBuffer::<f32>::new_spectrum(2, 4, 4, TransformGoal::Inverse);
    assert!(matches!(
        a.multiply_in_place(&b),
        Err(StackError::ShapeMismatch { .. })
    ));
    let c = SpectralBuffer::<f32>::new(3, 4, 4, TransformGoal::Inverse);
    assert_eq!(a.divide_in_place(&c), Err(StackError::NotASpectrum));
}

#[test]
fn test_divide_by_own_spectrum_is_identity() {
    let img = common::scene::<f64>(16, 16, 0.0, 0.0);
    let mut a = SpectralBuffer::from_image(&img, TransformGoal::Both);
    a.forward_transform().unwrap();
    let b = a.clone();
    a.divide_in_place(&b).unwrap();
    let dc = a.bin(0, 0, 0).unwrap();
    assert_relative_eq!(dc.re, 1.0, epsilon = 1e-9);
    a.inverse_transform().unwrap();
    // The inverse of an all-ones spectrum is a unit impulse at the origin.
    assert_relative_eq!(a.image().get(0, 0, 0), 1.0, epsilon = 1e-6);
    assert!(a.image().get(0, 5, 5).abs() < 1e-6);
}

#[test]
fn test_scale_in_both_states() {
    let img = ImageBuffer::<f32>::filled(1, 4, 4, 2.0);
    let mut s = SpectralBuffer::from_image(&img, TransformGoal::Direct);
    s.scale(3.0);
    assert_eq!(s.image().min_max(), (6.0, 6.0));
    s.forward_transform().unwrap();
    s.scale(0.5);
    assert_relative_eq!(s.bin(0, 0, 0).unwrap().re, 48.0);
}
