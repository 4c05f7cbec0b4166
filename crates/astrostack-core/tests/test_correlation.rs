mod common;

use approx::assert_abs_diff_eq;

use astrostack_core::align::{correlate, correlate_spectra, find_peak};
use astrostack_core::spectrum::{SpectralBuffer, TransformGoal};

const SIZE: usize = 56;

fn surface() -> SpectralBuffer<f64> {
    SpectralBuffer::new(1, SIZE, SIZE, TransformGoal::Inverse)
}

#[test]
fn test_autocorrelation_peaks_at_origin() {
    let img = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let mut out = surface();
    correlate(&img, &img, &mut out).unwrap();
    let peaks = find_peak(&out).unwrap();
    assert_eq!(peaks.len(), 1);
    let peak = peaks[0];
    assert_abs_diff_eq!(peak.x, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(peak.y, 0.0, epsilon = 1e-6);
    assert_eq!(peak.value, out.image().min_max().1);
    assert!(peak.sigma_x < 2.0 && peak.sigma_y < 2.0, "{peak:?}");
    assert!(peak.sigma_x > 0.5 && peak.sigma_y > 0.5, "{peak:?}");
}

#[test]
fn test_integer_displacement() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::scene::<f64>(SIZE, SIZE, 3.0, -2.0);
    let mut out = surface();
    correlate(&moved, &reference, &mut out).unwrap();
    let peak = find_peak(&out).unwrap()[0];
    assert_abs_diff_eq!(peak.x, 3.0, epsilon = 1e-3);
    assert_abs_diff_eq!(peak.y, -2.0, epsilon = 1e-3);
}

#[test]
fn test_subpixel_displacement() {
    let reference = common::scene::<f32>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::scene::<f32>(SIZE, SIZE, -1.3, 0.6);
    let mut out = SpectralBuffer::new(1, SIZE, SIZE, TransformGoal::Both);
    correlate(&moved, &reference, &mut out).unwrap();
    let peak = find_peak(&out).unwrap()[0];
    assert_abs_diff_eq!(peak.x, -1.3, epsilon = 0.1);
    assert_abs_diff_eq!(peak.y, 0.6, epsilon = 0.1);
}

#[test]
fn test_spectra_and_images_agree() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::scene::<f64>(SIZE, SIZE, 1.0, 4.0);

    let mut a = SpectralBuffer::from_image(&moved, TransformGoal::Direct);
    let mut b = SpectralBuffer::from_image(&reference, TransformGoal::Direct);
    a.forward_transform().unwrap();
    b.forward_transform().unwrap();
    let mut from_spectra = surface();
    correlate_spectra(&a, &b, &mut from_spectra).unwrap();

    let mut from_images = surface();
    correlate(&moved, &reference, &mut from_images).unwrap();
    assert!(common::max_abs_diff(from_spectra.image(), from_images.image()) < 1e-9);
}

#[test]
fn test_noise_has_no_usable_peak() {
    let a = common::noise::<f64>(1, 32, 32, 1);
    let b = common::noise::<f64>(1, 32, 32, 2);
    let mut out = SpectralBuffer::new(1, 32, 32, TransformGoal::Inverse);
    correlate(&a, &b, &mut out).unwrap();
    let peak = find_peak(&out).unwrap()[0];
    assert!(peak.sigma_x > 3.0 && peak.sigma_y > 3.0, "{peak:?}");
}

#[test]
fn test_one_peak_per_plane() {
    let a = common::color_scene::<f32>(SIZE, SIZE, 2.0, 1.0);
    let b = common::color_scene::<f32>(SIZE, SIZE, 0.0, 0.0);
    let mut out = SpectralBuffer::new(3, SIZE, SIZE, TransformGoal::Inverse);
    correlate(&a, &b, &mut out).unwrap();
    let peaks = find_peak(&out).unwrap();
    assert_eq!(peaks.len(), 3);
    for peak in peaks {
        assert_abs_diff_eq!(peak.x, 2.0, epsilon = 0.05);
        assert_abs_diff_eq!(peak.y, 1.0, epsilon = 0.05);
    }
}
