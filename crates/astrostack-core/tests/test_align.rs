mod common;

use approx::assert_abs_diff_eq;

use astrostack_core::align::{
    AlignConfig, AlignFailure, AlignStatus, Aligner, AlignerState, ImageSource,
};
use astrostack_core::buffer::ImageBuffer;
use astrostack_core::error::StackError;
use astrostack_core::geometry::Rect;

const SIZE: usize = 56;

const SHIFTS: [(f64, f64); 6] = [
    (0.0, 0.0),
    (3.0, -2.0),
    (-1.5, 2.25),
    (0.4, -0.7),
    (-2.0, -3.0),
    (1.75, 1.0),
];

fn shifted_scenes() -> Vec<ImageBuffer<f64>> {
    SHIFTS
        .iter()
        .map(|&(dx, dy)| common::scene(SIZE, SIZE, dx, dy))
        .collect()
}

#[test]
fn test_align_all_recovers_shifts() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let results: Vec<_> = aligner
        .align_all(&shifted_scenes())
        .unwrap()
        .into_iter()
        .map(Result::unwrap)
        .collect();
    aligner.finish();
    assert_eq!(aligner.state(), AlignerState::Done);

    for (result, &(dx, dy)) in results.iter().zip(&SHIFTS) {
        assert!(result.is_aligned(), "{result:?}");
        assert_abs_diff_eq!(result.offset.dx, dx, epsilon = 0.1);
        assert_abs_diff_eq!(result.offset.dy, dy, epsilon = 0.1);
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let reference = common::scene::<f32>(SIZE, SIZE, 0.0, 0.0);
    let images: Vec<ImageBuffer<f32>> = SHIFTS
        .iter()
        .map(|&(dx, dy)| common::scene(SIZE, SIZE, dx, dy))
        .collect();
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let batch: Vec<_> = aligner
        .align_all(&images)
        .unwrap()
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let mut scratch = aligner.new_scratch();
    for (image, expected) in images.iter().zip(&batch) {
        let single = aligner.align(image, &mut scratch).unwrap();
        assert_eq!(&single, expected);
    }
}

#[test]
fn test_check_result_refines_integer_shift() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::scene::<f64>(SIZE, SIZE, 3.0, -2.0);
    let config = AlignConfig {
        rect: Some(Rect::new(6, 6, 44, 44)),
        check_result: true,
        ..AlignConfig::default()
    };
    let aligner = Aligner::new(config, &reference).unwrap();
    let mut scratch = aligner.new_scratch();
    let result = aligner.align(&moved, &mut scratch).unwrap();
    assert_eq!(result.status, AlignStatus::Aligned);
    // The moved window holds exactly the reference window.
    assert_abs_diff_eq!(result.offset.dx, 3.0, epsilon = 1e-3);
    assert_abs_diff_eq!(result.offset.dy, -2.0, epsilon = 1e-3);
}

#[test]
fn test_noise_fails_as_too_wide() {
    let reference = common::noise::<f64>(1, 32, 32, 11);
    let candidate = common::noise::<f64>(1, 32, 32, 12);
    let config = AlignConfig {
        cutoff: 0.0,
        ..AlignConfig::default()
    };
    let aligner = Aligner::new(config, &reference).unwrap();
    let result = aligner.align(&candidate, &mut aligner.new_scratch()).unwrap();
    assert!(
        matches!(result.status, AlignStatus::Failed(AlignFailure::PeakTooWide { .. })),
        "{result:?}"
    );
}

#[test]
fn test_min_peak_value_rejects() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let config = AlignConfig {
        min_peak_value: 1.0,
        ..AlignConfig::default()
    };
    let aligner = Aligner::new(config, &reference).unwrap();
    let result = aligner.align(&reference, &mut aligner.new_scratch()).unwrap();
    assert!(matches!(
        result.status,
        AlignStatus::Failed(AlignFailure::PeakTooLow { .. })
    ));
    // The offset is still reported.
    assert_abs_diff_eq!(result.offset.dx, 0.0, epsilon = 1e-6);
}

#[test]
fn test_color_images_align_on_luminance() {
    let reference = common::color_scene::<f32>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::color_scene::<f32>(SIZE, SIZE, -2.5, 1.5);
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let result = aligner.align(&moved, &mut aligner.new_scratch()).unwrap();
    assert!(result.is_aligned());
    assert_abs_diff_eq!(result.offset.dx, -2.5, epsilon = 0.1);
    assert_abs_diff_eq!(result.offset.dy, 1.5, epsilon = 0.1);
}

#[test]
fn test_reference_spectrum_can_be_reused() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let moved = common::scene::<f64>(SIZE, SIZE, 1.0, 2.0);

    let first = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let expected = first.align(&moved, &mut first.new_scratch()).unwrap();
    let spectrum = first.into_reference_spectrum().unwrap();

    let second = Aligner::with_reference_spectrum(AlignConfig::default(), spectrum).unwrap();
    assert_eq!(second.state(), AlignerState::ReferenceReady);
    let again = second.align(&moved, &mut second.new_scratch()).unwrap();
    assert_eq!(again, expected);
}

#[test]
fn test_window_outside_candidate_is_error() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let small = common::scene::<f64>(20, 20, 0.0, 0.0);
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    assert!(matches!(
        aligner.align(&small, &mut aligner.new_scratch()),
        Err(StackError::InvalidRect(_))
    ));
}

#[test]
fn test_empty_batch() {
    let reference = common::scene::<f64>(16, 16, 0.0, 0.0);
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let none: Vec<ImageBuffer<f64>> = Vec::new();
    assert_eq!(aligner.align_all(&none).err(), Some(StackError::EmptySequence));
}

#[test]
fn test_unalignable_image_does_not_sink_the_batch() {
    let reference = common::scene::<f64>(SIZE, SIZE, 0.0, 0.0);
    let images = vec![
        common::scene::<f64>(SIZE, SIZE, 2.0, 1.0),
        common::scene::<f64>(20, 20, 0.0, 0.0),
        common::scene::<f64>(SIZE, SIZE, -1.0, 3.0),
    ];
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let results = aligner.align_all(&images).unwrap();
    assert_eq!(results.len(), 3);

    assert!(matches!(results[1], Err(StackError::InvalidRect(_))));
    let first = results[0].as_ref().unwrap();
    let last = results[2].as_ref().unwrap();
    assert!(first.is_aligned() && last.is_aligned());
    assert_abs_diff_eq!(first.offset.dx, 2.0, epsilon = 0.1);
    assert_abs_diff_eq!(first.offset.dy, 1.0, epsilon = 0.1);
    assert_abs_diff_eq!(last.offset.dx, -1.0, epsilon = 0.1);
    assert_abs_diff_eq!(last.offset.dy, 3.0, epsilon = 0.1);
}

#[test]
fn test_unalignable_image_in_parallel_batch() {
    let reference = common::scene::<f32>(SIZE, SIZE, 0.0, 0.0);
    let mut images: Vec<ImageBuffer<f32>> = (0..5)
        .map(|i| common::scene(SIZE, SIZE, i as f64 * 0.5, 0.0))
        .collect();
    images.insert(2, common::scene(12, 12, 0.0, 0.0));
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let results = aligner.align_all(&images).unwrap();

    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert!(results[2].is_err());
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .all(|r| r.is_aligned()));
}

/// A source that only exposes its pixels through `extract`.
struct Tile(ImageBuffer<f64>);

impl ImageSource<f64> for Tile {
    fn width(&self) -> usize {
        self.0.width()
    }

    fn height(&self) -> usize {
        self.0.height()
    }

    fn planes(&self) -> usize {
        self.0.planes()
    }

    fn extract(&self, rect: Rect) -> astrostack_core::error::Result<ImageBuffer<f64>> {
        self.0.extract(rect)
    }
}

#[test]
fn test_custom_source() {
    let reference = Tile(common::scene(SIZE, SIZE, 0.0, 0.0));
    let moved = Tile(common::scene(SIZE, SIZE, 2.0, 0.0));
    let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
    let results = aligner.align_all(&[moved]).unwrap();
    assert_abs_diff_eq!(results[0].as_ref().unwrap().offset.dx, 2.0, epsilon = 0.05);
}
