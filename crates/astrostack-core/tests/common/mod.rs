#![allow(dead_code)]

use astrostack_core::align::AlignmentResult;
use astrostack_core::buffer::ImageBuffer;
use astrostack_core::geometry::Offset;
use astrostack_core::precision::Precision;
use astrostack_core::stack::{partition, StackItem};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Blob centres and amplitudes of the synthetic scene, chosen so that no
/// two pairs share a separation.
const BLOBS: [(f64, f64, f64); 5] = [
    (14.0, 12.0, 1.0),
    (30.0, 17.0, 0.8),
    (21.0, 33.0, 0.9),
    (40.0, 38.0, 0.6),
    (11.0, 41.0, 0.7),
];

/// Gaussian blobs on a dark background, displaced by `(dx, dy)`: a feature
/// at `(x, y)` in the undisplaced scene appears at `(x + dx, y + dy)`.
pub fn scene<T: Precision>(width: usize, height: usize, dx: f64, dy: f64) -> ImageBuffer<T> {
    let mut img = ImageBuffer::new(1, width, height);
    for y in 0..height {
        for x in 0..width {
            let v: f64 = BLOBS
                .iter()
                .map(|&(cx, cy, a)| {
                    let r2 = (x as f64 - cx - dx).powi(2) + (y as f64 - cy - dy).powi(2);
                    a * (-r2 / (2.0 * 2.0 * 2.0)).exp()
                })
                .sum();
            img.set(0, x, y, T::from_real(v));
        }
    }
    img
}

/// Three-plane version of [`scene`] with a different gain per plane.
pub fn color_scene<T: Precision>(width: usize, height: usize, dx: f64, dy: f64) -> ImageBuffer<T> {
    let mono = scene::<T>(width, height, dx, dy);
    let mut img = ImageBuffer::new(3, width, height);
    for (p, gain) in [1.0, 0.7, 0.4].into_iter().enumerate() {
        for y in 0..height {
            for x in 0..width {
                img.set(p, x, y, mono.get(0, x, y) * T::from_real(gain));
            }
        }
    }
    img
}

/// Uniform noise in `[0, 1)` from a seeded generator.
pub fn noise<T: Precision>(planes: usize, width: usize, height: usize, seed: u64) -> ImageBuffer<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = ImageBuffer::new(planes, width, height);
    for p in 0..planes {
        for y in 0..height {
            for x in 0..width {
                img.set(p, x, y, T::from_real(rng.random::<f64>()));
            }
        }
    }
    img
}

/// Largest absolute pixel difference between two same-shape buffers.
pub fn max_abs_diff<T: Precision>(a: &ImageBuffer<T>, b: &ImageBuffer<T>) -> f64 {
    assert_eq!(a.shape(), b.shape());
    let mut worst: f64 = 0.0;
    for p in 0..a.planes() {
        for y in 0..a.height() {
            for (&u, &v) in a.row(p, y).iter().zip(b.row(p, y)) {
                worst = worst.max((u.as_f64() - v.as_f64()).abs());
            }
        }
    }
    worst
}

/// Spread `images` over `workers` contiguous partitions, pairing each with
/// its alignment.
pub fn partitioned<'a, T: Precision>(
    images: &'a [ImageBuffer<T>],
    alignments: &[Option<AlignmentResult>],
    workers: usize,
) -> Vec<Vec<StackItem<'a, ImageBuffer<T>>>> {
    partition(images.len(), workers)
        .into_iter()
        .map(|range| {
            range
                .map(|i| StackItem {
                    index: i,
                    source: &images[i],
                    alignment: alignments.get(i).copied().flatten(),
                })
                .collect()
        })
        .collect()
}

/// Alignment result that moves an image by `(dx, dy)`.
pub fn aligned_at(dx: f64, dy: f64) -> Option<AlignmentResult> {
    Some(AlignmentResult {
        offset: Offset::new(dx, dy),
        ..AlignmentResult::identity()
    })
}
