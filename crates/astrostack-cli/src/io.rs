use std::path::Path;

use anyhow::{bail, Context, Result};
use astrostack_core::buffer::ImageBuffer;
use astrostack_core::precision::Precision;
use image::{ColorType, DynamicImage, ImageFormat, Luma, Rgb};

/// Decode an image file into planar samples in `[0, 1]`.
///
/// Grayscale files give one plane; everything else is read as RGB.
pub fn load_image<T: Precision>(path: &Path) -> Result<ImageBuffer<T>> {
    let decoded =
        image::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
    Ok(to_planar(&decoded))
}

fn to_planar<T: Precision>(decoded: &DynamicImage) -> ImageBuffer<T> {
    let (w, h) = (decoded.width() as usize, decoded.height() as usize);
    let is_gray = matches!(
        decoded.color(),
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    );

    if is_gray {
        let luma = decoded.to_luma32f();
        let mut out = ImageBuffer::new(1, w, h);
        for (x, y, px) in luma.enumerate_pixels() {
            out.set(0, x as usize, y as usize, T::from_real(px.0[0] as f64));
        }
        out
    } else {
        let rgb = decoded.to_rgb32f();
        let mut out = ImageBuffer::new(3, w, h);
        for (x, y, px) in rgb.enumerate_pixels() {
            for (p, &v) in px.0.iter().enumerate() {
                out.set(p, x as usize, y as usize, T::from_real(v as f64));
            }
        }
        out
    }
}

fn to_u16<T: Precision>(v: T) -> u16 {
    (v.as_f64().clamp(0.0, 1.0) * 65535.0).round() as u16
}

/// Save a one- or three-plane buffer as a 16-bit TIFF. Samples are clamped
/// to `[0, 1]`.
pub fn save_tiff<T: Precision>(image: &ImageBuffer<T>, path: &Path) -> Result<()> {
    let (w, h) = (image.width(), image.height());
    match image.planes() {
        1 => {
            let mut pixels: Vec<u16> = Vec::with_capacity(w * h);
            for y in 0..h {
                pixels.extend(image.row(0, y).iter().map(|&v| to_u16(v)));
            }
            let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
                .context("pixel buffer does not match dimensions")?;
            img.save_with_format(path, ImageFormat::Tiff)?;
        }
        3 => {
            let mut pixels: Vec<u16> = Vec::with_capacity(w * h * 3);
            for y in 0..h {
                let (r, g, b) = (image.row(0, y), image.row(1, y), image.row(2, y));
                for x in 0..w {
                    pixels.extend([to_u16(r[x]), to_u16(g[x]), to_u16(b[x])]);
                }
            }
            let img = image::ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
                .context("pixel buffer does not match dimensions")?;
            img.save_with_format(path, ImageFormat::Tiff)?;
        }
        n => bail!("cannot save a {n}-plane image"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_tiff_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.tiff");
        let mut img = ImageBuffer::<f32>::new(1, 5, 4);
        img.set(0, 2, 1, 1.0);
        img.set(0, 4, 3, 0.5);
        save_tiff(&img, &path).unwrap();

        let back: ImageBuffer<f32> = load_image(&path).unwrap();
        assert_eq!(back.planes(), 1);
        assert_eq!((back.width(), back.height()), (5, 4));
        assert!((back.get(0, 2, 1) - 1.0).abs() < 1e-4);
        assert!((back.get(0, 4, 3) - 0.5).abs() < 1e-4);
        assert_eq!(back.get(0, 0, 0), 0.0);
    }

    #[test]
    fn test_color_tiff_keeps_planes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tiff");
        let mut img = ImageBuffer::<f64>::new(3, 3, 3);
        img.set(0, 1, 1, 1.0);
        img.set(2, 0, 2, 0.25);
        save_tiff(&img, &path).unwrap();

        let back: ImageBuffer<f64> = load_image(&path).unwrap();
        assert_eq!(back.planes(), 3);
        assert!((back.get(0, 1, 1) - 1.0).abs() < 1e-4);
        assert!(back.get(1, 1, 1).abs() < 1e-4);
        assert!((back.get(2, 0, 2) - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(to_u16(2.0f32), 65535);
        assert_eq!(to_u16(-1.0f64), 0);
    }

    #[test]
    fn test_two_planes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let img = ImageBuffer::<f32>::new(2, 2, 2);
        assert!(save_tiff(&img, &dir.path().join("x.tiff")).is_err());
    }
}
