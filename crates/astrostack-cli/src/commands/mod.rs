pub mod align;
pub mod config;
pub mod stack;

use std::path::PathBuf;

use anyhow::{Context, Result};
use astrostack_core::align::{AlignConfig, Aligner, AlignmentResult};
use astrostack_core::buffer::ImageBuffer;
use astrostack_core::config::ProcessConfig;
use astrostack_core::geometry::Rect;
use astrostack_core::precision::DefaultPrecision;
use rayon::prelude::*;
use tracing::info;

use crate::io::load_image;
use crate::progress::BarReporter;

pub type Image = ImageBuffer<DefaultPrecision>;

/// Per-image alignment: a result, or the error that kept the image from
/// being aligned at all.
pub type AlignOutcome = astrostack_core::error::Result<AlignmentResult>;

/// Parse `x,y,width,height`.
pub fn parse_rect(s: &str) -> std::result::Result<Rect, String> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("invalid rect '{s}': {e}"))?;
    match parts[..] {
        [x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(format!("rect '{s}' must be x,y,width,height")),
    }
}

/// Load a config file, or the defaults when none is given.
pub fn load_config(path: Option<&PathBuf>) -> Result<ProcessConfig> {
    let Some(path) = path else {
        return Ok(ProcessConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).context("Invalid processing config")
}

/// Decode every input file, in parallel.
pub fn load_all(files: &[PathBuf]) -> Result<Vec<Image>> {
    println!("Reading {} images...", files.len());
    files.par_iter().map(|path| load_image(path)).collect()
}

/// Align `images` against `reference`, or against the first image when no
/// separate reference is given.
pub fn align_images(
    config: &AlignConfig,
    reference: Option<&Image>,
    images: &[Image],
    reporter: &BarReporter,
) -> Result<Vec<AlignOutcome>> {
    let reference = match reference {
        Some(r) => r,
        None => images.first().context("no input images")?,
    };
    let aligner = Aligner::new(config.clone(), reference)?;
    let results = aligner.align_all_with_progress(images, reporter)?;
    aligner.finish();

    let aligned = results
        .iter()
        .filter(|r| matches!(r, Ok(result) if result.is_aligned()))
        .count();
    let errors = results.iter().filter(|r| r.is_err()).count();
    info!(aligned, errors, total = results.len(), "Alignment complete");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rect() {
        assert_eq!(parse_rect("1, 2,30,40"), Ok(Rect::new(1, 2, 30, 40)));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process.toml");
        std::fs::write(&path, "[stack]\nexpansion = 3\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.stack.expansion, 3);
        assert_eq!(load_config(None).unwrap(), ProcessConfig::default());
    }
}
