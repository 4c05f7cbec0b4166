use std::path::PathBuf;

use anyhow::Result;
use astrostack_core::geometry::Rect;
use astrostack_core::precision::DefaultPrecision;
use clap::Args;

use super::{align_images, load_all, load_config, parse_rect};
use crate::io::load_image;
use crate::progress::BarReporter;
use crate::summary::print_alignment_table;

#[derive(Args)]
pub struct AlignArgs {
    /// Input image files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Reference image (defaults to the first input)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Alignment window as x,y,width,height
    #[arg(long, value_parser = parse_rect)]
    pub rect: Option<Rect>,

    /// Low-pass cutoff as a fraction of the Nyquist radius (0 disables)
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Re-correlate the shifted window to confirm each offset
    #[arg(long)]
    pub check: bool,

    /// Processing config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?.align;
    if args.rect.is_some() {
        config.rect = args.rect;
    }
    if let Some(cutoff) = args.cutoff {
        config.cutoff = cutoff;
    }
    config.check_result |= args.check;

    let images = load_all(&args.files)?;
    let external = args.reference.as_deref().map(load_image::<DefaultPrecision>).transpose()?;

    let reporter = BarReporter::new()?;
    let results = align_images(&config, external.as_ref(), &images, &reporter)?;
    reporter.finish();

    let reference_index = if external.is_some() { None } else { Some(0) };
    print_alignment_table(&args.files, &results, reference_index);

    let aligned = results
        .iter()
        .filter(|r| matches!(r, Ok(result) if result.is_aligned()))
        .count();
    println!("Aligned {} of {} images", aligned, results.len());
    Ok(())
}
