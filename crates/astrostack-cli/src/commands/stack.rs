use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use astrostack_core::config::ProcessConfig;
use astrostack_core::geometry::Rect;
use astrostack_core::precision::DefaultPrecision;
use astrostack_core::stack::{
    partition, ExtremumPolarity, PostStack, SkipReason, SkippedImage, StackItem, StackMode, Stacker,
};
use clap::{Args, ValueEnum};
use tracing::warn;

use super::{align_images, load_all, load_config, parse_rect, AlignOutcome, Image};
use crate::io::{load_image, save_tiff};
use crate::progress::BarReporter;
use crate::summary::{print_skipped, print_stack_summary};

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum ModeArg {
    Standard,
    Sigma,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
pub enum PostArg {
    None,
    Mean,
    Normalize,
}

impl From<PostArg> for PostStack {
    fn from(arg: PostArg) -> Self {
        match arg {
            PostArg::None => PostStack::None,
            PostArg::Mean => PostStack::Mean,
            PostArg::Normalize => PostStack::Normalize,
        }
    }
}

#[derive(Args)]
pub struct StackArgs {
    /// Input image files
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "stacked.tiff")]
    pub output: PathBuf,

    /// Stacking mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Rejection threshold in standard deviations (sigma mode)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Upsampling factor of the stacked image
    #[arg(long)]
    pub expansion: Option<usize>,

    /// Post-processing of a standard stack
    #[arg(long, value_enum)]
    pub post: Option<PostArg>,

    /// Convert every image to luminance before stacking
    #[arg(long)]
    pub mono: bool,

    /// Also stack images whose alignment failed
    #[arg(long)]
    pub include_failed: bool,

    /// Reference image (defaults to the first input)
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Alignment window as x,y,width,height
    #[arg(long, value_parser = parse_rect)]
    pub rect: Option<Rect>,

    /// Number of worker threads (defaults to all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Processing config file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Fold command-line flags into a loaded config.
fn apply_overrides(config: &mut ProcessConfig, args: &StackArgs) {
    let stack = &mut config.stack;
    if let Some(mode) = args.mode {
        stack.mode = match mode {
            ModeArg::Standard => StackMode::Standard,
            ModeArg::Sigma => StackMode::sigma_reject(),
            ModeArg::Min => StackMode::Extremum {
                polarity: ExtremumPolarity::Min,
            },
            ModeArg::Max => StackMode::Extremum {
                polarity: ExtremumPolarity::Max,
            },
        };
    }
    if let (Some(t), StackMode::SigmaReject { threshold }) = (args.threshold, &mut stack.mode) {
        *threshold = t;
    }
    if let Some(expansion) = args.expansion {
        stack.expansion = expansion;
    }
    if let Some(post) = args.post {
        stack.post_stack = post.into();
    }
    stack.monochrome |= args.mono;
    stack.include_failed |= args.include_failed;
    if args.rect.is_some() {
        config.align.rect = args.rect;
    }
}

/// Pair each image with its alignment. Images that could not be aligned at
/// all are left out and reported as skipped.
fn stack_items(
    images: &[Image],
    results: Vec<AlignOutcome>,
) -> (Vec<StackItem<'_, Image>>, Vec<SkippedImage>) {
    let mut items = Vec::with_capacity(images.len());
    let mut skipped = Vec::new();
    for (index, (source, result)) in images.iter().zip(results).enumerate() {
        match result {
            Ok(alignment) => items.push(StackItem {
                index,
                source,
                alignment: Some(alignment),
            }),
            Err(e) => skipped.push(SkippedImage {
                index,
                reason: SkipReason::Error(e),
            }),
        }
    }
    (items, skipped)
}

pub fn run(args: &StackArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    apply_overrides(&mut config, args);
    if args.threshold.is_some() && !matches!(config.stack.mode, StackMode::SigmaReject { .. }) {
        warn!("--threshold only applies to sigma mode");
    }

    let threads = match args.threads {
        Some(n) => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build_global()
                .context("Failed to configure the thread pool")?;
            n.max(1)
        }
        None => rayon::current_num_threads(),
    };

    print_stack_summary(&config, args.files.len(), &args.output, threads);

    let images = load_all(&args.files)?;
    let external = args
        .reference
        .as_deref()
        .map(load_image::<DefaultPrecision>)
        .transpose()?;

    let reporter = Arc::new(BarReporter::new()?);
    let results = align_images(&config.align, external.as_ref(), &images, &reporter)?;

    let (items, unaligned) = stack_items(&images, results);
    for skipped in &unaligned {
        warn!(index = skipped.index, reason = %skipped.reason, "Image left out of the stack");
    }
    let partitions: Vec<Vec<StackItem<'_, Image>>> = partition(items.len(), threads)
        .into_iter()
        .map(|range| items[range].to_vec())
        .collect();

    let stacker =
        Stacker::<DefaultPrecision>::new(config.stack.clone()).with_reporter(reporter.clone());
    let output = stacker.stack(&partitions)?;
    reporter.finish();

    println!();
    println!(
        "Stacked {} of {} images",
        output.images_stacked,
        images.len()
    );
    let mut skipped = unaligned;
    skipped.extend(output.skipped);
    skipped.sort_by_key(|s| s.index);
    print_skipped(&args.files, &skipped);

    save_tiff(&output.image, &args.output)?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
