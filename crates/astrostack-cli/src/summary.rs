use std::path::{Path, PathBuf};

use astrostack_core::align::AlignStatus;
use astrostack_core::config::ProcessConfig;
use astrostack_core::stack::{PostStack, SkippedImage, StackMode};
use console::Style;

use crate::commands::AlignOutcome;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    failed: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            failed: Style::new().red(),
            path: Style::new().underlined(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn print_stack_summary(config: &ProcessConfig, inputs: usize, output: &Path, threads: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Astrostack"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(10)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Inputs"),
        s.value.apply_to(format!("{inputs} images"))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Output"),
        s.path.apply_to(output.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Threads"),
        s.value.apply_to(threads)
    );
    println!();

    println!("  {}", s.header.apply_to("Alignment"));
    match config.align.rect {
        Some(r) => println!(
            "    {:<12}{}",
            s.label.apply_to("Window"),
            s.value
                .apply_to(format!("{}x{} at ({}, {})", r.width, r.height, r.x, r.y))
        ),
        None => println!(
            "    {:<12}{}",
            s.label.apply_to("Window"),
            s.disabled.apply_to("full image")
        ),
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Cutoff"),
        s.value.apply_to(config.align.cutoff)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Max sigma"),
        s.value.apply_to(format!("{} px", config.align.precision_threshold))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Check"),
        s.value
            .apply_to(if config.align.check_result { "yes" } else { "no" })
    );
    println!();

    let stack = &config.stack;
    println!("  {}", s.header.apply_to("Stacking"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Mode"),
        s.method.apply_to(stack.mode)
    );
    if stack.mode == StackMode::Standard {
        let style = if stack.post_stack == PostStack::None {
            &s.disabled
        } else {
            &s.method
        };
        println!(
            "    {:<12}{}",
            s.label.apply_to("Post"),
            style.apply_to(stack.post_stack)
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Expansion"),
        s.value.apply_to(format!("{}x", stack.expansion))
    );
    if stack.monochrome {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Color"),
            s.disabled.apply_to("forced mono")
        );
    }
    if stack.include_failed {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Failed"),
            s.disabled.apply_to("included")
        );
    }
    println!();
}

/// One line per image: offset, peak width and verdict.
pub fn print_alignment_table(files: &[PathBuf], results: &[AlignOutcome], reference: Option<usize>) {
    let s = Styles::new();

    println!();
    println!(
        "  {:<4}{:<28}{:>9}{:>9}{:>8}{:>8}  {}",
        s.label.apply_to("#"),
        s.label.apply_to("File"),
        s.label.apply_to("dx"),
        s.label.apply_to("dy"),
        s.label.apply_to("sx"),
        s.label.apply_to("sy"),
        s.label.apply_to("Status")
    );
    for (i, (path, result)) in files.iter().zip(results).enumerate() {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                println!(
                    "  {:<4}{:<28}{:>9}{:>9}{:>8}{:>8}  {}",
                    i,
                    file_name(path),
                    "-",
                    "-",
                    "-",
                    "-",
                    s.failed.apply_to(e)
                );
                continue;
            }
        };
        let status = match result.status {
            AlignStatus::Aligned if Some(i) == reference => s.method.apply_to("reference".to_string()),
            AlignStatus::Aligned => s.method.apply_to("ok".to_string()),
            AlignStatus::Failed(failure) => s.failed.apply_to(failure.to_string()),
        };
        println!(
            "  {:<4}{:<28}{:>9.3}{:>9.3}{:>8.2}{:>8.2}  {}",
            i,
            file_name(path),
            result.offset.dx,
            result.offset.dy,
            result.peak.sigma_x,
            result.peak.sigma_y,
            status
        );
    }
    println!();
}

pub fn print_skipped(files: &[PathBuf], skipped: &[SkippedImage]) {
    if skipped.is_empty() {
        return;
    }
    let s = Styles::new();
    println!("  {}", s.header.apply_to("Skipped"));
    for item in skipped {
        let name = files
            .get(item.index)
            .map(|p| file_name(p))
            .unwrap_or_else(|| format!("#{}", item.index));
        println!(
            "    {:<28}{}",
            s.label.apply_to(name),
            s.failed.apply_to(&item.reason)
        );
    }
    println!();
}
