use astrostack_core::progress::{ProgressReporter, Stage};
use indicatif::{ProgressBar, ProgressStyle};

/// Draws alignment and stacking progress on one terminal bar.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: Stage, total_items: Option<usize>) {
        self.bar.reset();
        self.bar.set_length(total_items.unwrap_or(0) as u64);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self, items_done: usize) {
        // Workers report out of order.
        if items_done as u64 > self.bar.position() {
            self.bar.set_position(items_done as u64);
        }
    }

    fn finish_stage(&self) {
        self.bar.tick();
    }
}
