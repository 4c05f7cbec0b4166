/// Processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Reference,
    Aligning,
    /// Stacking pass, counted from 1.
    Stacking(usize),
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => write!(f, "Preparing reference"),
            Self::Aligning => write!(f, "Aligning images"),
            Self::Stacking(1) => write!(f, "Stacking"),
            Self::Stacking(pass) => write!(f, "Stacking (pass {pass})"),
        }
    }
}

/// Thread-safe progress reporting for alignment and stacking.
///
/// Calls may come from any worker thread. All methods have default no-op
/// implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new stage has started. `total_items` is the number of images in
    /// this stage, if known.
    fn begin_stage(&self, _stage: Stage, _total_items: Option<usize>) {}

    /// `items_done` images of the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Reporter that ignores every event.
pub struct NoOpReporter;

impl ProgressReporter for NoOpReporter {}
