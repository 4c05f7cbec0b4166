use std::marker::PhantomData;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::align::{AlignFailure, AlignStatus, AlignmentResult, ImageSource};
use crate::buffer::ImageBuffer;
use crate::error::{Result, StackError};
use crate::geometry::{Offset, Rect};
use crate::precision::Precision;
use crate::progress::{NoOpReporter, ProgressReporter, Stage};

use super::config::{StackConfig, StackMode};
use super::extremum::ExtremumStack;
use super::sigma_reject::SigmaRejectStack;
use super::standard::StandardStack;
use super::strategy::{PassOutcome, StackingStrategy};

/// One image handed to the stacker.
#[derive(Debug)]
pub struct StackItem<'a, S: ?Sized> {
    /// Position in the caller's list, echoed in [`SkippedImage`].
    pub index: usize,
    pub source: &'a S,
    /// `None` stacks the image as is.
    pub alignment: Option<AlignmentResult>,
}

impl<S: ?Sized> Clone for StackItem<'_, S> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            source: self.source,
            alignment: self.alignment,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    AlignmentFailed(AlignFailure),
    Error(StackError),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlignmentFailed(failure) => write!(f, "alignment failed: {failure}"),
            Self::Error(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedImage {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct StackOutput<T: Precision> {
    pub image: ImageBuffer<T>,
    pub images_stacked: usize,
    /// Sorted by index.
    pub skipped: Vec<SkippedImage>,
    /// The run was stopped early; `image` holds what was stacked so far.
    pub cancelled: bool,
}

/// Split `n_items` into at most `workers` contiguous, non-empty ranges of
/// nearly equal length.
pub fn partition(n_items: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.clamp(1, n_items.max(1));
    let base = n_items / workers;
    let extra = n_items % workers;
    let mut start = 0;
    (0..workers)
        .map(|w| {
            let len = base + usize::from(w < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .filter(|r| !r.is_empty())
        .collect()
}

/// Partials deposited by the workers of one pass.
struct MergeSlot<P, T: Precision> {
    partials: Vec<Option<P>>,
    living: usize,
    stacked: usize,
    skipped: Vec<SkippedImage>,
    outcome: Option<Result<PassOutcome<T>>>,
}

enum ItemOutcome {
    Stacked,
    Rejected(AlignFailure),
}

/// Runs a stacking strategy over partitioned images, one thread per
/// partition.
pub struct Stacker<T: Precision> {
    config: StackConfig,
    cancel: Arc<AtomicBool>,
    reporter: Arc<dyn ProgressReporter>,
    _precision: PhantomData<T>,
}

impl<T: Precision> Stacker<T> {
    pub fn new(config: StackConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            reporter: Arc::new(NoOpReporter),
            _precision: PhantomData,
        }
    }

    /// Share a flag that stops the run between two images once set.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Stack every item, each partition on its own thread.
    ///
    /// The stacking window is taken from the first item's source when the
    /// configuration leaves it open.
    pub fn stack<S>(&self, partitions: &[Vec<StackItem<'_, S>>]) -> Result<StackOutput<T>>
    where
        S: ImageSource<T> + ?Sized,
    {
        if self.config.expansion == 0 {
            return Err(StackError::InvalidParameter(
                "expansion factor must be >= 1".into(),
            ));
        }
        let first = partitions
            .iter()
            .flatten()
            .next()
            .ok_or(StackError::EmptySequence)?;
        let (src_w, src_h) = (first.source.width(), first.source.height());
        let rect = self
            .config
            .rect
            .unwrap_or_else(|| Rect::full(src_w, src_h))
            .validated(src_w, src_h)?;
        let (width, height) = (rect.width * self.config.expansion, rect.height * self.config.expansion);

        let total: usize = partitions.iter().map(Vec::len).sum();
        info!(
            images = total,
            workers = partitions.len(),
            mode = %self.config.mode,
            width,
            height,
            "Stacking"
        );

        let output = match self.config.mode {
            StackMode::Standard => {
                let strategy = StandardStack::new(
                    width,
                    height,
                    self.config.expansion,
                    self.config.post_stack,
                    self.config.monochrome,
                );
                self.run(&strategy, partitions, rect)?
            }
            StackMode::SigmaReject { threshold } => {
                self.check_uniform_planes(partitions)?;
                let strategy = SigmaRejectStack::new(width, height, self.config.expansion, threshold)?;
                self.run(&strategy, partitions, rect)?
            }
            StackMode::Extremum { polarity } => {
                let strategy = ExtremumStack::new(width, height, self.config.expansion, polarity);
                self.run(&strategy, partitions, rect)?
            }
        };

        info!(
            stacked = output.images_stacked,
            skipped = output.skipped.len(),
            cancelled = output.cancelled,
            "Stacking finished"
        );
        Ok(output)
    }

    /// Failed alignments are left out unless the config includes them.
    fn will_stack<S: ?Sized>(&self, item: &StackItem<'_, S>) -> bool {
        self.config.include_failed
            || !matches!(
                item.alignment.map(|a| a.status),
                Some(AlignStatus::Failed(_))
            )
    }

    /// Sigma-reject keeps per-plane statistics, so every stacked image must
    /// carry the same number of planes.
    fn check_uniform_planes<S>(&self, partitions: &[Vec<StackItem<'_, S>>]) -> Result<()>
    where
        S: ImageSource<T> + ?Sized,
    {
        if self.config.monochrome {
            return Ok(());
        }
        let mut items = partitions
            .iter()
            .flatten()
            .filter(|item| self.will_stack(item));
        let Some(first) = items.next() else {
            return Ok(());
        };
        let planes = first.source.planes();
        match items.find(|item| item.source.planes() != planes) {
            Some(odd) => Err(StackError::ShapeMismatch {
                expected: crate::error::Shape {
                    planes,
                    width: first.source.width(),
                    height: first.source.height(),
                },
                found: crate::error::Shape {
                    planes: odd.source.planes(),
                    width: odd.source.width(),
                    height: odd.source.height(),
                },
            }),
            None => Ok(()),
        }
    }

    fn run<St, S>(
        &self,
        strategy: &St,
        partitions: &[Vec<StackItem<'_, S>>],
        rect: Rect,
    ) -> Result<StackOutput<T>>
    where
        St: StackingStrategy<T>,
        S: ImageSource<T> + ?Sized,
    {
        let mut pass = 1;
        loop {
            let (outcome, stacked, mut skipped) = match self.run_pass(strategy, partitions, rect, pass) {
                Err(_) if self.is_cancelled() => return Err(StackError::Cancelled),
                result => result?,
            };
            match outcome {
                PassOutcome::Done(image) => {
                    skipped.sort_by_key(|s| s.index);
                    return Ok(StackOutput {
                        image,
                        images_stacked: stacked,
                        skipped,
                        cancelled: self.is_cancelled(),
                    });
                }
                PassOutcome::AnotherPass => {
                    if self.is_cancelled() {
                        return Err(StackError::Cancelled);
                    }
                    debug!(pass = pass + 1, "Starting another pass");
                    pass += 1;
                }
            }
        }
    }

    /// One enumeration of every partition. All workers merge before the
    /// call returns, so a following pass never overlaps this one.
    fn run_pass<St, S>(
        &self,
        strategy: &St,
        partitions: &[Vec<StackItem<'_, S>>],
        rect: Rect,
        pass: usize,
    ) -> Result<(PassOutcome<T>, usize, Vec<SkippedImage>)>
    where
        St: StackingStrategy<T>,
        S: ImageSource<T> + ?Sized,
    {
        let total: usize = partitions.iter().map(Vec::len).sum();
        self.reporter.begin_stage(Stage::Stacking(pass), Some(total));

        let slot: Mutex<MergeSlot<St::Partial, T>> = Mutex::new(MergeSlot {
            partials: (0..partitions.len()).map(|_| None).collect(),
            living: partitions.len(),
            stacked: 0,
            skipped: Vec::new(),
            outcome: None,
        });
        let done = AtomicUsize::new(0);

        thread::scope(|scope| {
            for (worker, items) in partitions.iter().enumerate() {
                let slot = &slot;
                let done = &done;
                scope.spawn(move || {
                    let mut partial = strategy.begin_pass(pass);
                    let mut stacked = 0;
                    let mut skipped = Vec::new();
                    for item in items {
                        if self.is_cancelled() {
                            debug!(worker, "Cancelled");
                            break;
                        }
                        match self.stack_item(strategy, &mut partial, item, rect) {
                            Ok(ItemOutcome::Stacked) => stacked += 1,
                            Ok(ItemOutcome::Rejected(failure)) => skipped.push(SkippedImage {
                                index: item.index,
                                reason: SkipReason::AlignmentFailed(failure),
                            }),
                            Err(e) => {
                                warn!(image = item.index, error = %e, "Image skipped");
                                skipped.push(SkippedImage {
                                    index: item.index,
                                    reason: SkipReason::Error(e),
                                });
                            }
                        }
                        self.reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
                    }

                    let mut state = slot.lock();
                    state.partials[worker] = Some(partial);
                    state.stacked += stacked;
                    state.skipped.append(&mut skipped);
                    state.living -= 1;
                    if state.living == 0 {
                        let merged = fold_in_order::<T, St>(strategy, &mut state.partials);
                        state.outcome = Some(merged.and_then(|m| strategy.finish_all(m)));
                    }
                });
            }
        });
        self.reporter.finish_stage();

        let state = slot.into_inner();
        let outcome = match state.outcome {
            Some(outcome) => outcome?,
            // No partition at all.
            None => return Err(StackError::EmptySequence),
        };
        Ok((outcome, state.stacked, state.skipped))
    }

    fn stack_item<St, S>(
        &self,
        strategy: &St,
        partial: &mut St::Partial,
        item: &StackItem<'_, S>,
        rect: Rect,
    ) -> Result<ItemOutcome>
    where
        St: StackingStrategy<T>,
        S: ImageSource<T> + ?Sized,
    {
        let alignment = item.alignment.unwrap_or_else(AlignmentResult::identity);
        if let AlignStatus::Failed(failure) = alignment.status {
            if !self.config.include_failed {
                return Ok(ItemOutcome::Rejected(failure));
            }
        }

        let (window, residual) = self.window(item.source, rect, alignment.offset)?;
        let window = if self.config.monochrome {
            window.to_luminance()
        } else {
            window
        };
        strategy.process_image(partial, &window, &[residual])?;
        Ok(ItemOutcome::Stacked)
    }

    /// Extract the stacking window moved by the integer part of `offset`,
    /// returning it with the offset left to resample. Falls back to the
    /// unmoved window when the moved one leaves the source.
    fn window<S>(&self, source: &S, rect: Rect, offset: Offset) -> Result<(ImageBuffer<T>, Offset)>
    where
        S: ImageSource<T> + ?Sized,
    {
        let (ix, iy) = (offset.dx.round(), offset.dy.round());
        let moved = rect
            .translated(ix as i64, iy as i64)
            .filter(|r| r.validated(source.width(), source.height()).is_ok());
        match moved {
            Some(r) => Ok((source.extract(r)?, Offset::new(offset.dx - ix, offset.dy - iy))),
            None => Ok((source.extract(rect)?, offset)),
        }
    }
}

/// Merge every deposited partial into the first, in partition order.
fn fold_in_order<T, St>(strategy: &St, partials: &mut [Option<St::Partial>]) -> Result<St::Partial>
where
    T: Precision,
    St: StackingStrategy<T>,
{
    let mut deposited = partials.iter_mut().filter_map(Option::take);
    let mut merged = deposited.next().ok_or(StackError::EmptySequence)?;
    for partial in deposited {
        strategy.merge(&mut merged, partial)?;
    }
    Ok(merged)
}
