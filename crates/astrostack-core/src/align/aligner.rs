use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buffer::ImageBuffer;
use crate::consts::{CHECK_RESIDUAL_TOLERANCE, PARALLEL_FRAME_THRESHOLD};
use crate::error::{Result, StackError};
use crate::geometry::{Offset, Rect};
use crate::precision::Precision;
use crate::progress::{ProgressReporter, Stage};
use crate::spectrum::{SpectralBuffer, TransformGoal};

use super::config::AlignConfig;
use super::correlation::{plane_peak, CorrelationPeak};
use super::source::ImageSource;

/// Lifecycle of one alignment run. Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum AlignerState {
    Idle = 0,
    ReferenceReady = 1,
    Aligning = 2,
    Done = 3,
}

impl AlignerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::ReferenceReady,
            2 => Self::Aligning,
            _ => Self::Done,
        }
    }
}

/// Why an alignment was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AlignFailure {
    PeakTooWide { sigma_x: f64, sigma_y: f64 },
    PeakTooLow { value: f64 },
    /// Re-correlating the shifted window did not land near zero.
    Inconsistent { residual: f64 },
}

impl std::fmt::Display for AlignFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PeakTooWide { sigma_x, sigma_y } => {
                write!(f, "peak too wide ({sigma_x:.2} x {sigma_y:.2} px)")
            }
            Self::PeakTooLow { value } => write!(f, "peak too low ({value:.3e})"),
            Self::Inconsistent { residual } => {
                write!(f, "inconsistent offset (residual {residual:.2} px)")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AlignStatus {
    Aligned,
    Failed(AlignFailure),
}

/// Outcome of aligning one image. A failed alignment still carries the
/// measured offset and peak so callers can decide what to do with it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub offset: Offset,
    pub peak: CorrelationPeak,
    pub status: AlignStatus,
}

impl AlignmentResult {
    /// Result for the reference itself, or for images stacked unaligned.
    pub fn identity() -> Self {
        Self {
            offset: Offset::default(),
            peak: CorrelationPeak::undefined(),
            status: AlignStatus::Aligned,
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.status == AlignStatus::Aligned
    }
}

/// Registers images against a reference by cross-correlation of
/// their luminance inside a search window.
///
/// The reference spectrum is built once, by whichever caller first needs
/// it, and is read-only afterwards; `align` can then run concurrently from
/// any number of threads, each with its own scratch buffer.
pub struct Aligner<'r, T: Precision> {
    config: AlignConfig,
    rect: Rect,
    reference: Option<&'r dyn ImageSource<T>>,
    spectrum: OnceCell<SpectralBuffer<T>>,
    state: AtomicU8,
}

impl<'r, T: Precision> Aligner<'r, T> {
    /// Align against `reference`; its spectrum is computed on first use.
    pub fn new(config: AlignConfig, reference: &'r dyn ImageSource<T>) -> Result<Self> {
        validate(&config)?;
        let rect = config
            .rect
            .unwrap_or_else(|| Rect::full(reference.width(), reference.height()))
            .validated(reference.width(), reference.height())?;
        Ok(Self {
            config,
            rect,
            reference: Some(reference),
            spectrum: OnceCell::new(),
            state: AtomicU8::new(AlignerState::Idle as u8),
        })
    }

    /// Align against a spectrum prepared elsewhere, for example one kept
    /// from a previous run with [`Aligner::into_reference_spectrum`].
    ///
    /// The spectrum must be single-plane and sized like the search window.
    pub fn with_reference_spectrum(config: AlignConfig, spectrum: SpectralBuffer<T>) -> Result<Self> {
        validate(&config)?;
        if !spectrum.is_spectrum() {
            return Err(StackError::NotASpectrum);
        }
        let rect = config
            .rect
            .unwrap_or_else(|| Rect::full(spectrum.width(), spectrum.height()));
        if rect.is_empty()
            || spectrum.planes() != 1
            || spectrum.width() != rect.width
            || spectrum.height() != rect.height
        {
            return Err(StackError::InvalidParameter(format!(
                "reference spectrum {}x{}x{} does not match a {}x{} search window",
                spectrum.width(),
                spectrum.height(),
                spectrum.planes(),
                rect.width,
                rect.height
            )));
        }
        Ok(Self {
            config,
            rect,
            reference: None,
            spectrum: OnceCell::with_value(spectrum),
            state: AtomicU8::new(AlignerState::ReferenceReady as u8),
        })
    }

    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Search window, in source coordinates.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn state(&self) -> AlignerState {
        AlignerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn advance_state(&self, state: AlignerState) {
        self.state.fetch_max(state as u8, Ordering::AcqRel);
    }

    /// The luminance spectrum of the reference window, cut off and
    /// DC-normalized. Built on the first call; concurrent callers block
    /// until it is ready.
    pub fn reference_spectrum(&self) -> Result<&SpectralBuffer<T>> {
        let spectrum = self.spectrum.get_or_try_init(|| {
            let source = self.reference.ok_or(StackError::NotASpectrum)?;
            let window = source.extract(self.rect)?.to_luminance();
            let mut spectrum = SpectralBuffer::from_image(&window, TransformGoal::Direct);
            spectrum.forward_transform()?;
            spectrum.apply_cutoff(self.config.cutoff)?;
            spectrum.normalize()?;
            debug!(
                width = self.rect.width,
                height = self.rect.height,
                cutoff = self.config.cutoff,
                "Reference spectrum ready"
            );
            Ok::<_, StackError>(spectrum)
        })?;
        self.advance_state(AlignerState::ReferenceReady);
        Ok(spectrum)
    }

    /// Keep the reference spectrum for another run.
    pub fn into_reference_spectrum(self) -> Result<SpectralBuffer<T>> {
        self.reference_spectrum()?;
        self.spectrum.into_inner().ok_or(StackError::NotASpectrum)
    }

    /// Per-worker scratch buffer for [`Aligner::align`].
    pub fn new_scratch(&self) -> SpectralBuffer<T> {
        SpectralBuffer::new(1, self.rect.width, self.rect.height, TransformGoal::Both)
    }

    /// Measure the offset of `image` relative to the reference.
    pub fn align<S>(&self, image: &S, scratch: &mut SpectralBuffer<T>) -> Result<AlignmentResult>
    where
        S: ImageSource<T> + ?Sized,
    {
        let reference = self.reference_spectrum()?;
        self.advance_state(AlignerState::Aligning);

        let window = image.extract(self.rect)?.to_luminance();
        let peak = self.correlate_window(reference, &window, scratch)?;
        let mut offset = Offset::new(peak.x, peak.y);

        let mut status = self.judge(&peak);
        if status == AlignStatus::Aligned && self.config.check_result {
            match self.check_offset(image, offset, reference, scratch)? {
                Some(Ok(refined)) => offset = refined,
                Some(Err(failure)) => status = AlignStatus::Failed(failure),
                None => debug!("Shifted window leaves the image, offset check skipped"),
            }
        }

        debug!(
            dx = offset.dx,
            dy = offset.dy,
            sigma_x = peak.sigma_x,
            sigma_y = peak.sigma_y,
            value = peak.value,
            "Aligned image"
        );
        Ok(AlignmentResult {
            offset,
            peak,
            status,
        })
    }

    /// Align a batch in parallel, reporting one item per image.
    ///
    /// The outer error covers the run as a whole (empty batch, unusable
    /// reference). Each image gets its own entry, so an image that cannot be
    /// aligned at all does not discard the others' offsets.
    pub fn align_all<S>(&self, images: &[S]) -> Result<Vec<Result<AlignmentResult>>>
    where
        S: ImageSource<T>,
    {
        self.align_all_with_progress(images, &crate::progress::NoOpReporter)
    }

    pub fn align_all_with_progress<S>(
        &self,
        images: &[S],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<Result<AlignmentResult>>>
    where
        S: ImageSource<T>,
    {
        if images.is_empty() {
            return Err(StackError::EmptySequence);
        }

        reporter.begin_stage(Stage::Reference, None);
        self.reference_spectrum()?;
        reporter.finish_stage();

        info!(images = images.len(), "Aligning images");
        reporter.begin_stage(Stage::Aligning, Some(images.len()));
        let counter = AtomicUsize::new(0);
        let align_one = |scratch: &mut SpectralBuffer<T>, (i, image): (usize, &S)| {
            let result = self.align(image, scratch);
            match &result {
                Ok(AlignmentResult {
                    status: AlignStatus::Failed(failure),
                    ..
                }) => warn!(image = i, %failure, "Alignment failed"),
                Err(e) => warn!(image = i, error = %e, "Image could not be aligned"),
                Ok(_) => {}
            }
            reporter.advance(counter.fetch_add(1, Ordering::Relaxed) + 1);
            result
        };

        let results: Vec<Result<AlignmentResult>> = if images.len() >= PARALLEL_FRAME_THRESHOLD {
            images
                .par_iter()
                .enumerate()
                .map_init(|| self.new_scratch(), align_one)
                .collect()
        } else {
            let mut scratch = self.new_scratch();
            images
                .iter()
                .enumerate()
                .map(|item| align_one(&mut scratch, item))
                .collect()
        };
        reporter.finish_stage();
        Ok(results)
    }

    /// Mark the run complete.
    pub fn finish(&self) {
        self.advance_state(AlignerState::Done);
    }

    fn correlate_window(
        &self,
        reference: &SpectralBuffer<T>,
        window: &ImageBuffer<T>,
        scratch: &mut SpectralBuffer<T>,
    ) -> Result<CorrelationPeak> {
        scratch.load(window)?;
        scratch.forward_transform()?;
        scratch.apply_cutoff(self.config.cutoff)?;
        scratch.normalize()?;
        scratch.multiply_with_conjugate_in_place(reference)?;
        scratch.inverse_transform()?;
        Ok(plane_peak(scratch.image(), 0))
    }

    fn judge(&self, peak: &CorrelationPeak) -> AlignStatus {
        let limit = self.config.precision_threshold;
        if peak.sigma_x > limit || peak.sigma_y > limit {
            AlignStatus::Failed(AlignFailure::PeakTooWide {
                sigma_x: peak.sigma_x,
                sigma_y: peak.sigma_y,
            })
        } else if peak.value < self.config.min_peak_value {
            AlignStatus::Failed(AlignFailure::PeakTooLow { value: peak.value })
        } else {
            AlignStatus::Aligned
        }
    }

    /// Correlate the window moved by the integer part of `offset`; what is
    /// left should be the fractional part. `None` when the moved window
    /// does not fit in the image.
    fn check_offset<S>(
        &self,
        image: &S,
        offset: Offset,
        reference: &SpectralBuffer<T>,
        scratch: &mut SpectralBuffer<T>,
    ) -> Result<Option<std::result::Result<Offset, AlignFailure>>>
    where
        S: ImageSource<T> + ?Sized,
    {
        let (ix, iy) = (offset.dx.round() as i64, offset.dy.round() as i64);
        let shifted = match self.rect.translated(ix, iy) {
            Some(r) if r.validated(image.width(), image.height()).is_ok() => r,
            _ => return Ok(None),
        };

        let window = image.extract(shifted)?.to_luminance();
        let peak = self.correlate_window(reference, &window, scratch)?;
        let residual = peak.x.hypot(peak.y);
        if residual > CHECK_RESIDUAL_TOLERANCE || !residual.is_finite() {
            return Ok(Some(Err(AlignFailure::Inconsistent { residual })));
        }
        Ok(Some(Ok(Offset::new(ix as f64 + peak.x, iy as f64 + peak.y))))
    }
}

fn validate(config: &AlignConfig) -> Result<()> {
    if !(0.0..=1.0).contains(&config.cutoff) {
        return Err(StackError::InvalidParameter(format!(
            "cutoff must be within [0, 1], got {}",
            config.cutoff
        )));
    }
    if config.precision_threshold.is_nan() || config.precision_threshold <= 0.0 {
        return Err(StackError::InvalidParameter(format!(
            "precision threshold must be > 0, got {}",
            config.precision_threshold
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(w: usize, h: usize, cx: f64, cy: f64) -> ImageBuffer<f64> {
        let mut img = ImageBuffer::new(1, w, h);
        for y in 0..h {
            for x in 0..w {
                let r2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
                img.set(0, x, y, (-r2 / 8.0).exp());
            }
        }
        img
    }

    #[test]
    fn test_state_moves_forward() {
        let reference = spot(16, 16, 8.0, 8.0);
        let aligner = Aligner::new(AlignConfig::default(), &reference).unwrap();
        assert_eq!(aligner.state(), AlignerState::Idle);
        aligner.reference_spectrum().unwrap();
        assert_eq!(aligner.state(), AlignerState::ReferenceReady);
        let mut scratch = aligner.new_scratch();
        aligner.align(&reference, &mut scratch).unwrap();
        assert_eq!(aligner.state(), AlignerState::Aligning);
        aligner.reference_spectrum().unwrap();
        assert_eq!(aligner.state(), AlignerState::Aligning);
        aligner.finish();
        assert_eq!(aligner.state(), AlignerState::Done);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let reference = spot(8, 8, 4.0, 4.0);
        let config = AlignConfig {
            cutoff: 1.5,
            ..AlignConfig::default()
        };
        assert!(Aligner::new(config, &reference).is_err());
        let config = AlignConfig {
            rect: Some(Rect::new(4, 4, 8, 8)),
            ..AlignConfig::default()
        };
        assert!(matches!(
            Aligner::new(config, &reference),
            Err(StackError::InvalidRect(_))
        ));
    }

    #[test]
    fn test_reference_spectrum_override_must_match_window() {
        let mut spectrum = SpectralBuffer::<f64>::from_image(&spot(8, 8, 4.0, 4.0), TransformGoal::Direct);
        assert_eq!(
            Aligner::with_reference_spectrum(AlignConfig::default(), spectrum.clone()).err(),
            Some(StackError::NotASpectrum)
        );
        spectrum.forward_transform().unwrap();
        let config = AlignConfig {
            rect: Some(Rect::new(0, 0, 4, 4)),
            ..AlignConfig::default()
        };
        assert!(Aligner::with_reference_spectrum(config, spectrum.clone()).is_err());
        let aligner = Aligner::with_reference_spectrum(AlignConfig::default(), spectrum).unwrap();
        assert_eq!(aligner.state(), AlignerState::ReferenceReady);
    }
}
