use crate::buffer::ImageBuffer;
use crate::error::{Result, StackError};
use crate::geometry::Offset;
use crate::precision::Precision;

use super::config::ExtremumPolarity;
use super::strategy::{PassOutcome, StackingStrategy};

/// Per-pixel maximum or minimum of the aligned images. The first image
/// seeds the buffer.
pub struct ExtremumStack {
    width: usize,
    height: usize,
    expansion: usize,
    polarity: ExtremumPolarity,
}

impl ExtremumStack {
    /// `width` x `height` is the output size, expansion included.
    pub fn new(width: usize, height: usize, expansion: usize, polarity: ExtremumPolarity) -> Self {
        Self {
            width,
            height,
            expansion,
            polarity,
        }
    }

    fn fold<T: Precision>(&self, into: &mut ImageBuffer<T>, other: &ImageBuffer<T>) -> Result<()> {
        match self.polarity {
            ExtremumPolarity::Max => into.max_in_place(other),
            ExtremumPolarity::Min => into.min_in_place(other),
        }
    }
}

impl<T: Precision> StackingStrategy<T> for ExtremumStack {
    type Partial = Option<ImageBuffer<T>>;

    fn begin_pass(&self, _pass: usize) -> Option<ImageBuffer<T>> {
        None
    }

    fn process_image(
        &self,
        partial: &mut Option<ImageBuffer<T>>,
        image: &ImageBuffer<T>,
        offsets: &[Offset],
    ) -> Result<()> {
        let aligned = image.resampled(offsets, self.width, self.height, self.expansion)?;
        match partial {
            None => *partial = Some(aligned),
            Some(extremum) => self.fold(extremum, &aligned)?,
        }
        Ok(())
    }

    fn merge(&self, into: &mut Option<ImageBuffer<T>>, from: Option<ImageBuffer<T>>) -> Result<()> {
        let Some(other) = from else {
            return Ok(());
        };
        match into {
            None => *into = Some(other),
            Some(extremum) => self.fold(extremum, &other)?,
        }
        Ok(())
    }

    fn finish_all(&self, merged: Option<ImageBuffer<T>>) -> Result<PassOutcome<T>> {
        merged
            .map(PassOutcome::Done)
            .ok_or(StackError::EmptySequence)
    }
}
