use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::buffer::ImageBuffer;
use crate::error::{Result, StackError};
use crate::geometry::Offset;
use crate::precision::Precision;

use super::config::PostStack;
use super::strategy::{PassOutcome, StackingStrategy};

/// Running sums, one per plane count so mono and colour images can be
/// mixed in one run.
#[derive(Debug)]
pub struct StandardPartial<T: Precision> {
    sums: BTreeMap<usize, ImageBuffer<T>>,
    count: usize,
}

/// Sum of the aligned images, optionally averaged or normalized.
pub struct StandardStack {
    width: usize,
    height: usize,
    expansion: usize,
    post_stack: PostStack,
    monochrome: bool,
}

impl StandardStack {
    /// `width` x `height` is the output size, expansion included.
    pub fn new(width: usize, height: usize, expansion: usize, post_stack: PostStack, monochrome: bool) -> Self {
        Self {
            width,
            height,
            expansion,
            post_stack,
            monochrome,
        }
    }
}

impl<T: Precision> StackingStrategy<T> for StandardStack {
    type Partial = StandardPartial<T>;

    fn begin_pass(&self, _pass: usize) -> StandardPartial<T> {
        StandardPartial {
            sums: BTreeMap::new(),
            count: 0,
        }
    }

    fn process_image(
        &self,
        partial: &mut StandardPartial<T>,
        image: &ImageBuffer<T>,
        offsets: &[Offset],
    ) -> Result<()> {
        let aligned = image.resampled(offsets, self.width, self.height, self.expansion)?;
        match partial.sums.entry(image.planes()) {
            Entry::Vacant(slot) => {
                slot.insert(aligned);
            }
            Entry::Occupied(mut slot) => slot.get_mut().add(&aligned)?,
        }
        partial.count += 1;
        Ok(())
    }

    fn merge(&self, into: &mut StandardPartial<T>, from: StandardPartial<T>) -> Result<()> {
        for (planes, sum) in from.sums {
            match into.sums.entry(planes) {
                Entry::Vacant(slot) => {
                    slot.insert(sum);
                }
                Entry::Occupied(mut slot) => slot.get_mut().add(&sum)?,
            }
        }
        into.count += from.count;
        Ok(())
    }

    fn finish_all(&self, merged: StandardPartial<T>) -> Result<PassOutcome<T>> {
        let mut sums = merged.sums.into_iter().rev();
        let (_, mut result) = sums.next().ok_or(StackError::EmptySequence)?;
        // Fewer planes, mono in practice, are spread over every colour plane.
        for (_, sum) in sums {
            result.add(&sum)?;
        }

        match self.post_stack {
            PostStack::None => {}
            PostStack::Mean => result.multiply_scalar(T::from_real(1.0 / merged.count as f64)),
            PostStack::Normalize => {
                result.normalize_with_factor(0.0, self.monochrome);
            }
        }
        Ok(PassOutcome::Done(result))
    }
}
