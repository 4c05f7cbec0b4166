use crate::buffer::ImageBuffer;
use crate::error::Result;
use crate::geometry::Offset;
use crate::precision::Precision;

/// What the driver does after the partials of a pass are merged.
#[derive(Debug)]
pub enum PassOutcome<T: Precision> {
    /// Enumerate the same partitions once more.
    AnotherPass,
    Done(ImageBuffer<T>),
}

/// One way of combining aligned images into a single buffer.
///
/// Each worker owns a `Partial` built by [`begin_pass`], folds its images
/// into it with [`process_image`], then hands it over to be merged with the
/// other workers' partials. Merging must be associative and commutative so
/// the result does not depend on how the images were partitioned.
///
/// [`begin_pass`]: StackingStrategy::begin_pass
/// [`process_image`]: StackingStrategy::process_image
pub trait StackingStrategy<T: Precision>: Sync {
    type Partial: Send;

    /// Empty per-worker state for `pass`, counted from 1.
    fn begin_pass(&self, pass: usize) -> Self::Partial;

    /// Fold one image, cropped to the stacking window and displaced by
    /// `offsets` (one per plane, or one for all), into `partial`.
    ///
    /// On error `partial` is left as it was.
    fn process_image(
        &self,
        partial: &mut Self::Partial,
        image: &ImageBuffer<T>,
        offsets: &[Offset],
    ) -> Result<()>;

    fn merge(&self, into: &mut Self::Partial, from: Self::Partial) -> Result<()>;

    /// Called once per pass on the fully merged state.
    fn finish_all(&self, merged: Self::Partial) -> Result<PassOutcome<T>>;
}
