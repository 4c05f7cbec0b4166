use crate::buffer::ImageBuffer;
use crate::error::Result;
use crate::geometry::Rect;
use crate::precision::Precision;

/// Anything that can hand out rectangular planar samples: a decoded file,
/// a video frame, an in-memory buffer.
pub trait ImageSource<T: Precision>: Sync {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn planes(&self) -> usize;

    /// Copy `rect` out as planar samples. `rect` must lie inside the source.
    fn extract(&self, rect: Rect) -> Result<ImageBuffer<T>>;
}

impl<T: Precision> ImageSource<T> for ImageBuffer<T> {
    fn width(&self) -> usize {
        ImageBuffer::width(self)
    }

    fn height(&self) -> usize {
        ImageBuffer::height(self)
    }

    fn planes(&self) -> usize {
        ImageBuffer::planes(self)
    }

    fn extract(&self, rect: Rect) -> Result<ImageBuffer<T>> {
        ImageBuffer::extract(self, rect)
    }
}

impl<T: Precision, S: ImageSource<T> + ?Sized> ImageSource<T> for &S {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    fn planes(&self) -> usize {
        (**self).planes()
    }

    fn extract(&self, rect: Rect) -> Result<ImageBuffer<T>> {
        (**self).extract(rect)
    }
}
