use crate::utils::error::{JpegError, JpegResult};
use std::ops::Range;

pub(crate) trait SafeAccess<T> {
    fn get_safe(&self, index: usize) -> JpegResult<&T>;
    fn get_range_safe(&self, range: Range<usize>) -> JpegResult<&[T]>;
    fn check_range(&self, range: Range<usize>) -> JpegResult<()>;
}

impl<T> SafeAccess<T> for [T] {
    /// Retrieves a reference to the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::UnexpectedEof` if the index is out of bounds. Segment
    /// parsing reads through this, so a short buffer always reads as truncated data.
    fn get_safe(&self, index: usize) -> JpegResult<&T> {
        self.get(index).ok_or(JpegError::UnexpectedEof)
    }

    /// Retrieves a sub-slice covering `range`.
    ///
    /// # Errors
    ///
    /// Returns `JpegError::UnexpectedEof` if the range reaches past the end of the slice,
    /// or `JpegError::InvalidSegment` if the range is reversed.
    fn get_range_safe(&self, range: Range<usize>) -> JpegResult<&[T]> {
        self.check_range(range.clone())?;
        self.get(range).ok_or(JpegError::UnexpectedEof)
    }

    /// Checks that `range` is valid for this slice without retrieving anything.
    ///
    /// # Errors
    ///
    /// * `JpegError::InvalidSegment` - the range start is greater than its end
    /// * `JpegError::UnexpectedEof` - the range end is greater than the slice length
    fn check_range(&self, range: Range<usize>) -> JpegResult<()> {
        if range.start > range.end {
            return Err(JpegError::InvalidSegment(format!(
                "invalid range: start ({}) > end ({})",
                range.start, range.end
            )));
        }

        if range.end > self.len() {
            return Err(JpegError::UnexpectedEof);
        }

        Ok(())
    }
}
