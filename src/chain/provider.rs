//! Pull-based source of frames for [`ConversionChain::get_converted_buffer`](super::ConversionChain::get_converted_buffer)

use crate::error::ProviderError;

/// A block of source frames lent by a [`FrameProvider`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredFrames<'a> {
    /// Interleaved source-spec bytes, at least `frames` frames long
    pub data: &'a [u8],
    /// Number of frames made available, possibly fewer than requested
    pub frames: usize,
}

/// Supplies source frames on demand
///
/// Every successful [`acquire`](FrameProvider::acquire) is paired with
/// exactly one [`release`](FrameProvider::release) before the next acquire.
pub trait FrameProvider {
    /// Lend up to `frame_hint` frames of the source spec
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` if no frames can be supplied.
    fn acquire(&mut self, frame_hint: usize) -> Result<AcquiredFrames<'_>, ProviderError>;

    /// Give back the block from the last acquire, `frames` of which were consumed
    fn release(&mut self, frames: usize);
}

impl<P: FrameProvider + ?Sized> FrameProvider for &mut P {
    fn acquire(&mut self, frame_hint: usize) -> Result<AcquiredFrames<'_>, ProviderError> {
        (**self).acquire(frame_hint)
    }

    fn release(&mut self, frames: usize) {
        (**self).release(frames);
    }
}
