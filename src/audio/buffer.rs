//! Owned scratch buffers for the conversion hot path

use crate::error::{ConversionError, Result};

/// Grow-only byte buffer owned by a single converter
///
/// Contents are only meaningful until the next call that asks for more
/// room: growth reallocates the whole buffer and does not keep old bytes.
#[derive(Debug, Default)]
pub struct ScratchBuffer {
    data: Vec<u8>,
}

impl ScratchBuffer {
    /// Create an empty buffer; memory is allocated on first use
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get buffer capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Make room for `bytes` bytes and return that region
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the allocation fails.
    pub fn ensure(&mut self, bytes: usize) -> Result<&mut [u8]> {
        if self.data.len() < bytes {
            let mut fresh = Vec::new();
            fresh
                .try_reserve_exact(bytes)
                .map_err(|_| ConversionError::out_of_memory(bytes))?;
            fresh.resize(bytes, 0);
            self.data = fresh;
        }
        Ok(&mut self.data[..bytes])
    }

    /// Borrow the first `bytes` bytes
    ///
    /// # Panics
    ///
    /// Panics if `bytes` exceeds the capacity.
    pub fn as_slice(&self, bytes: usize) -> &[u8] {
        &self.data[..bytes]
    }

    /// Free the memory
    pub fn release(&mut self) {
        self.data = Vec::new();
    }
}

/// Holds converted, not yet delivered frames of the destination spec
///
/// Unread frames always start at offset 0; a partial drain shifts the
/// remainder down.
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    data: Vec<u8>,
    frame_size: usize,
    available_frames: usize,
}

impl AccumulationBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all content and memory, and switch to a new frame size
    pub fn reset(&mut self, frame_size: usize) {
        self.data = Vec::new();
        self.frame_size = frame_size;
        self.available_frames = 0;
    }

    /// Get capacity in frames
    pub fn capacity_frames(&self) -> usize {
        if self.frame_size == 0 {
            0
        } else {
            self.data.len() / self.frame_size
        }
    }

    /// Get number of unread frames
    pub fn available_frames(&self) -> usize {
        self.available_frames
    }

    /// Check if no frames are pending
    pub fn is_empty(&self) -> bool {
        self.available_frames == 0
    }

    /// Grow to hold at least `frames` frames, keeping unread frames
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the allocation fails.
    ///
    /// # Panics
    ///
    /// Panics if the buffer has no frame size or the size overflows.
    pub fn reserve_frames(&mut self, frames: usize) -> Result<()> {
        assert!(self.frame_size != 0, "accumulation buffer used without a frame size");
        if frames <= self.capacity_frames() {
            return Ok(());
        }
        let Some(bytes) = frames.checked_mul(self.frame_size) else {
            panic!("accumulation buffer overflow: {frames} frames");
        };
        self.data
            .try_reserve_exact(bytes - self.data.len())
            .map_err(|_| ConversionError::out_of_memory(bytes))?;
        self.data.resize(bytes, 0);
        tracing::trace!("Accumulation buffer grown to {} frames", frames);
        Ok(())
    }

    /// Writable region past the unread frames
    pub fn free_tail_mut(&mut self) -> &mut [u8] {
        let offset = self.available_frames * self.frame_size;
        &mut self.data[offset..]
    }

    /// Mark `frames` frames written into the free tail as available
    ///
    /// # Panics
    ///
    /// Panics if that would exceed the capacity.
    pub fn commit(&mut self, frames: usize) {
        let available = self.available_frames + frames;
        assert!(
            available <= self.capacity_frames(),
            "accumulation buffer overrun: {available} > {} frames",
            self.capacity_frames()
        );
        self.available_frames = available;
    }

    /// Copy `frames` frames into `output` and shift the rest to offset 0
    ///
    /// # Panics
    ///
    /// Panics if fewer than `frames` frames are available or `output` is too small.
    pub fn drain_into(&mut self, output: &mut [u8], frames: usize) {
        assert!(
            frames <= self.available_frames,
            "draining {frames} frames with {} available",
            self.available_frames
        );
        let bytes = frames * self.frame_size;
        output[..bytes].copy_from_slice(&self.data[..bytes]);

        let leftover = self.available_frames - frames;
        if leftover > 0 {
            let end = self.available_frames * self.frame_size;
            self.data.copy_within(bytes..end, 0);
        }
        self.available_frames = leftover;
    }

    /// Peek at the unread frames
    pub fn pending(&self) -> &[u8] {
        &self.data[..self.available_frames * self.frame_size]
    }
}
