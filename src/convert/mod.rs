//! Single-dimension audio converters
//!
//! Each converter changes exactly one [`SampleSpecItem`] of a stream and owns
//! the scratch memory it writes into when the caller does not supply an
//! output buffer.

pub mod rate;
pub mod reformat;
pub mod remap;
pub mod resample;

#[cfg(test)]
mod tests;

use crate::audio::{SampleSpec, SampleSpecItem, ScratchBuffer};
use crate::error::{ConversionError, Result};

pub use rate::{FftRateConverter, LinearRateConverter, RateConverter};
pub use reformat::Reformatter;
pub use remap::Remapper;
pub use resample::Resampler;

/// Where the output of a `convert` call lives
///
/// Borrowed data is only valid until the next `convert` or `configure` on
/// the instance that produced it.
#[derive(Debug, PartialEq, Eq)]
pub enum ConvertedBuffer<'a> {
    /// Samples were written into the caller-supplied buffer
    Written {
        /// Number of destination frames written
        frames: usize,
    },
    /// Samples live in converter-owned scratch memory
    Scratch {
        /// Converted bytes
        data: &'a [u8],
        /// Number of destination frames
        frames: usize,
    },
    /// Identity conversion without an output buffer: the source itself
    Source {
        /// The caller's source bytes
        data: &'a [u8],
        /// Number of frames
        frames: usize,
    },
}

impl ConvertedBuffer<'_> {
    /// Number of destination frames produced
    #[must_use]
    pub fn frames(&self) -> usize {
        match *self {
            Self::Written { frames }
            | Self::Scratch { frames, .. }
            | Self::Source { frames, .. } => frames,
        }
    }

    /// Borrowed output bytes, `None` when the caller's buffer was written
    #[must_use]
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Written { .. } => None,
            Self::Scratch { data, .. } | Self::Source { data, .. } => Some(data),
        }
    }
}

/// A transform of one dimension between a fixed source/destination pair
pub trait Converter: Send {
    /// The dimension this converter is responsible for
    fn item(&self) -> SampleSpecItem;

    /// Bind the converter to a spec pair
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the pair does not differ in exactly this
    /// converter's dimension, or if the sub-case is not supported.
    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()>;

    /// Forget the bound pair and free scratch memory
    fn reset(&mut self);

    /// Upper bound of frames produced for `input_frames` input frames
    fn max_output_frames(&self, input_frames: usize) -> usize;

    /// Exact frames the next `process` of `input_frames` frames produces
    fn output_frames(&self, input_frames: usize) -> usize {
        input_frames
    }

    /// Convert `frames` frames of `src`
    ///
    /// Writes into `output` when supplied, otherwise into owned scratch
    /// memory readable through [`Converter::scratch_output`]. Returns the
    /// number of frames produced.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before a successful `configure`,
    /// `InvalidOperation` if a buffer is too small, `OutOfMemory` if scratch
    /// growth fails.
    fn process(&mut self, src: &[u8], frames: usize, output: Option<&mut [u8]>) -> Result<usize>;

    /// Scratch bytes holding the last `frames` frames produced without an output buffer
    fn scratch_output(&self, frames: usize) -> &[u8];

    /// Convert and tag where the result lives
    ///
    /// # Errors
    ///
    /// Same as [`Converter::process`].
    fn convert<'a>(
        &'a mut self,
        src: &[u8],
        frames: usize,
        output: Option<&mut [u8]>,
    ) -> Result<ConvertedBuffer<'a>> {
        if let Some(output) = output {
            let frames = self.process(src, frames, Some(output))?;
            return Ok(ConvertedBuffer::Written { frames });
        }
        let frames = self.process(src, frames, None)?;
        Ok(ConvertedBuffer::Scratch {
            data: self.scratch_output(frames),
            frames,
        })
    }
}

/// Spec pair and scratch memory shared by every converter
#[derive(Debug)]
pub(crate) struct ConverterCore {
    item: SampleSpecItem,
    specs: Option<(SampleSpec, SampleSpec)>,
    scratch: ScratchBuffer,
}

impl ConverterCore {
    pub(crate) fn new(item: SampleSpecItem) -> Self {
        Self {
            item,
            specs: None,
            scratch: ScratchBuffer::new(),
        }
    }

    /// Check that `src` and `dst` differ in this dimension only, then bind them
    pub(crate) fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.reset();

        if SampleSpec::is_item_equal(self.item, src, dst) {
            return Err(ConversionError::invalid_operation(format!(
                "{:?} converter has nothing to convert",
                self.item
            )));
        }
        for other in SampleSpecItem::ALL {
            if other != self.item && !SampleSpec::is_item_equal(other, src, dst) {
                return Err(ConversionError::invalid_operation(format!(
                    "{:?} converter cannot change {other:?}",
                    self.item
                )));
            }
        }

        self.specs = Some((src.clone(), dst.clone()));
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        self.specs = None;
        self.scratch.release();
    }

    pub(crate) fn specs(&self) -> Result<(&SampleSpec, &SampleSpec)> {
        self.specs
            .as_ref()
            .map(|(src, dst)| (src, dst))
            .ok_or_else(|| {
                let message = format!("{:?} converter not configured", self.item);
                ConversionError::not_initialized(message)
            })
    }

    /// Check that `src` holds `frames` source frames
    pub(crate) fn check_input(&self, src: &[u8], frames: usize) -> Result<()> {
        let (src_spec, _) = self.specs()?;
        let needed = src_spec.convert_frames_to_bytes(frames);
        if src.len() < needed {
            return Err(ConversionError::invalid_operation(format!(
                "source holds {} bytes, {frames} frames need {needed}",
                src.len()
            )));
        }
        Ok(())
    }

    /// Region receiving `frames` destination frames
    ///
    /// Scratch memory keeps one extra destination frame of headroom.
    pub(crate) fn output_region<'a>(
        &'a mut self,
        output: Option<&'a mut [u8]>,
        frames: usize,
    ) -> Result<&'a mut [u8]> {
        let (bytes, frame_size) = {
            let (_, dst) = self.specs()?;
            (dst.convert_frames_to_bytes(frames), dst.frame_size())
        };
        match output {
            Some(buffer) => {
                if buffer.len() < bytes {
                    return Err(ConversionError::invalid_operation(format!(
                        "output buffer holds {} bytes, {bytes} needed",
                        buffer.len()
                    )));
                }
                Ok(&mut buffer[..bytes])
            }
            None => {
                let region = self.scratch.ensure(bytes + frame_size)?;
                Ok(&mut region[..bytes])
            }
        }
    }

    pub(crate) fn scratch_output(&self, frames: usize) -> &[u8] {
        match &self.specs {
            Some((_, dst)) => self.scratch.as_slice(dst.convert_frames_to_bytes(frames)),
            None => &[],
        }
    }
}
