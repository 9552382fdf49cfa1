//! Sample format conversion between 16-bit and 24-in-32-bit containers

use crate::audio::{Sample, SampleFormat, SampleSpec, SampleSpecItem};
use crate::error::{ConversionError, Result};

use super::{Converter, ConverterCore};

/// Widen a 16-bit sample to Q8.23, sign extended in 32 bits
#[inline]
#[must_use]
pub fn widen_i16_to_i24(sample: i16) -> i32 {
    (i32::from(sample) << 16) >> 8
}

/// Narrow a Q8.23 sample to 16 bits, dropping the low 8 significant bits
#[inline]
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "The arithmetic shift leaves a value in the i16 range"
)]
pub fn narrow_i24_to_i16(sample: i32) -> i16 {
    ((sample << 8) >> 16) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Widen,
    Narrow,
}

/// Changes the sample format of a stream
#[derive(Debug)]
pub struct Reformatter {
    core: ConverterCore,
    direction: Option<(Direction, usize)>,
}

impl Reformatter {
    /// Create an unconfigured reformatter
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: ConverterCore::new(SampleSpecItem::Format),
            direction: None,
        }
    }
}

impl Default for Reformatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for Reformatter {
    fn item(&self) -> SampleSpecItem {
        SampleSpecItem::Format
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.direction = None;
        self.core.configure(src, dst)?;

        let direction = match (src.format(), dst.format()) {
            (SampleFormat::I16, SampleFormat::I24In32) => Direction::Widen,
            (SampleFormat::I24In32, SampleFormat::I16) => Direction::Narrow,
            (from, to) => {
                self.core.reset();
                return Err(ConversionError::invalid_operation(format!(
                    "cannot reformat {from:?} to {to:?}"
                )));
            }
        };

        tracing::debug!(
            "Reformatter configured: {:?} -> {:?}",
            src.format(),
            dst.format()
        );
        self.direction = Some((direction, src.channel_count() as usize));
        Ok(())
    }

    fn reset(&mut self) {
        self.direction = None;
        self.core.reset();
    }

    fn max_output_frames(&self, input_frames: usize) -> usize {
        input_frames
    }

    fn process(&mut self, src: &[u8], frames: usize, output: Option<&mut [u8]>) -> Result<usize> {
        let Some((direction, channels)) = self.direction else {
            return Err(ConversionError::not_initialized("reformatter not configured"));
        };
        self.core.check_input(src, frames)?;
        let dst = self.core.output_region(output, frames)?;

        let samples = frames * channels;
        match direction {
            Direction::Widen => {
                for index in 0..samples {
                    widen_i16_to_i24(i16::read(src, index)).write(dst, index);
                }
            }
            Direction::Narrow => {
                for index in 0..samples {
                    narrow_i24_to_i16(i32::read(src, index)).write(dst, index);
                }
            }
        }
        Ok(frames)
    }

    fn scratch_output(&self, frames: usize) -> &[u8] {
        self.core.scratch_output(frames)
    }
}
