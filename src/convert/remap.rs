//! Channel count and channel policy conversion

use crate::audio::{ChannelPolicy, Sample, SampleFormat, SampleSpec, SampleSpecItem};
use crate::config::ConversionConfig;
use crate::error::{ConversionError, Result};

use super::{Converter, ConverterCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemapStrategy {
    /// One source channel fanned out to every non-ignored destination channel
    MonoToMulti,
    /// Average of the valid source channels into a single channel
    MultiToMono,
    /// Same channel count, per-channel policy rules
    PolicyRemap,
}

#[derive(Debug)]
struct RemapPlan {
    strategy: RemapStrategy,
    format: SampleFormat,
    src_channels: usize,
    dst_channels: usize,
    src_valid: Vec<bool>,
    dst_policy: Vec<ChannelPolicy>,
}

impl RemapPlan {
    /// Floor average of the valid source channels of one frame, 0 if none
    #[inline]
    fn average<S: Sample>(&self, src: &[u8], frame: usize) -> S {
        let base = frame * self.src_channels;
        let mut sum = 0i64;
        let mut count = 0i64;
        for (channel, &valid) in self.src_valid.iter().enumerate() {
            if valid {
                sum += S::read(src, base + channel).to_i64();
                count += 1;
            }
        }
        if count == 0 {
            S::default()
        } else {
            S::from_i64(sum.div_euclid(count))
        }
    }

    fn run<S: Sample>(&self, silence_ignored: bool, src: &[u8], dst: &mut [u8], frames: usize) {
        match self.strategy {
            RemapStrategy::MonoToMulti => {
                for frame in 0..frames {
                    let sample = S::read(src, frame);
                    let base = frame * self.dst_channels;
                    for (channel, policy) in self.dst_policy.iter().enumerate() {
                        if *policy != ChannelPolicy::Ignore {
                            sample.write(dst, base + channel);
                        } else if silence_ignored {
                            S::default().write(dst, base + channel);
                        }
                    }
                }
            }
            RemapStrategy::MultiToMono => {
                for frame in 0..frames {
                    self.average::<S>(src, frame).write(dst, frame);
                }
            }
            RemapStrategy::PolicyRemap => {
                for frame in 0..frames {
                    let average = self.average::<S>(src, frame);
                    let base = frame * self.dst_channels;
                    for (channel, policy) in self.dst_policy.iter().enumerate() {
                        let sample = match policy {
                            ChannelPolicy::Ignore => S::default(),
                            ChannelPolicy::Average => average,
                            ChannelPolicy::Copy if self.src_valid[channel] => {
                                S::read(src, frame * self.src_channels + channel)
                            }
                            ChannelPolicy::Copy => average,
                        };
                        sample.write(dst, base + channel);
                    }
                }
            }
        }
    }
}

/// Changes the channel count or channel policies of a stream
///
/// Supported pairs: mono to N channels, N channels to mono, and N to N
/// channels with differing policies.
#[derive(Debug)]
pub struct Remapper {
    core: ConverterCore,
    plan: Option<RemapPlan>,
    silence_ignored: bool,
}

impl Remapper {
    /// Create a remapper with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ConversionConfig::default())
    }

    /// Create a remapper honouring `config.silence_ignored_channels`
    #[must_use]
    pub fn with_config(config: &ConversionConfig) -> Self {
        Self {
            core: ConverterCore::new(SampleSpecItem::ChannelCount),
            plan: None,
            silence_ignored: config.silence_ignored_channels,
        }
    }
}

impl Default for Remapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for Remapper {
    fn item(&self) -> SampleSpecItem {
        SampleSpecItem::ChannelCount
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.plan = None;
        self.core.configure(src, dst)?;

        let src_channels = src.channel_count() as usize;
        let dst_channels = dst.channel_count() as usize;
        let strategy = if src_channels == 1 && dst_channels > 1 {
            RemapStrategy::MonoToMulti
        } else if src_channels > 1 && dst_channels == 1 {
            RemapStrategy::MultiToMono
        } else if src_channels == dst_channels && src_channels > 0 {
            RemapStrategy::PolicyRemap
        } else {
            self.core.reset();
            return Err(ConversionError::invalid_operation(format!(
                "cannot remap {src_channels} channels to {dst_channels}"
            )));
        };

        tracing::debug!(
            "Remapper configured: {} -> {} channels ({:?})",
            src_channels,
            dst_channels,
            strategy
        );

        self.plan = Some(RemapPlan {
            strategy,
            format: src.format(),
            src_channels,
            dst_channels,
            src_valid: src
                .channels_policy()
                .iter()
                .map(|policy| *policy != ChannelPolicy::Ignore)
                .collect(),
            dst_policy: dst.channels_policy().to_vec(),
        });
        Ok(())
    }

    fn reset(&mut self) {
        self.plan = None;
        self.core.reset();
    }

    fn max_output_frames(&self, input_frames: usize) -> usize {
        input_frames
    }

    fn process(&mut self, src: &[u8], frames: usize, output: Option<&mut [u8]>) -> Result<usize> {
        let Some(plan) = self.plan.as_ref() else {
            return Err(ConversionError::not_initialized("remapper not configured"));
        };
        self.core.check_input(src, frames)?;
        let dst = self.core.output_region(output, frames)?;

        match plan.format {
            SampleFormat::I16 => plan.run::<i16>(self.silence_ignored, src, dst, frames),
            SampleFormat::I24In32 => plan.run::<i32>(self.silence_ignored, src, dst, frames),
        }
        Ok(frames)
    }

    fn scratch_output(&self, frames: usize) -> &[u8] {
        self.core.scratch_output(frames)
    }
}
