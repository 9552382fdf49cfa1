//! Sample specification definitions

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

use super::utils::USEC_PER_SEC;

/// PCM sample format
///
/// Samples are signed, interleaved and little endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 16-bit signed integer
    #[default]
    I16,
    /// 24-bit signed integer, sign extended in a 32-bit container (Q8.23)
    I24In32,
}

impl SampleFormat {
    /// Get bytes per sample (container size)
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::I24In32 => 4,
        }
    }

    /// Get significant bits per sample
    #[must_use]
    pub fn bits_per_sample(self) -> u32 {
        match self {
            SampleFormat::I16 => 16,
            SampleFormat::I24In32 => 24,
        }
    }

    /// Create from a significant bit width
    #[must_use]
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(SampleFormat::I16),
            24 => Some(SampleFormat::I24In32),
            _ => None,
        }
    }
}

/// Per-channel rule used by the remapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChannelPolicy {
    /// Copy the sample of the same channel index
    #[default]
    Copy,
    /// Average of all valid source channels
    Average,
    /// Channel carries no meaningful data
    Ignore,
}

/// One dimension of a [`SampleSpec`]
///
/// The declaration order is the order in which the conversion planner
/// visits the dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleSpecItem {
    /// Channel count, including the channel policy vector
    ChannelCount,
    /// Sample format
    Format,
    /// Sample rate
    Rate,
}

impl SampleSpecItem {
    /// All dimensions, in planning order
    pub const ALL: [SampleSpecItem; 3] = [
        SampleSpecItem::ChannelCount,
        SampleSpecItem::Format,
        SampleSpecItem::Rate,
    ];
}

/// Shape of one side of a conversion: channels, format and rate
///
/// Equality compares channel count, channel policies, format and rate. The
/// channel mask is informational and does not take part in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawSampleSpec", into = "RawSampleSpec")]
pub struct SampleSpec {
    channel_count: u32,
    channel_mask: u32,
    channels_policy: Vec<ChannelPolicy>,
    format: SampleFormat,
    sample_rate: u32,
}

impl SampleSpec {
    /// Create a spec with every channel in [`ChannelPolicy::Copy`]
    #[must_use]
    pub fn new(channel_count: u32, format: SampleFormat, sample_rate: u32) -> Self {
        Self {
            channel_count,
            channel_mask: 0,
            channels_policy: vec![ChannelPolicy::Copy; channel_count as usize],
            format,
            sample_rate,
        }
    }

    /// Create a spec with an explicit channel policy vector
    ///
    /// # Panics
    ///
    /// Panics if `policies.len() != channel_count`.
    #[must_use]
    pub fn with_policies(
        channel_count: u32,
        format: SampleFormat,
        sample_rate: u32,
        policies: Vec<ChannelPolicy>,
    ) -> Self {
        let mut spec = Self::new(channel_count, format, sample_rate);
        spec.set_channels_policy(policies);
        spec
    }

    /// Get the channel count
    #[must_use]
    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Set the channel count, resetting every channel policy to `Copy`
    pub fn set_channel_count(&mut self, channel_count: u32) {
        self.channel_count = channel_count;
        self.channels_policy = vec![ChannelPolicy::Copy; channel_count as usize];
    }

    /// Get the channel mask
    #[must_use]
    pub fn channel_mask(&self) -> u32 {
        self.channel_mask
    }

    /// Set the channel mask
    pub fn set_channel_mask(&mut self, channel_mask: u32) {
        self.channel_mask = channel_mask;
    }

    /// Get the policy vector, one entry per channel
    #[must_use]
    pub fn channels_policy(&self) -> &[ChannelPolicy] {
        &self.channels_policy
    }

    /// Get the policy of one channel
    ///
    /// # Panics
    ///
    /// Panics if `channel` is out of range.
    #[must_use]
    pub fn channel_policy(&self, channel: usize) -> ChannelPolicy {
        assert!(
            channel < self.channels_policy.len(),
            "channel {channel} out of range ({} channels)",
            self.channel_count
        );
        self.channels_policy[channel]
    }

    /// Replace the policy vector
    ///
    /// # Panics
    ///
    /// Panics if the vector length differs from the channel count.
    pub fn set_channels_policy(&mut self, policies: Vec<ChannelPolicy>) {
        assert_eq!(
            policies.len(),
            self.channel_count as usize,
            "channel policy vector must match the channel count"
        );
        self.channels_policy = policies;
    }

    /// Get the sample format
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Set the sample format
    pub fn set_format(&mut self, format: SampleFormat) {
        self.format = format;
    }

    /// Get the sample rate in Hz
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set the sample rate in Hz
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Get one dimension as a number
    ///
    /// The format is reported as its significant bit width.
    #[must_use]
    pub fn item(&self, item: SampleSpecItem) -> u32 {
        match item {
            SampleSpecItem::ChannelCount => self.channel_count,
            SampleSpecItem::Format => self.format.bits_per_sample(),
            SampleSpecItem::Rate => self.sample_rate,
        }
    }

    /// Set one dimension from a number
    ///
    /// # Panics
    ///
    /// Panics if `item` is `Format` and `value` is not a supported bit width.
    pub fn set_item(&mut self, item: SampleSpecItem, value: u32) {
        match item {
            SampleSpecItem::ChannelCount => self.set_channel_count(value),
            SampleSpecItem::Format => {
                let Some(format) = SampleFormat::from_bits(value) else {
                    panic!("unsupported sample format width: {value} bits");
                };
                self.format = format;
            }
            SampleSpecItem::Rate => self.sample_rate = value,
        }
    }

    /// Overwrite one dimension with the value held by `other`
    ///
    /// For the channel dimension the policy vector is copied too.
    pub fn copy_item_from(&mut self, item: SampleSpecItem, other: &SampleSpec) {
        match item {
            SampleSpecItem::ChannelCount => {
                self.channel_count = other.channel_count;
                self.channels_policy.clone_from(&other.channels_policy);
            }
            SampleSpecItem::Format => self.format = other.format,
            SampleSpecItem::Rate => self.sample_rate = other.sample_rate,
        }
    }

    /// Compare one dimension of two specs
    ///
    /// The channel dimension also compares the policy vectors.
    #[must_use]
    pub fn is_item_equal(item: SampleSpecItem, a: &SampleSpec, b: &SampleSpec) -> bool {
        match item {
            SampleSpecItem::ChannelCount => {
                a.channel_count == b.channel_count && a.channels_policy == b.channels_policy
            }
            SampleSpecItem::Format => a.format == b.format,
            SampleSpecItem::Rate => a.sample_rate == b.sample_rate,
        }
    }

    /// Check for a single channel
    #[must_use]
    pub fn is_mono(&self) -> bool {
        self.channel_count == 1
    }

    /// Check for two channels
    #[must_use]
    pub fn is_stereo(&self) -> bool {
        self.channel_count == 2
    }

    /// Get bytes per frame (all channels for one sample)
    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * self.channel_count as usize
    }

    /// Convert a frame count to a byte count
    ///
    /// # Panics
    ///
    /// Panics if the frame size is zero or the result overflows.
    #[must_use]
    pub fn convert_frames_to_bytes(&self, frames: usize) -> usize {
        let frame_size = self.checked_frame_size();
        let Some(bytes) = frames.checked_mul(frame_size) else {
            panic!("frame count overflow: {frames} frames of {frame_size} bytes");
        };
        bytes
    }

    /// Convert a byte count to a frame count, dropping any partial frame
    ///
    /// # Panics
    ///
    /// Panics if the frame size is zero.
    #[must_use]
    pub fn convert_bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.checked_frame_size()
    }

    /// Convert a frame count to a duration in microseconds, rounded down
    ///
    /// # Panics
    ///
    /// Panics if the sample rate is zero or the result overflows.
    #[must_use]
    pub fn convert_frames_to_usec(&self, frames: u64) -> u64 {
        assert!(self.sample_rate != 0, "cannot convert frames at a zero sample rate");
        let Some(scaled) = frames.checked_mul(USEC_PER_SEC) else {
            panic!("frame to time overflow: {frames} frames");
        };
        scaled / u64::from(self.sample_rate)
    }

    /// Convert a duration in microseconds to a frame count, rounded up
    ///
    /// A zero sample rate yields zero frames.
    ///
    /// # Panics
    ///
    /// Panics if the result overflows.
    #[must_use]
    pub fn convert_usec_to_frames(&self, usec: u64) -> u64 {
        let Some(scaled) = usec.checked_mul(u64::from(self.sample_rate)) else {
            panic!("time to frame overflow: {usec} us at {} Hz", self.sample_rate);
        };
        scaled.div_ceil(USEC_PER_SEC)
    }

    fn checked_frame_size(&self) -> usize {
        let frame_size = self.frame_size();
        assert!(frame_size != 0, "sample spec has a zero frame size: {self:?}");
        frame_size
    }
}

impl Default for SampleSpec {
    fn default() -> Self {
        Self::new(2, SampleFormat::I16, 48000)
    }
}

impl PartialEq for SampleSpec {
    fn eq(&self, other: &Self) -> bool {
        SampleSpecItem::ALL
            .iter()
            .all(|&item| Self::is_item_equal(item, self, other))
    }
}

impl Eq for SampleSpec {}

/// Popcount of a channel mask
#[must_use]
pub fn channel_mask_to_count(mask: u32) -> u32 {
    mask.count_ones()
}

/// Serialized form of [`SampleSpec`], validated on the way in
#[derive(Serialize, Deserialize)]
struct RawSampleSpec {
    channel_count: u32,
    #[serde(default)]
    channel_mask: u32,
    #[serde(default)]
    channels_policy: Vec<ChannelPolicy>,
    format: SampleFormat,
    sample_rate: u32,
}

impl TryFrom<RawSampleSpec> for SampleSpec {
    type Error = ConversionError;

    fn try_from(raw: RawSampleSpec) -> Result<Self, Self::Error> {
        let mut spec = SampleSpec::new(raw.channel_count, raw.format, raw.sample_rate);
        spec.channel_mask = raw.channel_mask;
        if !raw.channels_policy.is_empty() {
            if raw.channels_policy.len() != raw.channel_count as usize {
                return Err(ConversionError::InvalidParameter {
                    name: "channels_policy".to_string(),
                    message: format!(
                        "{} policies for {} channels",
                        raw.channels_policy.len(),
                        raw.channel_count
                    ),
                });
            }
            spec.channels_policy = raw.channels_policy;
        }
        Ok(spec)
    }
}

impl From<SampleSpec> for RawSampleSpec {
    fn from(spec: SampleSpec) -> Self {
        Self {
            channel_count: spec.channel_count,
            channel_mask: spec.channel_mask,
            channels_policy: spec.channels_policy,
            format: spec.format,
            sample_rate: spec.sample_rate,
        }
    }
}
