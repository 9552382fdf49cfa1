//! Stream-side glue around a [`ConversionChain`]
//!
//! A stream negotiates its client-facing [`SampleSpec`] once at open time,
//! then attaches to whatever hardware spec the current route provides.
//! Output streams convert client frames for the device; input streams pull
//! device frames through the chain for the client.

use crate::audio::{
    SampleFormat, SampleSpec, channel_mask_to_count, convert_src_to_dst_frames,
};
use crate::chain::{ConversionChain, FrameProvider};
use crate::config::ConversionConfig;
use crate::convert::ConvertedBuffer;
use crate::error::{ConversionError, ProviderError, Result};

/// Sample rate used when the client does not ask for one
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Front left | front right
pub const DEFAULT_OUTPUT_CHANNEL_MASK: u32 = 0x1 | 0x2;

/// Left | right capture channels
pub const DEFAULT_INPUT_CHANNEL_MASK: u32 = 0x4 | 0x8;

/// Most channels a client stream may carry
pub const MAX_CLIENT_CHANNELS: u32 = 2;

/// Stream buffers are sized in multiples of this many frames
const BUFFER_FRAME_ALIGNMENT: u64 = 16;

/// Direction of audio flow through a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamDirection {
    /// Playback: client frames go to the device
    Output,
    /// Capture: device frames go to the client
    Input,
}

impl StreamDirection {
    /// Channel mask used when none, or an unsupported one, is requested
    #[must_use]
    pub fn default_channel_mask(self) -> u32 {
        match self {
            StreamDirection::Output => DEFAULT_OUTPUT_CHANNEL_MASK,
            StreamDirection::Input => DEFAULT_INPUT_CHANNEL_MASK,
        }
    }
}

/// Parameters requested by a client when opening a stream
///
/// `None` (or zero) fields take the stream defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamParams {
    /// Requested channel mask
    pub channel_mask: Option<u32>,
    /// Requested sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Requested significant bits per sample (16 or 24)
    pub format_bits: Option<u32>,
}

impl StreamParams {
    /// Replace every unsupported field with the stream default
    ///
    /// The result always negotiates successfully.
    #[must_use]
    pub fn corrected(&self, direction: StreamDirection) -> Self {
        let channel_mask = self
            .channel_mask
            .filter(|&mask| mask != 0 && channel_mask_to_count(mask) <= MAX_CLIENT_CHANNELS)
            .unwrap_or_else(|| direction.default_channel_mask());
        let sample_rate = self
            .sample_rate
            .filter(|&rate| rate != 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        let format_bits = self
            .format_bits
            .and_then(SampleFormat::from_bits)
            .unwrap_or_default()
            .bits_per_sample();

        Self {
            channel_mask: Some(channel_mask),
            sample_rate: Some(sample_rate),
            format_bits: Some(format_bits),
        }
    }
}

/// Build the client sample spec for a stream
///
/// Absent values take the defaults: the direction's stereo mask, 48 kHz and
/// 16-bit samples. The rate is always accepted as requested.
///
/// # Errors
///
/// Returns `InvalidParameter` for a mask with more than two channels or an
/// unsupported sample width. The caller may retry with
/// [`StreamParams::corrected`].
pub fn negotiate(direction: StreamDirection, params: &StreamParams) -> Result<SampleSpec> {
    let channel_mask = match params.channel_mask {
        Some(mask) if mask != 0 => {
            let channels = channel_mask_to_count(mask);
            if channels > MAX_CLIENT_CHANNELS {
                tracing::debug!("Rejecting channel mask {:#x}: {} channels", mask, channels);
                return Err(ConversionError::InvalidParameter {
                    name: "channel_mask".to_string(),
                    message: format!(
                        "{channels} channels requested, at most {MAX_CLIENT_CHANNELS} supported"
                    ),
                });
            }
            mask
        }
        _ => direction.default_channel_mask(),
    };

    let format = match params.format_bits {
        Some(bits) if bits != 0 => SampleFormat::from_bits(bits).ok_or_else(|| {
            ConversionError::InvalidParameter {
                name: "format".to_string(),
                message: format!("{bits}-bit samples not supported"),
            }
        })?,
        _ => SampleFormat::default(),
    };

    let sample_rate = params
        .sample_rate
        .filter(|&rate| rate != 0)
        .unwrap_or(DEFAULT_SAMPLE_RATE);

    let mut spec = SampleSpec::new(channel_mask_to_count(channel_mask), format, sample_rate);
    spec.set_channel_mask(channel_mask);
    tracing::debug!(
        "Negotiated {:?} stream: mask {:#x}, {:?}, {} Hz",
        direction,
        channel_mask,
        format,
        sample_rate
    );
    Ok(spec)
}

/// Converts between a stream's client spec and the attached hardware spec
#[derive(Debug)]
pub struct StreamConverter {
    direction: StreamDirection,
    client_spec: SampleSpec,
    hw_spec: Option<SampleSpec>,
    chain: ConversionChain,
}

impl StreamConverter {
    /// Create a detached converter for a negotiated client spec
    #[must_use]
    pub fn new(
        direction: StreamDirection,
        client_spec: SampleSpec,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            direction,
            client_spec,
            hw_spec: None,
            chain: ConversionChain::with_config(config),
        }
    }

    /// Stream direction
    #[must_use]
    pub fn direction(&self) -> StreamDirection {
        self.direction
    }

    /// Client-facing spec
    #[must_use]
    pub fn client_spec(&self) -> &SampleSpec {
        &self.client_spec
    }

    /// Hardware spec of the attached route
    #[must_use]
    pub fn hw_spec(&self) -> Option<&SampleSpec> {
        self.hw_spec.as_ref()
    }

    /// Check if a route is attached
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.hw_spec.is_some()
    }

    /// The chain carrying the conversion
    #[must_use]
    pub fn chain(&self) -> &ConversionChain {
        &self.chain
    }

    /// Attach to a route and configure the conversion towards it
    ///
    /// # Errors
    ///
    /// Returns the chain configuration error; the stream is then left
    /// detached.
    pub fn attach(&mut self, hw_spec: SampleSpec) -> Result<()> {
        self.hw_spec = None;
        let (src, dst) = match self.direction {
            StreamDirection::Output => (&self.client_spec, &hw_spec),
            StreamDirection::Input => (&hw_spec, &self.client_spec),
        };
        if let Err(e) = self.chain.configure(src, dst) {
            tracing::warn!("Could not set up {:?} stream conversion: {}", self.direction, e);
            return Err(e);
        }
        self.hw_spec = Some(hw_spec);
        Ok(())
    }

    /// Detach from the current route
    pub fn detach(&mut self) {
        if self.hw_spec.take().is_some() {
            tracing::debug!("{:?} stream detached", self.direction);
        }
    }

    fn attached_hw_spec(&self) -> Result<&SampleSpec> {
        self.hw_spec
            .as_ref()
            .ok_or_else(|| ConversionError::not_initialized("stream has no route attached"))
    }

    fn expect_direction(&self, direction: StreamDirection) -> Result<()> {
        if self.direction == direction {
            Ok(())
        } else {
            Err(ConversionError::invalid_operation(format!(
                "{:?} stream cannot be used for {:?}",
                self.direction, direction
            )))
        }
    }

    /// Convert `frames` client frames for the device
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` while detached, `InvalidOperation` on an
    /// input stream, or the chain's conversion error.
    pub fn write<'a>(&'a mut self, src: &'a [u8], frames: usize) -> Result<ConvertedBuffer<'a>> {
        self.expect_direction(StreamDirection::Output)?;
        self.attached_hw_spec()?;
        self.chain.convert(src, frames, None)
    }

    /// Fill `dst` with `frames` client frames pulled from the device
    ///
    /// Hardware frames are copied straight across when the specs match.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` while detached, `InvalidOperation` on an
    /// output stream or for a short `dst`, `Provider` on a device failure, or
    /// the chain's conversion error.
    pub fn read(
        &mut self,
        dst: &mut [u8],
        frames: usize,
        provider: &mut dyn FrameProvider,
    ) -> Result<()> {
        self.expect_direction(StreamDirection::Input)?;
        if *self.attached_hw_spec()? != self.client_spec {
            return self.chain.get_converted_buffer(dst, frames, provider);
        }

        let frame_size = self.client_spec.frame_size();
        let needed = frames * frame_size;
        if dst.len() < needed {
            return Err(ConversionError::invalid_operation(format!(
                "output buffer holds {} bytes, {needed} needed",
                dst.len()
            )));
        }

        let mut filled = 0;
        while filled < frames {
            let want = frames - filled;
            let copied = {
                let block = provider.acquire(want)?;
                let count = block.frames.min(want);
                let offset = filled * frame_size;
                match block.data.get(..count * frame_size) {
                    Some(bytes) if count > 0 => {
                        dst[offset..offset + bytes.len()].copy_from_slice(bytes);
                        Ok(count)
                    }
                    Some(_) => Err(ProviderError::new("frame provider returned no frames")),
                    None => Err(ProviderError::new(format!(
                        "frame provider lent {} bytes for {count} frames",
                        block.data.len()
                    ))),
                }
            };
            match copied {
                Ok(count) => {
                    provider.release(count);
                    filled += count;
                }
                Err(e) => {
                    provider.release(0);
                    return Err(e.into());
                }
            }
        }
        tracing::trace!("Read {} frames without conversion", frames);
        Ok(())
    }

    /// Client bytes accounted for by `hw_frames` frames written to the device
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` while detached.
    pub fn client_bytes_for_hw_frames(&self, hw_frames: usize) -> Result<usize> {
        let hw_spec = self.attached_hw_spec()?;
        let frames = convert_src_to_dst_frames(hw_frames, hw_spec, &self.client_spec);
        Ok(self.client_spec.convert_frames_to_bytes(frames))
    }

    /// Client buffer size for one hardware period of `period_us` microseconds
    ///
    /// The frame count is rounded up to a multiple of 16.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the size does not fit in memory.
    pub fn buffer_bytes_for_period(&self, period_us: u64) -> Result<usize> {
        let frames = self
            .client_spec
            .convert_usec_to_frames(period_us)
            .next_multiple_of(BUFFER_FRAME_ALIGNMENT);
        let frames = usize::try_from(frames).map_err(|_| ConversionError::InvalidParameter {
            name: "period_us".to_string(),
            message: format!("{period_us} us period is too long"),
        })?;
        let bytes = self.client_spec.convert_frames_to_bytes(frames);
        tracing::debug!(
            "{:?} stream buffer: {} bytes for a {} us period",
            self.direction,
            bytes,
            period_us
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleSpecItem;
    use crate::testing::{VecFrameProvider, decode_samples, encode_samples};

    fn stereo16(rate: u32) -> SampleSpec {
        SampleSpec::new(2, SampleFormat::I16, rate)
    }

    fn output(client: SampleSpec) -> StreamConverter {
        StreamConverter::new(StreamDirection::Output, client, &ConversionConfig::default())
    }

    fn input(client: SampleSpec) -> StreamConverter {
        StreamConverter::new(StreamDirection::Input, client, &ConversionConfig::default())
    }

    #[test]
    fn test_negotiate_defaults() {
        let spec = negotiate(StreamDirection::Output, &StreamParams::default()).unwrap();
        assert_eq!(spec, stereo16(48000));
        assert_eq!(spec.channel_mask(), 0x3);

        let spec = negotiate(StreamDirection::Input, &StreamParams::default()).unwrap();
        assert_eq!(spec.channel_mask(), 0xC);
        assert_eq!(spec.channel_count(), 2);
    }

    #[test]
    fn test_negotiate_accepts_requested_values() {
        let params = StreamParams {
            channel_mask: Some(0x1),
            sample_rate: Some(44100),
            format_bits: Some(24),
        };
        let spec = negotiate(StreamDirection::Output, &params).unwrap();
        assert_eq!(spec.channel_count(), 1);
        assert_eq!(spec.format(), SampleFormat::I24In32);
        assert_eq!(spec.sample_rate(), 44100);
    }

    #[test]
    fn test_negotiate_rejects_then_corrects() {
        let params = StreamParams {
            channel_mask: Some(0x3F),
            sample_rate: Some(16000),
            format_bits: Some(16),
        };
        let err = negotiate(StreamDirection::Output, &params).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::InvalidParameter { ref name, .. } if name == "channel_mask"
        ));

        let corrected = params.corrected(StreamDirection::Output);
        assert_eq!(corrected.channel_mask, Some(0x3));
        assert_eq!(corrected.sample_rate, Some(16000));
        let spec = negotiate(StreamDirection::Output, &corrected).unwrap();
        assert_eq!(spec, stereo16(16000));

        let params = StreamParams {
            format_bits: Some(8),
            ..StreamParams::default()
        };
        let err = negotiate(StreamDirection::Input, &params).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(params.corrected(StreamDirection::Input).format_bits, Some(16));
    }

    #[test]
    fn test_detached_stream_is_not_initialized() {
        let mut stream = output(stereo16(48000));
        assert!(!stream.is_attached());
        assert!(matches!(
            stream.write(&[0u8; 4], 1),
            Err(ConversionError::NotInitialized { .. })
        ));
        assert!(matches!(
            stream.client_bytes_for_hw_frames(10),
            Err(ConversionError::NotInitialized { .. })
        ));

        let mut capture = input(stereo16(48000));
        let mut provider = VecFrameProvider::new(stereo16(48000), vec![0; 8]);
        assert!(matches!(
            capture.read(&mut [0u8; 8], 2, &mut provider),
            Err(ConversionError::NotInitialized { .. })
        ));
        assert_eq!(provider.acquire_count(), 0);
    }

    #[test]
    fn test_output_attach_converts_client_to_hw() {
        let client = SampleSpec::new(1, SampleFormat::I16, 48000);
        let hw = SampleSpec::new(2, SampleFormat::I24In32, 48000);
        let mut stream = output(client.clone());
        stream.attach(hw.clone()).unwrap();

        assert_eq!(stream.chain().source_spec(), Some(&client));
        assert_eq!(stream.chain().destination_spec(), Some(&hw));
        assert_eq!(
            stream.chain().active_items(),
            &[SampleSpecItem::Format, SampleSpecItem::ChannelCount]
        );

        let src = encode_samples(&[1, -2], SampleFormat::I16);
        let out = stream.write(&src, 2).unwrap();
        assert_eq!(out.frames(), 2);
        let samples = decode_samples(out.data().unwrap(), SampleFormat::I24In32);
        assert_eq!(samples, vec![256, 256, -512, -512]);

        assert_eq!(stream.client_bytes_for_hw_frames(2).unwrap(), 4);
        let mut provider = VecFrameProvider::new(hw, vec![]);
        assert!(stream.read(&mut [0u8; 4], 1, &mut provider).is_err());
    }

    #[test]
    fn test_output_identity_write_aliases_source() {
        let mut stream = output(stereo16(48000));
        stream.attach(stereo16(48000)).unwrap();
        let src = encode_samples(&[1, 2, 3, 4], SampleFormat::I16);
        let out = stream.write(&src, 2).unwrap();
        assert!(matches!(out, ConvertedBuffer::Source { .. }));
        assert_eq!(out.data(), Some(&src[..]));
    }

    #[test]
    fn test_input_passthrough_reads_hw_frames() {
        let spec = SampleSpec::new(1, SampleFormat::I16, 16000);
        let mut stream = input(spec.clone());
        stream.attach(spec.clone()).unwrap();

        let data = encode_samples(&[10, 20, 30, 40, 50], SampleFormat::I16);
        let mut provider = VecFrameProvider::new(spec, data).with_chunk_frames(2);
        let mut dst = [0u8; 8];
        stream.read(&mut dst, 4, &mut provider).unwrap();

        assert_eq!(decode_samples(&dst, SampleFormat::I16), vec![10, 20, 30, 40]);
        assert_eq!(provider.acquire_count(), 2);
        assert_eq!(provider.release_count(), 2);
        assert_eq!(provider.remaining_frames(), 1);
    }

    #[test]
    fn test_input_passthrough_exhausted_provider() {
        let spec = SampleSpec::new(1, SampleFormat::I16, 16000);
        let mut stream = input(spec.clone());
        stream.attach(spec.clone()).unwrap();

        let mut provider = VecFrameProvider::new(spec, encode_samples(&[1], SampleFormat::I16));
        let err = stream.read(&mut [0u8; 4], 2, &mut provider).unwrap_err();
        assert!(err.is_provider_error());
        assert!(!provider.has_outstanding_block());
    }

    #[test]
    fn test_input_converts_hw_to_client() {
        let client = SampleSpec::new(1, SampleFormat::I16, 48000);
        let hw = SampleSpec::new(2, SampleFormat::I16, 48000);
        let mut stream = input(client);
        stream.attach(hw.clone()).unwrap();
        assert_eq!(stream.chain().active_items(), &[SampleSpecItem::ChannelCount]);

        let data = encode_samples(&[100, 200, -100, -300, 7, 8], SampleFormat::I16);
        let mut provider = VecFrameProvider::new(hw, data);
        let mut dst = [0u8; 6];
        stream.read(&mut dst, 3, &mut provider).unwrap();
        assert_eq!(decode_samples(&dst, SampleFormat::I16), vec![150, -200, 7]);
    }

    #[test]
    fn test_failed_attach_leaves_stream_detached() {
        let mut stream = output(stereo16(48000));
        stream.attach(stereo16(44100)).unwrap();
        assert!(stream.is_attached());

        let err = stream.attach(stereo16(192_000)).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!stream.is_attached());

        stream.attach(stereo16(44100)).unwrap();
        stream.detach();
        assert!(stream.hw_spec().is_none());
    }

    #[test]
    fn test_buffer_bytes_for_period() {
        let stream = output(stereo16(48000));
        assert_eq!(stream.buffer_bytes_for_period(20_000).unwrap(), 960 * 4);
        // 441 frames round up to 448
        let stream = output(stereo16(44100));
        assert_eq!(stream.buffer_bytes_for_period(10_000).unwrap(), 448 * 4);
        assert_eq!(stream.buffer_bytes_for_period(0).unwrap(), 0);
    }

    #[test]
    fn test_client_bytes_for_hw_frames_across_rates() {
        let mut stream = output(stereo16(24000));
        stream.attach(stereo16(48000)).unwrap();
        assert_eq!(stream.client_bytes_for_hw_frames(480).unwrap(), 240 * 4);
    }
}
