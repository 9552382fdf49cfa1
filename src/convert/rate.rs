//! Rate-conversion primitives operating on interleaved `f32` frames

use rubato::{FftFixedIn, Resampler as _};

use crate::config::{ConversionConfig, ResamplerQuality};
use crate::error::{ConversionError, Result};

/// Stateful sample-rate converter for one fixed rate pair
///
/// Input and output are interleaved normalised floats. State carries over
/// between calls so a stream may be fed in arbitrary slices.
pub trait RateConverter: Send {
    /// Upper bound of frames produced by the next `process` of `input_frames` frames
    fn max_output_frames(&self, input_frames: usize) -> usize;

    /// Exact frames the next `process` of `input_frames` frames produces
    fn output_frames(&self, input_frames: usize) -> usize;

    /// Convert `input` and write to `output`, returning the frames written
    ///
    /// # Errors
    ///
    /// Returns `ResampleFailed` if the primitive fails or `output` is too
    /// small. A too-small `output` is rejected before any state changes.
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize>;

    /// Drop carried-over state
    fn reset(&mut self);
}

/// Create the primitive selected by `config` for `src_rate` to `dst_rate`
///
/// # Errors
///
/// Returns `ResampleFailed` if the FFT resampler rejects the parameters.
pub fn build_rate_converter(
    config: &ConversionConfig,
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Box<dyn RateConverter>> {
    match config.resampler_quality {
        ResamplerQuality::Linear => Ok(Box::new(LinearRateConverter::new(
            src_rate, dst_rate, channels,
        ))),
        ResamplerQuality::Fft => Ok(Box::new(FftRateConverter::new(
            src_rate,
            dst_rate,
            channels,
            config.fft_chunk_frames,
        )?)),
    }
}

#[inline]
fn lerp(s0: f32, s1: f32, frac: f32) -> f32 {
    s0 * (1.0 - frac) + s1 * frac
}

fn check_room(needed: usize, capacity: usize) -> Result<()> {
    if needed <= capacity {
        Ok(())
    } else {
        Err(ConversionError::ResampleFailed {
            message: format!("output holds {capacity} frames, {needed} needed"),
            source: None,
        })
    }
}

/// Linear interpolation with a phase carried across calls
#[derive(Debug)]
pub struct LinearRateConverter {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
    step: f64,      // input frames advanced per output frame
    phase: f64,     // position of the next output frame relative to the current input
    last: Vec<f32>, // final frame of the previous call, at position -1
}

impl LinearRateConverter {
    /// Create a converter for one rate pair
    #[must_use]
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = f64::from(src_rate) / f64::from(dst_rate);
        tracing::debug!(
            "Initializing linear rate converter: {} -> {} (step {:.4}), channels={}",
            src_rate,
            dst_rate,
            step,
            channels
        );
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            phase: 0.0,
            last: vec![0.0; channels],
        }
    }
}

impl RateConverter for LinearRateConverter {
    fn max_output_frames(&self, input_frames: usize) -> usize {
        let scaled = (input_frames as u64 + 1) * u64::from(self.dst_rate);
        usize::try_from(scaled.div_ceil(u64::from(self.src_rate))).unwrap_or(usize::MAX) + 1
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Phase is non-negative when cast and bounded by the input length"
    )]
    fn output_frames(&self, input_frames: usize) -> usize {
        if input_frames == 0 {
            return 0;
        }
        // Same phase walk as `process`, without writing
        let mut phase = self.phase;
        let mut produced = 0;
        while phase < 0.0 {
            produced += 1;
            phase += self.step;
        }
        while (phase.floor() as usize) + 1 < input_frames {
            produced += 1;
            phase += self.step;
        }
        produced
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        reason = "Phase is non-negative when cast and bounded by the input length"
    )]
    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize> {
        let channels = self.channels;
        let frames = input.len() / channels;
        if frames == 0 {
            return Ok(0);
        }
        check_room(self.output_frames(frames), output.len() / channels)?;

        let mut produced = 0;

        // Positions in [-1, 0) interpolate from the previous call's last frame
        while self.phase < 0.0 {
            let frac = (self.phase - self.phase.floor()) as f32;
            let out = &mut output[produced * channels..(produced + 1) * channels];
            for ch in 0..channels {
                out[ch] = lerp(self.last[ch], input[ch], frac);
            }
            produced += 1;
            self.phase += self.step;
        }

        while (self.phase.floor() as usize) + 1 < frames {
            let idx = self.phase.floor();
            let frac = (self.phase - idx) as f32;
            let base = idx as usize * channels;
            let out = &mut output[produced * channels..(produced + 1) * channels];
            for ch in 0..channels {
                out[ch] = lerp(input[base + ch], input[base + channels + ch], frac);
            }
            produced += 1;
            self.phase += self.step;
        }

        self.last
            .copy_from_slice(&input[(frames - 1) * channels..frames * channels]);
        self.phase -= frames as f64;

        Ok(produced)
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.last.fill(0.0);
    }
}

/// Band-limited resampling through rubato's synchronous FFT resampler
///
/// Input is buffered until a full chunk is available, so output lags input
/// by up to one chunk plus the filter delay. Chunk buffers are allocated once.
pub struct FftRateConverter {
    resampler: FftFixedIn<f32>,
    channels: usize,
    chunk_in: usize,
    chunk_out: usize,
    input: Vec<Vec<f32>>,
    filled: usize,
    output: Vec<Vec<f32>>,
}

impl std::fmt::Debug for FftRateConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftRateConverter")
            .field("channels", &self.channels)
            .field("chunk_in", &self.chunk_in)
            .field("chunk_out", &self.chunk_out)
            .field("pending_frames", &self.filled)
            .finish_non_exhaustive()
    }
}

impl FftRateConverter {
    /// Create a converter processing `chunk_frames` input frames at a time
    ///
    /// # Errors
    ///
    /// Returns `ResampleFailed` if rubato rejects the parameters.
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize, chunk_frames: usize) -> Result<Self> {
        let resampler = FftFixedIn::<f32>::new(
            src_rate as usize,
            dst_rate as usize,
            chunk_frames,
            2,
            channels,
        )
        .map_err(|e| ConversionError::ResampleFailed {
            message: format!("cannot build FFT resampler {src_rate} -> {dst_rate}"),
            source: Some(Box::new(e)),
        })?;

        let chunk_in = resampler.input_frames_next();
        let chunk_out = resampler.output_frames_next();
        tracing::debug!(
            "Initializing FFT rate converter: {} -> {}, channels={}, chunk={} -> {}",
            src_rate,
            dst_rate,
            channels,
            chunk_in,
            chunk_out
        );

        Ok(Self {
            channels,
            chunk_in,
            chunk_out,
            input: vec![vec![0.0; chunk_in]; channels],
            filled: 0,
            output: vec![vec![0.0; resampler.output_frames_max()]; channels],
            resampler,
        })
    }
}

impl RateConverter for FftRateConverter {
    fn max_output_frames(&self, input_frames: usize) -> usize {
        self.output_frames(input_frames)
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        (self.filled + input_frames) / self.chunk_in * self.chunk_out
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) -> Result<usize> {
        let channels = self.channels;
        let frames = input.len() / channels;
        check_room(self.output_frames(frames), output.len() / channels)?;

        let mut produced = 0;
        for frame in input.chunks_exact(channels) {
            for (plane, &sample) in self.input.iter_mut().zip(frame) {
                plane[self.filled] = sample;
            }
            self.filled += 1;
            if self.filled < self.chunk_in {
                continue;
            }
            self.filled = 0;

            let (_, written) = self
                .resampler
                .process_into_buffer(&self.input, &mut self.output, None)
                .map_err(|e| ConversionError::ResampleFailed {
                    message: "FFT resampler failed".to_string(),
                    source: Some(Box::new(e)),
                })?;
            for i in 0..written {
                let base = (produced + i) * channels;
                for (ch, plane) in self.output.iter().enumerate() {
                    output[base + ch] = plane[i];
                }
            }
            produced += written;
        }

        Ok(produced)
    }

    fn reset(&mut self) {
        self.resampler.reset();
        self.filled = 0;
    }
}
