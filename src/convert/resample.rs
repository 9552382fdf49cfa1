//! Sample rate conversion, directly or through a 48 kHz pivot

use crate::audio::{
    PIVOT_RATE, SampleFormat, SampleSpec, SampleSpecItem, is_direct_ratio_supported,
    samples_from_f32, samples_to_f32,
};
use crate::config::ConversionConfig;
use crate::error::{ConversionError, Result};

use super::rate::{RateConverter, build_rate_converter};
use super::{Converter, ConverterCore};

/// Rate pairs needed to go from `src_rate` to `dst_rate`
///
/// Returns one pair when the primitive accepts the ratio directly, two pairs
/// through [`PIVOT_RATE`] when both halves are accepted, `None` otherwise.
#[must_use]
pub fn resample_route(src_rate: u32, dst_rate: u32) -> Option<Vec<(u32, u32)>> {
    if is_direct_ratio_supported(src_rate, dst_rate) {
        return Some(vec![(src_rate, dst_rate)]);
    }
    if is_direct_ratio_supported(src_rate, PIVOT_RATE)
        && is_direct_ratio_supported(PIVOT_RATE, dst_rate)
    {
        return Some(vec![(src_rate, PIVOT_RATE), (PIVOT_RATE, dst_rate)]);
    }
    None
}

struct ResampleStage {
    src_rate: u32,
    dst_rate: u32,
    rate: Box<dyn RateConverter>,
    output: Vec<f32>,
}

impl std::fmt::Debug for ResampleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResampleStage")
            .field("src_rate", &self.src_rate)
            .field("dst_rate", &self.dst_rate)
            .field("output_capacity", &self.output.len())
            .finish_non_exhaustive()
    }
}

/// Grow `buffer` to at least `samples`, doubling from `baseline`
fn ensure_float(buffer: &mut Vec<f32>, samples: usize, baseline: usize) -> Result<()> {
    if buffer.len() >= samples {
        return Ok(());
    }
    let mut target = buffer.len().max(baseline).max(1);
    while target < samples {
        target *= 2;
    }
    buffer
        .try_reserve_exact(target - buffer.len())
        .map_err(|_| ConversionError::out_of_memory(target * size_of::<f32>()))?;
    buffer.resize(target, 0.0);
    tracing::trace!("Resample scratch grown to {} samples", target);
    Ok(())
}

/// Changes the sample rate of a stream
///
/// Samples are decoded to normalised floats, run through one or two rate
/// stages, then encoded back with saturation.
#[derive(Debug)]
pub struct Resampler {
    core: ConverterCore,
    config: ConversionConfig,
    format: SampleFormat,
    channels: usize,
    decoded: Vec<f32>,
    stages: Vec<ResampleStage>,
}

impl Resampler {
    /// Create a resampler with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ConversionConfig::default())
    }

    /// Create a resampler using `config` for the primitive and scratch sizing
    #[must_use]
    pub fn with_config(config: ConversionConfig) -> Self {
        Self {
            core: ConverterCore::new(SampleSpecItem::Rate),
            config,
            format: SampleFormat::default(),
            channels: 0,
            decoded: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Rate pairs of the configured stages, empty when unconfigured
    #[must_use]
    pub fn stage_rates(&self) -> Vec<(u32, u32)> {
        self.stages
            .iter()
            .map(|stage| (stage.src_rate, stage.dst_rate))
            .collect()
    }

    fn baseline_samples(&self) -> usize {
        self.config.resample_baseline_frames * self.channels
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for Resampler {
    fn item(&self) -> SampleSpecItem {
        SampleSpecItem::Rate
    }

    fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.reset();
        self.core.configure(src, dst)?;

        let Some(route) = resample_route(src.sample_rate(), dst.sample_rate()) else {
            self.core.reset();
            return Err(ConversionError::invalid_operation(format!(
                "cannot resample {} Hz to {} Hz",
                src.sample_rate(),
                dst.sample_rate()
            )));
        };

        self.format = src.format();
        self.channels = src.channel_count() as usize;
        for (src_rate, dst_rate) in route {
            let rate = match build_rate_converter(&self.config, src_rate, dst_rate, self.channels)
            {
                Ok(rate) => rate,
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            };
            self.stages.push(ResampleStage {
                src_rate,
                dst_rate,
                rate,
                output: Vec::new(),
            });
        }

        tracing::debug!(
            "Resampler configured: {} Hz -> {} Hz in {} stage(s)",
            src.sample_rate(),
            dst.sample_rate(),
            self.stages.len()
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.stages.clear();
        self.decoded = Vec::new();
        self.channels = 0;
        self.core.reset();
    }

    fn max_output_frames(&self, input_frames: usize) -> usize {
        self.stages
            .iter()
            .fold(input_frames, |frames, stage| stage.rate.max_output_frames(frames))
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        self.stages
            .iter()
            .fold(input_frames, |frames, stage| stage.rate.output_frames(frames))
    }

    fn process(&mut self, src: &[u8], frames: usize, output: Option<&mut [u8]>) -> Result<usize> {
        if self.stages.is_empty() {
            return Err(ConversionError::not_initialized("resampler not configured"));
        }
        self.core.check_input(src, frames)?;

        let channels = self.channels;
        let baseline = self.baseline_samples();
        let samples = frames * channels;
        ensure_float(&mut self.decoded, samples, baseline)?;
        match self.format {
            SampleFormat::I16 => samples_to_f32::<i16>(src, &mut self.decoded, samples),
            SampleFormat::I24In32 => samples_to_f32::<i32>(src, &mut self.decoded, samples),
        }

        // Reserve every buffer before any stage moves its stream state
        let mut stage_frames = frames;
        for stage in &mut self.stages {
            let max = stage.rate.max_output_frames(stage_frames) * channels;
            ensure_float(&mut stage.output, max, baseline)?;
            stage_frames = stage.rate.output_frames(stage_frames);
        }
        let produced = stage_frames;
        let dst = self.core.output_region(output, produced)?;

        stage_frames = frames;
        for index in 0..self.stages.len() {
            let (done, pending) = self.stages.split_at_mut(index);
            let stage = &mut pending[0];
            let input = match done.last() {
                Some(previous) => &previous.output[..stage_frames * channels],
                None => &self.decoded[..stage_frames * channels],
            };
            let max = stage.rate.max_output_frames(stage_frames) * channels;
            stage_frames = stage.rate.process(input, &mut stage.output[..max])?;
        }
        debug_assert_eq!(stage_frames, produced);

        let Some(last) = self.stages.last() else {
            return Err(ConversionError::not_initialized("resampler not configured"));
        };
        let samples = stage_frames * channels;
        match self.format {
            SampleFormat::I16 => samples_from_f32::<i16>(&last.output, dst, samples),
            SampleFormat::I24In32 => samples_from_f32::<i32>(&last.output, dst, samples),
        }
        Ok(stage_frames)
    }

    fn scratch_output(&self, frames: usize) -> &[u8] {
        self.core.scratch_output(frames)
    }
}
