//! Multi-stage conversion between two arbitrary sample specs

pub mod plan;
pub mod provider;


use crate::audio::{
    AccumulationBuffer, SampleSpec, SampleSpecItem, convert_src_to_dst_frames,
    rate_headroom_frames,
};
use crate::config::ConversionConfig;
use crate::convert::{ConvertedBuffer, Converter, Reformatter, Remapper, Resampler};
use crate::error::{ConversionError, ProviderError, Result};

pub use plan::{ConversionPlan, PlanStep, plan_conversion};
pub use provider::{AcquiredFrames, FrameProvider};

fn slot(item: SampleSpecItem) -> usize {
    match item {
        SampleSpecItem::ChannelCount => 0,
        SampleSpecItem::Format => 1,
        SampleSpecItem::Rate => 2,
    }
}

/// Borrow one converter for reading and another for writing
fn pair_mut(
    converters: &mut [Box<dyn Converter>],
    read: usize,
    write: usize,
) -> (&dyn Converter, &mut dyn Converter) {
    assert_ne!(read, write, "a converter cannot feed itself");
    if read < write {
        let (low, high) = converters.split_at_mut(write);
        (&*low[read], &mut *high[0])
    } else {
        let (low, high) = converters.split_at_mut(read);
        (&*high[0], &mut *low[write])
    }
}

/// One converter per dimension plus the order they run in
struct Pipeline {
    converters: Vec<Box<dyn Converter>>,
    active: Vec<SampleSpecItem>,
}

impl Pipeline {
    fn new(config: &ConversionConfig) -> Self {
        Self {
            converters: vec![
                Box::new(Remapper::with_config(config)),
                Box::new(Reformatter::new()),
                Box::new(Resampler::with_config(config.clone())),
            ],
            active: Vec::new(),
        }
    }

    fn reset(&mut self) {
        self.active.clear();
        for converter in &mut self.converters {
            converter.reset();
        }
    }

    fn configure(&mut self, plan: &ConversionPlan) -> Result<()> {
        for step in plan.steps() {
            self.converters[slot(step.item)].configure(&step.src, &step.dst)?;
            self.active.push(step.item);
        }
        Ok(())
    }

    fn max_output_frames(&self, input_frames: usize) -> usize {
        self.active.iter().fold(input_frames, |frames, &item| {
            self.converters[slot(item)].max_output_frames(frames)
        })
    }

    fn output_frames(&self, input_frames: usize) -> usize {
        self.active.iter().fold(input_frames, |frames, &item| {
            self.converters[slot(item)].output_frames(frames)
        })
    }

    /// Run `src` through every active converter
    ///
    /// Intermediate stages write their own scratch; only the last one may
    /// write into `output`.
    fn convert<'a>(
        &'a mut self,
        src: &[u8],
        frames: usize,
        mut output: Option<&mut [u8]>,
    ) -> Result<ConvertedBuffer<'a>> {
        let Some(&last_item) = self.active.last() else {
            return Err(ConversionError::not_initialized("conversion pipeline is empty"));
        };
        let last = self.active.len() - 1;
        let writes_output = output.is_some();

        let mut frames = frames;
        for (position, &item) in self.active.iter().enumerate() {
            let target = if position == last { output.take() } else { None };
            frames = if position == 0 {
                self.converters[slot(item)].process(src, frames, target)?
            } else {
                let previous = slot(self.active[position - 1]);
                let (reader, writer) = pair_mut(&mut self.converters, previous, slot(item));
                writer.process(reader.scratch_output(frames), frames, target)?
            };
        }

        if writes_output {
            Ok(ConvertedBuffer::Written { frames })
        } else {
            Ok(ConvertedBuffer::Scratch {
                data: self.converters[slot(last_item)].scratch_output(frames),
                frames,
            })
        }
    }
}

/// Converts audio between a source and a destination [`SampleSpec`]
///
/// `configure` plans a chain of up to three single-dimension converters.
/// Frames are then either pushed through [`convert`](Self::convert) or
/// pulled from a [`FrameProvider`] with
/// [`get_converted_buffer`](Self::get_converted_buffer), which keeps any
/// surplus destination frames for the next call.
///
/// Calls on one instance must be serialized by the owner.
pub struct ConversionChain {
    specs: Option<(SampleSpec, SampleSpec)>,
    pipeline: Pipeline,
    accumulator: AccumulationBuffer,
}

impl std::fmt::Debug for ConversionChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionChain")
            .field("specs", &self.specs)
            .field("active", &self.pipeline.active)
            .field("pending_frames", &self.accumulator.available_frames())
            .finish_non_exhaustive()
    }
}

impl Default for ConversionChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionChain {
    /// Create an unconfigured chain with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ConversionConfig::default())
    }

    /// Create an unconfigured chain
    #[must_use]
    pub fn with_config(config: &ConversionConfig) -> Self {
        Self {
            specs: None,
            pipeline: Pipeline::new(config),
            accumulator: AccumulationBuffer::new(),
        }
    }

    /// Plan and configure the converters taking `src` to `dst`
    ///
    /// Pending frames are discarded. An identical pair leaves the chain as a
    /// pass-through.
    ///
    /// # Errors
    ///
    /// Returns the first converter configuration error; the chain is then
    /// left unconfigured.
    pub fn configure(&mut self, src: &SampleSpec, dst: &SampleSpec) -> Result<()> {
        self.specs = None;
        self.pipeline.reset();
        self.accumulator.reset(dst.frame_size());

        if src == dst {
            tracing::debug!("Conversion chain is a pass-through: {:?}", src);
            self.specs = Some((src.clone(), dst.clone()));
            return Ok(());
        }

        let plan = plan_conversion(src, dst);
        if let Err(e) = self.pipeline.configure(&plan) {
            tracing::warn!("Conversion chain configuration failed: {}", e);
            self.pipeline.reset();
            return Err(e);
        }

        tracing::debug!(
            "Conversion chain configured: {} ch/{:?}/{} Hz -> {} ch/{:?}/{} Hz via {:?}",
            src.channel_count(),
            src.format(),
            src.sample_rate(),
            dst.channel_count(),
            dst.format(),
            dst.sample_rate(),
            self.pipeline.active
        );
        self.specs = Some((src.clone(), dst.clone()));
        Ok(())
    }

    /// Configured source spec
    #[must_use]
    pub fn source_spec(&self) -> Option<&SampleSpec> {
        self.specs.as_ref().map(|(src, _)| src)
    }

    /// Configured destination spec
    #[must_use]
    pub fn destination_spec(&self) -> Option<&SampleSpec> {
        self.specs.as_ref().map(|(_, dst)| dst)
    }

    /// Dimensions converted, in execution order
    #[must_use]
    pub fn active_items(&self) -> &[SampleSpecItem] {
        &self.pipeline.active
    }

    /// Check if the chain is configured as a pass-through
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.specs.is_some() && self.pipeline.active.is_empty()
    }

    /// Destination frames converted but not yet delivered
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.accumulator.available_frames()
    }

    /// Upper bound of destination frames produced from `input_frames` source frames
    #[must_use]
    pub fn max_output_frames(&self, input_frames: usize) -> usize {
        self.pipeline.max_output_frames(input_frames)
    }

    /// Convert `frames` source frames
    ///
    /// With an `output` buffer the result is written there. Without one, the
    /// result lives in the last converter's scratch memory, or is `src`
    /// itself for a pass-through chain.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before `configure`, `InvalidOperation` if a
    /// buffer is too small, or the first converter error.
    pub fn convert<'a>(
        &'a mut self,
        src: &'a [u8],
        frames: usize,
        output: Option<&mut [u8]>,
    ) -> Result<ConvertedBuffer<'a>> {
        let Some((src_spec, dst_spec)) = &self.specs else {
            return Err(ConversionError::not_initialized("conversion chain not configured"));
        };

        if !self.pipeline.active.is_empty() {
            // An early stage must not advance if the last one cannot write
            if let Some(output) = output.as_deref() {
                let needed = dst_spec.convert_frames_to_bytes(self.pipeline.output_frames(frames));
                if output.len() < needed {
                    return Err(ConversionError::invalid_operation(format!(
                        "output buffer holds {} bytes, {needed} needed",
                        output.len()
                    )));
                }
            }
            return self.pipeline.convert(src, frames, output);
        }

        let bytes = src_spec.convert_frames_to_bytes(frames);
        if src.len() < bytes {
            return Err(ConversionError::invalid_operation(format!(
                "source holds {} bytes, {frames} frames need {bytes}",
                src.len()
            )));
        }
        match output {
            Some(output) => {
                if output.len() < bytes {
                    return Err(ConversionError::invalid_operation(format!(
                        "output buffer holds {} bytes, {bytes} needed",
                        output.len()
                    )));
                }
                output[..bytes].copy_from_slice(&src[..bytes]);
                Ok(ConvertedBuffer::Written { frames })
            }
            None => Ok(ConvertedBuffer::Source {
                data: &src[..bytes],
                frames,
            }),
        }
    }

    /// Fill `dst` with exactly `out_frames` destination frames
    ///
    /// Frames left over from the previous call are delivered first. Source
    /// frames are then pulled from `provider` until enough have been
    /// converted; any surplus is kept for the next call.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` for an unconfigured or pass-through chain,
    /// `InvalidOperation` if `dst` is too small, `Provider` if the provider
    /// fails or supplies no frames, or the first converter error. Frames
    /// converted before the error stay pending.
    pub fn get_converted_buffer(
        &mut self,
        dst: &mut [u8],
        out_frames: usize,
        provider: &mut dyn FrameProvider,
    ) -> Result<()> {
        let Some((src_spec, dst_spec)) = &self.specs else {
            return Err(ConversionError::not_initialized("conversion chain not configured"));
        };
        if self.pipeline.active.is_empty() {
            return Err(ConversionError::not_initialized(
                "pass-through chain has no converted buffer",
            ));
        }

        let needed = dst_spec.convert_frames_to_bytes(out_frames);
        if dst.len() < needed {
            return Err(ConversionError::invalid_operation(format!(
                "output buffer holds {} bytes, {needed} needed",
                dst.len()
            )));
        }

        if self.accumulator.capacity_frames() < out_frames {
            self.accumulator.reserve_frames(out_frames + rate_headroom_frames())?;
        }

        let mut remaining = out_frames - out_frames.min(self.accumulator.available_frames());
        while remaining > 0 {
            let request = convert_src_to_dst_frames(remaining, dst_spec, src_spec);

            let (acquired, converted) = {
                let block = provider.acquire(request)?;
                let acquired = block.frames;
                let converted = if acquired == 0 {
                    Err(ProviderError::new("frame provider returned no frames").into())
                } else {
                    Self::convert_into(
                        &mut self.pipeline,
                        &mut self.accumulator,
                        block.data,
                        acquired,
                    )
                };
                (acquired, converted)
            };

            let produced = match converted {
                Ok(produced) => {
                    provider.release(acquired);
                    produced
                }
                Err(e) => {
                    provider.release(0);
                    return Err(e);
                }
            };

            tracing::trace!(
                "Converted {} source frames into {} (need {})",
                acquired,
                produced,
                remaining
            );
            remaining -= produced.min(remaining);
        }

        self.accumulator.drain_into(dst, out_frames);
        Ok(())
    }

    fn convert_into(
        pipeline: &mut Pipeline,
        accumulator: &mut AccumulationBuffer,
        src: &[u8],
        frames: usize,
    ) -> Result<usize> {
        let room = accumulator.available_frames() + pipeline.max_output_frames(frames);
        accumulator.reserve_frames(room)?;
        let produced = pipeline
            .convert(src, frames, Some(accumulator.free_tail_mut()))?
            .frames();
        accumulator.commit(produced);
        Ok(produced)
    }
}
