//! Helpers for exercising conversion chains without audio hardware


use crate::audio::{SampleFormat, SampleSpec};
use crate::chain::{AcquiredFrames, FrameProvider};
use crate::error::ProviderError;

/// Frame provider serving a fixed byte buffer of one sample spec
///
/// Each acquire lends at most `frame_hint` frames, further capped by the
/// chunk limit if set. Calls are counted so tests can check that every
/// acquire is released.
#[derive(Debug, Clone)]
pub struct VecFrameProvider {
    spec: SampleSpec,
    data: Vec<u8>,
    position: usize,
    chunk_frames: Option<usize>,
    fail_on_acquire: Option<usize>,
    outstanding: Option<usize>,
    acquire_count: usize,
    release_count: usize,
    released_frames: usize,
}

impl VecFrameProvider {
    /// Serve `data`, interpreted as frames of `spec`
    #[must_use]
    pub fn new(spec: SampleSpec, data: Vec<u8>) -> Self {
        Self {
            spec,
            data,
            position: 0,
            chunk_frames: None,
            fail_on_acquire: None,
            outstanding: None,
            acquire_count: 0,
            release_count: 0,
            released_frames: 0,
        }
    }

    /// Lend at most `frames` frames per acquire
    #[must_use]
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = Some(frames);
        self
    }

    /// Fail the `n`th acquire (1-based)
    #[must_use]
    pub fn fail_on_acquire(mut self, n: usize) -> Self {
        self.fail_on_acquire = Some(n);
        self
    }

    /// Frames not served yet
    #[must_use]
    pub fn remaining_frames(&self) -> usize {
        self.spec.convert_bytes_to_frames(self.data.len() - self.position)
    }

    /// Number of acquire calls, failed ones included
    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.acquire_count
    }

    /// Number of release calls
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.release_count
    }

    /// Total frames reported consumed through release
    #[must_use]
    pub fn released_frames(&self) -> usize {
        self.released_frames
    }

    /// Check if an acquired block is still waiting for its release
    #[must_use]
    pub fn has_outstanding_block(&self) -> bool {
        self.outstanding.is_some()
    }
}

impl FrameProvider for VecFrameProvider {
    fn acquire(&mut self, frame_hint: usize) -> Result<AcquiredFrames<'_>, ProviderError> {
        self.acquire_count += 1;
        if self.outstanding.is_some() {
            return Err(ProviderError::new("previous block was not released"));
        }
        if self.fail_on_acquire == Some(self.acquire_count) {
            return Err(ProviderError::new(format!(
                "injected failure on acquire {}",
                self.acquire_count
            )));
        }

        let available = self.remaining_frames();
        if available == 0 {
            return Err(ProviderError::new("frame provider exhausted"));
        }
        let frames = frame_hint
            .min(available)
            .min(self.chunk_frames.unwrap_or(usize::MAX));
        let bytes = self.spec.convert_frames_to_bytes(frames);
        self.outstanding = Some(frames);

        Ok(AcquiredFrames {
            data: &self.data[self.position..self.position + bytes],
            frames,
        })
    }

    fn release(&mut self, frames: usize) {
        self.release_count += 1;
        let lent = self.outstanding.take().unwrap_or(0);
        let consumed = frames.min(lent);
        self.position += self.spec.convert_frames_to_bytes(consumed);
        self.released_frames += consumed;
    }
}

/// Encode `samples` as little-endian bytes of `format`
///
/// Values are stored as given: pass 24-bit values for
/// [`SampleFormat::I24In32`].
///
/// # Panics
///
/// Panics if a value does not fit a 16-bit sample for [`SampleFormat::I16`].
#[must_use]
pub fn encode_samples(samples: &[i32], format: SampleFormat) -> Vec<u8> {
    match format {
        SampleFormat::I16 => samples
            .iter()
            .flat_map(|&s| {
                let Ok(sample) = i16::try_from(s) else {
                    panic!("{s} does not fit a 16-bit sample");
                };
                sample.to_le_bytes()
            })
            .collect(),
        SampleFormat::I24In32 => samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
    }
}

/// Decode little-endian bytes of `format` into sample values
#[must_use]
pub fn decode_samples(bytes: &[u8], format: SampleFormat) -> Vec<i32> {
    match format {
        SampleFormat::I16 => bytes
            .chunks_exact(2)
            .map(|c| i32::from(i16::from_le_bytes([c[0], c[1]])))
            .collect(),
        SampleFormat::I24In32 => bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Interleaved sine wave of `frames` frames in `spec`, half full scale
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    reason = "Test signal generation tolerates float rounding"
)]
pub fn sine_wave(spec: &SampleSpec, frames: usize, frequency: f32) -> Vec<u8> {
    let amplitude = match spec.format() {
        SampleFormat::I16 => 16_384.0,
        SampleFormat::I24In32 => 4_194_304.0,
    };
    let channels = spec.channel_count() as usize;
    let rate = spec.sample_rate() as f32;

    let samples: Vec<i32> = (0..frames)
        .flat_map(|frame| {
            let phase = 2.0 * std::f32::consts::PI * frequency * frame as f32 / rate;
            let value = (phase.sin() * amplitude) as i32;
            std::iter::repeat_n(value, channels)
        })
        .collect();
    encode_samples(&samples, spec.format())
}
