use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, Result};

/// Rate-conversion primitive used by the resampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResamplerQuality {
    /// Stateful linear interpolation, no added latency
    #[default]
    Linear,
    /// FFT based band-limited resampling (rubato), chunked
    Fft,
}

/// Configuration for conversion chain behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Rate-conversion primitive (default: linear)
    pub resampler_quality: ResamplerQuality,

    /// Write zeros to `Ignore` channels when up-mixing from mono
    /// (default: false, those channels are left untouched)
    pub silence_ignored_channels: bool,

    /// Initial frame capacity of each resample stage's float scratch (default: 256)
    pub resample_baseline_frames: usize,

    /// Input chunk size of the FFT resampler in frames (default: 256)
    pub fft_chunk_frames: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            resampler_quality: ResamplerQuality::Linear,
            silence_ignored_channels: false,
            resample_baseline_frames: 256,
            fft_chunk_frames: 256,
        }
    }
}

impl ConversionConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    /// Parse a config from JSON, missing fields taking their defaults
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the JSON is malformed or a size is zero.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConversionError::InvalidParameter {
                name: "config".to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("resample_baseline_frames", self.resample_baseline_frames),
            ("fft_chunk_frames", self.fft_chunk_frames),
        ] {
            if value == 0 {
                return Err(ConversionError::InvalidParameter {
                    name: name.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for `ConversionConfig`
#[derive(Debug, Clone, Default)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    /// Set the rate-conversion primitive
    #[must_use]
    pub fn resampler_quality(mut self, quality: ResamplerQuality) -> Self {
        self.config.resampler_quality = quality;
        self
    }

    /// Zero `Ignore` channels on mono up-mix
    #[must_use]
    pub fn silence_ignored_channels(mut self, enable: bool) -> Self {
        self.config.silence_ignored_channels = enable;
        self
    }

    /// Set the initial resample scratch capacity (clamped to at least 1 frame)
    #[must_use]
    pub fn resample_baseline_frames(mut self, frames: usize) -> Self {
        self.config.resample_baseline_frames = frames.max(1);
        self
    }

    /// Set the FFT resampler chunk size (clamped to at least 1 frame)
    #[must_use]
    pub fn fft_chunk_frames(mut self, frames: usize) -> Self {
        self.config.fft_chunk_frames = frames.max(1);
        self
    }

    /// Build the config
    #[must_use]
    pub fn build(self) -> ConversionConfig {
        self.config
    }
}
