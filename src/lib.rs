//! # audio-conversion
//!
//! PCM sample-format conversion for audio HAL streams.
//!
//! ## Features
//!
//! - Channel remapping with per-channel `Copy` / `Average` / `Ignore` policies
//! - 16-bit to 24-in-32-bit reformatting and back
//! - Sample-rate conversion, pivoting through 48 kHz when a ratio is not
//!   supported directly
//! - A pull-based conversion chain that buffers surplus frames between reads
//!
//! ## Example
//!
//! ```rust
//! use audio_conversion::{ConversionChain, SampleFormat, SampleSpec};
//!
//! # fn example() -> Result<(), audio_conversion::ConversionError> {
//! let src = SampleSpec::new(2, SampleFormat::I16, 48000);
//! let dst = SampleSpec::new(1, SampleFormat::I24In32, 48000);
//!
//! let mut chain = ConversionChain::new();
//! chain.configure(&src, &dst)?;
//!
//! let input = [100i16, 200, -100, -300]
//!     .iter()
//!     .flat_map(|s| s.to_le_bytes())
//!     .collect::<Vec<u8>>();
//! let output = chain.convert(&input, 2, None)?;
//! assert_eq!(output.frames(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Stream**: [`StreamConverter`] - Negotiated client spec attached to a route
//! - **Chain**: [`ConversionChain`] - Plans and runs up to three converters
//! - **Converters**: [`convert`] - One dimension each: channels, format, rate

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Configuration
pub mod config;
/// Error types
pub mod error;

/// Testing utilities
pub mod testing;

pub mod audio;
pub mod chain;
pub mod convert;
pub mod stream;

// Re-exports
pub use audio::{ChannelPolicy, SampleFormat, SampleSpec, SampleSpecItem};
pub use chain::{AcquiredFrames, ConversionChain, ConversionPlan, FrameProvider, plan_conversion};
pub use config::{ConversionConfig, ConversionConfigBuilder, ResamplerQuality};
pub use convert::{ConvertedBuffer, Converter, Reformatter, Remapper, Resampler};
pub use error::{ConversionError, ProviderError};
pub use stream::{StreamConverter, StreamDirection, StreamParams, negotiate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        ChannelPolicy, ConversionChain, ConversionConfig, ConversionError, ConvertedBuffer,
        FrameProvider, SampleFormat, SampleSpec, StreamConverter, StreamDirection,
    };
}
