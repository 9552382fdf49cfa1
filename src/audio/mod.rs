//! Sample specifications and the buffers and helpers built on them

pub mod buffer;
pub mod format;
pub mod sample;
pub mod utils;


pub use buffer::{AccumulationBuffer, ScratchBuffer};
pub use format::{ChannelPolicy, SampleFormat, SampleSpec, SampleSpecItem, channel_mask_to_count};
pub use sample::{Sample, samples_from_f32, samples_to_f32};
pub use utils::{
    MAX_POLYPHASE_FACTOR, MAX_SUPPORTED_RATE, MIN_SUPPORTED_RATE, PIVOT_RATE, USEC_PER_MSEC,
    USEC_PER_SEC, convert_src_to_dst_frames, convert_usec_to_msec, gcd, is_direct_ratio_supported,
    rate_headroom_frames,
};
