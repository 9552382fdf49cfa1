//! Rate and time helpers shared by the converters

use super::format::SampleSpec;

/// Highest sample rate the conversion chain is sized for
pub const MAX_SUPPORTED_RATE: u32 = 92_000;

/// Lowest sample rate the conversion chain is sized for
pub const MIN_SUPPORTED_RATE: u32 = 8_000;

/// Intermediate rate used when a direct resampling ratio is rejected
pub const PIVOT_RATE: u32 = 48_000;

/// Largest reduced ratio term the rate primitive accepts
pub const MAX_POLYPHASE_FACTOR: u32 = 640;

/// Microseconds per second
pub const USEC_PER_SEC: u64 = 1_000_000;

/// Microseconds per millisecond
pub const USEC_PER_MSEC: u64 = 1_000;

/// Convert a frame count expressed at `src` rate to the `dst` rate, rounded up
///
/// # Panics
///
/// Panics if the source rate is zero or the result does not fit in `usize`.
#[must_use]
pub fn convert_src_to_dst_frames(frames: usize, src: &SampleSpec, dst: &SampleSpec) -> usize {
    let src_rate = u64::from(src.sample_rate());
    assert!(src_rate != 0, "source spec has a zero sample rate");
    let scaled = frames as u64 * u64::from(dst.sample_rate());
    let Ok(converted) = usize::try_from(scaled.div_ceil(src_rate)) else {
        panic!("frame count overflow converting {frames} frames");
    };
    converted
}

/// Convert microseconds to milliseconds, rounded up
#[must_use]
pub fn convert_usec_to_msec(usec: u64) -> u64 {
    usec.div_ceil(USEC_PER_MSEC)
}

/// Greatest common divisor
#[must_use]
pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Check whether the rate primitive converts `src_rate` to `dst_rate` in one stage
///
/// Both rates must lie in the supported range and the reduced ratio must
/// fit the polyphase filter bank.
#[must_use]
pub fn is_direct_ratio_supported(src_rate: u32, dst_rate: u32) -> bool {
    let in_range = |rate: u32| (MIN_SUPPORTED_RATE..=MAX_SUPPORTED_RATE).contains(&rate);
    if src_rate == dst_rate || !in_range(src_rate) || !in_range(dst_rate) {
        return false;
    }
    let divisor = gcd(src_rate, dst_rate);
    src_rate / divisor <= MAX_POLYPHASE_FACTOR && dst_rate / divisor <= MAX_POLYPHASE_FACTOR
}

/// Worst-case extra frames needed to absorb rate-conversion rounding
#[must_use]
pub fn rate_headroom_frames() -> usize {
    2 * (MAX_SUPPORTED_RATE / MIN_SUPPORTED_RATE) as usize
}
