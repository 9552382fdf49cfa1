//! Numeric view over the supported PCM sample containers

/// A PCM sample container the converters operate on
///
/// Implemented for `i16` ([`SampleFormat::I16`](super::SampleFormat::I16)) and
/// `i32` ([`SampleFormat::I24In32`](super::SampleFormat::I24In32)).
pub trait Sample: Copy + Default + Send + 'static {
    /// Container size in bytes
    const BYTES: usize;
    /// Smallest representable value, as `f32` for saturation
    const MIN_F32: f32;
    /// Largest representable value, as `f32` for saturation
    const MAX_F32: f32;
    /// Full-scale value used to normalise to `[-1.0, 1.0)`
    const FULL_SCALE: f32;

    /// Read one little-endian sample at sample index `index`
    fn read(bytes: &[u8], index: usize) -> Self;

    /// Write one little-endian sample at sample index `index`
    fn write(self, bytes: &mut [u8], index: usize);

    /// Widen to the averaging accumulator
    fn to_i64(self) -> i64;

    /// Narrow from the averaging accumulator, truncating
    fn from_i64(value: i64) -> Self;

    /// Normalise to float
    fn to_f32(self) -> f32;

    /// Scale a normalised float back, clamping to the representable range
    fn from_f32_saturating(value: f32) -> Self;
}

impl Sample for i16 {
    const BYTES: usize = 2;
    const MIN_F32: f32 = -32_768.0;
    const MAX_F32: f32 = 32_767.0;
    const FULL_SCALE: f32 = 32_768.0;

    #[inline]
    fn read(bytes: &[u8], index: usize) -> Self {
        let offset = index * Self::BYTES;
        i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[inline]
    fn write(self, bytes: &mut [u8], index: usize) {
        let offset = index * Self::BYTES;
        bytes[offset..offset + Self::BYTES].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Callers pass averages of i16 samples, which fit in i16"
    )]
    fn from_i64(value: i64) -> Self {
        value as i16
    }

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self) / Self::FULL_SCALE
    }

    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Value is clamped to the i16 range before the cast"
    )]
    fn from_f32_saturating(value: f32) -> Self {
        (value * Self::FULL_SCALE)
            .round()
            .clamp(Self::MIN_F32, Self::MAX_F32) as i16
    }
}

/// 24 significant bits, sign extended in 32
impl Sample for i32 {
    const BYTES: usize = 4;
    const MIN_F32: f32 = -8_388_608.0;
    const MAX_F32: f32 = 8_388_607.0;
    const FULL_SCALE: f32 = 8_388_608.0;

    #[inline]
    fn read(bytes: &[u8], index: usize) -> Self {
        let offset = index * Self::BYTES;
        i32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[inline]
    fn write(self, bytes: &mut [u8], index: usize) {
        let offset = index * Self::BYTES;
        bytes[offset..offset + Self::BYTES].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn to_i64(self) -> i64 {
        i64::from(self)
    }

    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Callers pass averages of i32 samples, which fit in i32"
    )]
    fn from_i64(value: i64) -> Self {
        value as i32
    }

    #[inline]
    #[allow(
        clippy::cast_precision_loss,
        reason = "24 significant bits fit the f32 mantissa exactly"
    )]
    fn to_f32(self) -> f32 {
        self as f32 / Self::FULL_SCALE
    }

    #[inline]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Value is clamped to the 24-bit range before the cast"
    )]
    fn from_f32_saturating(value: f32) -> Self {
        (value * Self::FULL_SCALE)
            .round()
            .clamp(Self::MIN_F32, Self::MAX_F32) as i32
    }
}

/// Decode `count` samples into normalised floats
pub fn samples_to_f32<S: Sample>(bytes: &[u8], output: &mut [f32], count: usize) {
    for (index, out) in output[..count].iter_mut().enumerate() {
        *out = S::read(bytes, index).to_f32();
    }
}

/// Encode `count` normalised floats, saturating out-of-range values
pub fn samples_from_f32<S: Sample>(input: &[f32], bytes: &mut [u8], count: usize) {
    for (index, &value) in input[..count].iter().enumerate() {
        S::from_f32_saturating(value).write(bytes, index);
    }
}
